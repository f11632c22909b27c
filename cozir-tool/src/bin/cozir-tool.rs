pub mod cli;

use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use log::{debug, error};

use cozir_lib::port::{self, SerialTransport};
use cozir_lib::regs::{self, RegName};
use cozir_lib::{protocol, Cozir, SessionConfig};

use cli::{Calibration, Cli, Commands, Quantity};

type Sensor = Cozir<SerialTransport>;

enum OutputFormat {
    Plain,
    Json,
}

/// Retries `op` until it succeeds or `retries` extra attempts are used up.
fn with_retries<T, F>(retries: usize, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> protocol::Result<T>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                attempt += 1;
                debug!("{} failed ({}), retry {}/{}", what, e, attempt, retries);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to {}", what)),
        }
    }
}

fn cmd_list_registers(fmt: OutputFormat) -> Result<String> {
    let regs = regs::list_registers();
    Ok(match fmt {
        OutputFormat::Plain => regs
            .iter()
            .map(|reg| reg.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => json::stringify(
            regs.iter()
                .map(|reg| {
                    json::object! {
                        name: reg.name,
                        address: reg.address,
                        size: reg.size as u8,
                        access: reg.access.to_string(),
                        default: reg.default,
                    }
                })
                .collect::<Vec<_>>(),
        ),
    })
}

fn cmd_read(
    cozir: &mut Sensor,
    retries: usize,
    quantity: Quantity,
    fmt: OutputFormat,
) -> Result<String> {
    match quantity {
        Quantity::Celsius => with_retries(retries, "read temperature", || cozir.celsius())
            .map(|v| format!("{:.1}", v)),
        Quantity::Fahrenheit => with_retries(retries, "read temperature", || cozir.fahrenheit())
            .map(|v| format!("{:.1}", v)),
        Quantity::Kelvin => with_retries(retries, "read temperature", || cozir.kelvin())
            .map(|v| format!("{:.2}", v)),
        Quantity::Humidity => with_retries(retries, "read humidity", || cozir.humidity())
            .map(|v| format!("{:.1}", v)),
        Quantity::Light => {
            with_retries(retries, "read light", || cozir.light()).map(|v| v.to_string())
        }
        Quantity::Co2 => with_retries(retries, "read co2", || cozir.co2()).map(|v| v.to_string()),
        Quantity::All => {
            let temperature = with_retries(retries, "read temperature", || cozir.celsius())?;
            let humidity = with_retries(retries, "read humidity", || cozir.humidity())?;
            let light = with_retries(retries, "read light", || cozir.light())?;
            let co2 = with_retries(retries, "read co2", || cozir.co2())?;

            Ok(match fmt {
                OutputFormat::Plain => format!(
                    "temperature {:.1}\nhumidity {:.1}\nlight {}\nco2 {}",
                    temperature, humidity, light, co2
                ),
                OutputFormat::Json => json::stringify(json::object! {
                    temperature: temperature,
                    humidity: humidity,
                    light: light,
                    co2: co2,
                }),
            })
        }
    }
}

fn cmd_recent(cozir: &mut Sensor, retries: usize, fmt: OutputFormat) -> Result<String> {
    let recent = with_retries(retries, "read recent fields", || cozir.get_recent_fields())?;

    Ok(match fmt {
        OutputFormat::Plain => recent
            .fields()
            .iter()
            .map(|(tag, value)| format!("{} {}", tag, value))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => {
            let mut obj = json::JsonValue::new_object();
            for (tag, value) in recent.fields() {
                obj[tag.to_string().as_str()] = (*value).into();
            }
            json::stringify(obj)
        }
    })
}

fn cmd_calibrate(cozir: &mut Sensor, retries: usize, kind: Calibration) -> Result<String> {
    let reference = match kind {
        Calibration::FreshAir => {
            with_retries(retries, "calibrate in fresh air", || cozir.calibrate_fresh_air())?
        }
        Calibration::Nitrogen => {
            with_retries(retries, "calibrate in nitrogen", || cozir.calibrate_nitrogen())?
        }
        Calibration::KnownGas { concentration } => {
            with_retries(retries, "calibrate with known gas", || {
                cozir.calibrate_known_gas(concentration)
            })?
        }
        Calibration::FineTune { reading, expected } => {
            with_retries(retries, "fine tune zero point", || {
                cozir.fine_tune_zero_point(reading, expected)
            })?
        }
    };
    Ok(reference.to_string())
}

fn cmd_filter(cozir: &mut Sensor, retries: usize, value: Option<u8>) -> Result<String> {
    match value {
        Some(value) => with_retries(retries, "set digital filter", || cozir.set_digi_filter(value))
            .map(|_| String::new()),
        None => with_retries(retries, "get digital filter", || cozir.get_digi_filter())
            .map(|v| v.to_string()),
    }
}

fn cmd_read_reg(cozir: &mut Sensor, retries: usize, name: RegName) -> Result<String> {
    let reg = regs::find_register(&name).ok_or(anyhow!("Register {} not found", name.0))?;
    with_retries(retries, "read register", || cozir.get_register(&reg)).map(|v| v.to_string())
}

fn cmd_write_reg(cozir: &mut Sensor, retries: usize, name: RegName, value: u16) -> Result<String> {
    let reg = regs::find_register(&name).ok_or(anyhow!("Register {} not found", name.0))?;
    with_retries(retries, "write register", || cozir.set_register(&reg, value))
        .map(|_| String::new())
}

fn do_main() -> Result<String> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(Bash, &mut Cli::command(), "cozir-tool", &mut io::stdout());

        return Ok(String::default());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let fmt = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    if let Commands::ListRegisters = cli.command {
        return cmd_list_registers(fmt);
    }

    let timeout = Duration::from_millis(cli.timeout);
    let transport = port::open_port(&cli.port, cli.baudrate, cli.force, timeout)
        .with_context(|| format!("Can't open port '{}'", cli.port))?;
    let mut cozir = Cozir::with_config(
        transport,
        SessionConfig {
            timeout,
            ..SessionConfig::default()
        },
    );
    let retries = cli.retries;

    let mode = match cli.command {
        Commands::Mode { mode } => mode,
        _ => cli.mode,
    };
    with_retries(retries, "set operating mode", || cozir.set_operating_mode(mode))?;

    match cli.command {
        Commands::ListRegisters | Commands::Mode { .. } => Ok(String::new()),
        Commands::Read { quantity } => cmd_read(&mut cozir, retries, quantity, fmt),
        Commands::Fields { fields } => {
            with_retries(retries, "set output fields", || cozir.set_output_fields(fields))?;
            Ok(cozir.output_fields().to_string())
        }
        Commands::Recent => cmd_recent(&mut cozir, retries, fmt),
        Commands::Calibrate { kind } => cmd_calibrate(&mut cozir, retries, kind),
        Commands::Filter { value } => cmd_filter(&mut cozir, retries, value),
        Commands::ReadEeprom { address } => {
            with_retries(retries, "read eeprom", || cozir.get_eeprom(address))
                .map(|v| v.to_string())
        }
        Commands::WriteEeprom { address, value } => {
            with_retries(retries, "write eeprom", || cozir.set_eeprom(address, value))
                .map(|_| String::new())
        }
        Commands::ReadReg { reg } => cmd_read_reg(&mut cozir, retries, reg),
        Commands::WriteReg { reg, value } => cmd_write_reg(&mut cozir, retries, reg, value),
        Commands::Version => with_retries(retries, "read version", || cozir.version()),
        Commands::Config => with_retries(retries, "read configuration", || cozir.configuration()),
        Commands::PpmFactor => {
            with_retries(retries, "read ppm factor", || cozir.ppm_factor()).map(|v| v.to_string())
        }
    }
}

fn main() {
    match do_main() {
        Ok(s) => println!("{}", s),
        Err(e) => error!("{:#}", e),
    }
}
