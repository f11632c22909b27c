use clap::{Parser, Subcommand};
use std::str::FromStr;
use thiserror::Error;

use cozir_lib::regs::RegName;
use cozir_lib::{OperatingMode, OutputFields};

#[derive(Error, Debug)]
pub enum QuantityError {
    #[error("invalid quantity '{0}'")]
    BadQuantity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Celsius,
    Fahrenheit,
    Kelvin,
    Humidity,
    Light,
    Co2,
    All,
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "t" | "temperature" | "celsius" => Ok(Quantity::Celsius),
            "fahrenheit" => Ok(Quantity::Fahrenheit),
            "kelvin" => Ok(Quantity::Kelvin),
            "h" | "humidity" => Ok(Quantity::Humidity),
            "l" | "light" => Ok(Quantity::Light),
            "z" | "co2" => Ok(Quantity::Co2),
            "all" => Ok(Quantity::All),
            _ => Err(QuantityError::BadQuantity(input.to_string())),
        }
    }
}

fn parse_with_radix<T>(input: &str) -> Result<T, T::FromStrRadixErr>
where
    T: num::Num,
    <T as num::Num>::FromStrRadixErr: std::error::Error + Send + Sync,
{
    if input.starts_with("0x") {
        T::from_str_radix(input.trim_start_matches("0x"), 16)
    } else if input.starts_with("0b") {
        T::from_str_radix(input.trim_start_matches("0b"), 2)
    } else {
        T::from_str_radix(input, 10)
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Skip sanity checks
    #[clap(long, short)]
    pub force: bool,

    /// enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// UART device or 'auto'
    #[clap(long, short, default_value = "auto")]
    pub port: String,

    /// UART baud rate
    #[clap(long, short, default_value_t = 9600)]
    pub baudrate: u32,

    /// Response timeout in milliseconds
    #[clap(long, short, default_value_t = 1000)]
    pub timeout: u64,

    /// Retry count for failed exchanges
    #[clap(long, short, default_value_t = 0)]
    pub retries: usize,

    /// Use json-formatted output
    #[clap(long, short)]
    pub json: bool,

    /// Operating mode to put the sensor in before running the command
    #[clap(long, short, default_value = "polling")]
    pub mode: OperatingMode,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Calibration {
    /// Zero point calibration in fresh air
    FreshAir,

    /// Zero point calibration in nitrogen
    Nitrogen,

    /// Zero point calibration at a known concentration
    KnownGas { concentration: u16 },

    /// Correct zero point from a reading and the true concentration
    FineTune { reading: u16, expected: u16 },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List EEPROM registers
    ListRegisters,

    /// Set operating mode (command, streaming, polling)
    Mode { mode: OperatingMode },

    /// Read a measurement (temperature, fahrenheit, kelvin, humidity, light, co2, all)
    Read {
        #[clap(default_value = "all")]
        quantity: Quantity,
    },

    /// Select output fields, e.g. 'humidity,rawtemp,rawco2' or 'none'
    Fields { fields: OutputFields },

    /// Fetch the most recent measurement line
    Recent,

    /// Run a calibration
    Calibrate {
        #[clap(subcommand)]
        kind: Calibration,
    },

    /// Get or set the digital filter
    Filter { value: Option<u8> },

    /// Read EEPROM byte
    #[clap(visible_alias = "readb")]
    ReadEeprom {
        #[clap(parse(try_from_str=parse_with_radix))]
        address: u16,
    },

    /// Write EEPROM byte
    #[clap(visible_alias = "writeb")]
    WriteEeprom {
        #[clap(parse(try_from_str=parse_with_radix))]
        address: u16,
        #[clap(parse(try_from_str=parse_with_radix))]
        value: u16,
    },

    /// Read register
    ReadReg { reg: RegName },

    /// Write register
    WriteReg {
        reg: RegName,
        #[clap(parse(try_from_str=parse_with_radix))]
        value: u16,
    },

    /// Print firmware version
    Version,

    /// Print configuration dump
    Config,

    /// Print CO2 ppm multiplier
    PpmFactor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix() {
        assert_eq!(parse_with_radix::<u16>("0x0A").unwrap(), 10);
        assert_eq!(parse_with_radix::<u16>("0b101").unwrap(), 5);
        assert_eq!(parse_with_radix::<u16>("42").unwrap(), 42);
        assert!(parse_with_radix::<u8>("0x100").is_err());
    }

    #[test]
    fn quantity() {
        assert_eq!("co2".parse::<Quantity>().unwrap(), Quantity::Co2);
        assert_eq!("t".parse::<Quantity>().unwrap(), Quantity::Celsius);
        assert!("dust".parse::<Quantity>().is_err());
    }

    #[test]
    fn parse_command_line() {
        let cli = Cli::parse_from(["cozir-tool", "-p", "/dev/ttyUSB0", "fields", "humidity,rawco2"]);
        assert_eq!(cli.port, "/dev/ttyUSB0");
        assert_eq!(cli.mode, OperatingMode::Polling);
        match cli.command {
            Commands::Fields { fields } => {
                assert_eq!(fields, OutputFields::HUMIDITY | OutputFields::RAWCO2)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
