use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use cozir_lib::port;
use cozir_lib::sim::SimulatedSensor;
use cozir_lib::{Error, Transport};

/// Answer COZIR commands on a serial port with a simulated sensor
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// UART device the host tool is connected to
    port: String,

    /// UART baud rate
    #[clap(long, short, default_value_t = 9600)]
    baudrate: u32,

    /// Streaming interval in milliseconds
    #[clap(long, short, default_value_t = 500)]
    interval: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(false)
        .init();

    let interval = Duration::from_millis(args.interval);
    let mut port = port::open_port(&args.port, args.baudrate, true, interval)?;
    let mut sensor = SimulatedSensor::new();
    info!("simulating cozir on {} @ {} baud", args.port, args.baudrate);

    loop {
        match port.receive_line(interval) {
            Ok(line) => sensor.send(line.as_bytes())?,
            Err(Error::Timeout) => sensor.tick(),
            Err(e) => return Err(e.into()),
        }

        while let Ok(reply) = sensor.receive_line(Duration::ZERO) {
            debug!("reply {:?}", reply);
            port.send(reply.as_bytes())?;
        }
    }
}
