//! Host side driver for COZIR CO2 sensors.
//!
//! The sensor speaks a line based ASCII protocol: a single letter opcode,
//! optional decimal arguments and CRLF. [`Cozir`] wraps any [`Transport`]
//! and exposes one method per sensor command.
//!
//! ```no_run
//! use std::time::Duration;
//! use cozir_lib::{port, Cozir};
//!
//! # fn main() -> anyhow::Result<()> {
//! let transport = port::open_port("auto", 9600, false, Duration::from_secs(1))?;
//! let mut cozir = Cozir::new(transport);
//! cozir.init()?;
//! println!("{} ppm", cozir.co2()?);
//! # Ok(())
//! # }
//! ```

mod calibration;
pub mod fields;
pub mod port;
pub mod protocol;
pub mod regs;
pub mod sensor;
pub mod sim;

pub use fields::OutputFields;
pub use port::Transport;
pub use protocol::{Error, OperatingMode, Result};
pub use sensor::{Cozir, SessionConfig};
