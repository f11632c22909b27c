mod command;
mod response;

use num_derive::FromPrimitive;
use std::{fmt::Display, io, str::FromStr};
use thiserror::Error;

pub use command::Command;
pub use response::{
    check_ack, decode_humidity, decode_temperature, RecentFields, Response,
    TEMPERATURE_ZERO_POINT,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("timed out waiting for response")]
    Timeout,
    #[error("malformed response {line:?}: {reason}")]
    MalformedResponse { line: String, reason: &'static str },
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn malformed(line: &str, reason: &'static str) -> Self {
        Error::MalformedResponse {
            line: line.trim_end().to_string(),
            reason,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Transport(err),
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    OperatingMode = b'K',
    OutputFields = b'M',
    Temperature = b'T',
    Humidity = b'H',
    Light = b'L',
    Co2 = b'Z',
    FineTuneZeroPoint = b'F',
    CalibrateFreshAir = b'G',
    CalibrateNitrogen = b'U',
    CalibrateKnownGas = b'X',
    SetDigiFilter = b'A',
    GetDigiFilter = b'a',
    SetEeprom = b'P',
    GetEeprom = b'p',
    RecentFields = b'Q',
    Version = b'Y',
    Configuration = b'*',
    PpmFactor = b'.',
}

impl Opcode {
    pub fn as_char(self) -> char {
        char::from(self as u8)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_char().fmt(f)
    }
}

/// Reply behaviour of the sensor, selected with the `K` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum OperatingMode {
    /// Sensor answers each command with a single line.
    Command = 0,
    /// Sensor pushes measurement lines on its own.
    Streaming = 1,
    /// Sensor acknowledges with `K 0` before every answer.
    Polling = 2,
}

impl Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::Command => "command".fmt(f),
            OperatingMode::Streaming => "streaming".fmt(f),
            OperatingMode::Polling => "polling".fmt(f),
        }
    }
}

#[derive(Error, Debug)]
pub enum OperatingModeError {
    #[error("invalid operating mode '{0}'")]
    BadMode(String),
}

impl FromStr for OperatingMode {
    type Err = OperatingModeError;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input {
            "0" | "command" => Ok(OperatingMode::Command),
            "1" | "streaming" => Ok(OperatingMode::Streaming),
            "2" | "polling" => Ok(OperatingMode::Polling),
            _ => Err(OperatingModeError::BadMode(input.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn opcode_from_wire_byte() {
        assert_eq!(Opcode::from_u8(b'K'), Some(Opcode::OperatingMode));
        assert_eq!(Opcode::from_u8(b'p'), Some(Opcode::GetEeprom));
        assert_eq!(Opcode::from_u8(b'.'), Some(Opcode::PpmFactor));
        assert_eq!(Opcode::from_u8(b'k'), None);
    }

    #[test]
    fn opcode_case_is_significant() {
        assert_ne!(Opcode::SetDigiFilter.as_char(), Opcode::GetDigiFilter.as_char());
        assert_eq!(Opcode::SetEeprom.to_string(), "P");
        assert_eq!(Opcode::GetEeprom.to_string(), "p");
    }

    #[test]
    fn operating_mode_parse() {
        assert_eq!("polling".parse::<OperatingMode>().unwrap(), OperatingMode::Polling);
        assert_eq!("1".parse::<OperatingMode>().unwrap(), OperatingMode::Streaming);
        assert!("burst".parse::<OperatingMode>().is_err());
        assert_eq!(OperatingMode::from_u32(0), Some(OperatingMode::Command));
        assert_eq!(OperatingMode::from_u32(3), None);
    }

    #[test]
    fn io_timeout_maps_to_timeout() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, Error::Timeout));

        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Transport(_)));
    }
}
