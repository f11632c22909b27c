use std::fmt::Display;

use super::Opcode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    args: Vec<u32>,
}

impl Command {
    pub fn new(opcode: Opcode) -> Self {
        Command {
            opcode,
            args: Vec::new(),
        }
    }

    pub fn with_args(opcode: Opcode, args: &[u32]) -> Self {
        Command {
            opcode,
            args: args.to_vec(),
        }
    }

    pub fn arg(mut self, value: u32) -> Self {
        self.args.push(value);
        self
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn args(&self) -> &[u32] {
        &self.args
    }

    /// Wire form: opcode, space separated decimal arguments, CRLF.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opcode)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_no_args() {
        assert_eq!(Command::new(Opcode::Version).encode(), b"Y\r\n");
        assert_eq!(Command::new(Opcode::Configuration).encode(), b"*\r\n");
        assert_eq!(Command::new(Opcode::PpmFactor).encode(), b".\r\n");
        assert_eq!(Command::new(Opcode::GetDigiFilter).encode(), b"a\r\n");
    }

    #[test]
    fn encode_single_arg() {
        assert_eq!(
            Command::new(Opcode::OperatingMode).arg(2).encode(),
            b"K 2\r\n"
        );
        assert_eq!(
            Command::new(Opcode::OutputFields).arg(4226).encode(),
            b"M 4226\r\n"
        );
        assert_eq!(
            Command::new(Opcode::CalibrateKnownGas).arg(100).encode(),
            b"X 100\r\n"
        );
    }

    #[test]
    fn encode_two_args() {
        assert_eq!(
            Command::with_args(Opcode::SetEeprom, &[100, 42]).encode(),
            b"P 100 42\r\n"
        );
        assert_eq!(
            Command::with_args(Opcode::FineTuneZeroPoint, &[100, 50]).encode(),
            b"F 100 50\r\n"
        );
    }

    #[test]
    fn zero_is_rendered() {
        assert_eq!(
            Command::new(Opcode::OperatingMode).arg(0).encode(),
            b"K 0\r\n"
        );
    }

    #[test]
    fn accessors() {
        let cmd = Command::with_args(Opcode::GetEeprom, &[7]);
        assert_eq!(cmd.opcode(), Opcode::GetEeprom);
        assert_eq!(cmd.args(), &[7]);
        assert_eq!(cmd.to_string(), "p 7");
    }
}
