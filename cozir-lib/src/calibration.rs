use log::{debug, warn};

use crate::port::Transport;
use crate::protocol::{Command, Error, Opcode, Result};
use crate::regs::{self, Reg, RegSize};
use crate::sensor::Cozir;

const EEPROM_MAX_ADDRESS: u16 = 0xFF;

impl<T: Transport> Cozir<T> {
    /// Corrects the zero point given a `reading` the sensor reported while
    /// exposed to an `expected` concentration.
    pub fn fine_tune_zero_point(&mut self, reading: u16, expected: u16) -> Result<u32> {
        let cmd = Command::with_args(
            Opcode::FineTuneZeroPoint,
            &[reading.into(), expected.into()],
        );
        self.calibrate(&cmd)
    }

    /// Zero point calibration in fresh air, assumed to be at the background
    /// concentration register (`ACPPM`).
    pub fn calibrate_fresh_air(&mut self) -> Result<u32> {
        self.calibrate(&Command::new(Opcode::CalibrateFreshAir))
    }

    pub fn calibrate_nitrogen(&mut self) -> Result<u32> {
        self.calibrate(&Command::new(Opcode::CalibrateNitrogen))
    }

    pub fn calibrate_known_gas(&mut self, concentration: u16) -> Result<u32> {
        self.calibrate(&Command::new(Opcode::CalibrateKnownGas).arg(concentration.into()))
    }

    // The answer is the new internal zero point reference. The sensor keeps
    // settling for a while afterwards; waiting is up to the caller.
    fn calibrate(&mut self, cmd: &Command) -> Result<u32> {
        let reference = self.request(cmd)?.value()?;
        debug!("{} -> zero point {}", cmd, reference);
        Ok(reference)
    }

    pub fn set_digi_filter(&mut self, value: u8) -> Result<()> {
        let value = u32::from(value);
        self.request(&Command::new(Opcode::SetDigiFilter).arg(value))?
            .confirm(&[value])
    }

    pub fn get_digi_filter(&mut self) -> Result<u8> {
        let value = self.request_value(Opcode::GetDigiFilter)?;
        u8::try_from(value).map_err(|_| Error::MalformedResponse {
            line: format!("a {}", value),
            reason: "filter value out of range",
        })
    }

    /// Writes one raw EEPROM byte.
    pub fn set_eeprom(&mut self, address: u16, value: u16) -> Result<()> {
        if address > EEPROM_MAX_ADDRESS {
            return Err(Error::InvalidArgument(format!(
                "eeprom address {} out of range",
                address
            )));
        }
        if value > u8::MAX as u16 {
            return Err(Error::InvalidArgument(format!(
                "eeprom value {} does not fit a byte",
                value
            )));
        }

        let args: [u32; 2] = [address.into(), value.into()];
        self.request(&Command::with_args(Opcode::SetEeprom, &args))?
            .confirm(&args)
    }

    /// Reads one raw EEPROM byte.
    pub fn get_eeprom(&mut self, address: u16) -> Result<u8> {
        if address > EEPROM_MAX_ADDRESS {
            return Err(Error::InvalidArgument(format!(
                "eeprom address {} out of range",
                address
            )));
        }

        let response = self.request(&Command::new(Opcode::GetEeprom).arg(address.into()))?;
        let value = response.value()?;
        u8::try_from(value).map_err(|_| Error::MalformedResponse {
            line: format!("p {}", value),
            reason: "eeprom value does not fit a byte",
        })
    }

    /// Reads a register, high byte first. Nothing is combined unless both
    /// bytes were read.
    pub fn get_register(&mut self, reg: &Reg) -> Result<u16> {
        match reg.size {
            RegSize::Byte => self.get_eeprom(reg.address.into()).map(u16::from),
            RegSize::Half => {
                let hi = self.get_eeprom(reg.address.into())?;
                let lo = self.get_eeprom(u16::from(reg.address) + 1)?;
                Ok(u16::from_be_bytes([hi, lo]))
            }
        }
    }

    /// Writes a register, high byte first.
    ///
    /// The current bytes are read beforehand. When a byte write fails, every
    /// byte up to and including the failed one is put back, since the sensor
    /// may have stored a byte whose reply got lost.
    pub fn set_register(&mut self, reg: &Reg, value: u16) -> Result<()> {
        if !reg.access.writable() {
            return Err(Error::InvalidArgument(format!(
                "register {} is read-only",
                reg.name
            )));
        }
        if value > reg.max_value() {
            return Err(Error::InvalidArgument(format!(
                "value {} out of range for register {}",
                value, reg.name
            )));
        }

        let cells = reg.split(value);
        let previous = cells
            .iter()
            .map(|&(address, _)| self.get_eeprom(address.into()))
            .collect::<Result<Vec<_>>>()?;

        for (i, &(address, byte)) in cells.iter().enumerate() {
            if let Err(e) = self.set_eeprom(address.into(), byte.into()) {
                warn!("{} write failed at {}, restoring", reg.name, address);
                self.restore(&cells[..=i], &previous);
                return Err(e);
            }
        }

        debug!("{} <- {}", reg.name, value);
        Ok(())
    }

    fn restore(&mut self, cells: &[(u8, u8)], previous: &[u8]) {
        for (&(address, _), &old) in cells.iter().zip(previous) {
            if let Err(e) = self.set_eeprom(address.into(), old.into()) {
                warn!("restoring eeprom {} failed: {}", address, e);
            }
        }
    }

    fn named_register(name: &str) -> Result<Reg> {
        regs::register(name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown register {}", name)))
    }

    pub fn get_auto_calibration_preload(&mut self) -> Result<u16> {
        self.get_register(&Self::named_register("ACINIT")?)
    }

    pub fn set_auto_calibration_preload(&mut self, value: u16) -> Result<()> {
        self.set_register(&Self::named_register("ACINIT")?, value)
    }

    /// Days between automatic zero point calibrations.
    pub fn get_auto_calibration_interval(&mut self) -> Result<u16> {
        self.get_register(&Self::named_register("ACINTERVAL")?)
    }

    pub fn set_auto_calibration_interval(&mut self, value: u16) -> Result<()> {
        self.set_register(&Self::named_register("ACINTERVAL")?, value)
    }

    pub fn get_auto_calibration(&mut self) -> Result<bool> {
        self.get_register(&Self::named_register("ACONOFF")?)
            .map(|v| v != 0)
    }

    pub fn set_auto_calibration(&mut self, on: bool) -> Result<()> {
        self.set_register(&Self::named_register("ACONOFF")?, on.into())
    }

    pub fn get_auto_calibration_background_concentration(&mut self) -> Result<u16> {
        self.get_register(&Self::named_register("ACPPM")?)
    }

    pub fn set_auto_calibration_background_concentration(&mut self, value: u16) -> Result<()> {
        self.set_register(&Self::named_register("ACPPM")?, value)
    }

    pub fn get_ambient_concentration(&mut self) -> Result<u16> {
        self.get_register(&Self::named_register("AMBIENT")?)
    }

    pub fn set_ambient_concentration(&mut self, value: u16) -> Result<()> {
        self.set_register(&Self::named_register("AMBIENT")?, value)
    }

    pub fn get_buffer_clear_time(&mut self) -> Result<u16> {
        self.get_register(&Self::named_register("BUFFER_CLEAR")?)
    }

    pub fn set_buffer_clear_time(&mut self, value: u16) -> Result<()> {
        self.set_register(&Self::named_register("BUFFER_CLEAR")?, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockTransport;
    use crate::protocol::OperatingMode;
    use crate::sensor::SessionConfig;
    use crate::sim::SimulatedSensor;

    fn command_mode<T: Transport>(transport: T) -> Cozir<T> {
        Cozir::with_config(
            transport,
            SessionConfig {
                mode: OperatingMode::Command,
                ..SessionConfig::default()
            },
        )
    }

    fn simulated() -> Cozir<SimulatedSensor> {
        let mut cozir = Cozir::new(SimulatedSensor::new());
        cozir.init().unwrap();
        cozir
    }

    #[test]
    fn calibration_wire_format() {
        let mut cozir = command_mode(MockTransport::new());
        cozir
            .transport_mut()
            .push_line("F 32950")
            .push_line("G 33000")
            .push_line("U 32000")
            .push_line("X 32100");

        assert_eq!(cozir.fine_tune_zero_point(100, 50).unwrap(), 32950);
        assert_eq!(cozir.calibrate_fresh_air().unwrap(), 33000);
        assert_eq!(cozir.calibrate_nitrogen().unwrap(), 32000);
        assert_eq!(cozir.calibrate_known_gas(100).unwrap(), 32100);

        assert_eq!(
            cozir.transport().sent(),
            &["F 100 50\r\n", "G\r\n", "U\r\n", "X 100\r\n"].map(String::from)
        );
    }

    #[test]
    fn digi_filter() {
        let mut cozir = command_mode(MockTransport::new());
        cozir.transport_mut().push_line("A 00042").push_line("a 00042");

        cozir.set_digi_filter(42).unwrap();
        assert_eq!(cozir.get_digi_filter().unwrap(), 42);
        assert_eq!(
            cozir.transport().sent(),
            &["A 42\r\n", "a\r\n"].map(String::from)
        );
    }

    #[test]
    fn digi_filter_out_of_range() {
        let mut cozir = command_mode(MockTransport::new());
        cozir.transport_mut().push_line("a 00300");

        assert!(matches!(
            cozir.get_digi_filter(),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn eeprom_wire_format() {
        let mut cozir = command_mode(MockTransport::new());
        cozir
            .transport_mut()
            .push_line("P 00100 00042")
            .push_line("p 00042");

        cozir.set_eeprom(100, 42).unwrap();
        assert_eq!(cozir.get_eeprom(100).unwrap(), 42);
        assert_eq!(
            cozir.transport().sent(),
            &["P 100 42\r\n", "p 100\r\n"].map(String::from)
        );
    }

    #[test]
    fn eeprom_write_reply_must_echo_arguments() {
        for reply in ["P", "P 00100", "P 00100 00043", "P 00101 00042", "P x 00042"] {
            let mut cozir = command_mode(MockTransport::new());
            cozir.transport_mut().push_line(reply);

            assert!(
                matches!(cozir.set_eeprom(100, 42), Err(Error::MalformedResponse { .. })),
                "{:?} accepted",
                reply
            );
        }
    }

    #[test]
    fn digi_filter_reply_must_echo_value() {
        for reply in ["A", "A xyz", "A 00041"] {
            let mut cozir = command_mode(MockTransport::new());
            cozir.transport_mut().push_line(reply);

            assert!(
                matches!(cozir.set_digi_filter(42), Err(Error::MalformedResponse { .. })),
                "{:?} accepted",
                reply
            );
        }
    }

    #[test]
    fn eeprom_arguments_checked_before_sending() {
        let mut cozir = command_mode(MockTransport::new());

        assert!(matches!(
            cozir.set_eeprom(256, 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            cozir.set_eeprom(1, 256),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            cozir.get_eeprom(300),
            Err(Error::InvalidArgument(_))
        ));
        assert!(cozir.transport().sent().is_empty());
    }

    #[test]
    fn register_read_is_big_endian() {
        let mut cozir = command_mode(MockTransport::new());
        cozir.transport_mut().push_line("p 00087").push_line("p 00192");

        assert_eq!(cozir.get_auto_calibration_preload().unwrap(), 22464);
        assert_eq!(
            cozir.transport().sent(),
            &["p 3\r\n", "p 4\r\n"].map(String::from)
        );
    }

    #[test]
    fn register_read_aborts_after_first_failure() {
        let mut cozir = command_mode(MockTransport::new());
        cozir.transport_mut().push_timeout().push_line("p 00192");

        assert!(matches!(
            cozir.get_ambient_concentration(),
            Err(Error::Timeout)
        ));
        assert_eq!(cozir.transport().sent(), &["p 10\r\n".to_string()]);
    }

    #[test]
    fn register_write_order() {
        let mut cozir = command_mode(MockTransport::new());
        cozir
            .transport_mut()
            .push_line("p 00001")
            .push_line("p 00194")
            .push_line("P 00010 00001")
            .push_line("P 00011 00244");

        cozir.set_ambient_concentration(500).unwrap();
        assert_eq!(
            cozir.transport().sent(),
            &["p 10\r\n", "p 11\r\n", "P 10 1\r\n", "P 11 244\r\n"].map(String::from)
        );
    }

    #[test]
    fn register_write_with_wrong_echo_is_rolled_back() {
        let mut cozir = command_mode(MockTransport::new());
        cozir
            .transport_mut()
            .push_line("p 00001")
            .push_line("p 00194")
            .push_line("P 00010 00001")
            .push_line("P 00011 00243")
            .push_line("P 00010 00001")
            .push_line("P 00011 00194");

        assert!(matches!(
            cozir.set_ambient_concentration(500),
            Err(Error::MalformedResponse { .. })
        ));
        assert_eq!(
            cozir.transport().sent(),
            &["p 10\r\n", "p 11\r\n", "P 10 1\r\n", "P 11 244\r\n", "P 10 1\r\n", "P 11 194\r\n"]
                .map(String::from)
        );
    }

    #[test]
    fn first_byte_timeout_is_restored() {
        let mut cozir = command_mode(MockTransport::new());
        cozir
            .transport_mut()
            .push_line("p 00001")
            .push_line("p 00194")
            .push_timeout()
            .push_line("P 00010 00001");

        assert!(matches!(
            cozir.set_ambient_concentration(1000),
            Err(Error::Timeout)
        ));
        assert_eq!(
            cozir.transport().sent(),
            &["p 10\r\n", "p 11\r\n", "P 10 3\r\n", "P 10 1\r\n"].map(String::from)
        );
        assert_eq!(cozir.transport().remaining(), 0);
    }

    #[test]
    fn register_write_checks() {
        let mut cozir = command_mode(MockTransport::new());
        let reserved = regs::register("ansource").unwrap();
        let onoff = regs::register("aconoff").unwrap();

        assert!(matches!(
            cozir.set_register(&reserved, 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            cozir.set_register(&onoff, 256),
            Err(Error::InvalidArgument(_))
        ));
        assert!(cozir.transport().sent().is_empty());
    }

    #[test]
    fn registers_round_trip_on_simulator() {
        let mut cozir = simulated();

        cozir.set_auto_calibration_interval(8).unwrap();
        cozir.set_auto_calibration(true).unwrap();
        cozir.set_buffer_clear_time(300).unwrap();

        assert_eq!(cozir.get_auto_calibration_interval().unwrap(), 8);
        assert!(cozir.get_auto_calibration().unwrap());
        assert_eq!(cozir.get_buffer_clear_time().unwrap(), 300);
        assert_eq!(
            cozir.get_auto_calibration_background_concentration().unwrap(),
            450
        );
        assert_eq!(cozir.transport().eeprom(0x0C), 1);
        assert_eq!(cozir.transport().eeprom(0x0D), 44);
    }

    #[test]
    fn failed_second_byte_leaves_previous_value() {
        let mut cozir = simulated();
        let before = cozir.get_auto_calibration_preload().unwrap();

        cozir.transport_mut().drop_eeprom_write_after(1);
        assert!(matches!(
            cozir.set_auto_calibration_preload(0x1234),
            Err(Error::Timeout)
        ));

        assert_eq!(cozir.get_auto_calibration_preload().unwrap(), before);
        assert_eq!(cozir.transport().eeprom(0x03), 87);
        assert_eq!(cozir.transport().eeprom(0x04), 192);
    }

    #[test]
    fn failed_first_byte_keeps_value() {
        let mut cozir = simulated();

        cozir.transport_mut().drop_eeprom_write_after(0);
        assert!(cozir.set_ambient_concentration(1000).is_err());
        assert_eq!(cozir.get_ambient_concentration().unwrap(), 450);
    }

    #[test]
    fn calibration_on_simulator() {
        let mut cozir = simulated();
        assert_eq!(cozir.calibrate_fresh_air().unwrap(), 33000);
        assert_eq!(cozir.fine_tune_zero_point(450, 400).unwrap(), 32950);
        assert_eq!(cozir.calibrate_known_gas(100).unwrap(), 32100);

        cozir.set_digi_filter(32).unwrap();
        assert_eq!(cozir.get_digi_filter().unwrap(), 32);
    }
}
