use log::{debug, warn};
use std::time::{Duration, Instant};

use crate::fields::OutputFields;
use crate::port::Transport;
use crate::protocol::{
    check_ack, decode_humidity, decode_temperature, Command, Error, Opcode, OperatingMode,
    RecentFields, Response, Result,
};

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How long a single `receive_line` may block.
    pub timeout: Duration,
    /// Power-up time after `init` before the sensor answers reliably.
    pub warmup: Duration,
    /// Mode the sensor is assumed to be in before the first `K` command.
    pub mode: OperatingMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout: Duration::from_secs(1),
            warmup: Duration::from_millis(1200),
            mode: OperatingMode::Streaming,
        }
    }
}

/// Session with one COZIR sensor.
///
/// Mode and output fields are tracked locally and only updated after the
/// sensor confirmed the change, so a failed call leaves them untouched.
pub struct Cozir<T: Transport> {
    transport: T,
    config: SessionConfig,
    mode: OperatingMode,
    fields: OutputFields,
    started: Option<Instant>,
}

impl<T: Transport> Cozir<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Cozir {
            transport,
            mode: config.mode,
            config,
            fields: OutputFields::NONE,
            started: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Switches the sensor to polling mode and starts the warmup clock.
    pub fn init(&mut self) -> Result<()> {
        self.set_operating_mode(OperatingMode::Polling)?;
        self.started = Some(Instant::now());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.started
            .map_or(false, |started| started.elapsed() >= self.config.warmup)
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<()> {
        let cmd = Command::new(Opcode::OperatingMode).arg(mode as u32);

        // the sensor has not switched yet, so this is always a plain exchange
        self.transmit(&cmd)?;
        let line = self.receive()?;
        let value = Response::parse(&line, Opcode::OperatingMode)?.value()?;
        if value != mode as u32 {
            return Err(Error::malformed(&line, "mode not acknowledged"));
        }

        debug!("operating mode {} -> {}", self.mode, mode);
        self.mode = mode;
        Ok(())
    }

    pub fn output_fields(&self) -> OutputFields {
        self.fields
    }

    pub fn set_output_fields(&mut self, fields: OutputFields) -> Result<()> {
        if fields.unknown_bits() != 0 {
            warn!(
                "output field mask {:#06x} has unknown bits {:#06x}",
                fields.bits(),
                fields.unknown_bits()
            );
        }

        let bits = u32::from(fields.bits());
        self.request(&Command::new(Opcode::OutputFields).arg(bits))?
            .confirm(&[bits])?;

        debug!("output fields {} -> {}", self.fields, fields);
        self.fields = fields;
        Ok(())
    }

    pub fn clear_output_fields(&mut self) -> Result<()> {
        self.set_output_fields(OutputFields::NONE)
    }

    pub fn in_output_fields(&self, fields: OutputFields) -> bool {
        self.fields.contains(fields)
    }

    pub fn celsius(&mut self) -> Result<f32> {
        self.request_value(Opcode::Temperature)
            .map(decode_temperature)
    }

    pub fn fahrenheit(&mut self) -> Result<f32> {
        self.celsius().map(|c| c * 1.8 + 32.0)
    }

    pub fn kelvin(&mut self) -> Result<f32> {
        self.celsius().map(|c| c + 273.15)
    }

    /// Relative humidity in percent.
    pub fn humidity(&mut self) -> Result<f32> {
        self.request_value(Opcode::Humidity).map(decode_humidity)
    }

    pub fn light(&mut self) -> Result<u32> {
        self.request_value(Opcode::Light)
    }

    /// Filtered CO2 reading. Multiply by [`ppm_factor`](Self::ppm_factor)
    /// for ppm on sensors with an extended range.
    pub fn co2(&mut self) -> Result<u32> {
        self.request_value(Opcode::Co2)
    }

    pub fn ppm_factor(&mut self) -> Result<u32> {
        self.request_value(Opcode::PpmFactor)
    }

    pub fn version(&mut self) -> Result<String> {
        self.request(&Command::new(Opcode::Version))
            .map(|r| r.text().to_string())
    }

    pub fn configuration(&mut self) -> Result<String> {
        self.request(&Command::new(Opcode::Configuration))
            .map(|r| r.text().to_string())
    }

    /// Latest measurement line, holding the fields selected with
    /// [`set_output_fields`](Self::set_output_fields).
    pub fn get_recent_fields(&mut self) -> Result<RecentFields> {
        let line = self.exchange(&Command::new(Opcode::RecentFields))?;
        RecentFields::parse(&line)
    }

    pub(crate) fn request_value(&mut self, opcode: Opcode) -> Result<u32> {
        self.request(&Command::new(opcode))?.value()
    }

    pub(crate) fn request(&mut self, cmd: &Command) -> Result<Response> {
        let line = self.exchange(cmd)?;
        Response::parse(&line, cmd.opcode())
    }

    /// Sends `cmd` and returns the payload line, consuming the polling mode
    /// acknowledgement first if needed.
    fn exchange(&mut self, cmd: &Command) -> Result<String> {
        self.transmit(cmd)?;

        match self.mode {
            OperatingMode::Polling => {
                let ack = self.receive()?;
                check_ack(&ack)?;
            }
            OperatingMode::Command | OperatingMode::Streaming => (),
        }

        self.receive()
    }

    fn transmit(&mut self, cmd: &Command) -> Result<()> {
        debug!("send {:?}", cmd.to_string());
        self.transport.send(&cmd.encode())
    }

    fn receive(&mut self) -> Result<String> {
        let line = self.transport.receive_line(self.config.timeout)?;
        debug!("recv {:?}", line.trim_end());
        Ok(line)
    }
}
