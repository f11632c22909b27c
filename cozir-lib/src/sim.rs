//! In-process emulation of a COZIR sensor.
//!
//! [`SimulatedSensor`] implements [`Transport`], so a [`Cozir`](crate::Cozir)
//! session can talk to it directly. It keeps its own mode, output fields and
//! EEPROM, answers in the sensor's reply format and can be told to lose
//! EEPROM writes or go silent.

use log::debug;
use num_traits::FromPrimitive;
use std::collections::VecDeque;
use std::time::Duration;

use crate::fields::OutputFields;
use crate::port::Transport;
use crate::protocol::{Error, Opcode, OperatingMode, Result};
use crate::regs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurements {
    pub temperature: u32,
    pub humidity: u32,
    pub light: u32,
    pub co2: u32,
}

impl Default for Measurements {
    fn default() -> Self {
        Measurements {
            temperature: 1195,
            humidity: 345,
            light: 120,
            co2: 432,
        }
    }
}

pub struct SimulatedSensor {
    pub measurements: Measurements,
    mode: OperatingMode,
    fields: OutputFields,
    eeprom: [u8; 256],
    digi_filter: u8,
    zero_point: u32,
    ppm_factor: u32,
    outbox: VecDeque<String>,
    drop_write_after: Option<usize>,
    silent: bool,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensor {
    pub fn new() -> Self {
        let mut eeprom = [0u8; 256];
        for reg in regs::list_registers() {
            for (address, byte) in reg.split(reg.default) {
                eeprom[address as usize] = byte;
            }
        }

        SimulatedSensor {
            measurements: Measurements::default(),
            mode: OperatingMode::Streaming,
            fields: OutputFields::NONE,
            eeprom,
            digi_filter: 16,
            zero_point: 32950,
            ppm_factor: 1,
            outbox: VecDeque::new(),
            drop_write_after: None,
            silent: false,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn output_fields(&self) -> OutputFields {
        self.fields
    }

    pub fn eeprom(&self, address: u8) -> u8 {
        self.eeprom[address as usize]
    }

    pub fn digi_filter(&self) -> u8 {
        self.digi_filter
    }

    /// Lets `count` further `P` commands through, then silently drops the
    /// next one: nothing is stored and no reply is sent.
    pub fn drop_eeprom_write_after(&mut self, count: usize) {
        self.drop_write_after = Some(count);
    }

    /// A silent sensor swallows every command without answering.
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Emits one measurement line, as the sensor does periodically in
    /// streaming mode.
    pub fn tick(&mut self) {
        if self.mode == OperatingMode::Streaming {
            let line = self.fields_line();
            self.outbox.push_back(line);
        }
    }

    fn fields_line(&self) -> String {
        let fields = if self.fields.is_none() {
            OutputFields::FILTCO2
        } else {
            self.fields
        };

        let m = &self.measurements;
        let line = fields
            .tags()
            .into_iter()
            .map(|(field, tag)| {
                let value = match field {
                    OutputFields::LIGHT => m.light,
                    OutputFields::HUMIDITY => m.humidity,
                    OutputFields::RAWTEMP | OutputFields::FILTTEMP | OutputFields::SENSTEMP => {
                        m.temperature
                    }
                    OutputFields::FILTCO2 | OutputFields::RAWCO2 => m.co2,
                    OutputFields::ZEROPOINT => self.zero_point,
                    _ => 0,
                };
                format!("{} {:05}", tag, value)
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!(" {}\r\n", line)
    }

    fn reply(&mut self, opcode: Opcode, values: &[u32]) {
        if self.mode == OperatingMode::Polling && opcode != Opcode::OperatingMode {
            self.outbox.push_back("K 0\r\n".to_string());
        }

        let mut line = opcode.to_string();
        for value in values {
            line.push_str(&format!(" {:05}", value));
        }
        line.push_str("\r\n");
        self.outbox.push_back(line);
    }

    fn handle(&mut self, line: &str) {
        debug!("sim recv {:?}", line);

        let mut tokens = line.split_whitespace();
        let opcode = tokens
            .next()
            .filter(|t| t.len() == 1)
            .and_then(|t| Opcode::from_u8(t.as_bytes()[0]));
        // the sensor takes 16-bit arguments at most
        let args: Option<Vec<u32>> = tokens
            .map(|t| t.parse::<u16>().ok().map(u32::from))
            .collect();

        let (opcode, args) = match (opcode, args) {
            (Some(opcode), Some(args)) => (opcode, args),
            _ => {
                self.outbox.push_back("?\r\n".to_string());
                return;
            }
        };

        match (opcode, args.as_slice()) {
            (Opcode::OperatingMode, &[mode]) => match OperatingMode::from_u32(mode) {
                Some(mode) => {
                    self.reply(opcode, &[mode as u32]);
                    self.mode = mode;
                }
                None => self.outbox.push_back("?\r\n".to_string()),
            },
            (Opcode::OutputFields, &[bits]) => {
                self.fields = OutputFields::from_bits(bits as u16);
                self.reply(opcode, &[bits]);
            }
            (Opcode::Temperature, &[]) => self.reply(opcode, &[self.measurements.temperature]),
            (Opcode::Humidity, &[]) => self.reply(opcode, &[self.measurements.humidity]),
            (Opcode::Light, &[]) => self.reply(opcode, &[self.measurements.light]),
            (Opcode::Co2, &[]) => self.reply(opcode, &[self.measurements.co2]),
            (Opcode::PpmFactor, &[]) => self.reply(opcode, &[self.ppm_factor]),
            (Opcode::FineTuneZeroPoint, &[reading, expected]) => {
                self.zero_point = self
                    .zero_point
                    .saturating_add(expected)
                    .saturating_sub(reading);
                self.reply(opcode, &[self.zero_point]);
            }
            (Opcode::CalibrateFreshAir, &[]) => {
                self.zero_point = 33000;
                self.reply(opcode, &[self.zero_point]);
            }
            (Opcode::CalibrateNitrogen, &[]) => {
                self.zero_point = 32000;
                self.reply(opcode, &[self.zero_point]);
            }
            (Opcode::CalibrateKnownGas, &[ppm]) => {
                self.zero_point = 32000 + ppm;
                self.reply(opcode, &[self.zero_point]);
            }
            (Opcode::SetDigiFilter, &[value]) if value <= u8::MAX as u32 => {
                self.digi_filter = value as u8;
                self.reply(opcode, &[value]);
            }
            (Opcode::GetDigiFilter, &[]) => self.reply(opcode, &[self.digi_filter.into()]),
            (Opcode::SetEeprom, &[address, value]) if address <= 0xFF && value <= 0xFF => {
                match self.drop_write_after {
                    Some(0) => {
                        debug!("sim dropping eeprom write {} {}", address, value);
                        self.drop_write_after = None;
                    }
                    pending => {
                        self.drop_write_after = pending.map(|n| n - 1);
                        self.eeprom[address as usize] = value as u8;
                        self.reply(opcode, &[address, value]);
                    }
                }
            }
            (Opcode::GetEeprom, &[address]) if address <= 0xFF => {
                self.reply(opcode, &[self.eeprom[address as usize].into()]);
            }
            (Opcode::RecentFields, &[]) => {
                if self.mode == OperatingMode::Polling {
                    self.outbox.push_back("K 0\r\n".to_string());
                }
                let line = self.fields_line();
                self.outbox.push_back(line);
            }
            (Opcode::Version, &[]) => {
                if self.mode == OperatingMode::Polling {
                    self.outbox.push_back("K 0\r\n".to_string());
                }
                self.outbox
                    .push_back("Y,Jan 30 2013,10:45:03,AL17\r\n".to_string());
            }
            (Opcode::Configuration, &[]) => {
                let config = [
                    self.mode as u32,
                    self.fields.bits().into(),
                    self.digi_filter.into(),
                ];
                self.reply(opcode, &config);
            }
            _ => self.outbox.push_back("?\r\n".to_string()),
        }
    }
}

impl Transport for SimulatedSensor {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.outbox.clear();
        if self.silent {
            return Ok(());
        }

        let text = String::from_utf8_lossy(data).into_owned();
        for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
            self.handle(line);
        }
        Ok(())
    }

    fn receive_line(&mut self, _timeout: Duration) -> Result<String> {
        self.outbox.pop_front().ok_or(Error::Timeout)
    }
}
