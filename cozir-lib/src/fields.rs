use itertools::Itertools;
use std::{
    fmt::Display,
    ops::{BitOr, BitOrAssign},
    str::FromStr,
};
use thiserror::Error;

/// Selection of quantities reported in streamed and `Q` lines.
///
/// `NONE` is the empty selection. It only ever contains itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputFields(u16);

impl OutputFields {
    pub const NONE: OutputFields = OutputFields(0);
    pub const LIGHT: OutputFields = OutputFields(0x2000);
    pub const HUMIDITY: OutputFields = OutputFields(0x1000);
    pub const FILTLED: OutputFields = OutputFields(0x0800);
    pub const RAWLED: OutputFields = OutputFields(0x0400);
    pub const MAXLED: OutputFields = OutputFields(0x0200);
    pub const ZEROPOINT: OutputFields = OutputFields(0x0100);
    pub const RAWTEMP: OutputFields = OutputFields(0x0080);
    pub const FILTTEMP: OutputFields = OutputFields(0x0040);
    pub const FILTLEDSIGNAL: OutputFields = OutputFields(0x0020);
    pub const RAWLEDSIGNAL: OutputFields = OutputFields(0x0010);
    pub const SENSTEMP: OutputFields = OutputFields(0x0008);
    pub const FILTCO2: OutputFields = OutputFields(0x0004);
    pub const RAWCO2: OutputFields = OutputFields(0x0002);

    // name, field, tag used in the measurement line; in the sensor's output order
    const KNOWN: &'static [(&'static str, OutputFields, char)] = &[
        ("light", Self::LIGHT, 'L'),
        ("humidity", Self::HUMIDITY, 'H'),
        ("filtled", Self::FILTLED, 'D'),
        ("rawled", Self::RAWLED, 'd'),
        ("maxled", Self::MAXLED, 'l'),
        ("zeropoint", Self::ZEROPOINT, 'h'),
        ("rawtemp", Self::RAWTEMP, 'V'),
        ("filttemp", Self::FILTTEMP, 'T'),
        ("filtledsignal", Self::FILTLEDSIGNAL, 'o'),
        ("rawledsignal", Self::RAWLEDSIGNAL, 'O'),
        ("senstemp", Self::SENSTEMP, 'v'),
        ("filtco2", Self::FILTCO2, 'Z'),
        ("rawco2", Self::RAWCO2, 'z'),
    ];

    pub const fn from_bits(bits: u16) -> Self {
        OutputFields(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: OutputFields) -> bool {
        if other.is_none() {
            self.is_none()
        } else {
            self.0 & other.0 == other.0
        }
    }

    /// Bits set in this mask that do not name a known field.
    pub fn unknown_bits(self) -> u16 {
        let known = Self::KNOWN.iter().fold(0u16, |acc, (_, f, _)| acc | f.0);
        self.0 & !known
    }

    /// Line tags of the selected fields, in output order.
    pub fn tags(self) -> Vec<(OutputFields, char)> {
        Self::KNOWN
            .iter()
            .filter(|(_, f, _)| self.contains(*f))
            .map(|(_, f, tag)| (*f, *tag))
            .collect()
    }
}

impl BitOr for OutputFields {
    type Output = OutputFields;

    fn bitor(self, rhs: Self) -> Self::Output {
        OutputFields(self.0 | rhs.0)
    }
}

impl BitOrAssign for OutputFields {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<OutputFields> for u16 {
    fn from(fields: OutputFields) -> Self {
        fields.0
    }
}

impl Display for OutputFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return "none".fmt(f);
        }

        let mut names: Vec<String> = Self::KNOWN
            .iter()
            .filter(|(_, field, _)| self.contains(*field))
            .map(|(name, _, _)| name.to_string())
            .collect();

        if self.unknown_bits() != 0 {
            names.push(format!("{:#06x}", self.unknown_bits()));
        }

        names.iter().join("|").fmt(f)
    }
}

#[derive(Error, Debug)]
pub enum FieldsError {
    #[error("unknown output field '{0}'")]
    BadField(String),
}

impl FromStr for OutputFields {
    type Err = FieldsError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input == "none" {
            return Ok(OutputFields::NONE);
        }

        if let Ok(bits) = input.parse::<u16>() {
            return Ok(OutputFields(bits));
        }

        input
            .split(|c: char| c == ',' || c == '|')
            .map(|name| {
                let name = name.trim().to_lowercase();
                Self::KNOWN
                    .iter()
                    .find(|(known, _, _)| *known == name)
                    .map(|(_, field, _)| *field)
                    .ok_or(FieldsError::BadField(name))
            })
            .try_fold(OutputFields::NONE, |acc, field| field.map(|f| acc | f))
    }
}
