use lazy_static::lazy_static;
use regex::Regex;

use super::{Error, Opcode, Result};

/// Raw temperature reading that corresponds to 0.0 degrees Celsius.
///
/// The sensor reports temperature as an unsigned count of tenths of a degree
/// above this zero point. Counts below it are negative readings.
pub const TEMPERATURE_ZERO_POINT: u32 = 1000;

pub fn decode_temperature(raw: u32) -> f32 {
    (raw as f32 - TEMPERATURE_ZERO_POINT as f32) / 10.0
}

pub fn decode_humidity(raw: u32) -> f32 {
    raw as f32 / 10.0
}

/// A single reply line with its echoed opcode peeled off.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    opcode: Opcode,
    line: String,
    payload: Vec<String>,
}

impl Response {
    pub fn parse(line: &str, opcode: Opcode) -> Result<Self> {
        let text = line.trim();
        let mut chars = text.chars();

        if chars.next() != Some(opcode.as_char()) {
            return Err(Error::malformed(line, "unexpected echo"));
        }

        let rest = chars.as_str();
        if let Some(c) = rest.chars().next() {
            if !c.is_whitespace() && c != ',' {
                return Err(Error::malformed(line, "unexpected echo"));
            }
        }

        Ok(Response {
            opcode,
            line: text.to_string(),
            payload: rest.split_whitespace().map(str::to_string).collect(),
        })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Everything after the echoed opcode, with separators trimmed.
    pub fn text(&self) -> &str {
        self.line[1..].trim_start_matches(|c: char| c == ',' || c.is_whitespace())
    }

    pub fn value(&self) -> Result<u32> {
        let [value] = self.values::<1>()?;
        Ok(value)
    }

    pub fn values<const N: usize>(&self) -> Result<[u32; N]> {
        if self.payload.len() != N {
            return Err(Error::malformed(&self.line, "wrong token count"));
        }

        let mut result = [0u32; N];
        for (slot, token) in result.iter_mut().zip(&self.payload) {
            *slot = token
                .parse()
                .map_err(|_| Error::malformed(&self.line, "non-numeric payload"))?;
        }
        Ok(result)
    }

    /// Write commands echo their arguments back; anything else means the
    /// sensor did not take the value.
    pub fn confirm(&self, expected: &[u32]) -> Result<()> {
        if self.payload.len() != expected.len() {
            return Err(Error::malformed(&self.line, "wrong token count"));
        }

        for (token, &want) in self.payload.iter().zip(expected) {
            let got: u32 = token
                .parse()
                .map_err(|_| Error::malformed(&self.line, "non-numeric payload"))?;
            if got != want {
                return Err(Error::malformed(&self.line, "value not confirmed"));
            }
        }
        Ok(())
    }
}

/// Validates the `K 0` line the sensor sends ahead of every answer in
/// polling mode.
pub fn check_ack(line: &str) -> Result<()> {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some("K"), Some(value), None) if value.parse::<u32>().is_ok() => Ok(()),
        _ => Err(Error::malformed(line, "expected mode acknowledgement")),
    }
}

/// Measurement line as produced by `Q` or pushed in streaming mode, e.g.
/// `H 00345 T 01195 Z 00316`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentFields {
    fields: Vec<(char, u32)>,
}

impl RecentFields {
    pub fn parse(line: &str) -> Result<Self> {
        lazy_static! {
            static ref LINE: Regex = Regex::new(r"^(?:[A-Za-z]\s+\d+\s*)+$").unwrap();
            static ref FIELD: Regex = Regex::new(r"([A-Za-z])\s+(\d+)").unwrap();
        }

        let text = line.trim();
        if !LINE.is_match(text) {
            return Err(Error::malformed(line, "not a field list"));
        }

        let fields = FIELD
            .captures_iter(text)
            .map(|c| {
                let tag = c[1].chars().next().unwrap_or_default();
                c[2].parse::<u32>()
                    .map(|value| (tag, value))
                    .map_err(|_| Error::malformed(line, "field value out of range"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RecentFields { fields })
    }

    pub fn fields(&self) -> &[(char, u32)] {
        &self.fields
    }

    pub fn get(&self, tag: char) -> Option<u32> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, value)| *value)
    }

    pub fn humidity(&self) -> Option<f32> {
        self.get('H').map(decode_humidity)
    }

    pub fn temperature(&self) -> Option<f32> {
        self.get('T').or_else(|| self.get('V')).map(decode_temperature)
    }

    pub fn co2(&self) -> Option<u32> {
        self.get('Z').or_else(|| self.get('z'))
    }

    pub fn light(&self) -> Option<u32> {
        self.get('L')
    }
}
