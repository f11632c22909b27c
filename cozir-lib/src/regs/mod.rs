mod db;

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

use db::REGS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    R,
    W,
    RW,
}

impl Access {
    pub fn writable(self) -> bool {
        matches!(self, Access::W | Access::RW)
    }
}

impl Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::R => "R".fmt(f),
            Access::W => "W".fmt(f),
            Access::RW => "RW".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegSize {
    Byte = 1,
    Half = 2,
}

/// EEPROM cell of the sensor. `Half` registers keep the high byte at
/// `address` and the low byte at `address + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg {
    pub name: &'static str,
    pub address: u8,
    pub size: RegSize,
    pub access: Access,
    pub default: u16,
}

impl Reg {
    pub const fn new(
        name: &'static str,
        address: u8,
        size: RegSize,
        access: Access,
        default: u16,
    ) -> Self {
        Reg {
            name,
            address,
            size,
            access,
            default,
        }
    }

    pub fn max_value(&self) -> u16 {
        match self.size {
            RegSize::Byte => u8::MAX as u16,
            RegSize::Half => u16::MAX,
        }
    }

    pub fn split(&self, value: u16) -> Vec<(u8, u8)> {
        match self.size {
            RegSize::Byte => vec![(self.address, value as u8)],
            RegSize::Half => {
                let [hi, lo] = value.to_be_bytes();
                vec![(self.address, hi), (self.address + 1, lo)]
            }
        }
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:4} {:1} {:<2} {:5} {}",
            self.address, self.size as u8, self.access, self.default, self.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegName(pub String);

#[derive(Error, Debug)]
pub enum RegNameError {
    #[error("invalid register name '{0}'")]
    BadRegName(String),
}

impl FromStr for RegName {
    type Err = RegNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^[-_[:alnum:]]+$").unwrap();
        }
        if RE.is_match(s) {
            Ok(RegName(s.to_uppercase().replace('-', "_")))
        } else {
            Err(RegNameError::BadRegName(s.to_string()))
        }
    }
}

pub fn list_registers() -> Vec<Reg> {
    REGS.iter().cloned().sorted_by_key(|reg| reg.address).collect()
}

pub fn find_register(name: &RegName) -> Option<Reg> {
    REGS.iter().cloned().find(|reg| reg.name == name.0)
}

pub fn register(name: &str) -> Option<Reg> {
    name.parse().ok().and_then(|name| find_register(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_layout() {
        let reg = register("acinit").unwrap();
        assert_eq!(reg.address, 0x03);
        assert_eq!(reg.size, RegSize::Half);
        assert_eq!(reg.default, 87 * 256 + 192);

        let reg = register("ambient").unwrap();
        assert_eq!(reg.address, 0x0A);
        assert_eq!(reg.default, 450);

        let reg = register("aconoff").unwrap();
        assert_eq!(reg.size, RegSize::Byte);
    }

    #[test]
    fn split_is_big_endian() {
        let reg = register("acinit").unwrap();
        assert_eq!(reg.split(0x57C0), vec![(0x03, 0x57), (0x04, 0xC0)]);

        let reg = register("aconoff").unwrap();
        assert_eq!(reg.split(1), vec![(0x07, 1)]);
    }

    #[test]
    fn no_overlapping_cells() {
        let regs = list_registers();
        let cells: Vec<u8> = regs
            .iter()
            .flat_map(|reg| reg.split(0).into_iter().map(|(addr, _)| addr))
            .collect();
        assert_eq!(cells.iter().unique().count(), cells.len());
        assert!(regs.windows(2).all(|w| w[0].address < w[1].address));
    }

    #[test]
    fn name_lookup() {
        assert!(register("buffer-clear").is_some());
        assert!(register("nope").is_none());
        assert!("bad name".parse::<RegName>().is_err());
        assert!(!register("ansource").unwrap().access.writable());
    }
}
