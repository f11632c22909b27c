use super::{Access, Reg, RegSize};

#[rustfmt::skip]
pub static REGS: &[Reg] = &[
    Reg::new("AHHI",         0x00, RegSize::Byte, Access::R,  0),
    Reg::new("ANLO",         0x01, RegSize::Byte, Access::R,  0),
    Reg::new("ANSOURCE",     0x02, RegSize::Byte, Access::R,  0),
    Reg::new("ACINIT",       0x03, RegSize::Half, Access::RW, 22464),
    Reg::new("ACINTERVAL",   0x05, RegSize::Half, Access::RW, 24192),
    Reg::new("ACONOFF",      0x07, RegSize::Byte, Access::RW, 0),
    Reg::new("ACPPM",        0x08, RegSize::Half, Access::RW, 450),
    Reg::new("AMBIENT",      0x0A, RegSize::Half, Access::RW, 450),
    Reg::new("BUFFER_CLEAR", 0x0C, RegSize::Half, Access::RW, 8),
];
