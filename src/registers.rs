use std::{fmt, ops::Index, str::FromStr};

use anyhow::{anyhow, bail};
use strum::VariantNames;
use strum_macros::{EnumString, VariantNames};
use ux::u5;

/// the number of registers in the RISC-V ISA
pub const REGISTERS_COUNT: u8 = 32;

#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Default, EnumString, VariantNames,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum RegisterMapping {
    #[default]
    Zero = 0,
    Ra = 1,
    Sp = 2,
    Gp = 3,
    Tp = 4,
    T0 = 5,
    T1 = 6,
    T2 = 7,
    S0 = 8,
    S1 = 9,
    A0 = 10,
    A1 = 11,
    A2 = 12,
    A3 = 13,
    A4 = 14,
    A5 = 15,
    A6 = 16,
    A7 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    S8 = 24,
    S9 = 25,
    S10 = 26,
    S11 = 27,
    T3 = 28,
    T4 = 29,
    T5 = 30,
    T6 = 31,
}

impl fmt::Display for RegisterMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", *self as u8)
    }
}

impl TryFrom<u8> for RegisterMapping {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self, anyhow::Error> {
        if value >= REGISTERS_COUNT {
            bail!(
                "Invalid register number provided to RegisterMapping::from(u8): {}",
                value
            );
        }
        // this is safe because:
        // 1. the value is checked to be within the range of the enum
        // 2. the enum is repr(u8), so the memory layout is the same as u8
        // 3. we explicitly define the src and dst generics to ensure that future changes to the enum's memory size are caught at compile time
        Ok(unsafe { std::mem::transmute::<u8, Self>(value) })
    }
}

/// register fields in an instruction are 5 bits wide, so every field names a valid register.
impl From<u5> for RegisterMapping {
    fn from(value: u5) -> Self {
        // safe for the same reasons as `TryFrom<u8>`, and a u5 is always below REGISTERS_COUNT
        unsafe { std::mem::transmute::<u8, Self>(u8::from(value)) }
    }
}

impl RegisterMapping {
    /// Parse either an ABI name (`ra`, `sp`, `s0`, ...), `fp` or an architectural name (`x5`).
    pub fn parse_name(name: &str) -> anyhow::Result<Self> {
        let name = name.trim().to_lowercase();
        if let Some(number) = name.strip_prefix('x') {
            if let Ok(number) = number.parse::<u8>() {
                return Self::try_from(number);
            }
        }
        if name == "fp" {
            return Ok(Self::S0);
        }
        Self::from_str(&name).map_err(|_| {
            anyhow!(
                "Unknown register name `{name}`, expected one of x0..x31, fp, or {}",
                Self::VARIANTS.join(", ")
            )
        })
    }
}

/// The write port of the register file, as driven by the Writeback stage.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct RegisterWrite {
    pub address: RegisterMapping,
    pub data: u32,
    pub enable: bool,
}

impl RegisterWrite {
    /// whether this write would actually change architectural state
    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.enable && self.address != RegisterMapping::Zero
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct RegisterFile {
    registers: [u32; REGISTERS_COUNT as usize],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<RegisterMapping> for RegisterFile {
    type Output = u32;
    fn index(&self, index: RegisterMapping) -> &Self::Output {
        &self.registers[index as usize]
    }
}

impl RegisterFile {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registers: [0; REGISTERS_COUNT as usize],
        }
    }

    /// Initialize the register file with the provided defaults, makes everything else 0
    ///
    /// mappings for the zero register are ignored.
    pub fn initialize(&mut self, mappings: &[(RegisterMapping, u32)]) {
        self.registers = [0; REGISTERS_COUNT as usize];
        for (mapping, value) in mappings {
            self.write(RegisterWrite {
                address: *mapping,
                data: *value,
                enable: true,
            });
        }
    }

    #[must_use]
    pub const fn read(&self, reg: RegisterMapping) -> u32 {
        match reg {
            RegisterMapping::Zero => 0,
            _ => self.registers[reg as usize],
        }
    }

    /// Read a register as the Decode stage sees it: if Writeback is committing to the same
    /// register during this cycle, the value being written is returned instead of the stored one.
    #[must_use]
    pub fn read_with_bypass(&self, reg: RegisterMapping, port: &RegisterWrite) -> u32 {
        if port.is_effective() && port.address == reg {
            port.data
        } else {
            self.read(reg)
        }
    }

    /// Apply a write at the clock edge.
    ///
    /// Returns the register and value if the write changed architectural state,
    /// writes to the zero register and disabled writes are dropped.
    pub fn write(&mut self, port: RegisterWrite) -> Option<(RegisterMapping, u32)> {
        if !port.is_effective() {
            return None;
        }
        self.registers[port.address as usize] = port.data;
        Some((port.address, port.data))
    }

    /// a copy of all 32 registers, indexed by register number
    #[must_use]
    pub const fn registers(&self) -> [u32; REGISTERS_COUNT as usize] {
        self.registers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(address: RegisterMapping, data: u32) -> RegisterWrite {
        RegisterWrite {
            address,
            data,
            enable: true,
        }
    }

    #[test]
    fn test_zero_register_is_hardwired() {
        let mut rf = RegisterFile::new();
        for value in [1, 0xdead_beef, u32::MAX] {
            assert_eq!(rf.write(write(RegisterMapping::Zero, value)), None);
            assert_eq!(rf.read(RegisterMapping::Zero), 0);
            assert_eq!(rf[RegisterMapping::Zero], 0);
        }
    }

    #[test]
    fn test_disabled_write_is_dropped() {
        let mut rf = RegisterFile::new();
        let port = RegisterWrite {
            enable: false,
            ..write(RegisterMapping::A0, 7)
        };
        assert_eq!(rf.write(port), None);
        assert_eq!(rf.read(RegisterMapping::A0), 0);
    }

    #[test]
    fn test_write_then_read() {
        let mut rf = RegisterFile::new();
        assert_eq!(
            rf.write(write(RegisterMapping::T6, 0x1234)),
            Some((RegisterMapping::T6, 0x1234))
        );
        assert_eq!(rf.read(RegisterMapping::T6), 0x1234);
        assert_eq!(rf.registers()[31], 0x1234);
    }

    #[test]
    fn test_bypass() {
        let mut rf = RegisterFile::new();
        rf.initialize(&[(RegisterMapping::A0, 1), (RegisterMapping::Zero, 9)]);

        // same register being written: the new value is observed
        assert_eq!(
            rf.read_with_bypass(RegisterMapping::A0, &write(RegisterMapping::A0, 2)),
            2
        );
        // different register: stored value
        assert_eq!(
            rf.read_with_bypass(RegisterMapping::A0, &write(RegisterMapping::A1, 2)),
            1
        );
        // writes to x0 are never bypassed
        assert_eq!(
            rf.read_with_bypass(RegisterMapping::Zero, &write(RegisterMapping::Zero, 2)),
            0
        );
    }

    #[test]
    fn test_register_names() -> anyhow::Result<()> {
        assert_eq!(RegisterMapping::parse_name("ra")?, RegisterMapping::Ra);
        assert_eq!(RegisterMapping::parse_name("X10")?, RegisterMapping::A0);
        assert_eq!(RegisterMapping::parse_name("fp")?, RegisterMapping::S0);
        assert_eq!(RegisterMapping::parse_name("s11")?, RegisterMapping::S11);
        assert!(RegisterMapping::parse_name("x32").is_err());
        assert!(RegisterMapping::parse_name("q1").is_err());
        assert_eq!(RegisterMapping::T3.to_string(), "x28");
        Ok(())
    }
}
