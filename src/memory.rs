//! The instruction and data memories the core is attached to.

use log::warn;

use crate::{instruction::NOP, signals::MemWidth};

/// the data memory size used when none is configured, in bytes
pub const DEFAULT_DATA_MEMORY_SIZE: usize = 4096;

/// an array that holds the instructions of the program.
/// Each instruction is a 32-bit integer.
/// The program counter (PC) will be used to index this array to get the current instruction.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InstructionMemory {
    rom: Vec<u32>,
}

impl InstructionMemory {
    pub fn new(rom: Vec<u32>) -> Self {
        Self { rom }
    }

    /// whether `pc` addresses an instruction of the program
    pub fn contains(&self, pc: u32) -> bool {
        pc % 4 == 0 && (pc as usize / 4) < self.rom.len()
    }

    /// Read the instruction at `pc`.
    ///
    /// Addresses past the end of the program, and misaligned ones, read as a no-op.
    pub fn get_instruction(&self, pc: u32) -> u32 {
        if self.contains(pc) {
            self.rom[pc as usize / 4]
        } else {
            NOP
        }
    }
}

/// Byte addressable, little-endian data memory starting at address `0x0`.
///
/// Accesses that fall (partly) outside of the memory never fault: loads read 0 and stores are dropped.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DataMemory {
    bytes: Vec<u8>,
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_MEMORY_SIZE)
    }
}

impl DataMemory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    fn range(&self, address: u32, width: MemWidth) -> Option<std::ops::Range<usize>> {
        let start = address as usize;
        let end = start.checked_add(width.bytes())?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    /// Load `width` bytes at `address`, sign- or zero-extending sub-word values to 32 bits.
    pub fn read(&self, address: u32, width: MemWidth, signed: bool) -> u32 {
        let Some(range) = self.range(address, width) else {
            warn!("load of {width:?} from {address:#x} is outside of data memory, reading 0");
            return 0;
        };
        let bytes = &self.bytes[range];
        match (width, signed) {
            (MemWidth::Byte, true) => bytes[0] as i8 as i32 as u32,
            (MemWidth::Byte, false) => u32::from(bytes[0]),
            (MemWidth::Half, true) => i16::from_le_bytes([bytes[0], bytes[1]]) as i32 as u32,
            (MemWidth::Half, false) => u32::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            (MemWidth::Word, _) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Store the low `width` bytes of `value` at `address`.
    ///
    /// Returns whether the store landed.
    pub fn write(&mut self, address: u32, width: MemWidth, value: u32) -> bool {
        let Some(range) = self.range(address, width) else {
            warn!("store of {width:?} to {address:#x} is outside of data memory, dropping it");
            return false;
        };
        let n = width.bytes();
        self.bytes[range].copy_from_slice(&value.to_le_bytes()[..n]);
        true
    }

    /// Read an aligned-or-not 32-bit word, for inspecting memory from outside the core.
    pub fn read_word(&self, address: u32) -> u32 {
        self.read(address, MemWidth::Word, false)
    }

    /// Initialize the data memory with the provided words, makes everything else 0
    pub fn initialize(&mut self, words: &[(u32, u32)]) {
        self.bytes.fill(0);
        for (address, value) in words {
            self.write(*address, MemWidth::Word, *value);
        }
    }
}
