//! Simulator configuration, loaded from a TOML file.
//!
//! ```toml
//! [general]
//! max_cycles = 1000
//!
//! [memory]
//! data_memory_size = 128
//! init = [{ address = 0x70, value = 0x5 }, { address = 0x74, value = 0x10 }]
//!
//! [registers]
//! ra = 0x20
//! x10 = 0x70
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{memory::DEFAULT_DATA_MEMORY_SIZE, registers::RegisterMapping};

const DEFAULT_MAX_CYCLES: u64 = 10_000;

#[derive(Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    /// initial register values, by ABI (`sp`) or architectural (`x2`) name
    #[serde(default)]
    pub registers: BTreeMap<String, u32>,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// the run stops after this many cycles even if the program has not finished
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,
    /// print the per-cycle report
    #[serde(default = "default_report")]
    pub report: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            report: default_report(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// size of the data memory, in bytes
    #[serde(default = "default_data_memory_size")]
    pub data_memory_size: usize,
    /// words stored in data memory before the first cycle
    #[serde(default)]
    pub init: Vec<MemoryInit>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_memory_size: default_data_memory_size(),
            init: Vec::new(),
        }
    }
}

impl MemoryConfig {
    /// the initial contents as `(address, word)` pairs
    pub fn words(&self) -> Vec<(u32, u32)> {
        self.init.iter().map(|init| (init.address, init.value)).collect()
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct MemoryInit {
    pub address: u32,
    pub value: u32,
}

fn default_max_cycles() -> u64 {
    DEFAULT_MAX_CYCLES
}

fn default_report() -> bool {
    true
}

fn default_data_memory_size() -> usize {
    DEFAULT_DATA_MEMORY_SIZE
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// resolve the `[registers]` table into register/value pairs
    pub fn register_mappings(&self) -> Result<Vec<(RegisterMapping, u32)>> {
        self.registers
            .iter()
            .map(|(name, value)| Ok((RegisterMapping::parse_name(name)?, *value)))
            .collect()
    }
}
