//! Trace configuration: seeds, traceable range and extra symbols.
//!
//! Everything has a default matching a uPD78213 ROM, so an empty JSON object
//! is a valid configuration. Address fields accept JSON numbers or
//! hexadecimal strings (`"0x3200"`, `"3200h"`, `"3200"`).

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::{Address, DisassemblyError};

/// Inclusive address range the tracer may enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRange {
    #[serde(deserialize_with = "de_address")]
    pub start: Address,
    #[serde(deserialize_with = "de_address")]
    pub end: Address,
}

impl TraceRange {
    pub fn new(start: Address, end: Address) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr <= self.end
    }

    /// Every address of the range in ascending order.
    pub fn addresses(&self) -> RangeInclusive<Address> {
        self.start..=self.end
    }
}

impl Default for TraceRange {
    fn default() -> Self {
        Self { start: 0x0000, end: 0xfffe }
    }
}

/// A caller supplied symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDef {
    #[serde(deserialize_with = "de_address")]
    pub address: Address,
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

/// Configuration for one disassembly run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Hardware vector slots, each holding a pointer to a handler
    #[serde(deserialize_with = "de_addresses")]
    pub vectors: Vec<Address>,
    /// CALLT table slots traced as subroutine entries
    #[serde(deserialize_with = "de_addresses")]
    pub callt_vectors: Vec<Address>,
    /// Base of the CALLT pointer table
    #[serde(deserialize_with = "de_address")]
    pub callt_base: Address,
    /// Extra entry points
    #[serde(deserialize_with = "de_addresses")]
    pub entry_points: Vec<Address>,
    /// Addresses the tracer may enter
    pub traceable: TraceRange,
    /// Symbols layered over the built-in table
    pub symbols: Vec<SymbolDef>,
}

/// INTEPW; its slot usually holds data on the uPD78213.
const SKIPPED_VECTOR: Address = 0x002a;

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            vectors: (0x0000..=0x003e)
                .step_by(2)
                .filter(|&slot| slot != SKIPPED_VECTOR)
                .collect(),
            callt_vectors: (0x0042..=0x007e).step_by(2).collect(),
            callt_base: crate::decoder::CALLT_BASE,
            entry_points: Vec::new(),
            traceable: TraceRange::default(),
            symbols: Vec::new(),
        }
    }
}

impl TraceConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DisassemblyError> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, DisassemblyError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), DisassemblyError> {
        if self.traceable.start > self.traceable.end {
            return Err(DisassemblyError::Config(format!(
                "traceable range 0x{:04x}..=0x{:04x} is empty",
                self.traceable.start, self.traceable.end
            )));
        }
        if let Some(def) = self.symbols.iter().find(|def| def.name.trim().is_empty()) {
            return Err(DisassemblyError::Config(format!(
                "symbol at 0x{:04x} has an empty name",
                def.address
            )));
        }
        Ok(())
    }
}

/// Parse a hexadecimal address: `3200`, `0x3200` or `3200h`.
pub fn parse_address(text: &str) -> Result<Address, DisassemblyError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_suffix('h'))
        .or_else(|| trimmed.strip_suffix('H'))
        .unwrap_or(trimmed);

    Address::from_str_radix(digits, 16)
        .map_err(|e| DisassemblyError::Config(format!("invalid address '{}': {}", text, e)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Number(u64),
    Text(String),
}

impl RawAddress {
    fn resolve(self) -> Result<Address, String> {
        match self {
            RawAddress::Number(n) => {
                Address::try_from(n).map_err(|_| format!("address {} does not fit in 16 bits", n))
            }
            RawAddress::Text(text) => parse_address(&text).map_err(|e| e.to_string()),
        }
    }
}

fn de_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    RawAddress::deserialize(deserializer)?
        .resolve()
        .map_err(de::Error::custom)
}

fn de_addresses<'de, D>(deserializer: D) -> Result<Vec<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<RawAddress>::deserialize(deserializer)?
        .into_iter()
        .map(RawAddress::resolve)
        .collect::<Result<_, _>>()
        .map_err(de::Error::custom)
}
