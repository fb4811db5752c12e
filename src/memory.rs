//! ROM byte store and per-address classification map.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::{Address, Instruction};

/// Number of addressable bytes in the 78K/II address space.
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// A read outside the ROM image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Address 0x{addr:04x} is outside the {len}-byte image")]
pub struct OutOfRange {
    /// Address that was read
    pub addr: Address,
    /// Length of the image
    pub len: usize,
}

/// Immutable ROM image addressed from 0.
#[derive(Clone, PartialEq, Eq)]
pub struct Rom {
    bytes: Arc<[u8]>,
}

impl Rom {
    /// Wrap raw image bytes.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Length of the image in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `addr` lies inside the image.
    pub fn contains(&self, addr: Address) -> bool {
        (addr as usize) < self.bytes.len()
    }

    /// Read one byte.
    pub fn read_byte(&self, addr: Address) -> Result<u8, OutOfRange> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(OutOfRange { addr, len: self.bytes.len() })
    }

    /// Read a little-endian word (low byte first). The high byte address does
    /// not wrap past 0xFFFF.
    pub fn read_word(&self, addr: Address) -> Result<u16, OutOfRange> {
        let low = self.read_byte(addr)?;
        let high_addr = addr.checked_add(1).ok_or(OutOfRange { addr, len: self.bytes.len() })?;
        let high = self.read_byte(high_addr)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// The whole image.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rom({} bytes)", self.bytes.len())
    }
}

/// What the tracer has learned about one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Byte belongs to a decoded instruction
    pub decoded: bool,
    /// First byte of a decoded instruction
    pub instruction_start: bool,
    /// Reached by a call
    pub call_target: bool,
    /// Reached by a jump or branch
    pub jump_target: bool,
    /// Reached from a vector or an explicit entry point
    pub entry_point: bool,
    /// Register-indirect jump or call whose destination is unknown
    pub unresolved_indirect: bool,
    /// First byte of a vector or CALLT table slot
    pub vector: bool,
}

/// Two control-flow paths disagree on where an instruction starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "Decode conflict: {size}-byte instruction at 0x{addr:04x} overlaps the \
     {existing_size}-byte instruction at 0x{existing_addr:04x}"
)]
pub struct DecodeConflict {
    /// Start of the rejected decode
    pub addr: Address,
    /// Size of the rejected decode
    pub size: u8,
    /// Start of the instruction already in place
    pub existing_addr: Address,
    /// Size of the instruction already in place
    pub existing_size: u8,
}

/// The ROM plus its classification map. Single source of truth for the
/// tracer (which mutates it) and the symbol resolver (which only reads it).
#[derive(Debug, Clone)]
pub struct Memory {
    rom: Rom,
    info: Vec<Classification>,
    instructions: BTreeMap<Address, Instruction>,
}

impl Memory {
    /// A fresh, unclassified map over `rom`.
    pub fn new(rom: Rom) -> Self {
        Self {
            rom,
            info: vec![Classification::default(); ADDRESS_SPACE],
            instructions: BTreeMap::new(),
        }
    }

    /// The underlying image.
    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    /// Everything known about `addr`.
    pub fn classification(&self, addr: Address) -> Classification {
        self.info[addr as usize]
    }

    pub fn is_decoded(&self, addr: Address) -> bool {
        self.info[addr as usize].decoded
    }

    pub fn is_instruction_start(&self, addr: Address) -> bool {
        self.info[addr as usize].instruction_start
    }

    pub fn is_call_target(&self, addr: Address) -> bool {
        self.info[addr as usize].call_target
    }

    pub fn is_jump_target(&self, addr: Address) -> bool {
        self.info[addr as usize].jump_target
    }

    pub fn is_entry_point(&self, addr: Address) -> bool {
        self.info[addr as usize].entry_point
    }

    pub fn is_unresolved_indirect(&self, addr: Address) -> bool {
        self.info[addr as usize].unresolved_indirect
    }

    pub fn is_vector(&self, addr: Address) -> bool {
        self.info[addr as usize].vector
    }

    pub fn mark_call_target(&mut self, addr: Address) {
        self.info[addr as usize].call_target = true;
    }

    pub fn mark_jump_target(&mut self, addr: Address) {
        self.info[addr as usize].jump_target = true;
    }

    pub fn mark_entry_point(&mut self, addr: Address) {
        self.info[addr as usize].entry_point = true;
    }

    pub fn mark_unresolved_indirect(&mut self, addr: Address) {
        self.info[addr as usize].unresolved_indirect = true;
    }

    pub fn mark_vector(&mut self, addr: Address) {
        self.info[addr as usize].vector = true;
    }

    /// Record `insn` at its address, marking every byte it covers as decoded.
    ///
    /// Placing an identical instruction twice is a no-op. An instruction whose
    /// span overlaps a different one already in place is rejected and the map
    /// is left untouched.
    pub fn place(&mut self, insn: Instruction) -> Result<(), DecodeConflict> {
        if let Some(existing) = self.instructions.get(&insn.addr) {
            if *existing == insn {
                return Ok(());
            }
            return Err(conflict(&insn, existing));
        }

        let span = span(insn.addr, insn.size);
        if let Some(addr) = span.clone().find(|&a| self.info[a].decoded) {
            if let Some(existing) = self.instruction_covering(addr as Address) {
                return Err(conflict(&insn, existing));
            }
        }

        for a in span {
            self.info[a].decoded = true;
        }
        self.info[insn.addr as usize].instruction_start = true;
        self.instructions.insert(insn.addr, insn);
        Ok(())
    }

    /// The instruction starting at `addr`.
    pub fn instruction_at(&self, addr: Address) -> Option<&Instruction> {
        self.instructions.get(&addr)
    }

    /// The instruction whose bytes include `addr`, wherever it starts.
    pub fn instruction_covering(&self, addr: Address) -> Option<&Instruction> {
        self.instructions
            .range(..=addr)
            .next_back()
            .map(|(_, insn)| insn)
            .filter(|insn| span(insn.addr, insn.size).contains(&(addr as usize)))
    }

    /// All decoded instructions in ascending address order.
    pub fn instructions(&self) -> impl Iterator<Item = (Address, &Instruction)> + '_ {
        self.instructions.iter().map(|(&addr, insn)| (addr, insn))
    }

    /// Number of decoded instructions.
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}

fn span(addr: Address, size: u8) -> std::ops::Range<usize> {
    let start = addr as usize;
    start..(start + size as usize).min(ADDRESS_SPACE)
}

fn conflict(insn: &Instruction, existing: &Instruction) -> DecodeConflict {
    DecodeConflict {
        addr: insn.addr,
        size: insn.size,
        existing_addr: existing.addr,
        existing_size: existing.size,
    }
}
