//! Symbol table and the post-trace resolver.
//!
//! Names come from three places, in strict precedence order: predefined
//! symbols (built-in table plus configuration), code labels derived from the
//! classification map (`sub_XXXX`, `lab_XXXX`) and data labels derived from
//! referenced addresses (`mem_XXXX`). A name, once assigned, is never replaced
//! by a lower-precedence one.

pub mod upd78213;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::config::{TraceConfig, TraceRange};
use crate::memory::{Classification, Memory};
use crate::Address;

/// Where a symbol came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Built-in table or configuration
    Predefined,
    /// Subroutine or label at a traced instruction
    Code,
    /// Address referenced as data by some instruction
    Data,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Predefined => write!(f, "predefined"),
            Provenance::Code => write!(f, "code"),
            Provenance::Data => write!(f, "data"),
        }
    }
}

/// A named address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub comment: String,
    pub provenance: Provenance,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        comment: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self { name: name.into(), comment: comment.into(), provenance }
    }
}

/// Address to symbol map, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: BTreeMap<Address, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the symbol at `addr`, replacing any existing one.
    pub fn define(&mut self, addr: Address, symbol: Symbol) {
        self.entries.insert(addr, symbol);
    }

    /// Set the symbol at `addr` unless one exists. Returns whether it was added.
    pub fn insert_if_absent(&mut self, addr: Address, symbol: Symbol) -> bool {
        match self.entries.entry(addr) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(symbol);
                true
            }
        }
    }

    pub fn get(&self, addr: Address) -> Option<&Symbol> {
        self.entries.get(&addr)
    }

    /// Name of the symbol at `addr`; the lookup function for
    /// [`Instruction::render`](crate::Instruction::render).
    pub fn name(&self, addr: Address) -> Option<&str> {
        self.entries.get(&addr).map(|s| s.name.as_str())
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.entries.contains_key(&addr)
    }

    /// All symbols in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, &Symbol)> + '_ {
        self.entries.iter().map(|(&addr, symbol)| (addr, symbol))
    }

    /// Symbols within `range`, in ascending address order.
    pub fn range(
        &self,
        range: RangeInclusive<Address>,
    ) -> impl Iterator<Item = (Address, &Symbol)> + '_ {
        self.entries.range(range).map(|(&addr, symbol)| (addr, symbol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The predefined table for `config`: CALLT slot names, the uPD78213 table
/// and then the configured symbols, later entries replacing earlier ones.
pub fn predefined(config: &TraceConfig) -> SymbolTable {
    let mut table = SymbolTable::new();

    for (addr, name, comment) in upd78213::callt_slots(config.callt_base) {
        table.define(addr, Symbol::new(name, comment, Provenance::Predefined));
    }
    for &(addr, name, comment) in upd78213::SYMBOLS {
        table.define(addr, Symbol::new(name, comment, Provenance::Predefined));
    }
    for def in &config.symbols {
        table.define(def.address, Symbol::new(&def.name, &def.comment, Provenance::Predefined));
    }

    table
}

/// A call, jump or entry target that never became an instruction start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanTarget {
    pub addr: Address,
    pub flags: Classification,
    /// Start of the instruction the target lands inside, if any
    pub inside: Option<Address>,
}

/// Output of [`resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub symbols: SymbolTable,
    pub orphans: Vec<OrphanTarget>,
}

/// Name every code and data address found by the tracer.
///
/// Takes the traced map read-only and the predefined table by value; the
/// returned table is the final one.
pub fn resolve(memory: &Memory, predefined: SymbolTable, range: TraceRange) -> Resolution {
    let mut symbols = predefined;
    let mut orphans = Vec::new();
    let before = symbols.len();

    for addr in range.addresses() {
        let flags = memory.classification(addr);
        if !(flags.call_target || flags.jump_target || flags.entry_point) {
            continue;
        }

        if !flags.instruction_start {
            let inside = memory.instruction_covering(addr).map(|insn| insn.addr);
            log::warn!("Target 0x{:04x} is not an instruction start", addr);
            orphans.push(OrphanTarget { addr, flags, inside });
            continue;
        }

        let name = if flags.call_target {
            format!("sub_{:04x}", addr)
        } else {
            format!("lab_{:04x}", addr)
        };
        symbols.insert_if_absent(addr, Symbol::new(name, "", Provenance::Code));
    }

    let data: BTreeSet<Address> = memory
        .instructions()
        .flat_map(|(_, insn)| insn.referenced_addresses())
        .collect();
    for addr in data {
        let name = format!("mem_{:04x}", addr);
        symbols.insert_if_absent(addr, Symbol::new(name, "", Provenance::Data));
    }

    log::debug!(
        "Resolved {} symbols ({} generated), {} orphan targets",
        symbols.len(),
        symbols.len() - before,
        orphans.len()
    );

    Resolution { symbols, orphans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolDef;
    use crate::memory::Rom;
    use crate::{Argument, FlowType, Instruction, MAX_INSTRUCTION_SIZE};

    fn insn(addr: Address, size: u8, args: Vec<Argument>) -> Instruction {
        Instruction {
            addr,
            size,
            opcode_len: 1,
            template: "op".to_string(),
            args,
            flow: FlowType::Continue,
            bytes: [0; MAX_INSTRUCTION_SIZE],
        }
    }

    fn memory() -> Memory {
        Memory::new(Rom::new(vec![0; 0x400]))
    }

    #[test]
    fn test_predefined_table() {
        let table = predefined(&TraceConfig::default());

        assert_eq!(table.name(0x0000), Some("rst_vect"));
        assert_eq!(table.name(0x0040), Some("callt_start"));
        assert_eq!(table.name(0x0042), Some("callt_1_vect"));
        assert_eq!(table.name(0x007e), Some("callt_31_vect"));
        assert_eq!(table.name(0xffc6), Some("RFM"));
        assert_eq!(table.get(0xfffe).map(|s| s.comment.as_str()), Some("Program status word"));
        assert!(table.iter().all(|(_, s)| s.provenance == Provenance::Predefined));
    }

    #[test]
    fn test_configured_symbols_override_builtins() {
        let config = TraceConfig {
            symbols: vec![
                SymbolDef { address: 0x0000, name: "reset".into(), comment: String::new() },
                SymbolDef { address: 0x1234, name: "main_loop".into(), comment: "idle".into() },
            ],
            ..TraceConfig::default()
        };
        let table = predefined(&config);

        assert_eq!(table.name(0x0000), Some("reset"));
        assert_eq!(table.get(0x1234).map(|s| s.comment.as_str()), Some("idle"));
    }

    #[test]
    fn test_code_symbols() {
        let mut memory = memory();
        memory.place(insn(0x100, 1, Vec::new())).unwrap();
        memory.place(insn(0x110, 1, Vec::new())).unwrap();
        memory.place(insn(0x120, 1, Vec::new())).unwrap();
        memory.place(insn(0x130, 1, Vec::new())).unwrap();
        memory.mark_call_target(0x100);
        memory.mark_jump_target(0x100);
        memory.mark_jump_target(0x110);
        memory.mark_entry_point(0x120);

        let r = resolve(&memory, SymbolTable::new(), TraceRange::default());

        assert_eq!(r.symbols.name(0x100), Some("sub_0100"));
        assert_eq!(r.symbols.name(0x110), Some("lab_0110"));
        assert_eq!(r.symbols.name(0x120), Some("lab_0120"));
        assert_eq!(r.symbols.name(0x130), None);
        assert_eq!(r.symbols.get(0x100).map(|s| s.provenance), Some(Provenance::Code));
        assert!(r.orphans.is_empty());
    }

    #[test]
    fn test_data_symbols() {
        let mut memory = memory();
        memory
            .place(insn(0x100, 3, vec![Argument::referenced(0xfe20), Argument::target(0x200)]))
            .unwrap();
        memory.place(insn(0x103, 2, vec![Argument::referenced(0xfe20)])).unwrap();
        memory.place(insn(0x105, 2, vec![Argument::referenced(0xff00)])).unwrap();

        let r = resolve(&memory, predefined(&TraceConfig::default()), TraceRange::default());

        assert_eq!(r.symbols.name(0xfe20), Some("mem_fe20"));
        assert_eq!(r.symbols.get(0xfe20).map(|s| s.provenance), Some(Provenance::Data));
        // Predefined wins over generated data names.
        assert_eq!(r.symbols.name(0xff00), Some("P0"));
        // Target arguments are not data.
        assert_eq!(r.symbols.name(0x200), None);
    }

    #[test]
    fn test_predefined_symbols_are_never_replaced() {
        let mut memory = memory();
        memory.place(insn(0x0000, 1, vec![Argument::referenced(0x0002)])).unwrap();
        memory.mark_call_target(0x0000);

        let r = resolve(&memory, predefined(&TraceConfig::default()), TraceRange::default());

        assert_eq!(r.symbols.name(0x0000), Some("rst_vect"));
        assert_eq!(r.symbols.name(0x0002), Some("nmi_vect"));
    }

    #[test]
    fn test_orphan_targets_are_reported() {
        let mut memory = memory();
        memory.place(insn(0x100, 3, Vec::new())).unwrap();
        memory.mark_jump_target(0x101);
        memory.mark_call_target(0x300);

        let r = resolve(&memory, SymbolTable::new(), TraceRange::default());

        assert_eq!(r.orphans.len(), 2);
        assert_eq!(r.orphans[0].addr, 0x101);
        assert_eq!(r.orphans[0].inside, Some(0x100));
        assert!(r.orphans[0].flags.jump_target);
        assert_eq!(r.orphans[1].addr, 0x300);
        assert_eq!(r.orphans[1].inside, None);
        assert!(!r.symbols.contains(0x101));
    }

    #[test]
    fn test_range_limits_code_symbols() {
        let mut memory = memory();
        memory.place(insn(0x300, 1, Vec::new())).unwrap();
        memory.mark_jump_target(0x300);

        let r = resolve(&memory, SymbolTable::new(), TraceRange::new(0x000, 0x2ff));

        assert!(r.symbols.is_empty());
    }

    #[test]
    fn test_insert_if_absent() {
        let mut table = SymbolTable::new();

        assert!(table.insert_if_absent(1, Symbol::new("a", "", Provenance::Code)));
        assert!(!table.insert_if_absent(1, Symbol::new("b", "", Provenance::Data)));
        assert_eq!(table.name(1), Some("a"));
        assert_eq!(table.len(), 1);
    }
}
