//! Core IR, traits and pipeline for the uPD78K/II tracing disassembler.
//!
//! A raw ROM image carries no information about where code starts or ends.
//! This library rebuilds a symbolic listing by tracing control flow from the
//! hardware vectors, the CALLT table and any user supplied entry points,
//! decoding every reachable instruction exactly once and naming what it finds.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use upd78k2_dasm::{
//!     config::TraceConfig,
//!     format::OutputFormat,
//!     memory::Rom,
//!     disassemble,
//! };
//!
//! // Read the ROM image
//! let rom = Rom::new(fs::read("rom.bin").unwrap());
//!
//! // Trace from the uPD78213 vectors and resolve symbols
//! let config = TraceConfig::default();
//! let disassembly = disassemble(rom, &config);
//!
//! // Render a text listing
//! let text = OutputFormat::Text
//!     .get_formatter()
//!     .format(&disassembly.listing(&config))
//!     .unwrap();
//! println!("{}", text);
//! ```

pub mod config;
pub mod decoder;
pub mod format;
pub mod memory;
pub mod symbols;
pub mod trace;
#[cfg(test)]
mod large_tests;

/// A 16-bit address in the 78K/II address space.
pub type Address = u16;

use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;

use crate::config::TraceConfig;
use crate::decoder::{DecodeError, Upd78k2Decoder};
use crate::memory::{Memory, Rom};
use crate::symbols::{OrphanTarget, SymbolTable};
use crate::trace::{TraceReport, Tracer};

/// Maximum instruction size in bytes (prefix, two opcode bytes, two operands).
pub const MAX_INSTRUCTION_SIZE: usize = 5;

/// How an instruction affects control flow.
///
/// The tracer derives the successor addresses of every instruction from this
/// tag alone, so each consumer matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FlowType {
    /// Execution continues with the next instruction.
    Continue,
    /// Execution stops here (BRK).
    Stop,
    /// Jump to a statically known target.
    UnconditionalJump,
    /// Jump through a register pair; the target is unknown.
    IndirectUnconditionalJump,
    /// Branch that may or may not be taken.
    ConditionalJump,
    /// Call to a statically known subroutine.
    SubroutineCall,
    /// Call through a register pair; the callee is unknown but the call returns.
    IndirectSubroutineCall,
    /// Return from a subroutine or interrupt handler.
    SubroutineReturn,
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowType::Continue => "continue",
            FlowType::Stop => "stop",
            FlowType::UnconditionalJump => "jump",
            FlowType::IndirectUnconditionalJump => "indirect-jump",
            FlowType::ConditionalJump => "branch",
            FlowType::SubroutineCall => "call",
            FlowType::IndirectSubroutineCall => "indirect-call",
            FlowType::SubroutineReturn => "return",
        };
        f.write_str(name)
    }
}

/// What an address argument means to the instruction using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArgumentKind {
    /// A data, short-address or SFR operand that is read or written.
    ReferencedAddress,
    /// A control-flow destination.
    TargetAddress,
}

/// A typed address operand, substituted into the mnemonic template at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Argument {
    /// Role of the address
    pub kind: ArgumentKind,
    /// The address itself
    pub address: Address,
}

impl Argument {
    /// A data operand.
    pub fn referenced(address: Address) -> Self {
        Self { kind: ArgumentKind::ReferencedAddress, address }
    }

    /// A control-flow destination.
    pub fn target(address: Address) -> Self {
        Self { kind: ArgumentKind::TargetAddress, address }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the first byte (the `0x01` prefix when present)
    pub addr: Address,
    /// Size of the instruction in bytes
    pub size: u8,
    /// Number of leading bytes that form the opcode (prefix included)
    pub opcode_len: u8,
    /// Mnemonic with `{n}` placeholders for the arguments
    pub template: String,
    /// Address arguments in placeholder order
    pub args: Vec<Argument>,
    /// Control-flow behaviour
    pub flow: FlowType,
    /// Raw bytes of the instruction (up to MAX_INSTRUCTION_SIZE)
    pub bytes: [u8; MAX_INSTRUCTION_SIZE],
}

impl Instruction {
    /// Returns the instruction bytes, up to the actual instruction size.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.size as usize]
    }

    /// Returns the opcode bytes.
    pub fn opcode(&self) -> &[u8] {
        &self.bytes[..self.opcode_len as usize]
    }

    /// Returns the operand bytes.
    pub fn operands(&self) -> &[u8] {
        &self.bytes[self.opcode_len as usize..self.size as usize]
    }

    /// Length in bytes; also the offset of the fallthrough successor.
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Decoded instructions are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Address of the instruction that follows this one in memory.
    pub fn next_address(&self) -> Address {
        self.addr.wrapping_add(self.size as Address)
    }

    /// The branch or call destination, if the instruction has one.
    pub fn target_address(&self) -> Option<Address> {
        self.args
            .iter()
            .find(|arg| arg.kind == ArgumentKind::TargetAddress)
            .map(|arg| arg.address)
    }

    /// All data addresses the instruction reads or writes.
    pub fn referenced_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.args
            .iter()
            .filter(|arg| arg.kind == ArgumentKind::ReferencedAddress)
            .map(|arg| arg.address)
    }

    /// Substitute every `{n}` placeholder with the symbol `lookup` returns for
    /// argument `n`, or with the address as four hex digits.
    pub fn render<'s, F>(&self, lookup: F) -> String
    where
        F: Fn(Address) -> Option<&'s str>,
    {
        let mut out = String::with_capacity(self.template.len() + 8);
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                out.push(c);
                continue;
            }
            let mut index = String::new();
            while let Some(&d) = chars.peek() {
                chars.next();
                if d == '}' {
                    break;
                }
                index.push(d);
            }
            let arg = index.parse::<usize>().ok().and_then(|i| self.args.get(i));
            match arg {
                Some(arg) => match lookup(arg.address) {
                    Some(name) => out.push_str(name),
                    None => {
                        let _ = write!(out, "{:04x}", arg.address);
                    }
                },
                None => {
                    out.push('{');
                    out.push_str(&index);
                    out.push('}');
                }
            }
        }

        out
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|_| None))
    }
}

/// Decoder trait: one instruction at a time.
pub trait Decoder: Send + Sync {
    /// Decode a single instruction at `at`.
    ///
    /// # Arguments
    /// * `rom` - The ROM image to decode
    /// * `at` - Address of the first byte
    ///
    /// # Returns
    /// The instruction, or the reason no instruction starts at `at`
    fn decode(&self, rom: &Rom, at: Address) -> Result<Instruction, DecodeError>;
}

/// Everything a complete run produces.
#[derive(Debug)]
pub struct Disassembly {
    /// Classification map and decoded instructions, read-only after tracing
    pub memory: Memory,
    /// Per-path failures collected while tracing
    pub report: TraceReport,
    /// Final symbol table
    pub symbols: SymbolTable,
    /// Flagged targets that never became instruction starts
    pub orphans: Vec<OrphanTarget>,
}

impl Disassembly {
    /// Bundle the parts a listing renderer needs.
    pub fn listing<'a>(&'a self, config: &TraceConfig) -> format::Listing<'a> {
        format::Listing {
            memory: &self.memory,
            symbols: &self.symbols,
            report: &self.report,
            orphans: &self.orphans,
            range: config.traceable,
        }
    }
}

/// Trace `rom` with the 78K/II decoder and resolve symbols.
pub fn disassemble(rom: Rom, config: &TraceConfig) -> Disassembly {
    let decoder = Upd78k2Decoder::with_callt_base(config.callt_base);
    let trace = Tracer::new(&decoder, config).trace(rom);

    let predefined = symbols::predefined(config);
    let resolution = symbols::resolve(&trace.memory, predefined, config.traceable);

    Disassembly {
        memory: trace.memory,
        report: trace.report,
        symbols: resolution.symbols,
        orphans: resolution.orphans,
    }
}

/// Error type for disassembly operations
#[derive(Debug, thiserror::Error)]
pub enum DisassemblyError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}
