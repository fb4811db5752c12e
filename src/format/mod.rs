//! Output format module implementation

mod csv;
mod json;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::config::TraceRange;
use crate::memory::Memory;
use crate::symbols::{OrphanTarget, SymbolTable};
use crate::trace::TraceReport;
use crate::{Address, DisassemblyError, Instruction};

/// Supported output formats for disassembly results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Assembler-style listing (default)
    #[default]
    Text,
    /// JSON format (hierarchical)
    Json,
    /// JSON Lines format (one JSON object per line)
    #[value(name = "jsonl", alias = "json-lines")]
    JsonLines,
    /// CSV format, one row per instruction
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "asm" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" | "json-lines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn ListingFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Everything a renderer reads: the traced map, the final symbols and the
/// diagnostics, restricted to one address range.
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    pub memory: &'a Memory,
    pub symbols: &'a SymbolTable,
    pub report: &'a TraceReport,
    pub orphans: &'a [OrphanTarget],
    pub range: TraceRange,
}

impl<'a> Listing<'a> {
    /// Instruction text with every argument replaced by its symbol.
    pub fn render(&self, insn: &Instruction) -> String {
        let symbols = self.symbols;
        insn.render(|addr| symbols.name(addr))
    }

    /// Decoded instructions inside the range, in address order.
    pub fn instructions(&self) -> impl Iterator<Item = &'a Instruction> + 'a {
        let range = self.range;
        self.memory
            .instructions()
            .filter(move |(addr, _)| range.contains(*addr))
            .map(|(_, insn)| insn)
    }

    /// Last address that is both in the range and in the image.
    fn last_address(&self) -> Option<Address> {
        let len = self.memory.rom().len();
        if len == 0 || self.range.start as usize >= len {
            return None;
        }
        let last = (len - 1).min(self.range.end as usize);
        Some(last as Address)
    }

    /// Whether a symbol's address is listed in the body rather than as an
    /// equate in the header.
    fn in_body(&self, addr: Address) -> bool {
        self.last_address()
            .map_or(false, |last| self.range.start <= addr && addr <= last)
    }

    /// Every problem found while tracing and resolving, in a fixed order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let report = self.report;
        let mut out = Vec::new();

        for failure in &report.failures {
            out.push(Diagnostic::new(
                DiagnosticKind::DecodeFailure,
                failure.addr,
                failure.error.to_string(),
            ));
        }
        for conflict in &report.conflicts {
            out.push(Diagnostic::new(
                DiagnosticKind::DecodeConflict,
                conflict.addr,
                conflict.to_string(),
            ));
        }
        for &addr in &report.indirect {
            let text = self
                .memory
                .instruction_at(addr)
                .map(|insn| self.render(insn))
                .unwrap_or_default();
            out.push(Diagnostic::new(
                DiagnosticKind::UnresolvedIndirect,
                addr,
                format!("{}: destination unknown", text),
            ));
        }
        for bad in &report.bad_vectors {
            out.push(Diagnostic::new(DiagnosticKind::BadVector, bad.slot, bad.error.to_string()));
        }
        for skipped in &report.untraceable {
            let origin = match skipped.from {
                Some(from) => format!(" from 0x{:04x}", from),
                None => String::new(),
            };
            out.push(Diagnostic::new(
                DiagnosticKind::Untraceable,
                skipped.addr,
                format!("{}{} outside the traceable range", skipped.reach, origin),
            ));
        }
        for orphan in self.orphans {
            let role = if orphan.flags.call_target {
                "call"
            } else if orphan.flags.jump_target {
                "jump"
            } else {
                "entry"
            };
            let message = match orphan.inside {
                Some(start) => format!("{} target inside the instruction at 0x{:04x}", role, start),
                None => format!("{} target was never decoded", role),
            };
            out.push(Diagnostic::new(DiagnosticKind::OrphanTarget, orphan.addr, message));
        }

        out
    }
}

/// Category of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    DecodeFailure,
    DecodeConflict,
    UnresolvedIndirect,
    BadVector,
    Untraceable,
    OrphanTarget,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::DecodeFailure => "decode failure",
            DiagnosticKind::DecodeConflict => "decode conflict",
            DiagnosticKind::UnresolvedIndirect => "unresolved indirect",
            DiagnosticKind::BadVector => "bad vector",
            DiagnosticKind::Untraceable => "untraceable",
            DiagnosticKind::OrphanTarget => "orphan target",
        };
        f.write_str(name)
    }
}

/// One trace or resolve problem, flattened for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub addr: Address,
    pub message: String,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, addr: Address, message: String) -> Self {
        Self { kind, addr, message }
    }
}

/// Formatter trait for listing output
pub trait ListingFormatter {
    /// Format a listing
    fn format(&self, listing: &Listing<'_>) -> Result<String, DisassemblyError>;
}

/// Format the listing as assembler source
pub struct TextFormatter;

/// Format the listing in JSON
pub struct JsonFormatter;

/// Format the listing in JSON Lines
pub struct JsonLinesFormatter;

/// Format the listing in CSV
pub struct CsvFormatter;

/// Bytes as space separated hex pairs.
pub(crate) fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

impl TextFormatter {
    fn label(output: &mut String, name: &str, comment: &str) {
        if comment.is_empty() {
            output.push_str(&format!("{}:\n", name));
        } else {
            output.push_str(&format!("{:<36}; {}\n", format!("{}:", name), comment));
        }
    }

    fn code(output: &mut String, text: &str, addr: Address, bytes: &[u8]) {
        output.push_str(&format!("    {:<32}; {:04x}: {}\n", text, addr, hex_bytes(bytes)));
    }

    fn equate(output: &mut String, addr: Address, name: &str, comment: &str) {
        let line = format!("{:<20}EQU 0x{:04x}", name, addr);
        if comment.is_empty() {
            output.push_str(&format!("{}\n", line));
        } else {
            output.push_str(&format!("{:<36}; {}\n", line, comment));
        }
    }

    /// Equates for symbols that fall on the trailing bytes of a multi-byte
    /// line, which get no label line of their own.
    fn covered(output: &mut String, listing: &Listing<'_>, addr: Address, len: usize, last: usize) {
        let end = (addr as usize + len - 1).min(last);
        if end <= addr as usize {
            return;
        }
        for (inner, symbol) in listing.symbols.range(addr + 1..=end as Address) {
            Self::equate(output, inner, &symbol.name, &symbol.comment);
        }
    }
}

impl ListingFormatter for TextFormatter {
    fn format(&self, listing: &Listing<'_>) -> Result<String, DisassemblyError> {
        let mut output = String::new();
        let memory = listing.memory;
        let rom = memory.rom();

        // Symbols outside the listed bytes become equates.
        for (addr, symbol) in listing.symbols.iter().filter(|(addr, _)| !listing.in_body(*addr)) {
            Self::equate(&mut output, addr, &symbol.name, &symbol.comment);
        }

        let last = match listing.last_address() {
            Some(last) => last as usize,
            None => return Ok(output),
        };

        output.push_str(&format!("\n    ORG 0x{:04x}\n\n", listing.range.start));

        let mut at = listing.range.start as usize;
        while at <= last {
            let addr = at as Address;
            if let Some(symbol) = listing.symbols.get(addr) {
                Self::label(&mut output, &symbol.name, &symbol.comment);
            }

            if let Some(insn) = memory.instruction_at(addr) {
                Self::code(&mut output, &listing.render(insn), addr, insn.bytes());
                Self::covered(&mut output, listing, addr, insn.len(), last);
                at += insn.len();
                continue;
            }

            let word_fits = at < last && !memory.is_decoded(addr) && !memory.is_decoded(addr + 1);
            if memory.is_vector(addr) && word_fits {
                if let Ok(value) = rom.read_word(addr) {
                    let target = match listing.symbols.name(value) {
                        Some(name) => name.to_string(),
                        None => format!("0x{:04x}", value),
                    };
                    let bytes = &rom.as_slice()[at..at + 2];
                    Self::code(&mut output, &format!("DW {}", target), addr, bytes);
                    Self::covered(&mut output, listing, addr, 2, last);
                    at += 2;
                    continue;
                }
            }

            let byte = rom
                .read_byte(addr)
                .map_err(|e| DisassemblyError::Generic(e.to_string()))?;
            Self::code(&mut output, &format!("DB 0x{:02x}", byte), addr, &[byte]);
            at += 1;
        }

        let diagnostics = listing.diagnostics();
        if !diagnostics.is_empty() {
            output.push('\n');
            for diagnostic in diagnostics {
                output.push_str(&format!(
                    "; {}: 0x{:04x}: {}\n",
                    diagnostic.kind, diagnostic.addr, diagnostic.message
                ));
            }
        }

        output.push_str("\n    END\n");
        Ok(output)
    }
}
