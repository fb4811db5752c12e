//! JSON and JSON Lines output formatters

use serde::Serialize;
use serde_json::json;

use super::{hex_bytes, Diagnostic, DiagnosticKind, Listing, ListingFormatter};
use crate::symbols::{Provenance, Symbol};
use crate::{Address, DisassemblyError, Instruction};

/// Serializable instruction for JSON output
#[derive(Serialize)]
struct InstructionJson<'a> {
    /// Address of the instruction
    address: String,
    /// Symbol at this address, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
    /// Size of the instruction in bytes
    size: u8,
    /// Bytes of the instruction as hex string
    bytes: String,
    /// Rendered instruction text
    text: String,
    /// Control-flow category
    flow: String,
    /// Branch or call destination
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    /// Data addresses the instruction touches
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<String>,
}

/// Serializable symbol for JSON output
#[derive(Serialize)]
struct SymbolJson<'a> {
    address: String,
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    comment: &'a str,
    provenance: Provenance,
}

#[derive(Serialize)]
struct DiagnosticJson {
    #[serde(rename = "type")]
    kind: DiagnosticKind,
    address: String,
    message: String,
}

#[derive(Serialize)]
struct RangeJson {
    start: String,
    end: String,
}

/// Serializable listing for JSON output
#[derive(Serialize)]
struct ListingJson<'a> {
    range: RangeJson,
    instructions: Vec<InstructionJson<'a>>,
    symbols: Vec<SymbolJson<'a>>,
    diagnostics: Vec<DiagnosticJson>,
}

fn address(addr: Address) -> String {
    format!("0x{:04x}", addr)
}

fn instruction_to_json<'a>(listing: &Listing<'a>, insn: &Instruction) -> InstructionJson<'a> {
    InstructionJson {
        address: address(insn.addr),
        label: listing.symbols.name(insn.addr),
        size: insn.size,
        bytes: hex_bytes(insn.bytes()),
        text: listing.render(insn),
        flow: insn.flow.to_string(),
        target: insn.target_address().map(address),
        references: insn.referenced_addresses().map(address).collect(),
    }
}

fn symbol_to_json(addr: Address, symbol: &Symbol) -> SymbolJson<'_> {
    SymbolJson {
        address: address(addr),
        name: &symbol.name,
        comment: &symbol.comment,
        provenance: symbol.provenance,
    }
}

fn diagnostic_to_json(diagnostic: Diagnostic) -> DiagnosticJson {
    DiagnosticJson {
        kind: diagnostic.kind,
        address: address(diagnostic.addr),
        message: diagnostic.message,
    }
}

impl ListingFormatter for super::JsonFormatter {
    fn format(&self, listing: &Listing<'_>) -> Result<String, DisassemblyError> {
        let result = ListingJson {
            range: RangeJson {
                start: address(listing.range.start),
                end: address(listing.range.end),
            },
            instructions: listing
                .instructions()
                .map(|insn| instruction_to_json(listing, insn))
                .collect(),
            symbols: listing
                .symbols
                .iter()
                .map(|(addr, symbol)| symbol_to_json(addr, symbol))
                .collect(),
            diagnostics: listing.diagnostics().into_iter().map(diagnostic_to_json).collect(),
        };

        Ok(serde_json::to_string_pretty(&result)?)
    }
}

impl ListingFormatter for super::JsonLinesFormatter {
    fn format(&self, listing: &Listing<'_>) -> Result<String, DisassemblyError> {
        let mut lines = Vec::new();

        for insn in listing.instructions() {
            let entry = instruction_to_json(listing, insn);
            lines.push(json!({
                "type": "instruction",
                "address": entry.address,
                "label": entry.label,
                "size": entry.size,
                "bytes": entry.bytes,
                "text": entry.text,
                "flow": entry.flow,
                "target": entry.target,
                "references": entry.references,
            }));
        }

        for (addr, symbol) in listing.symbols.iter() {
            lines.push(json!({
                "type": "symbol",
                "address": address(addr),
                "name": symbol.name,
                "comment": symbol.comment,
                "provenance": symbol.provenance,
            }));
        }

        for diagnostic in listing.diagnostics() {
            lines.push(json!({
                "type": "diagnostic",
                "kind": diagnostic.kind,
                "address": address(diagnostic.addr),
                "message": diagnostic.message,
            }));
        }

        let mut output = String::new();
        for line in lines {
            output.push_str(&serde_json::to_string(&line)?);
            output.push('\n');
        }

        Ok(output)
    }
}
