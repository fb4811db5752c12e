//! CSV output formatter

use serde::Serialize;

use super::{hex_bytes, Listing, ListingFormatter};
use crate::DisassemblyError;

/// One CSV row per instruction.
#[derive(Serialize)]
struct Row<'a> {
    address: String,
    label: &'a str,
    size: u8,
    bytes: String,
    instruction: String,
    flow: String,
    target: String,
}

impl ListingFormatter for super::CsvFormatter {
    fn format(&self, listing: &Listing<'_>) -> Result<String, DisassemblyError> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());

        for insn in listing.instructions() {
            writer.serialize(Row {
                address: format!("0x{:04x}", insn.addr),
                label: listing.symbols.name(insn.addr).unwrap_or_default(),
                size: insn.size,
                bytes: hex_bytes(insn.bytes()),
                instruction: listing.render(insn),
                flow: insn.flow.to_string(),
                target: insn
                    .target_address()
                    .map(|addr| format!("0x{:04x}", addr))
                    .unwrap_or_default(),
            })?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| DisassemblyError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| DisassemblyError::Generic(e.to_string()))
    }
}
