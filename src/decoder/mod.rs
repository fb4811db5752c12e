//! Table-driven instruction decoder for the NEC 78K/II family.
//!
//! Decoding walks an ordered list of mask/value rules (see [`rules`]) and
//! stops at the first rule whose opcode pattern, and optional pattern on the
//! following byte, matches. Several patterns overlap, so the order of the
//! table is part of the instruction set definition.
//!
//! A leading `0x01` byte is not an instruction by itself: it selects the
//! external (`&`) variant of memory operands, or the sfr variant of some
//! saddr operands, for the instruction that follows.

mod fields;
mod rules;

use crate::memory::{OutOfRange, Rom};
use crate::{Address, Argument, Decoder, FlowType, Instruction, MAX_INSTRUCTION_SIZE};

pub use self::fields::{CALLF_BASE, SADDR_BASE, SFR_BASE};

/// Prefix byte selecting external memory / sfr operand variants.
pub const PREFIX: u8 = 0x01;

/// Default address of the CALLT pointer table.
pub const CALLT_BASE: Address = 0x0040;

/// Why a byte sequence is not a legal instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Illegal {
    /// No rule matches the opcode
    #[error("no matching instruction")]
    NoMatch,
    /// The `0x01` prefix precedes an instruction that has no prefixed form
    #[error("prefix not allowed")]
    PrefixNotAllowed,
    /// An addressing-mode field selects an unused encoding
    #[error("unused memory addressing mode {0}")]
    MemoryMode(u8),
    /// A word-pair address operand is odd
    #[error("odd word address 0x{0:04x}")]
    MisalignedPointer(u16),
}

/// Errors that can occur during decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The bytes at `addr` are not an instruction
    #[error("Illegal opcode {} at 0x{addr:04x}: {reason}", hex(.bytes))]
    IllegalOpcode {
        /// Address of the first byte
        addr: Address,
        /// The offending opcode byte(s)
        bytes: Vec<u8>,
        /// What went wrong
        reason: Illegal,
    },

    /// The instruction, or a table it dereferences, runs past the image
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decoder for the uPD78K/II instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upd78k2Decoder {
    callt_base: Address,
}

impl Default for Upd78k2Decoder {
    fn default() -> Self {
        Self { callt_base: CALLT_BASE }
    }
}

impl Upd78k2Decoder {
    /// Decoder with the standard CALLT table at 0x0040.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder reading CALLT pointers from a table at `callt_base`.
    pub fn with_callt_base(callt_base: Address) -> Self {
        Self { callt_base }
    }

    /// Address of the CALLT pointer table.
    pub fn callt_base(&self) -> Address {
        self.callt_base
    }
}


impl Decoder for Upd78k2Decoder {
    fn decode(&self, rom: &Rom, at: Address) -> Result<Instruction, DecodeError> {
        let first = rom.read_byte(at)?;
        let prefixed = first == PREFIX;
        let op_at = if prefixed {
            at.checked_add(1).ok_or(OutOfRange { addr: at, len: rom.len() })?
        } else {
            at
        };

        let window = Window {
            rom,
            start: at,
            op_at,
            prefixed,
            op: rom.read_byte(op_at)?,
            callt_base: self.callt_base,
        };

        let built = rules::dispatch(&window)?;

        let opcode_len = window.prefix_len() + 1 + built.extra_opcode;
        let size = opcode_len + built.operands;
        let mut bytes = [0u8; MAX_INSTRUCTION_SIZE];
        for (i, slot) in bytes.iter_mut().enumerate().take(size as usize) {
            let addr = at
                .checked_add(i as Address)
                .ok_or(OutOfRange { addr: at, len: rom.len() })?;
            *slot = rom.read_byte(addr)?;
        }

        Ok(Instruction {
            addr: at,
            size,
            opcode_len,
            template: built.text,
            args: built.args,
            flow: built.flow,
            bytes,
        })
    }
}

/// The bytes a rule looks at: the opcode byte and what follows it.
pub(crate) struct Window<'a> {
    rom: &'a Rom,
    start: Address,
    op_at: Address,
    prefixed: bool,
    op: u8,
    callt_base: Address,
}

impl Window<'_> {
    /// Byte `offset` positions after the opcode byte (0 is the opcode itself).
    fn byte(&self, offset: u16) -> Result<u8, OutOfRange> {
        let addr = self
            .op_at
            .checked_add(offset)
            .ok_or(OutOfRange { addr: self.op_at, len: self.rom.len() })?;
        self.rom.read_byte(addr)
    }

    fn word(&self, offset: u16) -> Result<u16, OutOfRange> {
        Ok(fields::addr16(self.byte(offset)?, self.byte(offset + 1)?))
    }

    fn prefix_len(&self) -> u8 {
        u8::from(self.prefixed)
    }

    /// `&` for the external variant of a memory operand.
    fn amp(&self) -> &'static str {
        if self.prefixed {
            "&"
        } else {
            ""
        }
    }

    /// A saddr operand, or an sfr operand when prefixed.
    fn saddr_or_sfr(&self, low: u8) -> Address {
        if self.prefixed {
            fields::sfr(low)
        } else {
            fields::saddr(low)
        }
    }

    /// Destination of a relative branch `len` bytes long whose displacement
    /// byte sits at `offset`.
    fn relative(&self, len: u8, offset: u16) -> Result<Address, OutOfRange> {
        Ok(fields::relative(self.start, len, self.byte(offset)?))
    }

    /// Illegal encoding identified by the prefix and opcode byte alone.
    fn illegal(&self, reason: Illegal) -> DecodeError {
        self.illegal_bytes(reason, false)
    }

    /// Illegal encoding whose second byte was inspected to reach the verdict.
    fn illegal_wide(&self, reason: Illegal) -> DecodeError {
        self.illegal_bytes(reason, true)
    }

    fn illegal_bytes(&self, reason: Illegal, wide: bool) -> DecodeError {
        let mut bytes = Vec::with_capacity(3);
        if self.prefixed {
            bytes.push(PREFIX);
        }
        bytes.push(self.op);
        if wide {
            if let Ok(next) = self.byte(1) {
                bytes.push(next);
            }
        }
        DecodeError::IllegalOpcode { addr: self.start, bytes, reason }
    }
}

/// What a rule produces; `decode` turns it into an [`Instruction`].
pub(crate) struct Built {
    text: String,
    args: Vec<Argument>,
    flow: FlowType,
    extra_opcode: u8,
    operands: u8,
}

impl Built {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            args: Vec::new(),
            flow: FlowType::Continue,
            extra_opcode: 0,
            operands: 0,
        }
    }

    fn operands(mut self, n: u8) -> Self {
        self.operands = n;
        self
    }

    /// The byte after the opcode is part of the opcode.
    fn wide_opcode(mut self) -> Self {
        self.extra_opcode = 1;
        self
    }

    fn referenced(mut self, addr: Address) -> Self {
        self.args.push(Argument::referenced(addr));
        self
    }

    fn target(mut self, addr: Address) -> Self {
        self.args.push(Argument::target(addr));
        self
    }

    fn flow(mut self, flow: FlowType) -> Self {
        self.flow = flow;
        self
    }
}
