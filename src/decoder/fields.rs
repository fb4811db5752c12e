//! Operand field extraction for 78K/II opcodes.

use crate::Address;

const REGS: [&str; 8] = ["X", "A", "C", "B", "E", "D", "L", "H"];
const REG_PAIRS: [&str; 4] = ["AX", "BC", "DE", "HL"];

const ALU8: [&str; 8] = ["ADD", "ADDC", "SUB", "SUBC", "AND", "XOR", "OR", "CMP"];
const ALU16: [&str; 4] = ["ADDW", "ADDW", "SUBW", "CMPW"];

const MEM_INDIRECT: [&str; 6] = ["[DE+]", "[HL+]", "[DE-]", "[HL-]", "[DE]", "[HL]"];
const MEM_BASE: [&str; 3] = ["DE", "SP", "HL"];
const MEM_INDEXED: [&str; 4] = ["DE", "A", "HL", "B"];

/// Start of the short direct addressing area.
pub const SADDR_BASE: Address = 0xfe00;
/// Start of the special function register area.
pub const SFR_BASE: Address = 0xff00;
/// Start of the CALLF entry area.
pub const CALLF_BASE: Address = 0x0800;

/// General register in the low three bits.
pub fn reg(byte: u8) -> &'static str {
    REGS[(byte & 0x07) as usize]
}

/// Register pair in bits 1-2.
pub fn reg_pair(byte: u8) -> &'static str {
    REG_PAIRS[((byte >> 1) & 0x03) as usize]
}

/// X or A, selected by bit 3.
pub fn bit_reg(byte: u8) -> &'static str {
    ["X", "A"][((byte >> 3) & 0x01) as usize]
}

pub fn saddr(low: u8) -> Address {
    SADDR_BASE + low as Address
}

pub fn sfr(low: u8) -> Address {
    SFR_BASE + low as Address
}

pub fn addr16(low: u8, high: u8) -> Address {
    u16::from_le_bytes([low, high])
}

/// 8-bit ALU operation in the low three bits.
pub fn alu8(byte: u8) -> &'static str {
    ALU8[(byte & 0x07) as usize]
}

/// 16-bit ALU operation in the low two bits.
pub fn alu16(byte: u8) -> &'static str {
    ALU16[(byte & 0x03) as usize]
}

/// Register-indirect memory operand, `None` for the two unused encodings.
pub fn mem_indirect(mode: u8) -> Option<&'static str> {
    MEM_INDIRECT.get((mode & 0x07) as usize).copied()
}

/// Base register of a `[rp+byte]` operand.
pub fn mem_base(mode: u8) -> Option<&'static str> {
    MEM_BASE.get((mode & 0x07) as usize).copied()
}

/// Index register of a `word[r]` operand.
pub fn mem_indexed(mode: u8) -> Option<&'static str> {
    MEM_INDEXED.get((mode & 0x07) as usize).copied()
}

/// `[DE]` or `[HL]`, selected by bit 0.
pub fn mem1(byte: u8) -> &'static str {
    ["[DE]", "[HL]"][(byte & 0x01) as usize]
}

/// Destination of a relative branch: the address after the instruction plus
/// the signed displacement.
pub fn relative(pc: Address, len: u8, disp: u8) -> Address {
    pc.wrapping_add(len as Address)
        .wrapping_add(disp as i8 as i16 as u16)
}

/// CALLF destination: the low three opcode bits extend the operand byte.
pub fn callf(op: u8, low: u8) -> Address {
    CALLF_BASE + low as Address + (((op & 0x07) as Address) << 8)
}
