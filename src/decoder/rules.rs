//! The ordered 78K/II rule cascade.
//!
//! Rules are tried top to bottom and the first match wins. Do not reorder:
//! several opcode patterns overlap (the `0x16`/`0x06`/`0x0A` memory families,
//! the `0x05`, `0x08`, `0x03` and `0x02` second-byte families, `0x88`-`0x8F`
//! shared between 8-bit and 16-bit ALU forms) and the order resolves them.

use super::fields::{
    alu16, alu8, bit_reg, callf, mem1, mem_base, mem_indexed, mem_indirect, reg,
    reg_pair, saddr, sfr,
};
use super::{Built, DecodeError, Illegal, Window};
use crate::{Address, FlowType};

type Build = fn(&Window<'_>) -> Result<Built, DecodeError>;

#[derive(Clone, Copy)]
struct Pattern {
    mask: u8,
    value: u8,
}

impl Pattern {
    fn matches(self, byte: u8) -> bool {
        byte & self.mask == self.value
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Rejected,
    Accepted,
}

struct Rule {
    name: &'static str,
    op: Pattern,
    next: Option<Pattern>,
    prefix: Prefix,
    build: Build,
}

const fn rule(name: &'static str, mask: u8, value: u8, build: Build) -> Rule {
    Rule {
        name,
        op: Pattern { mask, value },
        next: None,
        prefix: Prefix::Rejected,
        build,
    }
}

impl Rule {
    /// Also require the byte after the opcode to match.
    const fn next(self, mask: u8, value: u8) -> Rule {
        Rule { next: Some(Pattern { mask, value }), ..self }
    }

    /// Allow the `0x01` prefix.
    const fn prefixed(self) -> Rule {
        Rule { prefix: Prefix::Accepted, ..self }
    }
}

#[rustfmt::skip]
static RULES: &[Rule] = &[
    rule("NOP",                0xff, 0x00, nop),
    rule("MOV STBC,#byte",     0xff, 0x09, mov_stbc).next(0xff, 0xc0),
    rule("SEL RBn",            0xff, 0x05, sel_rb).next(0xfc, 0xa8),
    rule("DI/EI",              0xfe, 0x4a, di_ei),
    rule("MOV r,#byte",        0xf8, 0xb8, mov_r_imm),
    rule("MOV saddr,#byte",    0xff, 0x3a, mov_saddr_imm),
    rule("MOV sfr,#byte",      0xff, 0x2b, mov_sfr_imm),
    rule("MOV r,r'",           0xff, 0x24, mov_r_r).next(0x88, 0x00),
    rule("MOV A,r",            0xf8, 0xd0, mov_a_r),
    rule("MOV A,saddr",        0xff, 0x20, mov_a_saddr),
    rule("MOV saddr,A",        0xff, 0x22, mov_saddr_a),
    rule("MOV A,sfr",          0xff, 0x10, mov_a_sfr),
    rule("MOV sfr,A",          0xff, 0x12, mov_sfr_a),
    rule("MOV saddr,saddr'",   0xff, 0x38, mov_saddr_saddr),
    rule("MOV A,mem",          0xfc, 0x58, mov_a_mem_short).prefixed(),
    rule("MOV A,mem",          0xfe, 0x5c, mov_a_mem_short).prefixed(),
    rule("MOV A,mem",          0xff, 0x16, mov_a_mem).next(0x8f, 0x00).prefixed(),
    rule("MOV A,mem",          0xff, 0x06, mov_a_mem).next(0x8f, 0x00).prefixed(),
    rule("MOV A,mem",          0xff, 0x0a, mov_a_mem).next(0x8f, 0x00).prefixed(),
    rule("MOV mem,A",          0xfc, 0x50, mov_mem_a_short).prefixed(),
    rule("MOV mem,A",          0xfe, 0x54, mov_mem_a_short).prefixed(),
    rule("MOV mem,A",          0xff, 0x16, mov_mem_a).next(0x8f, 0x80).prefixed(),
    rule("MOV mem,A",          0xff, 0x06, mov_mem_a).next(0x8f, 0x80).prefixed(),
    rule("MOV mem,A",          0xff, 0x0a, mov_mem_a).next(0x8f, 0x80).prefixed(),
    rule("MOV A,!addr16",      0xff, 0x09, mov_a_addr16).next(0xff, 0xf0).prefixed(),
    rule("MOV !addr16,A",      0xff, 0x09, mov_addr16_a).next(0xff, 0xf1).prefixed(),
    rule("XCH r,r'",           0xff, 0x25, xch_r_r).next(0x88, 0x00),
    rule("XCH A,r",            0xf8, 0xd8, xch_a_r),
    rule("XCH A,saddr/sfr",    0xff, 0x21, xch_a_saddr).prefixed(),
    rule("XCH saddr,saddr'",   0xff, 0x39, xch_saddr_saddr),
    rule("XCH A,mem",          0xff, 0x16, xch_a_mem).next(0x8f, 0x04).prefixed(),
    rule("XCH A,mem",          0xff, 0x06, xch_a_mem).next(0x8f, 0x04).prefixed(),
    rule("XCH A,mem",          0xff, 0x0a, xch_a_mem).next(0x8f, 0x04).prefixed(),
    rule("MOVW rp,#word",      0xf8, 0x60, movw_rp_imm),
    rule("MOVW saddrp,#word",  0xff, 0x0c, movw_saddrp_imm),
    rule("MOVW sfrp,#word",    0xff, 0x0b, movw_sfrp_imm),
    rule("MOVW rp,rp'",        0xff, 0x24, movw_rp_rp).next(0x99, 0x08),
    rule("MOVW AX,saddrp",     0xff, 0x1c, movw_ax_saddrp),
    rule("MOVW saddrp,AX",     0xff, 0x1a, movw_saddrp_ax),
    rule("MOVW AX,sfrp",       0xfd, 0x11, movw_sfrp),
    rule("MOVW AX,mem1",       0xff, 0x05, movw_ax_mem1).next(0xfe, 0xe2).prefixed(),
    rule("MOVW mem1,AX",       0xff, 0x05, movw_mem1_ax).next(0xfe, 0xe6).prefixed(),
    rule("ALU A,#byte",        0xf8, 0xa8, alu_a_imm),
    rule("ALU saddr,#byte",    0xf8, 0x68, alu_saddr_imm).prefixed(),
    rule("ALU r,r'",           0xf8, 0x88, alu_r_r).next(0x88, 0x00),
    rule("ALU A,saddr",        0xf8, 0x98, alu_a_saddr).prefixed(),
    rule("ALU saddr,saddr'",   0xf8, 0x78, alu_saddr_saddr),
    rule("ALU A,mem",          0xff, 0x16, alu_a_mem).next(0x88, 0x08).prefixed(),
    rule("ALU A,mem",          0xff, 0x06, alu_a_mem).next(0x88, 0x08).prefixed(),
    rule("ALU A,mem",          0xff, 0x0a, alu_a_mem).next(0x88, 0x08).prefixed(),
    rule("ALUW AX,#word",      0xff, 0x2d, alu16_imm),
    rule("ALUW AX,#word",      0xff, 0x2e, alu16_imm),
    rule("ALUW AX,#word",      0xff, 0x2f, alu16_imm),
    rule("ALUW AX,rp",         0xff, 0x88, alu16_rp).next(0xf9, 0x08),
    rule("ALUW AX,rp",         0xff, 0x8a, alu16_rp).next(0xf9, 0x08),
    rule("ALUW AX,rp",         0xff, 0x8f, alu16_rp).next(0xf9, 0x08),
    rule("ALUW AX,saddrp",     0xff, 0x1d, alu16_saddrp).prefixed(),
    rule("ALUW AX,saddrp",     0xff, 0x1e, alu16_saddrp).prefixed(),
    rule("ALUW AX,saddrp",     0xff, 0x1f, alu16_saddrp).prefixed(),
    rule("MULU/DIVUW",         0xff, 0x05, mulu_divuw).next(0xe8, 0x08),
    rule("INC/DEC r",          0xf0, 0xc0, inc_dec_r),
    rule("INC/DEC saddr",      0xfe, 0x26, inc_dec_saddr),
    rule("INCW/DECW rp",       0xf4, 0x44, incw_decw_rp),
    rule("shift/rotate",       0xfe, 0x30, shift),
    rule("ROR4/ROL4",          0xff, 0x05, ror4_rol4).next(0xed, 0x8c).prefixed(),
    rule("ADJBA/ADJBS",        0xfe, 0x0e, adjba_adjbs),
    rule("bitop CY,saddr.bit", 0xff, 0x08, bitop_cy_short).next(0x90, 0x00),
    rule("MOV1 saddr.bit,CY",  0xff, 0x08, mov1_short_cy).next(0xf0, 0x10),
    rule("AND1 CY,/saddr.bit", 0xff, 0x08, and1_not_short).next(0xf0, 0x30),
    rule("OR1 CY,/saddr.bit",  0xff, 0x08, or1_not_short).next(0xf0, 0x50),
    rule("NOT1 saddr.bit",     0xff, 0x08, not1_short).next(0xf0, 0x70),
    rule("SET1/CLR1 sfr.bit",  0xff, 0x08, set_clr_sfr_bit).next(0xe8, 0x88),
    rule("bitop CY,r.bit",     0xff, 0x03, bitop_cy_reg).next(0x90, 0x00),
    rule("MOV1 r.bit,CY",      0xff, 0x03, mov1_reg_cy).next(0xf0, 0x10),
    rule("AND1 CY,/r.bit",     0xff, 0x03, and1_not_reg).next(0xf0, 0x30),
    rule("OR1 CY,/r.bit",      0xff, 0x03, or1_not_reg).next(0xf0, 0x50),
    rule("NOT1 r.bit",         0xff, 0x03, not1_reg).next(0xf0, 0x70),
    rule("SET1/CLR1 r.bit",    0xff, 0x03, set_clr_reg_bit).next(0xe0, 0x80),
    rule("CLR1 CY",            0xff, 0x40, carry_op),
    rule("SET1 CY",            0xff, 0x41, carry_op),
    rule("NOT1 CY",            0xff, 0x42, carry_op),
    rule("SET1/CLR1 saddr.bit",0xe8, 0xa0, set_clr_saddr_bit),
    rule("bitop CY,PSW.bit",   0xff, 0x02, bitop_cy_psw).next(0x90, 0x00),
    rule("MOV1 PSW.bit,CY",    0xff, 0x02, mov1_psw_cy).next(0xf8, 0x10),
    rule("AND1 CY,/PSW.bit",   0xff, 0x02, and1_not_psw).next(0xf8, 0x30),
    rule("OR1 CY,/PSW.bit",    0xff, 0x02, or1_not_psw).next(0xf8, 0x50),
    rule("NOT1 PSW.bit",       0xff, 0x02, not1_psw).next(0xf8, 0x70),
    rule("SET1/CLR1 PSW.bit",  0xff, 0x02, set_clr_psw_bit).next(0xe8, 0x80),
    rule("CALL !addr16",       0xff, 0x28, call_addr16),
    rule("CALL rp",            0xff, 0x05, call_rp).next(0xf8, 0x58),
    rule("CALLF !addr11",      0xf8, 0x90, call_f),
    rule("CALLT [addr5]",      0xe0, 0xe0, call_t),
    rule("RET/RETI/BRK/RETB",  0xf6, 0x56, ret),
    rule("PUSH/POP rp",        0xf4, 0x34, push_pop_rp),
    rule("PUSH/POP PSW",       0xfe, 0x48, push_pop_psw),
    rule("PUSH sfr",           0xff, 0x29, push_sfr),
    rule("POP sfr",            0xff, 0x43, pop_sfr),
    rule("INCW/DECW SP",       0xff, 0x05, incw_decw_sp).next(0xfe, 0xc8),
    rule("BR !addr16",         0xff, 0x2c, br_addr16),
    rule("BR rp",              0xff, 0x05, br_rp).next(0xf9, 0x48),
    rule("BR $addr16",         0xff, 0x14, br_rel),
    rule("Bcc $addr16",        0xfc, 0x80, bcc),
    rule("BT saddr.bit",       0xf8, 0x70, bt_saddr),
    rule("BF/BTCLR saddr.bit", 0xff, 0x08, bf_btclr_saddr).next(0xe8, 0xa0),
    rule("BT/BF sfr.bit",      0xff, 0x08, bt_bf_sfr).next(0xe8, 0xa8),
    rule("BTCLR sfr.bit",      0xff, 0x08, btclr_sfr).next(0xf8, 0xd0),
    rule("BT/BF r.bit",        0xff, 0x03, bt_bf_reg).next(0xe0, 0xa0),
    rule("BTCLR r.bit",        0xff, 0x03, btclr_reg).next(0xf0, 0xd0),
    rule("BT PSW.bit",         0xff, 0x02, bt_psw).next(0xf8, 0xa0),
    rule("BTCLR PSW.bit",      0xff, 0x02, btclr_psw).next(0xf8, 0xd0),
    rule("DBNZ r",             0xfe, 0x32, dbnz_r),
    rule("DBNZ saddr",         0xff, 0x3b, dbnz_saddr),
];

/// Run the cascade over `w`.
pub(super) fn dispatch(w: &Window<'_>) -> Result<Built, DecodeError> {
    let mut truncated = None;

    for rule in RULES {
        if !rule.op.matches(w.op) {
            continue;
        }
        if let Some(next) = rule.next {
            match w.byte(1) {
                Ok(byte) if next.matches(byte) => {}
                Ok(_) => continue,
                Err(e) => {
                    truncated.get_or_insert(e);
                    continue;
                }
            }
        }
        if w.prefixed && rule.prefix == Prefix::Rejected {
            return Err(match rule.next {
                Some(_) => w.illegal_wide(Illegal::PrefixNotAllowed),
                None => w.illegal(Illegal::PrefixNotAllowed),
            });
        }
        log::trace!("0x{:04x}: matched {}", w.start, rule.name);
        return (rule.build)(w);
    }

    match truncated {
        Some(e) => Err(e.into()),
        None => Err(w.illegal(Illegal::NoMatch)),
    }
}

// Memory operands

/// Operand of the `0x16` (indirect), `0x06` (based) and `0x0A` (indexed)
/// families, selected by bits 4-6 of the second byte.
struct MemOperand {
    text: String,
    operands: u8,
    base: Option<Address>,
}

impl MemOperand {
    fn apply(self, built: Built) -> Built {
        let built = built.operands(self.operands);
        match self.base {
            Some(addr) => built.referenced(addr),
            None => built,
        }
    }
}

fn mem_operand(w: &Window<'_>) -> Result<MemOperand, DecodeError> {
    let mode = (w.byte(1)? >> 4) & 0x07;
    let bad_mode = || w.illegal_wide(Illegal::MemoryMode(mode));

    match w.op {
        0x16 => Ok(MemOperand {
            text: mem_indirect(mode).ok_or_else(bad_mode)?.to_string(),
            operands: 1,
            base: None,
        }),
        0x06 => {
            let base = mem_base(mode).ok_or_else(bad_mode)?;
            Ok(MemOperand {
                text: format!("[{}+0x{:02x}]", base, w.byte(2)?),
                operands: 2,
                base: None,
            })
        }
        _ => {
            let index = mem_indexed(mode).ok_or_else(bad_mode)?;
            let word = w.word(2)?;
            if word & 1 != 0 {
                return Err(w.illegal_wide(Illegal::MisalignedPointer(word)));
            }
            Ok(MemOperand {
                text: format!("{{0}}[{}]", index),
                operands: 3,
                base: Some(word),
            })
        }
    }
}

fn short_mem(w: &Window<'_>) -> Result<&'static str, DecodeError> {
    mem_indirect(w.op).ok_or_else(|| w.illegal(Illegal::MemoryMode(w.op & 0x07)))
}

// 8-bit transfers

fn nop(_: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("nop"))
}

fn mov_stbc(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV STBC, #{:02x}", w.byte(3)?)).operands(3))
}

fn sel_rb(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("SEL RB{}", w.byte(1)? & 0x03)).operands(1))
}

fn di_ei(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(["DI", "EI"][(w.op & 0x01) as usize]))
}

fn mov_r_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV {}, #{:02x}", reg(w.op), w.byte(1)?)).operands(1))
}

fn mov_saddr_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV {{0}}, #{:02x}", w.byte(2)?))
        .referenced(saddr(w.byte(1)?))
        .operands(2))
}

fn mov_sfr_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV {{0}}, #{:02x}", w.byte(2)?))
        .referenced(sfr(w.byte(1)?))
        .operands(2))
}

fn mov_r_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("MOV {}, {}", reg(b >> 4), reg(b))).operands(1))
}

fn mov_a_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV A, {}", reg(w.op))))
}

fn mov_a_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOV A, {0}").referenced(saddr(w.byte(1)?)).operands(1))
}

fn mov_saddr_a(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOV {0}, A").referenced(saddr(w.byte(1)?)).operands(1))
}

fn mov_a_sfr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOV A, {0}").referenced(sfr(w.byte(1)?)).operands(1))
}

fn mov_sfr_a(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOV {0}, A").referenced(sfr(w.byte(1)?)).operands(1))
}

fn mov_saddr_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOV {0}, {1}")
        .referenced(saddr(w.byte(1)?))
        .referenced(saddr(w.byte(2)?))
        .operands(2))
}

fn mov_a_mem_short(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV A, {}{}", w.amp(), short_mem(w)?)))
}

fn mov_a_mem(w: &Window<'_>) -> Result<Built, DecodeError> {
    let mem = mem_operand(w)?;
    let text = format!("MOV A, {}{}", w.amp(), mem.text);
    Ok(mem.apply(Built::new(text)))
}

fn mov_mem_a_short(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV {}{}, A", w.amp(), short_mem(w)?)))
}

fn mov_mem_a(w: &Window<'_>) -> Result<Built, DecodeError> {
    let mem = mem_operand(w)?;
    let text = format!("MOV {}{}, A", w.amp(), mem.text);
    Ok(mem.apply(Built::new(text)))
}

fn mov_a_addr16(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV A, {}!{{0}}", w.amp()))
        .referenced(w.word(2)?)
        .wide_opcode()
        .operands(2))
}

fn mov_addr16_a(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV {}!{{0}}, A", w.amp()))
        .referenced(w.word(2)?)
        .wide_opcode()
        .operands(2))
}

fn xch_r_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("XCH {}, {}", reg(b >> 4), reg(b))).operands(1))
}

fn xch_a_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("XCH A, {}", reg(w.op))))
}

fn xch_a_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("XCH A, {0}")
        .referenced(w.saddr_or_sfr(w.byte(1)?))
        .operands(1))
}

fn xch_saddr_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("XCH {0}, {1}")
        .referenced(saddr(w.byte(1)?))
        .referenced(saddr(w.byte(2)?))
        .operands(2))
}

fn xch_a_mem(w: &Window<'_>) -> Result<Built, DecodeError> {
    let mem = mem_operand(w)?;
    let text = format!("XCH A, {}{}", w.amp(), mem.text);
    Ok(mem.apply(Built::new(text)))
}

// 16-bit transfers

fn movw_rp_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOVW {}, #{:04x}", reg_pair(w.op), w.word(1)?)).operands(2))
}

fn movw_saddrp_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOVW {{0}}, #{:04x}", w.word(2)?))
        .referenced(saddr(w.byte(1)?))
        .operands(3))
}

fn movw_sfrp_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    let low = w.byte(1)?;
    let word = w.word(2)?;
    let built = if low == 0xfc {
        Built::new(format!("MOVW SP, #{:04x}", word))
    } else {
        Built::new(format!("MOVW {{0}}, #{:04x}", word)).referenced(sfr(low))
    };
    Ok(built.operands(3))
}

fn movw_rp_rp(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("MOVW {}, {}", reg_pair(b >> 4), reg_pair(b))).operands(1))
}

fn movw_ax_saddrp(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOVW AX, {0}").referenced(saddr(w.byte(1)?)).operands(1))
}

fn movw_saddrp_ax(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("MOVW {0}, AX").referenced(saddr(w.byte(1)?)).operands(1))
}

fn movw_sfrp(w: &Window<'_>) -> Result<Built, DecodeError> {
    let low = w.byte(1)?;
    let store = w.op & 0x02 != 0;
    let built = match (low == 0xfc, store) {
        (true, false) => Built::new("MOVW AX, SP"),
        (true, true) => Built::new("MOVW SP, AX"),
        (false, false) => Built::new("MOVW AX, {0}").referenced(sfr(low)),
        (false, true) => Built::new("MOVW {0}, AX").referenced(sfr(low)),
    };
    Ok(built.operands(1))
}

fn movw_ax_mem1(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOVW AX, {}{}", w.amp(), mem1(w.byte(1)?))).operands(1))
}

fn movw_mem1_ax(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOVW {}{}, AX", w.amp(), mem1(w.byte(1)?))).operands(1))
}

// Arithmetic and logic

fn alu_a_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} A, #{:02x}", alu8(w.op), w.byte(1)?)).operands(1))
}

fn alu_saddr_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} {{0}}, #{:02x}", alu8(w.op), w.byte(2)?))
        .referenced(w.saddr_or_sfr(w.byte(1)?))
        .operands(2))
}

fn alu_r_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("{} {}, {}", alu8(w.op), reg(b >> 4), reg(b))).operands(1))
}

fn alu_a_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} A, {{0}}", alu8(w.op)))
        .referenced(w.saddr_or_sfr(w.byte(1)?))
        .operands(1))
}

fn alu_saddr_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} {{0}}, {{1}}", alu8(w.op)))
        .referenced(saddr(w.byte(1)?))
        .referenced(saddr(w.byte(2)?))
        .operands(2))
}

fn alu_a_mem(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = alu8(w.byte(1)?);
    let mem = mem_operand(w)?;
    let text = format!("{} A, {}{}", op, w.amp(), mem.text);
    Ok(mem.apply(Built::new(text)))
}

fn alu16_imm(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} AX, #{:04x}", alu16(w.op), w.word(1)?)).operands(2))
}

fn alu16_rp(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} AX, {}", alu16(w.op), reg_pair(w.byte(1)?))).operands(1))
}

fn alu16_saddrp(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("{} AX, {{0}}", alu16(w.op)))
        .referenced(w.saddr_or_sfr(w.byte(1)?))
        .operands(1))
}

fn mulu_divuw(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["MULU", "DIVUW"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {}", op, reg(b))).operands(1))
}

fn inc_dec_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = ["INC", "DEC"][((w.op >> 3) & 0x01) as usize];
    Ok(Built::new(format!("{} {}", op, reg(w.op))))
}

fn inc_dec_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = ["INC", "DEC"][(w.op & 0x01) as usize];
    Ok(Built::new(format!("{} {{0}}", op))
        .referenced(saddr(w.byte(1)?))
        .operands(1))
}

fn incw_decw_rp(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = ["INCW", "DECW"][((w.op >> 3) & 0x01) as usize];
    Ok(Built::new(format!("{} {}", op, reg_pair(w.op << 1))))
}

fn shift(w: &Window<'_>) -> Result<Built, DecodeError> {
    const OPS: [&str; 8] = ["RORC", "ROR", "SHR", "SHRW", "ROLC", "ROL", "SHL", "SHLW"];
    let b = w.byte(1)?;
    let op = OPS[(((b >> 6) & 0x03) + ((w.op & 0x01) << 2)) as usize];
    Ok(Built::new(format!("{} {}, {}", op, reg(b), (b >> 3) & 0x07)).operands(1))
}

fn ror4_rol4(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["ROR4", "ROL4"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {}{}", op, w.amp(), mem1(b >> 1))).operands(1))
}

fn adjba_adjbs(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(["ADJBA", "ADJBS"][(w.op & 0x01) as usize]))
}

// Bit manipulation

const BIT_OPS: [&str; 4] = ["MOV1", "AND1", "OR1", "XOR1"];

/// Bit number and saddr/sfr address of an `0x08`-family bit operand.
fn short_bit(w: &Window<'_>) -> Result<(u8, Address), DecodeError> {
    let b = w.byte(1)?;
    let low = w.byte(2)?;
    let addr = if b & 0x08 == 0 { saddr(low) } else { sfr(low) };
    Ok((b & 0x07, addr))
}

fn bitop_cy_short(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = BIT_OPS[((w.byte(1)? >> 5) & 0x03) as usize];
    let (bit, addr) = short_bit(w)?;
    Ok(Built::new(format!("{} CY, {{0}}.{}", op, bit)).referenced(addr).operands(2))
}

fn mov1_short_cy(w: &Window<'_>) -> Result<Built, DecodeError> {
    let (bit, addr) = short_bit(w)?;
    Ok(Built::new(format!("MOV1 {{0}}.{}, CY", bit)).referenced(addr).operands(2))
}

fn and1_not_short(w: &Window<'_>) -> Result<Built, DecodeError> {
    let (bit, addr) = short_bit(w)?;
    Ok(Built::new(format!("AND1 CY, /{{0}}.{}", bit)).referenced(addr).operands(2))
}

fn or1_not_short(w: &Window<'_>) -> Result<Built, DecodeError> {
    let (bit, addr) = short_bit(w)?;
    Ok(Built::new(format!("OR1 CY, /{{0}}.{}", bit)).referenced(addr).operands(2))
}

fn not1_short(w: &Window<'_>) -> Result<Built, DecodeError> {
    let (bit, addr) = short_bit(w)?;
    Ok(Built::new(format!("NOT1 {{0}}.{}", bit)).referenced(addr).operands(2))
}

fn set_clr_sfr_bit(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["SET1", "CLR1"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {{0}}.{}", op, b & 0x07))
        .referenced(sfr(w.byte(2)?))
        .operands(2))
}

fn bitop_cy_reg(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = BIT_OPS[((b >> 5) & 0x03) as usize];
    Ok(Built::new(format!("{} CY, {}.{}", op, bit_reg(b), b & 0x07)).operands(1))
}

fn mov1_reg_cy(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("MOV1 {}.{}, CY", bit_reg(b), b & 0x07)).operands(1))
}

fn and1_not_reg(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("AND1 CY, /{}.{}", bit_reg(b), b & 0x07)).operands(1))
}

fn or1_not_reg(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("OR1 CY, /{}.{}", bit_reg(b), b & 0x07)).operands(1))
}

fn not1_reg(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("NOT1 {}.{}", bit_reg(b), b & 0x07)).operands(1))
}

fn set_clr_reg_bit(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["SET1", "CLR1"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {}.{}", op, bit_reg(b), b & 0x07)).operands(1))
}

fn carry_op(w: &Window<'_>) -> Result<Built, DecodeError> {
    let text = match w.op {
        0x40 => "CLR1 CY",
        0x41 => "SET1 CY",
        _ => "NOT1 CY",
    };
    Ok(Built::new(text))
}

fn set_clr_saddr_bit(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = ["SET1", "CLR1"][((w.op >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {{0}}.{}", op, w.op & 0x07))
        .referenced(saddr(w.byte(1)?))
        .operands(1))
}

fn bitop_cy_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = BIT_OPS[((b >> 5) & 0x03) as usize];
    Ok(Built::new(format!("{} CY, PSW.{}", op, b & 0x07)).operands(1))
}

fn mov1_psw_cy(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("MOV1 PSW.{}, CY", w.byte(1)? & 0x07)).operands(1))
}

fn and1_not_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("AND1 CY, /PSW.{}", w.byte(1)? & 0x07)).operands(1))
}

fn or1_not_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("OR1 CY, /PSW.{}", w.byte(1)? & 0x07)).operands(1))
}

fn not1_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("NOT1 PSW.{}", w.byte(1)? & 0x07)).operands(1))
}

fn set_clr_psw_bit(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["SET1", "CLR1"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} PSW.{}", op, b & 0x07)).operands(1))
}

// Calls, returns and stack

fn call_addr16(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("CALL !{0}")
        .target(w.word(1)?)
        .flow(FlowType::SubroutineCall)
        .operands(2))
}

fn call_rp(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("CALL {}", reg_pair(w.byte(1)?)))
        .flow(FlowType::IndirectSubroutineCall)
        .operands(1))
}

fn call_f(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("CALLF !{0}")
        .target(callf(w.op, w.byte(1)?))
        .flow(FlowType::SubroutineCall)
        .operands(1))
}

/// The destination is the pointer stored in the table slot, not the slot.
fn call_t(w: &Window<'_>) -> Result<Built, DecodeError> {
    let index = (w.op & 0x1f) as Address;
    let slot = w.callt_base.wrapping_add(index * 2);
    let target = w.rom.read_word(slot)?;
    Ok(Built::new("CALLT [{0}]:{1}")
        .referenced(slot)
        .target(target)
        .flow(FlowType::SubroutineCall))
}

fn ret(w: &Window<'_>) -> Result<Built, DecodeError> {
    let index = (((w.op & 0x08) >> 2) + (w.op & 0x01)) as usize;
    let flow = if w.op == 0x5e {
        FlowType::Stop
    } else {
        FlowType::SubroutineReturn
    };
    Ok(Built::new(["RET", "RETI", "BRK", "RETB"][index]).flow(flow))
}

fn push_pop_rp(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = ["POP", "PUSH"][((w.op >> 3) & 0x01) as usize];
    Ok(Built::new(format!("{} {}", op, reg_pair(w.op << 1))))
}

fn push_pop_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(["POP PSW", "PUSH PSW"][(w.op & 0x01) as usize]))
}

fn push_sfr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("PUSH {0}").referenced(sfr(w.byte(1)?)).operands(1))
}

fn pop_sfr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("POP {0}").referenced(sfr(w.byte(1)?)).operands(1))
}

fn incw_decw_sp(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(["INCW SP", "DECW SP"][(w.byte(1)? & 0x01) as usize]).operands(1))
}

// Branches

fn br_addr16(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("BR !{0}")
        .target(w.word(1)?)
        .flow(FlowType::UnconditionalJump)
        .operands(2))
}

fn br_rp(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("BR {}", reg_pair(w.byte(1)?)))
        .flow(FlowType::IndirectUnconditionalJump)
        .operands(1))
}

fn br_rel(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("BR ${0}")
        .target(w.relative(2, 1)?)
        .flow(FlowType::UnconditionalJump)
        .operands(1))
}

fn bcc(w: &Window<'_>) -> Result<Built, DecodeError> {
    let op = ["BNZ", "BZ", "BNC", "BC"][(w.op & 0x03) as usize];
    Ok(Built::new(format!("{} ${{0}}", op))
        .target(w.relative(2, 1)?)
        .flow(FlowType::ConditionalJump)
        .operands(1))
}

fn bt_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("BT {{0}}.{}, ${{1}}", w.op & 0x07))
        .referenced(saddr(w.byte(1)?))
        .target(w.relative(3, 2)?)
        .flow(FlowType::ConditionalJump)
        .operands(2))
}

fn bf_btclr_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["BF", "BTCLR"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {{0}}.{}, ${{1}}", op, b & 0x07))
        .referenced(saddr(w.byte(2)?))
        .target(w.relative(4, 3)?)
        .flow(FlowType::ConditionalJump)
        .operands(3))
}

fn bt_bf_sfr(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["BF", "BT"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {{0}}.{}, ${{1}}", op, b & 0x07))
        .referenced(sfr(w.byte(2)?))
        .target(w.relative(4, 3)?)
        .flow(FlowType::ConditionalJump)
        .operands(3))
}

fn btclr_sfr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("BTCLR {{0}}.{}, ${{1}}", w.byte(1)? & 0x07))
        .referenced(sfr(w.byte(2)?))
        .target(w.relative(4, 3)?)
        .flow(FlowType::ConditionalJump)
        .operands(3))
}

fn bt_bf_reg(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    let op = ["BF", "BT"][((b >> 4) & 0x01) as usize];
    Ok(Built::new(format!("{} {}.{}, ${{0}}", op, bit_reg(b), b & 0x07))
        .target(w.relative(3, 2)?)
        .flow(FlowType::ConditionalJump)
        .operands(2))
}

fn btclr_reg(w: &Window<'_>) -> Result<Built, DecodeError> {
    let b = w.byte(1)?;
    Ok(Built::new(format!("BTCLR {}.{}, ${{0}}", bit_reg(b), b & 0x07))
        .target(w.relative(3, 2)?)
        .flow(FlowType::ConditionalJump)
        .operands(2))
}

fn bt_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("BT PSW.{}, ${{0}}", w.byte(1)? & 0x07))
        .target(w.relative(3, 2)?)
        .flow(FlowType::ConditionalJump)
        .operands(2))
}

fn btclr_psw(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new(format!("BTCLR PSW.{}, ${{0}}", w.byte(1)? & 0x07))
        .target(w.relative(3, 2)?)
        .flow(FlowType::ConditionalJump)
        .operands(2))
}

fn dbnz_r(w: &Window<'_>) -> Result<Built, DecodeError> {
    let r = ["C", "B"][(w.op & 0x01) as usize];
    Ok(Built::new(format!("DBNZ {}, ${{0}}", r))
        .target(w.relative(2, 1)?)
        .flow(FlowType::ConditionalJump)
        .operands(1))
}

fn dbnz_saddr(w: &Window<'_>) -> Result<Built, DecodeError> {
    Ok(Built::new("DBNZ {0}, ${1}")
        .referenced(saddr(w.byte(1)?))
        .target(w.relative(3, 2)?)
        .flow(FlowType::ConditionalJump)
        .operands(2))
}
