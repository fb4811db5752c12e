//! Worklist-driven control-flow tracer.
//!
//! Tracing starts from the hardware vectors, the CALLT table slots and any
//! explicit entry points, and follows every statically known successor of
//! every decoded instruction. Each address is handed to the decoder at most
//! once. Flags from every path that reaches an address accumulate; a failure
//! on one path ends that path only.

mod worklist;

use std::fmt;

use serde::Serialize;

use self::worklist::{Pending, Worklist};
use crate::config::TraceConfig;
use crate::decoder::DecodeError;
use crate::memory::{DecodeConflict, Memory, OutOfRange, Rom};
use crate::{Address, Decoder, FlowType, Instruction};

/// How an address was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reach {
    /// A vector, or an explicit entry point
    Entry,
    /// A subroutine call or a CALLT table slot
    Call,
    /// A jump or branch
    Jump,
    /// Execution falling through from the previous instruction
    Fallthrough,
}

impl Reach {
    fn mark(self, memory: &mut Memory, addr: Address) {
        match self {
            Reach::Entry => memory.mark_entry_point(addr),
            Reach::Call => memory.mark_call_target(addr),
            Reach::Jump => memory.mark_jump_target(addr),
            Reach::Fallthrough => {}
        }
    }
}

impl fmt::Display for Reach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reach::Entry => "entry",
            Reach::Call => "call",
            Reach::Jump => "jump",
            Reach::Fallthrough => "fallthrough",
        };
        f.write_str(name)
    }
}

/// An address the decoder rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub addr: Address,
    pub error: DecodeError,
}

/// A vector or CALLT slot whose pointer lies outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadVector {
    pub slot: Address,
    pub error: OutOfRange,
}

/// A successor that was not followed because it lies outside the traceable
/// range (or past the top of the address space).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Untraceable {
    /// Instruction or vector slot the successor came from; `None` for
    /// configured entry points
    pub from: Option<Address>,
    /// The skipped address
    pub addr: Address,
    pub reach: Reach,
}

/// Everything that went wrong on individual paths, in worklist order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceReport {
    /// Addresses the decoder rejected
    pub failures: Vec<DecodeFailure>,
    /// Decodes that overlapped an instruction already in place
    pub conflicts: Vec<DecodeConflict>,
    /// `BR rp` / `CALL rp` sites whose destination is unknown
    pub indirect: Vec<Address>,
    /// Vector slots that could not be read
    pub bad_vectors: Vec<BadVector>,
    /// Successors outside the traceable range
    pub untraceable: Vec<Untraceable>,
}

impl TraceReport {
    /// Whether tracing met no problems at all.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
            && self.conflicts.is_empty()
            && self.indirect.is_empty()
            && self.bad_vectors.is_empty()
            && self.untraceable.is_empty()
    }
}

/// Result of a trace: the populated classification map and the report.
#[derive(Debug)]
pub struct Trace {
    pub memory: Memory,
    pub report: TraceReport,
}

/// Control-flow tracer over one decoder and configuration.
pub struct Tracer<'a, D: Decoder + ?Sized> {
    decoder: &'a D,
    config: &'a TraceConfig,
}

impl<'a, D: Decoder + ?Sized> Tracer<'a, D> {
    pub fn new(decoder: &'a D, config: &'a TraceConfig) -> Self {
        Self { decoder, config }
    }

    /// Trace `rom` from every configured seed until the worklist is empty.
    pub fn trace(&self, rom: Rom) -> Trace {
        log::debug!("Starting trace of {} bytes", rom.len());

        let mut run = Run {
            config: self.config,
            memory: Memory::new(rom),
            report: TraceReport::default(),
            work: Worklist::new(),
        };

        run.seed();

        while let Some(Pending { addr, reach }) = run.work.pop() {
            reach.mark(&mut run.memory, addr);
            if !run.work.visit(addr) {
                continue;
            }

            match self.decoder.decode(run.memory.rom(), addr) {
                Ok(insn) => run.place(insn),
                Err(error) => {
                    log::warn!("0x{:04x} ({}): {}", addr, reach, error);
                    run.report.failures.push(DecodeFailure { addr, error });
                }
            }
        }

        log::debug!(
            "Trace complete: {} addresses visited, {} instructions, {} failures, {} conflicts",
            run.work.visited(),
            run.memory.instruction_count(),
            run.report.failures.len(),
            run.report.conflicts.len()
        );

        Trace { memory: run.memory, report: run.report }
    }
}

/// Mutable state of one trace.
struct Run<'a> {
    config: &'a TraceConfig,
    memory: Memory,
    report: TraceReport,
    work: Worklist,
}

impl Run<'_> {
    fn seed(&mut self) {
        let config = self.config;
        for &slot in &config.vectors {
            self.seed_vector(slot, Reach::Entry);
        }
        for &slot in &config.callt_vectors {
            self.seed_vector(slot, Reach::Call);
        }
        for &addr in &config.entry_points {
            log::debug!("Entry point 0x{:04x}", addr);
            self.enqueue(None, addr, Reach::Entry);
        }
    }

    /// Dereference a vector slot and queue the handler it points to.
    fn seed_vector(&mut self, slot: Address, reach: Reach) {
        match self.memory.rom().read_word(slot) {
            Ok(handler) => {
                log::debug!("Vector 0x{:04x} -> 0x{:04x}", slot, handler);
                self.memory.mark_vector(slot);
                self.enqueue(Some(slot), handler, reach);
            }
            Err(error) => {
                log::warn!("Vector 0x{:04x}: {}", slot, error);
                self.report.bad_vectors.push(BadVector { slot, error });
            }
        }
    }

    fn enqueue(&mut self, from: Option<Address>, addr: Address, reach: Reach) {
        if self.config.traceable.contains(addr) {
            self.work.push(addr, reach);
        } else {
            log::debug!("Skipping {} to 0x{:04x}: outside the traceable range", reach, addr);
            self.report.untraceable.push(Untraceable { from, addr, reach });
        }
    }

    fn fallthrough(&mut self, insn: &Instruction) {
        match insn.addr.checked_add(insn.size as Address) {
            Some(next) => self.enqueue(Some(insn.addr), next, Reach::Fallthrough),
            None => self.report.untraceable.push(Untraceable {
                from: Some(insn.addr),
                addr: insn.next_address(),
                reach: Reach::Fallthrough,
            }),
        }
    }

    fn target(&mut self, insn: &Instruction, reach: Reach) {
        if let Some(target) = insn.target_address() {
            self.enqueue(Some(insn.addr), target, reach);
        }
    }

    fn unresolved(&mut self, insn: &Instruction) {
        log::warn!("0x{:04x}: unresolved indirect {}", insn.addr, insn);
        self.memory.mark_unresolved_indirect(insn.addr);
        self.report.indirect.push(insn.addr);
    }

    /// Record a decoded instruction and queue its successors.
    fn place(&mut self, insn: Instruction) {
        log::trace!("0x{:04x}: {}", insn.addr, insn);

        if let Err(conflict) = self.memory.place(insn.clone()) {
            log::warn!("{}", conflict);
            self.report.conflicts.push(conflict);
            return;
        }

        match insn.flow {
            FlowType::Continue => self.fallthrough(&insn),
            FlowType::Stop | FlowType::SubroutineReturn => {}
            FlowType::UnconditionalJump => self.target(&insn, Reach::Jump),
            FlowType::ConditionalJump => {
                self.target(&insn, Reach::Jump);
                self.fallthrough(&insn);
            }
            FlowType::SubroutineCall => {
                self.target(&insn, Reach::Call);
                self.fallthrough(&insn);
            }
            FlowType::IndirectUnconditionalJump => self.unresolved(&insn),
            FlowType::IndirectSubroutineCall => {
                self.unresolved(&insn);
                self.fallthrough(&insn);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceRange;
    use crate::decoder::{Illegal, Upd78k2Decoder};

    /// Only the reset vector, no CALLT slots.
    fn reset_only() -> TraceConfig {
        TraceConfig {
            vectors: vec![0x0000],
            callt_vectors: Vec::new(),
            ..TraceConfig::default()
        }
    }

    fn image(len: usize, code: &[(Address, &[u8])]) -> Rom {
        let mut bytes = vec![0u8; len];
        for &(at, chunk) in code {
            let at = at as usize;
            bytes[at..at + chunk.len()].copy_from_slice(chunk);
        }
        Rom::new(bytes)
    }

    fn trace(rom: Rom, config: &TraceConfig) -> Trace {
        let decoder = Upd78k2Decoder::with_callt_base(config.callt_base);
        Tracer::new(&decoder, config).trace(rom)
    }

    #[test]
    fn test_reset_vector_is_dereferenced() {
        let rom = image(0x3201, &[(0x0000, &[0x00, 0x32]), (0x3200, &[0x56])]);
        let t = trace(rom, &reset_only());

        assert!(t.memory.is_instruction_start(0x3200));
        assert!(t.memory.is_entry_point(0x3200));
        assert!(t.memory.is_vector(0x0000));
        assert!(!t.memory.is_instruction_start(0x0000));
        assert!(t.report.is_empty());
    }

    #[test]
    fn test_successors_by_flow_type() {
        let rom = image(
            0x200,
            &[
                (0x0000, &[0x00, 0x01]),
                // CALL !0150 ; BZ $0110 ; BR !0180 ; NOP
                (0x0100, &[0x28, 0x50, 0x01, 0x81, 0x0b, 0x2c, 0x80, 0x01, 0x00]),
                (0x0110, &[0x56]),
                (0x0150, &[0x56]),
                (0x0180, &[0x5e]),
            ],
        );
        let t = trace(rom, &reset_only());
        let m = &t.memory;

        assert!(m.is_entry_point(0x0100));
        assert!(m.is_call_target(0x0150));
        assert!(m.is_instruction_start(0x0103));
        assert!(m.is_jump_target(0x0110));
        assert!(m.is_instruction_start(0x0110));
        assert!(m.is_jump_target(0x0180));
        assert!(m.is_instruction_start(0x0180));
        // BR is unconditional, so nothing falls through to 0x0108.
        assert!(!m.is_instruction_start(0x0108));
        assert_eq!(m.instruction_count(), 6);
        assert!(t.report.is_empty());
    }

    #[test]
    fn test_conditional_branch_follows_both_paths() {
        let rom = image(
            0x120,
            &[
                (0x0000, &[0x10, 0x01]),
                // BNZ $0114 ; RET ; ... ; RETI
                (0x0110, &[0x80, 0x02, 0x56, 0x00, 0x57]),
            ],
        );
        let t = trace(rom, &reset_only());

        assert!(t.memory.is_instruction_start(0x0112));
        assert!(t.memory.is_instruction_start(0x0114));
        assert!(t.memory.is_jump_target(0x0114));
        assert!(!t.memory.is_instruction_start(0x0113));
    }

    #[test]
    fn test_flags_accumulate() {
        let mut config = reset_only();
        config.entry_points = vec![0x0150];
        let rom = image(
            0x200,
            &[(0x0000, &[0x00, 0x01]), (0x0100, &[0x28, 0x50, 0x01, 0x56]), (0x0150, &[0x56])],
        );
        let t = trace(rom, &config);

        assert!(t.memory.is_call_target(0x0150));
        assert!(t.memory.is_entry_point(0x0150));
        assert_eq!(t.memory.instruction_count(), 3);
    }

    #[test]
    fn test_decode_failure_stops_only_that_path() {
        let mut config = reset_only();
        config.entry_points = vec![0x0180];
        let rom = image(0x200, &[(0x0000, &[0x00, 0x01]), (0x0100, &[0x04]), (0x0180, &[0x56])]);
        let t = trace(rom, &config);

        assert!(!t.memory.is_instruction_start(0x0100));
        assert!(t.memory.is_entry_point(0x0100));
        assert!(t.memory.is_instruction_start(0x0180));
        assert_eq!(t.report.failures.len(), 1);
        assert!(matches!(
            t.report.failures[0].error,
            DecodeError::IllegalOpcode { reason: Illegal::NoMatch, .. }
        ));
    }

    #[test]
    fn test_indirect_exits_are_flagged() {
        let rom = image(
            0x200,
            &[
                (0x0000, &[0x00, 0x01]),
                // CALL AX ; BR HL
                (0x0100, &[0x05, 0x58, 0x05, 0x4e]),
            ],
        );
        let t = trace(rom, &reset_only());

        assert!(t.memory.is_unresolved_indirect(0x0100));
        assert!(t.memory.is_instruction_start(0x0102));
        assert!(t.memory.is_unresolved_indirect(0x0102));
        assert_eq!(t.report.indirect, vec![0x0100, 0x0102]);
        assert!(!t.memory.is_instruction_start(0x0104));
    }

    #[test]
    fn test_conflicting_decode_keeps_first() {
        let rom = image(
            0x200,
            &[
                (0x0000, &[0x00, 0x01]),
                // MOV A, #00 ; BR $0101 (into the middle of the MOV)
                (0x0100, &[0xb9, 0x00, 0x14, 0xfd]),
            ],
        );
        let t = trace(rom, &reset_only());

        assert!(t.memory.is_instruction_start(0x0100));
        assert!(t.memory.is_jump_target(0x0101));
        assert!(!t.memory.is_instruction_start(0x0101));
        assert_eq!(t.report.conflicts.len(), 1);
        assert_eq!(t.report.conflicts[0].addr, 0x0101);
        assert_eq!(t.report.conflicts[0].existing_addr, 0x0100);
    }

    #[test]
    fn test_bad_vector_and_untraceable_targets() {
        let config = TraceConfig {
            vectors: vec![0x0000, 0x0100],
            callt_vectors: Vec::new(),
            traceable: TraceRange { start: 0x0000, end: 0x00ff },
            ..TraceConfig::default()
        };
        // Reset vector points past the traceable range.
        let rom = image(0x40, &[(0x0000, &[0x00, 0x30])]);
        let t = trace(rom, &config);

        assert_eq!(t.report.bad_vectors.len(), 1);
        assert_eq!(t.report.bad_vectors[0].slot, 0x0100);
        assert_eq!(
            t.report.untraceable,
            vec![Untraceable { from: Some(0x0000), addr: 0x3000, reach: Reach::Entry }]
        );
        assert_eq!(t.memory.instruction_count(), 0);
    }

    #[test]
    fn test_callt_slots_seed_calls() {
        let config = TraceConfig {
            vectors: Vec::new(),
            callt_vectors: vec![0x0042],
            ..TraceConfig::default()
        };
        let rom = image(0x200, &[(0x0042, &[0x00, 0x01]), (0x0100, &[0x56])]);
        let t = trace(rom, &config);

        assert!(t.memory.is_vector(0x0042));
        assert!(t.memory.is_call_target(0x0100));
        assert!(t.memory.is_instruction_start(0x0100));
    }

    #[test]
    fn test_trace_terminates_on_loops() {
        // BR $0100 ; and a DBNZ loop reached from a second entry point
        let mut config = reset_only();
        config.entry_points = vec![0x0180];
        let rom = image(
            0x200,
            &[
                (0x0000, &[0x00, 0x01]),
                (0x0100, &[0x14, 0xfe]),
                (0x0180, &[0x00, 0x33, 0xfd, 0x56]),
            ],
        );
        let t = trace(rom, &config);

        assert!(t.memory.is_instruction_start(0x0100));
        assert!(t.memory.is_jump_target(0x0100));
        assert!(t.memory.is_jump_target(0x0180));
        assert!(t.memory.is_instruction_start(0x0183));
        assert_eq!(t.memory.instruction_count(), 4);
        assert!(t.report.is_empty());
    }

    #[test]
    fn test_trace_is_deterministic() {
        let rom = Rom::new((0..0x1000u32).map(|i| (i * 91 + 7) as u8).collect::<Vec<_>>());
        let config = TraceConfig { entry_points: vec![0x0200, 0x0400], ..TraceConfig::default() };

        let a = trace(rom.clone(), &config);
        let b = trace(rom, &config);

        assert_eq!(a.report, b.report);
        assert_eq!(
            a.memory.instructions().collect::<Vec<_>>(),
            b.memory.instructions().collect::<Vec<_>>()
        );
        for addr in 0..=0xffffu16 {
            assert_eq!(a.memory.classification(addr), b.memory.classification(addr));
        }
    }
}
