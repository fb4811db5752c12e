//! Pending-address queue with a visited set.

use std::collections::{HashSet, VecDeque};

use super::Reach;
use crate::Address;

/// An address waiting to be decoded, tagged with how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pending {
    pub addr: Address,
    pub reach: Reach,
}

/// FIFO of pending addresses.
///
/// The same address may be queued once per [`Reach`] so that every way of
/// reaching it gets recorded, but [`Worklist::visit`] admits it for decoding
/// only once. Both sets are bounded by the 64K address space, which bounds
/// the whole trace.
#[derive(Debug, Default)]
pub(crate) struct Worklist {
    queue: VecDeque<Pending>,
    queued: HashSet<(Address, Reach)>,
    visited: HashSet<Address>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `addr`. Returns false when it was already queued with the same reach.
    pub fn push(&mut self, addr: Address, reach: Reach) -> bool {
        if !self.queued.insert((addr, reach)) {
            return false;
        }
        self.queue.push_back(Pending { addr, reach });
        true
    }

    pub fn pop(&mut self) -> Option<Pending> {
        self.queue.pop_front()
    }

    /// Claim `addr` for decoding. Returns false if it was already claimed.
    pub fn visit(&mut self, addr: Address) -> bool {
        self.visited.insert(addr)
    }

    /// Number of distinct addresses handed to the decoder.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut work = Worklist::new();
        work.push(0x10, Reach::Entry);
        work.push(0x20, Reach::Jump);

        assert_eq!(work.pop(), Some(Pending { addr: 0x10, reach: Reach::Entry }));
        assert_eq!(work.pop(), Some(Pending { addr: 0x20, reach: Reach::Jump }));
        assert!(work.pop().is_none());
    }

    #[test]
    fn test_duplicate_pushes_are_dropped_per_reach() {
        let mut work = Worklist::new();

        assert!(work.push(0x10, Reach::Call));
        assert!(!work.push(0x10, Reach::Call));
        assert!(work.push(0x10, Reach::Jump));
    }

    #[test]
    fn test_visit_once() {
        let mut work = Worklist::new();

        assert!(work.visit(0x10));
        assert!(!work.visit(0x10));
        assert_eq!(work.visited(), 1);
    }
}
