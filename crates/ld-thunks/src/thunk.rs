//! Thunks: deduplicated trampoline runs serving one address-range group.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt;

use crate::atom::{Atom, AtomIndex};
use crate::error::LayoutError;
use crate::reach;
use crate::session::{LinkSession, ThunkIndex};
use crate::symbol::{SectionId, Symbol, SymbolWithLoc};

/// Byte size of one trampoline: three instructions (adrp/add/br).
pub const TRAMPOLINE_SIZE: u64 = 12;

/// Trampoline alignment as a power-of-two exponent (word aligned).
pub const TRAMPOLINE_ALIGN: u32 = 2;

/// A branch target as seen from a trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThunkTarget {
    /// An external symbol reached through its stub-table entry.
    Stub(SymbolWithLoc),
    /// A symbol resolving to an atom in this link.
    Atom(SymbolWithLoc),
}

impl ThunkTarget {
    /// Tag a raw branch target by how it must be reached.
    pub fn classify(session: &LinkSession, target: SymbolWithLoc) -> Self {
        if session.stub_address(target).is_some() {
            ThunkTarget::Stub(target)
        } else {
            ThunkTarget::Atom(target)
        }
    }

    /// The symbol being jumped to.
    pub fn symbol(&self) -> SymbolWithLoc {
        match self {
            ThunkTarget::Stub(loc) | ThunkTarget::Atom(loc) => *loc,
        }
    }
}

impl fmt::Display for ThunkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThunkTarget::Stub(loc) => write!(f, "stub({})", loc),
            ThunkTarget::Atom(loc) => write!(f, "atom({})", loc),
        }
    }
}

/// A contiguous run of trampoline atoms serving one group.
///
/// Each distinct target maps to exactly one trampoline; a thunk with zero
/// targets owns no atoms and occupies zero bytes.
#[derive(Debug, Default)]
pub struct Thunk {
    /// First trampoline atom of the run, once the run is non-empty.
    start_index: Option<AtomIndex>,
    /// Number of trampoline atoms in the run.
    len: u32,
    /// Targets in discovery order; position i is served by trampoline i.
    targets: Vec<ThunkTarget>,
    /// Dedup table: target -> position in the run.
    lookup: BTreeMap<ThunkTarget, u32>,
}

impl Thunk {
    /// Create a new empty thunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trampoline atoms in the run.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the thunk owns no trampolines.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total byte size of the run.
    pub fn size(&self) -> u64 {
        self.len as u64 * TRAMPOLINE_SIZE
    }

    /// Targets in discovery (= emission) order.
    pub fn targets(&self) -> &[ThunkTarget] {
        &self.targets
    }

    /// Whether the thunk already serves `target`.
    pub fn contains(&self, target: &ThunkTarget) -> bool {
        self.lookup.contains_key(target)
    }

    /// The trampoline atom at position `pos` of the run.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is out of bounds.
    pub fn atom_at(&self, pos: u32) -> AtomIndex {
        assert!(pos < self.len, "Trampoline position out of bounds");
        let start = self.start_index.unwrap_or_else(|| {
            panic!("Thunk has no trampolines");
        });
        AtomIndex(start.0 + pos)
    }

    /// The trampoline atom serving `target`, if present.
    pub fn trampoline_for(&self, target: &ThunkTarget) -> Option<AtomIndex> {
        self.lookup.get(target).map(|&pos| self.atom_at(pos))
    }

    /// Last trampoline atom of the run, if the run is non-empty.
    pub fn last_atom(&self) -> Option<AtomIndex> {
        if self.len == 0 {
            None
        } else {
            Some(self.atom_at(self.len - 1))
        }
    }

    /// Trampoline atom indices in run order.
    pub fn atoms(&self) -> impl Iterator<Item = AtomIndex> + '_ {
        (0..self.len).map(move |pos| self.atom_at(pos))
    }

    pub(crate) fn push(&mut self, target: ThunkTarget, tramp: AtomIndex) {
        if self.start_index.is_none() {
            self.start_index = Some(tramp);
        }
        // Run contiguity: trampoline atoms are allocated back-to-back.
        debug_assert_eq!(tramp.0, self.start_index.map(|s| s.0).unwrap_or(0) + self.len);
        self.lookup.insert(target, self.len);
        self.targets.push(target);
        self.len += 1;
    }
}

/// Scan every atom of the closed group `group_start..=group_end`, create
/// deduplicated trampolines for unreachable branch targets, and splice
/// them into the emission chain immediately after the group.
///
/// Returns the thunk's index when at least one trampoline was created;
/// a group whose branches are all in range records nothing on the
/// session. Targets are discovered in atom order, then relocation-record
/// order, so the emitted trampoline layout is reproducible.
pub(crate) fn synthesize(
    session: &mut LinkSession,
    section: SectionId,
    group_start: AtomIndex,
    group_end: AtomIndex,
    allocated: &BTreeSet<AtomIndex>,
) -> Result<Option<ThunkIndex>, LayoutError> {
    // Index the thunk will get if it turns out non-empty.
    let thunk_index = ThunkIndex(session.thunks().len() as u32);
    let mut thunk = Thunk::new();

    let mut atom_index = group_start;
    loop {
        // Clone the records: trampoline creation below mutates the session.
        let relocs = session.relocations(atom_index).to_vec();
        for reloc in &relocs {
            if !reloc.kind.is_branch() {
                continue;
            }
            if reach::is_reachable(session, atom_index, reloc, allocated) {
                continue;
            }
            let target = ThunkTarget::classify(session, reloc.target);

            // A previous layout pass may already serve this call site;
            // keep that association instead of growing a new trampoline.
            if reuses_earlier_thunk(session, atom_index, &target, thunk_index) {
                continue;
            }

            if thunk.contains(&target) {
                session.record_atom_thunk(atom_index, thunk_index);
                continue;
            }

            let sym = session.add_synthetic_symbol(Symbol {
                value: 0,
                section: Some(section),
                external: false,
            })?;
            let tramp = session.add_atom(Atom {
                sym,
                file: None,
                size: TRAMPOLINE_SIZE,
                alignment: TRAMPOLINE_ALIGN,
                prev: None,
                next: None,
            })?;
            let splice_after = thunk.last_atom().unwrap_or(group_end);
            session.insert_atom_after(splice_after, tramp);
            thunk.push(target, tramp);
            session.record_atom_thunk(atom_index, thunk_index);
        }

        if atom_index == group_end {
            break;
        }
        match session.atom(atom_index).next {
            Some(next) => atom_index = next,
            None => break,
        }
    }

    if thunk.is_empty() {
        Ok(None)
    } else {
        Ok(Some(session.push_thunk(thunk)))
    }
}

/// Whether an earlier pass's thunk already provides a trampoline for this
/// call site and target. Re-layout over an already-thunked graph then
/// creates no additional trampolines.
fn reuses_earlier_thunk(
    session: &LinkSession,
    atom_index: AtomIndex,
    target: &ThunkTarget,
    current: ThunkIndex,
) -> bool {
    match session.thunk_for_atom(atom_index) {
        Some(existing) if existing != current => session.thunk(existing).contains(target),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_thunk() {
        let thunk = Thunk::new();
        assert!(thunk.is_empty());
        assert_eq!(thunk.len(), 0);
        assert_eq!(thunk.size(), 0);
        assert_eq!(thunk.last_atom(), None);
        assert_eq!(thunk.atoms().count(), 0);
    }

    #[test]
    fn test_push_and_lookup() {
        let mut thunk = Thunk::new();
        let a = ThunkTarget::Atom(SymbolWithLoc::in_file(0, 0));
        let b = ThunkTarget::Stub(SymbolWithLoc::in_file(1, 0));
        thunk.push(a, AtomIndex(10));
        thunk.push(b, AtomIndex(11));

        assert_eq!(thunk.len(), 2);
        assert_eq!(thunk.size(), 24);
        assert!(thunk.contains(&a));
        assert!(thunk.contains(&b));
        assert_eq!(thunk.trampoline_for(&a), Some(AtomIndex(10)));
        assert_eq!(thunk.trampoline_for(&b), Some(AtomIndex(11)));
        assert_eq!(thunk.last_atom(), Some(AtomIndex(11)));
        assert_eq!(thunk.targets(), &[a, b]);
    }

    #[test]
    fn test_stub_and_atom_targets_are_distinct() {
        let loc = SymbolWithLoc::in_file(0, 0);
        assert_ne!(ThunkTarget::Stub(loc), ThunkTarget::Atom(loc));
        assert_eq!(ThunkTarget::Stub(loc).symbol(), loc);
        assert_eq!(ThunkTarget::Atom(loc).symbol(), loc);
    }

    #[test]
    fn test_classify() {
        let mut session = LinkSession::new();
        let external = SymbolWithLoc::in_file(0, 0);
        let local = SymbolWithLoc::in_file(1, 0);
        session.add_stub(external, 0x100);

        assert_eq!(
            ThunkTarget::classify(&session, external),
            ThunkTarget::Stub(external)
        );
        assert_eq!(
            ThunkTarget::classify(&session, local),
            ThunkTarget::Atom(local)
        );
    }

    #[test]
    #[should_panic(expected = "Trampoline position out of bounds")]
    fn test_atom_at_out_of_bounds() {
        let thunk = Thunk::new();
        thunk.atom_at(0);
    }
}
