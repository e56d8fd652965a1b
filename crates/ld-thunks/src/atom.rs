//! The atom graph: an index-addressed arena of code fragments linked in
//! emission order.
//!
//! Atoms are never removed and indices are never compacted, so an
//! `AtomIndex` stays valid across insertions and splicing a new atom into
//! the chain is O(1) without disturbing unrelated atoms.

use alloc::vec::Vec;
use core::fmt;

use crate::error::LayoutError;
use crate::symbol::SymbolWithLoc;

/// Stable index of an atom in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomIndex(pub u32);

impl fmt::Display for AtomIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom{}", self.0)
    }
}

/// A contiguous chunk of code, or a synthesized trampoline.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Symbol that names this atom; its value is the atom's address.
    pub sym: SymbolWithLoc,
    /// Originating object file; `None` for synthesized atoms.
    pub file: Option<u32>,
    /// Byte size.
    pub size: u64,
    /// Alignment as a power-of-two exponent.
    pub alignment: u32,
    /// Previous atom in emission order.
    pub prev: Option<AtomIndex>,
    /// Next atom in emission order.
    pub next: Option<AtomIndex>,
}

/// Arena of atoms with stable indices.
#[derive(Debug, Default)]
pub struct AtomArena {
    atoms: Vec<Atom>,
}

impl AtomArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self { atoms: Vec::new() }
    }

    /// Allocate a new atom, initially unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TooManyAtoms`] if the arena has exhausted
    /// its u32 index space.
    pub fn add(&mut self, atom: Atom) -> Result<AtomIndex, LayoutError> {
        let index = u32::try_from(self.atoms.len()).map_err(|_| LayoutError::TooManyAtoms)?;
        self.atoms.push(atom);
        Ok(AtomIndex(index))
    }

    /// Get an atom by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this arena.
    pub fn get(&self, index: AtomIndex) -> &Atom {
        &self.atoms[index.0 as usize]
    }

    /// Get a mutable reference to an atom by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this arena.
    pub fn get_mut(&mut self, index: AtomIndex) -> &mut Atom {
        &mut self.atoms[index.0 as usize]
    }

    /// Number of atoms ever allocated.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Splice `new` into the chain immediately after `after`, relinking
    /// the follower's `prev`.
    pub fn insert_after(&mut self, after: AtomIndex, new: AtomIndex) {
        let follower = self.get(after).next;
        {
            let atom = self.get_mut(new);
            atom.prev = Some(after);
            atom.next = follower;
        }
        self.get_mut(after).next = Some(new);
        if let Some(follower) = follower {
            self.get_mut(follower).prev = Some(new);
        }
    }

    /// Iterate forward from `start` following `next` links, inclusive.
    pub fn iter_from(&self, start: AtomIndex) -> AtomIter<'_> {
        AtomIter {
            arena: self,
            current: Some(start),
        }
    }
}

/// Forward iterator over the atom chain.
pub struct AtomIter<'a> {
    arena: &'a AtomArena,
    current: Option<AtomIndex>,
}

impl Iterator for AtomIter<'_> {
    type Item = AtomIndex;

    fn next(&mut self) -> Option<AtomIndex> {
        let index = self.current?;
        self.current = self.arena.get(index).next;
        Some(index)
    }
}
