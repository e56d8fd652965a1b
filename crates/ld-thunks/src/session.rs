//! The link session: all state the thunk-insertion pass shares with the
//! surrounding linker, held on one exclusively-owned context object.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::atom::{Atom, AtomArena, AtomIndex};
use crate::error::LayoutError;
use crate::reloc::Relocation;
use crate::symbol::{SectionId, Symbol, SymbolWithLoc};
use crate::thunk::{Thunk, ThunkTarget};

/// Header of one output section.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionHeader {
    /// Base address of the section in the output image.
    pub addr: u64,
    /// Total byte size, including trampolines and alignment padding.
    pub size: u64,
    /// Alignment as a power-of-two exponent.
    pub alignment: u32,
}

/// Index of a thunk in the session's thunk list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThunkIndex(pub u32);

impl fmt::Display for ThunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thunk{}", self.0)
    }
}

/// Context for one link: atoms, symbols, relocations, sections, stub and
/// indirection tables, and the thunks produced by layout.
///
/// The external collaborators populate atoms/symbols/relocations before
/// layout runs; [`crate::create_thunks`] mutates addresses and section
/// headers in place and appends thunks; the relocation-resolution phase
/// then consumes [`LinkSession::trampoline_address`] /
/// [`crate::resolve_branch`].
#[derive(Debug, Default)]
pub struct LinkSession {
    atoms: AtomArena,
    symbols: BTreeMap<SymbolWithLoc, Symbol>,
    next_synthetic: u32,
    sections: Vec<SectionHeader>,
    first_atoms: BTreeMap<SectionId, AtomIndex>,
    atom_by_symbol: BTreeMap<SymbolWithLoc, AtomIndex>,
    relocs: BTreeMap<AtomIndex, Vec<Relocation>>,
    stubs: BTreeMap<SymbolWithLoc, u64>,
    got: BTreeMap<SymbolWithLoc, u64>,
    thunks: Vec<Thunk>,
    atom_to_thunk: BTreeMap<AtomIndex, ThunkIndex>,
}

impl LinkSession {
    /// Create a new empty session.
    pub fn new() -> Self {
        Self::default()
    }

    // --- sections ---

    /// Register an output section and get its id.
    ///
    /// # Panics
    ///
    /// Panics if more than 256 sections are registered.
    pub fn add_section(&mut self, header: SectionHeader) -> SectionId {
        assert!(self.sections.len() < 256, "Section table full");
        let id = SectionId(self.sections.len() as u8);
        self.sections.push(header);
        id
    }

    /// Get a section header.
    pub fn section(&self, id: SectionId) -> &SectionHeader {
        &self.sections[id.0 as usize]
    }

    /// Get a mutable section header.
    pub fn section_mut(&mut self, id: SectionId) -> &mut SectionHeader {
        &mut self.sections[id.0 as usize]
    }

    /// Record the first atom of a section's emission chain.
    pub fn set_first_atom(&mut self, section: SectionId, index: AtomIndex) {
        self.first_atoms.insert(section, index);
    }

    /// First atom of a section's emission chain, if the section has atoms.
    pub fn first_atom(&self, section: SectionId) -> Option<AtomIndex> {
        self.first_atoms.get(&section).copied()
    }

    // --- symbols ---

    /// Define (or redefine) a symbol provided by an external collaborator.
    pub fn define_symbol(&mut self, loc: SymbolWithLoc, symbol: Symbol) {
        self.symbols.insert(loc, symbol);
    }

    /// Allocate a new linker-synthesized symbol.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TooManySymbols`] if the synthetic index
    /// space is exhausted.
    pub fn add_synthetic_symbol(&mut self, symbol: Symbol) -> Result<SymbolWithLoc, LayoutError> {
        let loc = SymbolWithLoc::synthetic(self.next_synthetic);
        self.next_synthetic = self
            .next_synthetic
            .checked_add(1)
            .ok_or(LayoutError::TooManySymbols)?;
        self.symbols.insert(loc, symbol);
        Ok(loc)
    }

    /// Look up a symbol.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was never defined.
    pub fn symbol(&self, loc: SymbolWithLoc) -> &Symbol {
        self.symbols.get(&loc).unwrap_or_else(|| {
            panic!("Symbol {} not defined in session", loc);
        })
    }

    /// Look up a symbol mutably.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was never defined.
    pub fn symbol_mut(&mut self, loc: SymbolWithLoc) -> &mut Symbol {
        self.symbols.get_mut(&loc).unwrap_or_else(|| {
            panic!("Symbol {} not defined in session", loc);
        })
    }

    // --- atoms ---

    /// Allocate a new atom and index it by its owning symbol.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TooManyAtoms`] on arena exhaustion.
    pub fn add_atom(&mut self, atom: Atom) -> Result<AtomIndex, LayoutError> {
        let sym = atom.sym;
        let index = self.atoms.add(atom)?;
        self.atom_by_symbol.insert(sym, index);
        Ok(index)
    }

    /// Get an atom by index.
    pub fn atom(&self, index: AtomIndex) -> &Atom {
        self.atoms.get(index)
    }

    /// Get a mutable atom by index.
    pub fn atom_mut(&mut self, index: AtomIndex) -> &mut Atom {
        self.atoms.get_mut(index)
    }

    /// The atom a symbol resolves to, if any.
    pub fn atom_for_symbol(&self, loc: SymbolWithLoc) -> Option<AtomIndex> {
        self.atom_by_symbol.get(&loc).copied()
    }

    /// Splice `new` into the emission chain immediately after `after`.
    pub fn insert_atom_after(&mut self, after: AtomIndex, new: AtomIndex) {
        self.atoms.insert_after(after, new);
    }

    /// Address of an atom (its owning symbol's value).
    pub fn atom_address(&self, index: AtomIndex) -> u64 {
        self.symbol(self.atom(index).sym).value
    }

    /// Assign an atom's address by mutating its owning symbol.
    pub fn set_atom_address(&mut self, index: AtomIndex, addr: u64) {
        let sym = self.atom(index).sym;
        self.symbol_mut(sym).value = addr;
    }

    // --- relocations ---

    /// Attach decoded relocation records to an atom.
    pub fn set_relocations(&mut self, atom: AtomIndex, relocs: Vec<Relocation>) {
        self.relocs.insert(atom, relocs);
    }

    /// Relocation records of an atom, in record order.
    pub fn relocations(&self, atom: AtomIndex) -> &[Relocation] {
        self.relocs.get(&atom).map(Vec::as_slice).unwrap_or(&[])
    }

    // --- stub and indirection tables ---

    /// Register a stub-table entry for an external symbol.
    pub fn add_stub(&mut self, loc: SymbolWithLoc, addr: u64) {
        self.stubs.insert(loc, addr);
    }

    /// Address of a symbol's stub-table entry, if it has one.
    pub fn stub_address(&self, loc: SymbolWithLoc) -> Option<u64> {
        self.stubs.get(&loc).copied()
    }

    /// Register an indirection (GOT) slot for a symbol.
    pub fn add_got_entry(&mut self, loc: SymbolWithLoc, addr: u64) {
        self.got.insert(loc, addr);
    }

    /// Address of a symbol's indirection (GOT) slot, if it has one.
    pub fn got_address(&self, loc: SymbolWithLoc) -> Option<u64> {
        self.got.get(&loc).copied()
    }

    // --- thunks ---

    /// Append a thunk and get its index.
    pub fn push_thunk(&mut self, thunk: Thunk) -> ThunkIndex {
        let index = ThunkIndex(self.thunks.len() as u32);
        self.thunks.push(thunk);
        index
    }

    /// Get a thunk.
    pub fn thunk(&self, index: ThunkIndex) -> &Thunk {
        &self.thunks[index.0 as usize]
    }

    /// All thunks, in creation (group) order.
    pub fn thunks(&self) -> &[Thunk] {
        &self.thunks
    }

    /// Associate an originating atom with the thunk that serves it.
    pub fn record_atom_thunk(&mut self, atom: AtomIndex, thunk: ThunkIndex) {
        self.atom_to_thunk.insert(atom, thunk);
    }

    /// The thunk serving an originating atom, if it needed one.
    pub fn thunk_for_atom(&self, atom: AtomIndex) -> Option<ThunkIndex> {
        self.atom_to_thunk.get(&atom).copied()
    }

    /// Resolved address of the trampoline a call site in `atom` must use
    /// to reach `target`, if that call site was redirected.
    pub fn trampoline_address(&self, atom: AtomIndex, target: SymbolWithLoc) -> Option<u64> {
        let thunk = self.thunk(self.thunk_for_atom(atom)?);
        let tagged = ThunkTarget::classify(self, target);
        let tramp = thunk.trampoline_for(&tagged)?;
        Some(self.atom_address(tramp))
    }
}
