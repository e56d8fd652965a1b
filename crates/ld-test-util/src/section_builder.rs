//! Builder for synthetic sections.

use ld_thunks::{
    Atom, AtomIndex, LinkSession, Relocation, SectionHeader, SectionId, Symbol, SymbolWithLoc,
};

/// Builds one code section atom by atom.
///
/// Atoms are chained in insertion order; every atom gets a symbol in
/// object file 0. External symbols get a stub-table entry and no atom.
pub struct SectionBuilder {
    session: LinkSession,
    section: SectionId,
    tail: Option<AtomIndex>,
    next_sym: u32,
}

impl SectionBuilder {
    /// Create a builder for a section based at address 0.
    pub fn new() -> Self {
        Self::with_base_addr(0)
    }

    /// Create a builder for a section based at `addr`.
    pub fn with_base_addr(addr: u64) -> Self {
        let mut session = LinkSession::new();
        let section = session.add_section(SectionHeader {
            addr,
            size: 0,
            alignment: 0,
        });
        Self {
            session,
            section,
            tail: None,
            next_sym: 0,
        }
    }

    /// The section under construction.
    pub fn section(&self) -> SectionId {
        self.section
    }

    /// Append an atom of `size` bytes with the given alignment exponent.
    pub fn add_atom(&mut self, size: u64, alignment: u32) -> AtomIndex {
        let sym = self.fresh_symbol();
        self.session.define_symbol(
            sym,
            Symbol {
                value: 0,
                section: Some(self.section),
                external: false,
            },
        );
        let index = self
            .session
            .add_atom(Atom {
                sym,
                file: Some(0),
                size,
                alignment,
                prev: None,
                next: None,
            })
            .expect("atom arena exhausted");

        match self.tail {
            Some(tail) => self.session.insert_atom_after(tail, index),
            None => self.session.set_first_atom(self.section, index),
        }
        self.tail = Some(index);
        index
    }

    /// Define an external symbol with a stub-table entry at `stub_addr`.
    pub fn add_external(&mut self, stub_addr: u64) -> SymbolWithLoc {
        let sym = self.fresh_symbol();
        self.session.define_symbol(
            sym,
            Symbol {
                value: 0,
                section: None,
                external: true,
            },
        );
        self.session.add_stub(sym, stub_addr);
        sym
    }

    /// Add a branch relocation at `offset` within `from`, targeting the
    /// symbol of atom `to`.
    pub fn add_branch(&mut self, from: AtomIndex, offset: u32, to: AtomIndex) {
        let target = self.session.atom(to).sym;
        self.add_branch_to(from, offset, target);
    }

    /// Add a branch relocation at `offset` within `from`, targeting an
    /// arbitrary symbol.
    pub fn add_branch_to(&mut self, from: AtomIndex, offset: u32, target: SymbolWithLoc) {
        let mut relocs = self.session.relocations(from).to_vec();
        relocs.push(Relocation::branch(offset, target));
        self.session.set_relocations(from, relocs);
    }

    /// Finish building and hand over the session.
    pub fn finish(self) -> (LinkSession, SectionId) {
        (self.session, self.section)
    }

    fn fresh_symbol(&mut self) -> SymbolWithLoc {
        let sym = SymbolWithLoc::in_file(self.next_sym, 0);
        self.next_sym += 1;
        sym
    }
}

impl Default for SectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
