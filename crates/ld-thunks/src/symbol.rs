//! Symbols and symbol identity.

use core::fmt;

/// Identifier of an output section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionId(pub u8);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sect{}", self.0)
    }
}

/// A symbol within a specific originating object file.
///
/// This pair is the identity used for "target of a branch": multiple atoms
/// may reference a symbol, but a symbol resolves to exactly one atom.
/// `file == None` marks a linker-synthesized symbol (e.g. a trampoline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolWithLoc {
    /// Index into the owning object's (or the linker's) symbol list.
    pub sym_index: u32,
    /// Originating object file, if any.
    pub file: Option<u32>,
}

impl SymbolWithLoc {
    /// A symbol defined in object file `file`.
    pub fn in_file(sym_index: u32, file: u32) -> Self {
        Self {
            sym_index,
            file: Some(file),
        }
    }

    /// A linker-synthesized symbol.
    pub fn synthetic(sym_index: u32) -> Self {
        Self {
            sym_index,
            file: None,
        }
    }
}

impl fmt::Display for SymbolWithLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file {
            Some(file) => write!(f, "%{}@obj{}", self.sym_index, file),
            None => write!(f, "%{}@linker", self.sym_index),
        }
    }
}

/// A symbol table entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Symbol {
    /// Address of the symbol. Tentative while layout runs, final after.
    pub value: u64,
    /// Section the symbol's atom is emitted into, if any.
    pub section: Option<SectionId>,
    /// Defined in another linkage unit and reached through the stub table.
    pub external: bool,
}
