//! Relocation records.

use crate::symbol::SymbolWithLoc;

/// How a reference within an atom's code must be patched.
///
/// Only [`RelocKind::Branch26`] is fixed up by the thunk pass; the other
/// kinds appear in real relocation streams and are skipped by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// B/BL word-scaled signed 26-bit branch immediate, ±128 MiB.
    Branch26,
    /// ADRP page of the target address.
    Page21,
    /// Low 12 bits of the target address.
    PageOff12,
    /// ADRP page of the target's indirection (GOT) slot.
    GotPage21,
    /// Low 12 bits of the target's indirection (GOT) slot address.
    GotPageOff12,
    /// Absolute 64-bit pointer.
    Pointer64,
}

impl RelocKind {
    /// Whether this is the direct range-limited branch the thunk pass
    /// fixes up.
    pub fn is_branch(self) -> bool {
        matches!(self, RelocKind::Branch26)
    }

    /// Whether the reference resolves through the indirection (GOT) table
    /// rather than to the symbol address itself.
    pub fn is_got(self) -> bool {
        matches!(self, RelocKind::GotPage21 | RelocKind::GotPageOff12)
    }
}

/// A relocation record attached to an atom.
#[derive(Debug, Clone, Copy)]
pub struct Relocation {
    /// Byte offset of the patched instruction within the atom.
    pub offset: u32,
    /// Fully resolved target of the reference.
    pub target: SymbolWithLoc,
    /// Patch kind.
    pub kind: RelocKind,
    /// Constant added to the target address.
    pub addend: i64,
}

impl Relocation {
    /// A branch relocation with no addend.
    pub fn branch(offset: u32, target: SymbolWithLoc) -> Self {
        Self {
            offset,
            target,
            kind: RelocKind::Branch26,
            addend: 0,
        }
    }
}
