//! Layout and emission errors.

use core::fmt;

use crate::symbol::SymbolWithLoc;

/// Unrecoverable errors of the thunk-insertion pass.
///
/// Every decision point of the pass itself (reachability, group closing,
/// dedup) is total; errors arise only from table exhaustion or from a
/// displacement that cannot be encoded once layout is final. The caller
/// reports the error and aborts the link; no partial output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// The atom arena exhausted its u32 index space.
    TooManyAtoms,
    /// The linker symbol table exhausted its u32 index space.
    TooManySymbols,
    /// A branch displacement cannot be encoded even after thunk insertion.
    ///
    /// Indicates a reachability bug or a pathological layout (e.g. a
    /// single atom larger than the branch range).
    BranchOutOfRange {
        /// The displacement that overflowed.
        disp: i64,
        /// Maximum encodable forward displacement.
        max: i64,
    },
    /// A trampoline's page displacement exceeds the ADRP range.
    PageOutOfRange {
        /// The displacement that overflowed.
        disp: i64,
    },
    /// A GOT-kind relocation names a symbol with no indirection slot.
    ///
    /// A malformed input record; the collaborator registers slots before
    /// resolution runs.
    MissingGotSlot {
        /// The slot-less target.
        target: SymbolWithLoc,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::TooManyAtoms => write!(f, "atom table exhausted"),
            LayoutError::TooManySymbols => write!(f, "symbol table exhausted"),
            LayoutError::BranchOutOfRange { disp, max } => write!(
                f,
                "branch displacement {} out of range (max {})",
                disp, max
            ),
            LayoutError::PageOutOfRange { disp } => {
                write!(f, "trampoline page displacement {} out of range", disp)
            }
            LayoutError::MissingGotSlot { target } => {
                write!(f, "symbol {} has no indirection slot", target)
            }
        }
    }
}
