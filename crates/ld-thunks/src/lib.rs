//! arm64 branch-range extension for a linker's section layout phase.
//!
//! A direct arm64 branch (B/BL) encodes its displacement in a word-scaled
//! signed 26-bit immediate and reaches roughly ±128 MiB. When an output
//! code section is laid out by concatenating atoms, a call site and its
//! target can end up farther apart than that. This crate:
//!
//! - partitions a section's atom sequence into address-contiguous groups
//!   whose span keeps every in-group branch encodable,
//! - synthesizes deduplicated trampolines ("thunks") at each group's end
//!   for branches that would otherwise be out of range,
//! - emits the trampoline instruction bytes (`adrp`/`add`/`br x16`) once
//!   all addresses are final, and
//! - answers the relocation-resolution phase's question of where a given
//!   call site's branch should actually land.
//!
//! Atom, symbol and relocation construction from input objects, as well as
//! output-file writing, are the surrounding linker's concern; all shared
//! state lives in an explicit [`LinkSession`].

#![no_std]

extern crate alloc;

mod atom;
mod emit;
mod error;
mod layout;
mod reach;
mod reloc;
mod session;
mod symbol;
mod thunk;

pub use atom::{Atom, AtomArena, AtomIndex, AtomIter};
pub use emit::{emit_thunk, resolve_branch};
pub use error::LayoutError;
pub use layout::{create_thunks, LayoutParams, MAX_BRANCH_DISTANCE};
pub use reach::is_reachable;
pub use reloc::{RelocKind, Relocation};
pub use session::{LinkSession, SectionHeader, ThunkIndex};
pub use symbol::{SectionId, Symbol, SymbolWithLoc};
pub use thunk::{Thunk, ThunkTarget, TRAMPOLINE_ALIGN, TRAMPOLINE_SIZE};
