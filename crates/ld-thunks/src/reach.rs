//! Branch reachability.

use alloc::collections::BTreeSet;

use crate::atom::AtomIndex;
use crate::error::LayoutError;
use crate::reloc::Relocation;
use crate::session::LinkSession;

/// Decide whether a branch relocation in `atom_index` can be encoded
/// directly, given the set of atoms whose tentative addresses are already
/// assigned.
///
/// The checks run in a fixed order that later phases rely on:
/// stub indirection, cross-section, not-yet-allocated, displacement
/// overflow. Anything not yet proven address-stable counts as
/// unreachable; the cost of that pessimism is at worst an unnecessary
/// trampoline, never a broken branch.
pub fn is_reachable(
    session: &LinkSession,
    atom_index: AtomIndex,
    reloc: &Relocation,
    allocated: &BTreeSet<AtomIndex>,
) -> bool {
    // Calls routed through the stub table are never direct.
    if session.stub_address(reloc.target).is_some() {
        return false;
    }

    // A target that resolves to no atom has no comparable address.
    let Some(target_atom) = session.atom_for_symbol(reloc.target) else {
        return false;
    };

    // Cross-section branches are resolved elsewhere.
    let source_section = session.symbol(session.atom(atom_index).sym).section;
    let target_section = session.symbol(session.atom(target_atom).sym).section;
    if source_section != target_section {
        return false;
    }

    // Addresses are comparable only once both sides are laid out.
    if !allocated.contains(&target_atom) {
        return false;
    }

    let source_addr = session.atom_address(atom_index) + reloc.offset as u64;
    let Ok(target_addr) = target_address(session, reloc) else {
        return false;
    };
    let disp = target_addr.wrapping_sub(source_addr) as i64;
    arm64_encoder::fits_branch26(disp)
}

/// Effective address a relocation refers to: the symbol's value (plus
/// addend), or its indirection slot for GOT-kind references.
///
/// # Errors
///
/// Returns [`LayoutError::MissingGotSlot`] for a GOT-kind record whose
/// target was never given an indirection slot.
pub(crate) fn target_address(
    session: &LinkSession,
    reloc: &Relocation,
) -> Result<u64, LayoutError> {
    if reloc.kind.is_got() {
        session
            .got_address(reloc.target)
            .ok_or(LayoutError::MissingGotSlot {
                target: reloc.target,
            })
    } else {
        Ok((session.symbol(reloc.target).value as i64).wrapping_add(reloc.addend) as u64)
    }
}
