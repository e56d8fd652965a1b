//! Grouping and address assignment.
//!
//! Walks a section's atom chain assigning tentative addresses, closes a
//! group once its span approaches the branch encoding limit, has the
//! thunk synthesizer fix up the closed group, places the resulting
//! trampolines, and resumes behind them.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::atom::AtomIndex;
use crate::error::LayoutError;
use crate::session::LinkSession;
use crate::symbol::SectionId;
use crate::thunk::{self, TRAMPOLINE_ALIGN, TRAMPOLINE_SIZE};

/// Raw reach of the word-scaled signed 26-bit branch immediate: 2^27 bytes.
pub const MAX_BRANCH_DISTANCE: u64 = 1 << 27;

/// Tunable layout parameters.
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    /// Subtracted from [`MAX_BRANCH_DISTANCE`] when closing groups, so a
    /// group's own trampolines and padding cannot push an in-group branch
    /// out of range. A configuration constant, not a derived bound.
    pub safety_margin: u64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        // 5 MiB, in line with what production linkers reserve.
        Self {
            safety_margin: 0x50_0000,
        }
    }
}

impl LayoutParams {
    /// Maximum span a group may cover.
    pub fn max_allowed_distance(&self) -> u64 {
        MAX_BRANCH_DISTANCE - self.safety_margin
    }
}

/// Lay out `section` and insert thunks where branches would be out of
/// range.
///
/// Assigns every atom's final address, splices trampoline atoms into the
/// emission chain, records thunks and the atom-to-thunk association on
/// the session, and updates the section header's size and alignment.
/// A section with no atoms is left untouched except for a zeroed header.
///
/// # Errors
///
/// Propagates atom/symbol table exhaustion from trampoline creation.
pub fn create_thunks(
    session: &mut LinkSession,
    section: SectionId,
    params: &LayoutParams,
) -> Result<(), LayoutError> {
    let max_allowed = params.max_allowed_distance();
    let base_addr = {
        let header = session.section_mut(section);
        header.size = 0;
        header.alignment = 0;
        header.addr
    };

    let Some(first) = session.first_atom(section) else {
        return Ok(());
    };

    let mut allocated: BTreeSet<AtomIndex> = BTreeSet::new();
    let mut offset: u64 = 0;
    let mut max_align: u32 = 0;
    let mut atom_index = first;

    loop {
        let group_start = atom_index;
        let mut group_end = atom_index;

        // Growth: place atoms until the group's span reaches the limit.
        // The body runs at least once, so a single oversized atom still
        // forms a (one-atom) group.
        loop {
            let (size, alignment) = {
                let atom = session.atom(group_end);
                (atom.size, atom.alignment)
            };
            offset = align_to(offset, 1u64 << alignment);
            session.set_atom_address(group_end, base_addr + offset);
            offset += size;
            max_align = max_align.max(alignment);
            allocated.insert(group_end);

            let group_start_offset = session.atom_address(group_start) - base_addr;
            if offset - group_start_offset >= max_allowed {
                break;
            }
            match session.atom(group_end).next {
                Some(next) => group_end = next,
                None => break,
            }
        }

        // Fix up the closed group; trampolines land right after group_end.
        // A group needing no trampolines records no thunk at all.
        let mut resume_after = group_end;
        if let Some(thunk_index) =
            thunk::synthesize(session, section, group_start, group_end, &allocated)?
        {
            // Place the trampolines.
            let trampolines: Vec<AtomIndex> = session.thunk(thunk_index).atoms().collect();
            offset = align_to(offset, 1u64 << TRAMPOLINE_ALIGN);
            max_align = max_align.max(TRAMPOLINE_ALIGN);
            for &tramp in &trampolines {
                session.set_atom_address(tramp, base_addr + offset);
                allocated.insert(tramp);
                offset += TRAMPOLINE_SIZE;
            }
            if let Some(&last) = trampolines.last() {
                resume_after = last;
            }
        }

        // The next group starts behind the thunk run (or behind group_end
        // when no thunk was needed).
        match session.atom(resume_after).next {
            Some(next) => atom_index = next,
            None => break,
        }
    }

    let header = session.section_mut(section);
    header.size = offset;
    header.alignment = max_align;
    Ok(())
}

fn align_to(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}
