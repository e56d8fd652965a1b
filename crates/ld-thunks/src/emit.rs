//! Trampoline code emission and final branch resolution.

use alloc::vec::Vec;

use arm64_encoder::{add_imm, adrp, br, fits_branch26, fits_page21, page_off, pages_between, Xr};

use crate::atom::AtomIndex;
use crate::error::LayoutError;
use crate::reach;
use crate::reloc::Relocation;
use crate::session::LinkSession;
use crate::thunk::{Thunk, ThunkTarget};

/// Maximum encodable forward branch displacement, for error reporting.
const MAX_BRANCH_DISP: i64 = (1 << 27) - 4;

/// Append the instruction bytes of a finalized thunk, in run order.
///
/// Every trampoline is exactly three little-endian words: a page-address
/// load, a page-offset add, and a register branch through x16, the
/// scratch register the procedure-call standard reserves between a call
/// site and its target.
///
/// # Errors
///
/// Returns [`LayoutError::PageOutOfRange`] if a target lies beyond the
/// ADRP range (±4 GiB) of its trampoline.
pub fn emit_thunk(
    session: &LinkSession,
    thunk: &Thunk,
    buf: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    for (pos, target) in thunk.targets().iter().enumerate() {
        let tramp_addr = session.atom_address(thunk.atom_at(pos as u32));
        let target_addr = target_final_address(session, target);

        let pages = pages_between(tramp_addr, target_addr);
        if !fits_page21(pages) {
            return Err(LayoutError::PageOutOfRange {
                disp: target_addr.wrapping_sub(tramp_addr) as i64,
            });
        }

        buf.extend_from_slice(&adrp(Xr::X16, pages as i32).to_le_bytes());
        buf.extend_from_slice(&add_imm(Xr::X16, Xr::X16, page_off(target_addr)).to_le_bytes());
        buf.extend_from_slice(&br(Xr::X16).to_le_bytes());
    }
    Ok(())
}

/// Where the branch at `reloc` in `atom_index` must land once layout is
/// final: the direct target (or its stub entry) when in range, otherwise
/// the call site's trampoline.
///
/// # Errors
///
/// Returns [`LayoutError::BranchOutOfRange`] if neither the direct target
/// nor a trampoline is encodable, a reachability bug or a pathological
/// layout. Returns [`LayoutError::MissingGotSlot`] for a malformed
/// GOT-kind record.
pub fn resolve_branch(
    session: &LinkSession,
    atom_index: AtomIndex,
    reloc: &Relocation,
) -> Result<u64, LayoutError> {
    let source_addr = session.atom_address(atom_index) + reloc.offset as u64;
    let direct = match session.stub_address(reloc.target) {
        Some(stub) => stub,
        None => reach::target_address(session, reloc)?,
    };
    let disp = direct.wrapping_sub(source_addr) as i64;
    if fits_branch26(disp) {
        return Ok(direct);
    }

    match session.trampoline_address(atom_index, reloc.target) {
        Some(tramp) => {
            let disp = tramp.wrapping_sub(source_addr) as i64;
            if fits_branch26(disp) {
                Ok(tramp)
            } else {
                Err(LayoutError::BranchOutOfRange {
                    disp,
                    max: MAX_BRANCH_DISP,
                })
            }
        }
        None => Err(LayoutError::BranchOutOfRange {
            disp,
            max: MAX_BRANCH_DISP,
        }),
    }
}

fn target_final_address(session: &LinkSession, target: &ThunkTarget) -> u64 {
    match target {
        ThunkTarget::Stub(loc) => session.stub_address(*loc).unwrap_or_else(|| {
            panic!("Symbol {} lost its stub entry", loc);
        }),
        ThunkTarget::Atom(loc) => session.symbol(*loc).value,
    }
}
