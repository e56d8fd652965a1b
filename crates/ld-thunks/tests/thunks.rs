//! End-to-end tests of grouping, thunk insertion and emission over
//! synthetic sections.

use arm64_encoder::{add_imm, adrp, br, disassemble_code, fits_branch26, pages_between, Xr};
use ld_test_util::SectionBuilder;
use ld_thunks::{
    create_thunks, emit_thunk, resolve_branch, LayoutError, LayoutParams, Relocation, RelocKind,
    SymbolWithLoc, ThunkTarget, MAX_BRANCH_DISTANCE,
};

const MIB: u64 = 1024 * 1024;

/// Params that close groups once a span reaches `allowed` bytes.
fn params_with_allowance(allowed: u64) -> LayoutParams {
    LayoutParams {
        safety_margin: MAX_BRANCH_DISTANCE - allowed,
    }
}

#[test]
fn section_in_range_needs_no_thunks() {
    let mut builder = SectionBuilder::new();
    let a = builder.add_atom(16, 2);
    let b = builder.add_atom(32, 2);
    let c = builder.add_atom(4096, 2);
    builder.add_branch(a, 0, c);
    builder.add_branch(c, 8, a);
    builder.add_branch(b, 4, b);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();

    assert!(session.thunks().is_empty());
    // Section size is the plain sum: no extra bytes, no padding needed.
    assert_eq!(session.section(text).size, 16 + 32 + 4096);
    assert_eq!(session.atom_address(a), 0);
    assert_eq!(session.atom_address(b), 16);
    assert_eq!(session.atom_address(c), 48);
}

#[test]
fn alignment_padding_is_counted() {
    let mut builder = SectionBuilder::new();
    let a = builder.add_atom(4, 2);
    let b = builder.add_atom(8, 4);
    let c = builder.add_atom(12, 3);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();

    assert_eq!(session.atom_address(a), 0);
    assert_eq!(session.atom_address(b), 16);
    assert_eq!(session.atom_address(c), 24);
    assert_eq!(session.section(text).size, 36);
    assert_eq!(session.section(text).alignment, 4);
}

#[test]
fn forward_branch_within_allowance_needs_no_thunk() {
    // B branches 5 MiB forward to A; the default allowance (~123 MiB)
    // keeps everything in one group.
    let mut builder = SectionBuilder::new();
    let b = builder.add_atom(4, 2);
    let pad = builder.add_atom(5 * MIB, 2);
    let a = builder.add_atom(4096, 2);
    builder.add_branch(b, 0, a);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();

    assert!(session.thunks().is_empty());
    assert_eq!(session.section(text).size, 4 + 5 * MIB + 4096);
    assert_eq!(session.atom_address(pad), 4);
}

#[test]
fn forward_branch_past_group_boundary_gets_a_thunk() {
    // Same layout, but with the allowance shrunk to 1 MiB the group
    // closes before A is laid out, so the forward branch is pessimistically
    // routed through a trampoline spliced at the group boundary.
    let mut builder = SectionBuilder::new();
    let b = builder.add_atom(4, 2);
    let pad = builder.add_atom(5 * MIB, 2);
    let a = builder.add_atom(4096, 2);
    builder.add_branch(b, 0, a);
    let (mut session, text) = builder.finish();
    let a_sym = session.atom(a).sym;

    create_thunks(&mut session, text, &params_with_allowance(MIB)).unwrap();

    // Only the group that actually redirected a branch records a thunk.
    assert_eq!(session.thunks().len(), 1);
    let thunk = &session.thunks()[0];
    assert_eq!(thunk.targets(), &[ThunkTarget::Atom(a_sym)]);

    // The trampoline sits between the group and A in emission order.
    let tramp = thunk.atom_at(0);
    assert_eq!(session.atom(pad).next, Some(tramp));
    assert_eq!(session.atom(tramp).next, Some(a));
    assert_eq!(session.atom(tramp).file, None);
    assert_eq!(session.atom_address(tramp), 4 + 5 * MIB);

    // Final resolution still prefers the direct target: once addresses
    // are fixed, A turns out to be in range after all and the trampoline
    // stays behind as padding.
    let reloc = session.relocations(b)[0];
    let landing = resolve_branch(&session, b, &reloc).unwrap();
    assert_eq!(landing, session.atom_address(a));
    assert!(fits_branch26(landing as i64));

    assert_eq!(session.section(text).size, 4 + 5 * MIB + 12 + 4096);
}

#[test]
fn branches_to_one_external_share_a_trampoline() {
    // Stub table lives past the branch range, so every call is redirected;
    // three call sites in one group cost one trampoline.
    let mut builder = SectionBuilder::new();
    let x = builder.add_atom(16, 2);
    let y = builder.add_atom(16, 2);
    let z = builder.add_atom(16, 2);
    let ext = builder.add_external(0x900_0000);
    builder.add_branch_to(x, 0, ext);
    builder.add_branch_to(y, 4, ext);
    builder.add_branch_to(z, 8, ext);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();

    assert_eq!(session.thunks().len(), 1);
    let thunk = &session.thunks()[0];
    assert_eq!(thunk.len(), 1);
    assert_eq!(thunk.targets(), &[ThunkTarget::Stub(ext)]);

    let addr_x = session.trampoline_address(x, ext).unwrap();
    let addr_y = session.trampoline_address(y, ext).unwrap();
    let addr_z = session.trampoline_address(z, ext).unwrap();
    assert_eq!(addr_x, addr_y);
    assert_eq!(addr_y, addr_z);

    for atom in [x, y, z] {
        let reloc = session.relocations(atom)[0];
        assert_eq!(resolve_branch(&session, atom, &reloc).unwrap(), addr_x);
    }
}

#[test]
fn emitted_trampoline_reaches_the_stub() {
    let mut builder = SectionBuilder::new();
    let caller = builder.add_atom(16, 2);
    let ext = builder.add_external(0x900_0123);
    builder.add_branch_to(caller, 0, ext);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();

    assert_eq!(session.thunks().len(), 1);
    let thunk = &session.thunks()[0];
    let tramp_addr = session.atom_address(thunk.atom_at(0));

    let mut buf = Vec::new();
    emit_thunk(&session, thunk, &mut buf).unwrap();
    assert_eq!(buf.len(), 12);

    let words: Vec<u32> = buf
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let pages = pages_between(tramp_addr, 0x900_0123);
    assert_eq!(words[0], adrp(Xr::X16, pages as i32));
    assert_eq!(words[1], add_imm(Xr::X16, Xr::X16, 0x123));
    assert_eq!(words[2], br(Xr::X16));

    let listing = disassemble_code(&buf);
    assert!(listing.contains("br x16"));
}

#[test]
fn long_section_splits_into_bounded_groups() {
    // 200 atoms of 1 MiB, all branching forward to the last one (~199 MiB
    // away), with a 4 MiB allowance.
    let mut builder = SectionBuilder::new();
    let mut atoms = Vec::new();
    for _ in 0..200 {
        atoms.push(builder.add_atom(MIB, 2));
    }
    let last = *atoms.last().unwrap();
    for &atom in &atoms[..199] {
        builder.add_branch(atom, 0, last);
    }
    let (mut session, text) = builder.finish();
    let last_sym = session.atom(last).sym;

    let allowed = 4 * MIB;
    create_thunks(&mut session, text, &params_with_allowance(allowed)).unwrap();

    // Four atoms per group; every group but the final one redirects its
    // branches through one deduplicated trampoline. The final group's
    // branches are in range, so it records no thunk.
    assert_eq!(session.thunks().len(), 49);
    assert!(session.thunks().iter().all(|t| t.len() == 1));

    // Span bound: walk the emission chain and measure each maximal run of
    // input atoms between trampolines.
    let mut run_start = None;
    let mut prev_end = 0u64;
    let mut index = session.first_atom(text);
    while let Some(i) = index {
        let atom = session.atom(i);
        if atom.file.is_none() {
            if let Some(start) = run_start.take() {
                let span = prev_end - start;
                assert!(span <= allowed + MIB);
                assert!(span < MAX_BRANCH_DISTANCE);
            }
        } else {
            let addr = session.atom_address(i);
            if run_start.is_none() {
                run_start = Some(addr);
            }
            prev_end = addr + atom.size;
        }
        index = atom.next;
    }
    if let Some(start) = run_start {
        let span = prev_end - start;
        assert!(span <= allowed + MIB);
        assert!(span < MAX_BRANCH_DISTANCE);
    }

    // Reachability soundness: every branch lands somewhere encodable.
    for &atom in &atoms[..199] {
        let reloc = session.relocations(atom)[0];
        let landing = resolve_branch(&session, atom, &reloc).unwrap();
        let source = session.atom_address(atom) + reloc.offset as u64;
        assert!(fits_branch26(landing.wrapping_sub(source) as i64));
    }

    // The first caller is ~199 MiB from the target and must go through
    // its group's trampoline.
    let reloc = session.relocations(atoms[0])[0];
    let landing = resolve_branch(&session, atoms[0], &reloc).unwrap();
    assert_eq!(
        landing,
        session.trampoline_address(atoms[0], last_sym).unwrap()
    );
    assert_ne!(landing, session.atom_address(last));
}

#[test]
fn relayout_is_idempotent() {
    let mut builder = SectionBuilder::new();
    let b = builder.add_atom(4, 2);
    builder.add_atom(5 * MIB, 2);
    let a = builder.add_atom(4096, 2);
    builder.add_branch(b, 0, a);
    let (mut session, text) = builder.finish();
    let params = params_with_allowance(MIB);

    create_thunks(&mut session, text, &params).unwrap();
    let trampolines_after_first: Vec<u64> = session
        .thunks()
        .iter()
        .flat_map(|t| t.atoms())
        .map(|i| session.atom_address(i))
        .collect();
    let thunk_count_after_first = session.thunks().len();
    let size_after_first = session.section(text).size;
    let a_addr = session.atom_address(a);

    create_thunks(&mut session, text, &params).unwrap();
    let trampolines_after_second: Vec<u64> = session
        .thunks()
        .iter()
        .flat_map(|t| t.atoms())
        .map(|i| session.atom_address(i))
        .collect();

    // No additional thunks or trampolines, identical addresses and size.
    assert_eq!(session.thunks().len(), thunk_count_after_first);
    assert_eq!(trampolines_after_first, trampolines_after_second);
    assert_eq!(session.section(text).size, size_after_first);
    assert_eq!(session.atom_address(a), a_addr);

    // The call site still resolves to the same place as after the first
    // pass (the direct target, which both layouts put in range).
    let reloc = session.relocations(b)[0];
    let landing = resolve_branch(&session, b, &reloc).unwrap();
    assert_eq!(landing, session.atom_address(a));
}

#[test]
fn oversized_atom_forms_its_own_group() {
    let mut builder = SectionBuilder::new();
    let big = builder.add_atom(0x2000, 2);
    let tail = builder.add_atom(16, 2);
    builder.add_branch(tail, 0, big);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &params_with_allowance(0x1000)).unwrap();

    // The oversized atom alone exceeds the allowance but still lays out;
    // the backward branch from the next group stays direct.
    assert!(session.thunks().is_empty());
    assert_eq!(session.atom_address(big), 0);
    assert_eq!(session.atom_address(tail), 0x2000);
    assert_eq!(session.section(text).size, 0x2010);

    let reloc = session.relocations(tail)[0];
    assert_eq!(resolve_branch(&session, tail, &reloc).unwrap(), 0);
}

#[test]
fn non_branch_relocations_are_ignored() {
    let mut builder = SectionBuilder::new();
    let a = builder.add_atom(16, 2);
    let ext = builder.add_external(0x900_0000);
    let (mut session, text) = builder.finish();
    session.add_got_entry(ext, 0x8000);
    session.set_relocations(
        a,
        vec![
            Relocation {
                offset: 0,
                target: ext,
                kind: RelocKind::GotPage21,
                addend: 0,
            },
            Relocation {
                offset: 4,
                target: ext,
                kind: RelocKind::Pointer64,
                addend: 0,
            },
        ],
    );

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();
    assert!(session.thunks().is_empty());
    assert_eq!(session.section(text).size, 16);
}

#[test]
fn unreachable_branch_without_thunk_is_an_error() {
    // A stale layout the pass never saw: the target sits 256 MiB away and
    // no trampoline exists, so final resolution must refuse.
    let mut builder = SectionBuilder::new();
    let a = builder.add_atom(16, 2);
    let b = builder.add_atom(16, 2);
    builder.add_branch(a, 0, b);
    let (mut session, _) = builder.finish();
    session.set_atom_address(a, 0);
    session.set_atom_address(b, 0x1000_0000);

    let reloc = session.relocations(a)[0];
    let err = resolve_branch(&session, a, &reloc).unwrap_err();
    assert!(matches!(err, LayoutError::BranchOutOfRange { .. }));
}

#[test]
fn empty_section_is_a_no_op() {
    let builder = SectionBuilder::new();
    let (mut session, text) = builder.finish();
    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();
    assert_eq!(session.section(text).size, 0);
    assert!(session.thunks().is_empty());
}

#[test]
fn base_address_offsets_every_atom() {
    let mut builder = SectionBuilder::with_base_addr(0x10_0000);
    let a = builder.add_atom(16, 2);
    let b = builder.add_atom(16, 2);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();
    assert_eq!(session.atom_address(a), 0x10_0000);
    assert_eq!(session.atom_address(b), 0x10_0010);
    // Size stays relative to the section start.
    assert_eq!(session.section(text).size, 32);
}

#[test]
fn synthetic_symbols_do_not_collide_with_inputs() {
    let mut builder = SectionBuilder::new();
    let caller = builder.add_atom(16, 2);
    let ext = builder.add_external(0x900_0000);
    builder.add_branch_to(caller, 0, ext);
    let (mut session, text) = builder.finish();

    create_thunks(&mut session, text, &LayoutParams::default()).unwrap();

    assert_eq!(session.thunks().len(), 1);
    let tramp_sym = session.atom(session.thunks()[0].atom_at(0)).sym;
    assert_eq!(tramp_sym, SymbolWithLoc::synthetic(0));
    assert_eq!(session.symbol(tramp_sym).section, Some(text));
}
