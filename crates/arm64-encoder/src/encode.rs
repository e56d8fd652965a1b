//! arm64 instruction encoding.
//!
//! Every function returns the 32-bit little-endian instruction word.
//! Displacement-taking encoders assert their operand ranges; callers that
//! work with unverified displacements should pre-check with the `fits_*`
//! predicates.

use crate::regs::Xr;

/// ADRP Xd, #pages: load the 4 KiB page address `PC_page + pages` into Xd.
///
/// # Panics
///
/// Panics if `pages` does not fit the signed 21-bit immediate.
pub fn adrp(rd: Xr, pages: i32) -> u32 {
    assert!(
        fits_page21(pages as i64),
        "ADRP page offset out of range: {}",
        pages
    );
    let imm = pages as u32;
    let immlo = imm & 0x3;
    let immhi = (imm >> 2) & 0x7ffff;
    // 1|immlo|10000|immhi|Rd
    0x9000_0000 | (immlo << 29) | (immhi << 5) | rd.num() as u32
}

/// ADD Xd, Xn, #imm12 (64-bit, no shift).
///
/// # Panics
///
/// Panics if `imm12` is not a 12-bit value.
pub fn add_imm(rd: Xr, rn: Xr, imm12: u16) -> u32 {
    assert!(imm12 < 4096, "ADD immediate out of range: {}", imm12);
    // sf=1|00|100010|sh=0|imm12|Rn|Rd
    0x9100_0000 | ((imm12 as u32) << 10) | ((rn.num() as u32) << 5) | rd.num() as u32
}

/// B #offset: unconditional PC-relative branch.
///
/// # Panics
///
/// Panics if `offset` is misaligned or exceeds the 26-bit word range.
pub fn b(offset: i64) -> u32 {
    assert!(fits_branch26(offset), "B offset out of range: {}", offset);
    // 000101|imm26
    0x1400_0000 | imm26(offset)
}

/// BL #offset: branch with link.
///
/// # Panics
///
/// Panics if `offset` is misaligned or exceeds the 26-bit word range.
pub fn bl(offset: i64) -> u32 {
    assert!(fits_branch26(offset), "BL offset out of range: {}", offset);
    // 100101|imm26
    0x9400_0000 | imm26(offset)
}

/// BR Xn: branch to register.
pub fn br(rn: Xr) -> u32 {
    // 1101011|0|0|00|11111|0000|0|0|Rn|00000
    0xd61f_0000 | ((rn.num() as u32) << 5)
}

/// BLR Xn: branch with link to register.
pub fn blr(rn: Xr) -> u32 {
    // 1101011|0|0|01|11111|0000|0|0|Rn|00000
    0xd63f_0000 | ((rn.num() as u32) << 5)
}

/// RET: return through x30.
pub fn ret() -> u32 {
    // 1101011|0|0|10|11111|0000|0|0|Rn=30|00000
    0xd65f_03c0
}

/// NOP.
pub fn nop() -> u32 {
    0xd503_201f
}

/// Replace the imm26 field of an existing B/BL word with `offset`.
///
/// # Panics
///
/// Panics if `offset` is misaligned or exceeds the 26-bit word range.
pub fn patch_branch26(word: u32, offset: i64) -> u32 {
    assert!(
        fits_branch26(offset),
        "branch offset out of range: {}",
        offset
    );
    (word & 0xfc00_0000) | imm26(offset)
}

/// Whether a byte displacement is encodable in the word-scaled signed
/// 26-bit branch immediate (4-byte aligned, within ±2^27 bytes).
pub fn fits_branch26(disp: i64) -> bool {
    disp & 3 == 0 && (-(1 << 27)..(1 << 27)).contains(&disp)
}

/// Whether a page count is encodable in the signed 21-bit ADRP immediate.
pub fn fits_page21(pages: i64) -> bool {
    (-(1 << 20)..(1 << 20)).contains(&pages)
}

/// Signed page delta between two addresses, as ADRP counts pages.
pub fn pages_between(from: u64, to: u64) -> i64 {
    (to >> 12) as i64 - (from >> 12) as i64
}

/// Low 12 bits of an address, the page offset paired with an ADRP.
pub fn page_off(addr: u64) -> u16 {
    (addr & 0xfff) as u16
}

fn imm26(offset: i64) -> u32 {
    ((offset >> 2) as u32) & 0x03ff_ffff
}
