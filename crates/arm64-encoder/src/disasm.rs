//! arm64 instruction disassembly.
//!
//! Covers exactly the repertoire of the encoder; anything else is printed
//! as a raw word.

use alloc::{format, string::String};

/// Disassemble a single arm64 instruction.
///
/// Returns a human-readable string like "adrp x16, #5" or "br x16".
pub fn disassemble_instruction(inst: u32) -> String {
    if inst == 0xd503_201f {
        return String::from("nop");
    }

    // ADRP: 1|immlo|10000|immhi|Rd
    if inst & 0x9f00_0000 == 0x9000_0000 {
        let rd = inst & 0x1f;
        let immlo = (inst >> 29) & 0x3;
        let immhi = (inst >> 5) & 0x7ffff;
        let raw = (immhi << 2) | immlo;
        // Sign-extend 21-bit page count
        let pages = if raw & 0x10_0000 != 0 {
            (raw | 0xffe0_0000) as i32
        } else {
            raw as i32
        };
        return format!("adrp {}, #{}", xr_name(rd as u8), pages);
    }

    // ADD (64-bit immediate, no shift): sf=1|00|100010|sh=0|imm12|Rn|Rd
    if inst & 0xffc0_0000 == 0x9100_0000 {
        let rd = inst & 0x1f;
        let rn = (inst >> 5) & 0x1f;
        let imm12 = (inst >> 10) & 0xfff;
        return format!(
            "add {}, {}, #0x{:x}",
            xr_name(rd as u8),
            xr_name(rn as u8),
            imm12
        );
    }

    // B/BL: op|imm26
    if inst & 0x7c00_0000 == 0x1400_0000 {
        let mnemonic = if inst & 0x8000_0000 != 0 { "bl" } else { "b" };
        let raw = inst & 0x03ff_ffff;
        // Sign-extend 26-bit word offset
        let words = if raw & 0x0200_0000 != 0 {
            (raw | 0xfc00_0000) as i32
        } else {
            raw as i32
        };
        return format!("{} #{}", mnemonic, (words as i64) << 2);
    }

    // BR/BLR/RET: 1101011|0|0|op|11111|0000|0|0|Rn|00000
    if inst & 0xff9f_fc1f == 0xd61f_0000 {
        let rn = ((inst >> 5) & 0x1f) as u8;
        return match (inst >> 21) & 0x3 {
            0 => format!("br {}", xr_name(rn)),
            1 => format!("blr {}", xr_name(rn)),
            _ if rn == 30 => String::from("ret"),
            _ => format!("ret {}", xr_name(rn)),
        };
    }

    format!("unknown 0x{:08x}", inst)
}

/// Disassemble a code buffer containing arm64 instructions.
///
/// Returns a formatted string with one instruction per line, showing
/// the offset and the disassembled instruction.
pub fn disassemble_code(code: &[u8]) -> String {
    let mut result = String::new();
    let mut offset = 0;

    while offset + 4 <= code.len() {
        let inst = u32::from_le_bytes([
            code[offset],
            code[offset + 1],
            code[offset + 2],
            code[offset + 3],
        ]);
        result.push_str(&format!("0x{:04x}: {}\n", offset, disassemble_instruction(inst)));
        offset += 4;
    }

    if offset < code.len() {
        result.push_str(&format!("0x{:04x}: <incomplete instruction>\n", offset));
    }

    result
}

fn xr_name(num: u8) -> String {
    match num {
        29 => String::from("fp"),
        30 => String::from("lr"),
        31 => String::from("xzr"),
        n => format!("x{}", n),
    }
}
