//! arm64 instruction encoder.
//!
//! This crate provides functions to encode the small arm64 instruction
//! repertoire a linker needs for range-extension trampolines and branch
//! fix-ups, plus a matching disassembler for tests and debug output.

#![no_std]

extern crate alloc;

mod disasm;
mod encode;
mod regs;

pub use disasm::{disassemble_code, disassemble_instruction};
pub use encode::*;
pub use regs::Xr;
