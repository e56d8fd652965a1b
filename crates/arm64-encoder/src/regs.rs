//! arm64 general-purpose registers.

extern crate alloc;

use core::fmt;

/// arm64 64-bit general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Xr(u8);

impl Xr {
    /// Create a new register from its number (0-31; 31 is XZR).
    ///
    /// # Panics
    ///
    /// Panics if the register number is >= 32.
    pub fn new(num: u8) -> Self {
        assert!(num < 32, "Register number must be < 32");
        Self(num)
    }

    /// Get the register number (0-31).
    pub fn num(&self) -> u8 {
        self.0
    }
}

// Named registers
impl Xr {
    // x0-x7: argument / return value
    pub const X0: Xr = Xr(0);
    pub const X1: Xr = Xr(1);
    pub const X2: Xr = Xr(2);
    pub const X3: Xr = Xr(3);
    pub const X4: Xr = Xr(4);
    pub const X5: Xr = Xr(5);
    pub const X6: Xr = Xr(6);
    pub const X7: Xr = Xr(7);
    // x8: indirect result location
    pub const X8: Xr = Xr(8);
    // x9-x15: caller-saved temporaries
    pub const X9: Xr = Xr(9);
    pub const X10: Xr = Xr(10);
    pub const X11: Xr = Xr(11);
    pub const X12: Xr = Xr(12);
    pub const X13: Xr = Xr(13);
    pub const X14: Xr = Xr(14);
    pub const X15: Xr = Xr(15);
    // x16-x17: intra-procedure-call scratch (ip0/ip1), safe to clobber
    // between a call site and its target
    pub const X16: Xr = Xr(16);
    pub const X17: Xr = Xr(17);
    // x18: platform register
    pub const X18: Xr = Xr(18);
    // x19-x28: callee-saved
    pub const X19: Xr = Xr(19);
    pub const X20: Xr = Xr(20);
    pub const X21: Xr = Xr(21);
    pub const X22: Xr = Xr(22);
    pub const X23: Xr = Xr(23);
    pub const X24: Xr = Xr(24);
    pub const X25: Xr = Xr(25);
    pub const X26: Xr = Xr(26);
    pub const X27: Xr = Xr(27);
    pub const X28: Xr = Xr(28);
    // x29: frame pointer
    pub const FP: Xr = Xr(29);
    // x30: link register
    pub const LR: Xr = Xr(30);
    // x31: zero register (in non-memory operand positions)
    pub const XZR: Xr = Xr(31);

    // Procedure-call-standard aliases for the scratch pair.
    pub const IP0: Xr = Xr(16);
    pub const IP1: Xr = Xr(17);
}

impl fmt::Display for Xr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            29 => write!(f, "fp"),
            30 => write!(f, "lr"),
            31 => write!(f, "xzr"),
            n => write!(f, "x{}", n),
        }
    }
}
