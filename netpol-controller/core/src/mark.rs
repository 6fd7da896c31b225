//! Packet mark bits shared between policy chains and pod chains.
//!
//! A policy chain sets [`PROVISIONAL_PASS`] on packets its rules permit. The pod chain logs and
//! rejects packets that arrive at its tail without that bit; the survivors have the bit cleared and
//! [`FINAL_PASS`] set, which is what the node's accept rule matches on.

use std::fmt;

pub const PROVISIONAL_PASS: Mark = Mark(0x10000);

pub const FINAL_PASS: Mark = Mark(0x20000);

/// A single bit of the packet mark word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mark(u32);

impl Mark {
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `value/mask` matching packets that carry this bit.
    pub fn matcher(self) -> String {
        format!("{self}/{self}")
    }

    /// `value/mask` that sets this bit and leaves the rest of the word untouched.
    pub fn set(self) -> String {
        self.matcher()
    }

    /// `value/mask` that clears this bit and leaves the rest of the word untouched.
    pub fn clear(self) -> String {
        format!("0/{self}")
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
