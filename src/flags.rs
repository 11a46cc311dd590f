//! request and state bitsets.
//!
//! hand-rolled rather than pulled from a crate: the set is small, fixed, and never needs the
//! generality (derive macros, iteration, serde) a general bitflags dependency buys.

/// flags set when a request is built, controlling both pipeline shape and reply layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestFlags(u16);

impl RequestFlags {
    pub const NONE: Self = Self(0);
    pub const IS_SEARCH: Self = Self(1 << 0);
    pub const IS_CURSOR: Self = Self(1 << 1);
    pub const SEND_SCORES: Self = Self(1 << 2);
    pub const SEND_PAYLOADS: Self = Self(1 << 3);
    pub const SEND_SORTKEYS: Self = Self(1 << 4);
    pub const SEND_NOFIELDS: Self = Self(1 << 5);
    pub const NOROWS: Self = Self(1 << 6);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl core::ops::BitOr for RequestFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// flags mutated over a request's lifetime as it executes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const NONE: Self = Self(0);
    pub const ITER_DONE: Self = Self(1 << 0);
    pub const ERROR: Self = Self(1 << 1);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}
