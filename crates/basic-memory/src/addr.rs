use core::fmt;
use core::ops::{Add, Sub};

/// A byte offset into user RAM.
///
/// Line numbers, heap blocks and control-stack frames are all addressed
/// this way rather than with raw pointers, so the same interpreter state
/// can be serialized, moved or inspected without aliasing concerns.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Addr(u32);

impl Addr {
    /// The null/invalid address, used as a sentinel (e.g. end of a bucket
    /// chain, or "no handler installed").
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn add(self, offset: u32) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    #[inline]
    #[must_use]
    pub const fn sub(self, offset: u32) -> Self {
        Self(self.0.wrapping_sub(offset))
    }

    /// Unsigned distance from `other` to `self`.
    #[inline]
    #[must_use]
    pub const fn diff(self, other: Self) -> i64 {
        self.0 as i64 - other.0 as i64
    }
}

impl Add<u32> for Addr {
    type Output = Self;
    fn add(self, rhs: u32) -> Self {
        self.add(rhs)
    }
}

impl Sub<u32> for Addr {
    type Output = Self;
    fn sub(self, rhs: u32) -> Self {
        self.sub(rhs)
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr(0x{:06x})", self.0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{:06X}", self.0)
    }
}
