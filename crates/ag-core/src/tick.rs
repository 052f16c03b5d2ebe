//! Tick positions on the musical time axis

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default resolution: ticks per quarter note
pub const DEFAULT_DIVISION: i64 = 480;

/// Position on the timeline in ticks
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tick(pub i64);

impl Tick {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn new(ticks: i64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Convert a whole-note fraction (1/4 = one quarter note) into ticks.
    ///
    /// Truncates toward zero when the fraction is finer than the division.
    #[inline]
    pub fn from_fraction(numerator: i64, denominator: i64, division: i64) -> Self {
        debug_assert!(denominator != 0, "zero denominator");
        Self(numerator * division * 4 / denominator)
    }

    /// Ticks elapsed since `earlier` (negative if `earlier` is later)
    #[inline]
    pub fn since(self, earlier: Tick) -> i64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for Tick {
    fn from(ticks: i64) -> Self {
        Self(ticks)
    }
}

impl std::ops::Add<i64> for Tick {
    type Output = Self;

    fn add(self, rhs: i64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl std::ops::AddAssign<i64> for Tick {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs;
    }
}

impl std::ops::Sub<i64> for Tick {
    type Output = Self;

    fn sub(self, rhs: i64) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = i64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

/// Inclusive span between two ticks; `start == end` marks an instantaneous change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSpan {
    pub start: Tick,
    pub end: Tick,
}

impl TickSpan {
    #[inline]
    pub fn new(start: Tick, end: Tick) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn instant(tick: Tick) -> Self {
        Self {
            start: tick,
            end: tick,
        }
    }

    #[inline]
    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn len(&self) -> i64 {
        self.end - self.start
    }
}
