//! Change methods and directions
//!
//! A ramp changes a value over a span of ticks. The method picks the
//! curve shape, the direction fixes which way the value is allowed to move.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Curve shape of a ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeMethod {
    /// Linear
    #[default]
    Normal,
    /// Slow start, fast end (sine quarter period)
    EaseIn,
    /// Fast start, slow end (sine quarter period)
    EaseOut,
    /// Slow start and end (sine half period)
    EaseInOut,
    /// (d+1)^(t/T) - 1
    Exponential,
}

/// Stable persistence tokens, one per method
pub const CHANGE_METHOD_TABLE: [(ChangeMethod, &str); 5] = [
    (ChangeMethod::Normal, "normal"),
    (ChangeMethod::EaseIn, "ease-in"),
    (ChangeMethod::EaseOut, "ease-out"),
    (ChangeMethod::EaseInOut, "ease-in-out"),
    (ChangeMethod::Exponential, "exponential"),
];

impl ChangeMethod {
    pub const ALL: [ChangeMethod; 5] = [
        ChangeMethod::Normal,
        ChangeMethod::EaseIn,
        ChangeMethod::EaseOut,
        ChangeMethod::EaseInOut,
        ChangeMethod::Exponential,
    ];

    /// Persistence token for this method.
    ///
    /// # Panics
    ///
    /// Panics if the method is missing from [`CHANGE_METHOD_TABLE`]; that is a
    /// programming error, never bad input.
    pub fn name(self) -> &'static str {
        match CHANGE_METHOD_TABLE.iter().find(|(method, _)| *method == self) {
            Some((_, name)) => name,
            None => unreachable!("unrecognised change method {self:?}"),
        }
    }

    /// Look a method up by its persistence token. Unknown names fall back to
    /// [`ChangeMethod::Normal`].
    pub fn from_name(name: &str) -> Self {
        CHANGE_METHOD_TABLE
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(method, _)| *method)
            .unwrap_or_else(|| {
                log::debug!("unknown change method name {name:?}, using normal");
                ChangeMethod::Normal
            })
    }
}

impl fmt::Display for ChangeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChangeMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Which way a ramp moves its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeDirection {
    #[default]
    Increasing,
    Decreasing,
}

impl ChangeDirection {
    /// +1 for increasing, -1 for decreasing
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            ChangeDirection::Increasing => 1,
            ChangeDirection::Decreasing => -1,
        }
    }

    /// Whether moving from `start` to `end` goes against this direction
    #[inline]
    pub fn is_reversed_by(self, start: i32, end: i32) -> bool {
        match self {
            ChangeDirection::Increasing => end < start,
            ChangeDirection::Decreasing => end > start,
        }
    }
}
