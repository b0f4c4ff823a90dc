//! Discrete trading actions produced by the decision oracle.

use std::fmt;

/// A normalized oracle decision.
///
/// Oracles return integer codes; [`Action::from_code`] maps them by exact
/// match. Codes outside `{0, 1, 2}` become [`Action::Unknown`], which the
/// execution policy treats like `Hold` but logs under its own tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Code `0`: do nothing.
    Hold,
    /// Code `1`: open a long position of one unit.
    Buy,
    /// Code `2`: close the long position.
    Sell,
    /// Any other code, kept for diagnostics.
    Unknown(i64),
}

impl Action {
    pub const HOLD_CODE: i64 = 0;
    pub const BUY_CODE: i64 = 1;
    pub const SELL_CODE: i64 = 2;

    /// Normalize a raw oracle code.
    pub const fn from_code(code: i64) -> Self {
        match code {
            Self::HOLD_CODE => Self::Hold,
            Self::BUY_CODE => Self::Buy,
            Self::SELL_CODE => Self::Sell,
            other => Self::Unknown(other),
        }
    }

    /// The integer code this action was decoded from.
    pub const fn code(&self) -> i64 {
        match self {
            Self::Hold => Self::HOLD_CODE,
            Self::Buy => Self::BUY_CODE,
            Self::Sell => Self::SELL_CODE,
            Self::Unknown(code) => *code,
        }
    }

    /// Tag written to the trade log.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
