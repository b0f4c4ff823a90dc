//! Fixed-point decimal type for prices and account balances.
//!
//! [`Price`] stores values as `mantissa * 10^(-8)` in an `i64`, so every
//! balance mutation in the ledger is exact. A price of `50000.50` is stored
//! as mantissa `5_000_050_000_000`.
//!
//! Formatting honours the precision flag: `format!("{:.2}", p)` rounds half
//! away from zero to cents, which is what the trade log prints.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Number of fractional digits carried by every [`Price`].
pub const PRICE_SCALE: u32 = 8;

const FACTOR: i64 = 10i64.pow(PRICE_SCALE);

/// Fixed-point decimal with 8 fractional digits.
///
/// # Examples
///
/// ```
/// use tb_core::types::Price;
///
/// let price = Price::from_f64(50000.5).unwrap();
/// assert_eq!(format!("{:.2}", price), "50000.50");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Price(i64);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Build a price from its raw mantissa (`value * 10^8`).
    #[inline]
    pub const fn from_mantissa(mantissa: i64) -> Self {
        Self(mantissa)
    }

    /// Build a price from a whole number of units.
    ///
    /// Returns `None` if the value does not fit.
    #[inline]
    pub const fn from_units(units: i64) -> Option<Self> {
        match units.checked_mul(FACTOR) {
            Some(m) => Some(Self(m)),
            None => None,
        }
    }

    /// Convert an `f64` into a price, rounding to 8 decimal places.
    ///
    /// Returns `None` for NaN, infinities, and values outside the
    /// representable range.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * FACTOR as f64).round();
        if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Returns the raw mantissa.
    #[inline]
    pub const fn mantissa(&self) -> i64 {
        self.0
    }

    /// Convert to `f64`. Intended for feature vectors and display only.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / FACTOR as f64
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Round the mantissa to `digits` fractional digits, half away from zero.
    ///
    /// Returns the rounded value as an integer count of `10^(-digits)` units.
    fn rounded_to(&self, digits: u32) -> i64 {
        let divisor = 10i64.pow(PRICE_SCALE - digits);
        let q = self.0 / divisor;
        let r = self.0 % divisor;
        if r.unsigned_abs() * 2 >= divisor.unsigned_abs() {
            q + self.0.signum()
        } else {
            q
        }
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({:.8})", self)
    }
}

/// Honors the format precision (default 8 digits).
///
/// Rounding is half away from zero on the exact decimal value, so `1.005`
/// prints as `1.01` at two digits. Float formatting of the same input would
/// print `1.00` because the binary `f64` lies just below the tie.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = f.precision().map_or(PRICE_SCALE, |p| (p as u32).min(PRICE_SCALE));
        let units = self.rounded_to(digits);
        let sign = if units < 0 { "-" } else { "" };
        let abs = units.unsigned_abs();
        if digits == 0 {
            return write!(f, "{sign}{abs}");
        }
        let divisor = 10u64.pow(digits);
        write!(
            f,
            "{sign}{}.{:0>width$}",
            abs / divisor,
            abs % divisor,
            width = digits as usize
        )
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Add for Price {
    type Output = Self;

    /// Panics on overflow; use [`Price::checked_add`] on ledger paths.
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(rhs).expect("Price::add overflow")
    }
}

impl Sub for Price {
    type Output = Self;

    /// Panics on overflow; use [`Price::checked_sub`] on ledger paths.
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.checked_sub(rhs).expect("Price::sub overflow")
    }
}
