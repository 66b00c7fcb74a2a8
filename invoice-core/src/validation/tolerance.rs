//! Tolerant equality for monetary amounts.
//!
//! Stored totals are computed per line and may carry more decimals than the
//! currency shows, so comparisons accept any difference below a small
//! fraction of the last displayed decimal place.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places shown for monetary amounts.
pub const DEFAULT_PRECISION: u32 = 2;

/// Largest precision whose epsilon still fits a [`Decimal`] scale.
const MAX_PRECISION: u32 = 27;

/// Numeric tolerance used by every consistency check.
///
/// Two amounts match when `|a - b| < 6 / 10^(precision + 1)`, which is
/// `0.006` at the default precision of two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    precision: u32,
}

impl Tolerance {
    /// Tolerance for `precision` decimal places, capped at 27.
    pub const fn new(precision: u32) -> Self {
        let precision = if precision > MAX_PRECISION {
            MAX_PRECISION
        } else {
            precision
        };
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// The exclusive upper bound on an accepted difference.
    pub fn epsilon(&self) -> Decimal {
        Decimal::new(6, self.precision + 1)
    }

    /// Whether `a` and `b` are equal within this tolerance. Values too far
    /// apart for their difference to be represented never match.
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use invoice_core::Tolerance;
    ///
    /// let tolerance = Tolerance::default();
    /// assert!(tolerance.matches(dec!(121.00), dec!(121.005)));
    /// assert!(!tolerance.matches(dec!(121.00), dec!(121.01)));
    /// ```
    pub fn matches(
        &self,
        a: Decimal,
        b: Decimal,
    ) -> bool {
        a.checked_sub(b)
            .is_some_and(|diff| diff.abs() < self.epsilon())
    }

    /// Rounds `value` to the tolerance precision using half-up rounding
    /// (midpoints move away from zero).
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use invoice_core::Tolerance;
    ///
    /// let tolerance = Tolerance::default();
    /// assert_eq!(tolerance.round(dec!(123.454)), dec!(123.45));
    /// assert_eq!(tolerance.round(dec!(123.455)), dec!(123.46));
    /// assert_eq!(tolerance.round(dec!(-123.455)), dec!(-123.46));
    /// ```
    pub fn round(
        &self,
        value: Decimal,
    ) -> Decimal {
        value.round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}
