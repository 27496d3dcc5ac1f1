// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fixed-point money.
//!
//! Every amount in the ledger is an integer count of currency minor units
//! (cents). Binary floating point never touches a balance. [`Decimal`] only
//! appears at the edges: rendering amounts for humans and parsing decimal
//! strings from imported files.
//!
//! # Example
//!
//! ```
//! use royalty_ledger::Amount;
//!
//! let earned = Amount::from_minor(10_000);
//! let spent = Amount::from_minor(500);
//! assert_eq!(earned.checked_sub(spent), Some(Amount::from_minor(9_500)));
//! assert_eq!(earned.to_string(), "100.00");
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed amount in currency minor units.
///
/// Entry and payment amounts are validated to be non-negative before they
/// reach the ledger; derived balances may be negative when expenses exceed
/// earnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Number of fractional digits represented by one minor unit.
    pub const MINOR_UNIT_SCALE: u32 = 2;

    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Absolute difference between two amounts, `None` on overflow.
    pub fn abs_diff(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0)?.checked_abs().map(Amount)
    }

    /// Returns the amount as a decimal with [`Self::MINOR_UNIT_SCALE`] digits.
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::MINOR_UNIT_SCALE)
    }

    /// Converts a decimal in major units (e.g. `"120.50"`) into minor units.
    ///
    /// Returns `None` when the value carries more precision than one minor
    /// unit or does not fit in an `i64`.
    pub fn from_decimal(value: Decimal) -> Option<Amount> {
        let scaled = value.checked_mul(Decimal::from(10i64.pow(Self::MINOR_UNIT_SCALE)))?;
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        i64::try_from(scaled.trunc()).ok().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn displays_with_two_fraction_digits() {
        assert_eq!(Amount::from_minor(12_000).to_string(), "120.00");
        assert_eq!(Amount::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn from_decimal_scales_to_minor_units() {
        assert_eq!(Amount::from_decimal(dec!(100.00)), Some(Amount::from_minor(10_000)));
        assert_eq!(Amount::from_decimal(dec!(25.5)), Some(Amount::from_minor(2_550)));
        assert_eq!(Amount::from_decimal(dec!(0)), Some(Amount::ZERO));
    }

    #[test]
    fn from_decimal_rejects_sub_cent_precision() {
        assert_eq!(Amount::from_decimal(dec!(1.005)), None);
    }

    #[test]
    fn from_decimal_rejects_values_beyond_i64() {
        assert_eq!(Amount::from_decimal(dec!(100000000000000000)), None);
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        assert_eq!(Amount::from_minor(i64::MAX).checked_add(Amount::from_minor(1)), None);
        assert_eq!(Amount::from_minor(i64::MIN).checked_sub(Amount::from_minor(1)), None);
        assert_eq!(
            Amount::from_minor(3).checked_sub(Amount::from_minor(5)),
            Some(Amount::from_minor(-2))
        );
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Amount::from_minor(12_000);
        let b = Amount::from_minor(11_000);
        assert_eq!(a.abs_diff(b), Some(Amount::from_minor(1_000)));
        assert_eq!(b.abs_diff(a), Some(Amount::from_minor(1_000)));
    }
}
