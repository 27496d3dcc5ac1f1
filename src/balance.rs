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

//! Balance computation.
//!
//! ```text
//! balance = Σ earnings + Σ royalties − Σ expenses − Σ completed payments
//! ```
//!
//! [`compute`] is a pure fold over entries and payments in integer minor
//! units. Any overflow aborts the computation instead of wrapping.

use crate::amount::Amount;
use crate::entry::{EntryClass, LedgerEntry};
use crate::payment::Payment;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-class totals behind a balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalanceBreakdown {
    pub earnings: Amount,
    pub royalties: Amount,
    pub expenses: Amount,
    pub paid: Amount,
    pub balance: Amount,
}

/// Derives a balance from an artist's entries and payments.
///
/// With `as_of`, only entries recorded at or before that instant and
/// payments settled at or before it are counted.
///
/// Returns `None` if any running total overflows.
pub fn compute<'a, E, P>(entries: E, payments: P, as_of: Option<DateTime<Utc>>) -> Option<BalanceBreakdown>
where
    E: IntoIterator<Item = &'a LedgerEntry>,
    P: IntoIterator<Item = &'a Payment>,
{
    let mut totals = BalanceBreakdown::default();

    for entry in entries {
        if as_of.is_some_and(|as_of| entry.recorded_at > as_of) {
            continue;
        }
        let bucket = match entry.class() {
            EntryClass::Earning => &mut totals.earnings,
            EntryClass::Royalty => &mut totals.royalties,
            EntryClass::Expense => &mut totals.expenses,
        };
        *bucket = bucket.checked_add(entry.amount)?;
    }

    for payment in payments {
        if payment.debits_at(as_of) {
            totals.paid = totals.paid.checked_add(payment.amount)?;
        }
    }

    totals.balance = totals
        .earnings
        .checked_add(totals.royalties)?
        .checked_sub(totals.expenses)?
        .checked_sub(totals.paid)?;
    Some(totals)
}
