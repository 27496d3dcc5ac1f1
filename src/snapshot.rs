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

//! Cached balances.
//!
//! A [`BalanceSnapshot`] is a denormalized copy of an artist's balance kept
//! for cheap display. It is never authoritative: appends and payments drop
//! it, and the reconciliation job compares it against a fresh computation.

use crate::amount::Amount;
use crate::base::ArtistId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub artist_id: ArtistId,
    pub balance: Amount,
    pub computed_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn new(artist_id: ArtistId, balance: Amount, computed_at: DateTime<Utc>) -> Self {
        Self {
            artist_id,
            balance,
            computed_at,
        }
    }
}

/// Result of comparing a snapshot with a freshly derived balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotCheck {
    /// Cached value matches within tolerance.
    Consistent { balance: Amount },
    /// No snapshot was cached; nothing to compare against.
    Missing { computed: Amount },
    /// Cached value drifted from the derived one.
    Diverged { cached: Amount, computed: Amount },
}

impl SnapshotCheck {
    /// Compares `cached` with `computed`.
    ///
    /// A difference too large to represent counts as divergence.
    pub fn compare(cached: Option<Amount>, computed: Amount, tolerance: Amount) -> Self {
        match cached {
            None => Self::Missing { computed },
            Some(cached) => match cached.abs_diff(computed) {
                Some(diff) if diff <= tolerance => Self::Consistent { balance: computed },
                _ => Self::Diverged { cached, computed },
            },
        }
    }
}
