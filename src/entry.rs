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

//! Ledger entries.
//!
//! An entry records money owed to an artist (earnings, royalties) or
//! deducted from what they are owed (expenses). Amounts are never negative;
//! [`EntryClass::sign`] decides the direction of the contribution.
//! Entries are immutable once appended. A mistake is fixed by appending an
//! offsetting entry that names the entry it corrects.

use crate::amount::Amount;
use crate::base::{ArtistId, EntryId, ReleaseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an earning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningSource {
    Streaming,
    DigitalSale,
    Merchandise,
}

/// The kind of an entry, with the data only that kind carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    Earning {
        source: EarningSource,
        platform: String,
    },
    Royalty,
    Expense,
}

impl EntryKind {
    pub fn class(&self) -> EntryClass {
        match self {
            Self::Earning { .. } => EntryClass::Earning,
            Self::Royalty => EntryClass::Royalty,
            Self::Expense => EntryClass::Expense,
        }
    }
}

/// Revenue class of an entry, used for filtering and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryClass {
    Earning,
    Royalty,
    Expense,
}

impl EntryClass {
    /// `1` for money owed to the artist, `-1` for deductions.
    pub fn sign(self) -> i8 {
        match self {
            Self::Earning | Self::Royalty => 1,
            Self::Expense => -1,
        }
    }
}

impl fmt::Display for EntryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Earning => "earning",
            Self::Royalty => "royalty",
            Self::Expense => "expense",
        };
        f.write_str(label)
    }
}

/// Entry creation request.
///
/// ```json
/// {"artist_id": 1, "kind": "royalty", "amount": 2500, "release_id": 10,
///  "recorded_at": "2025-03-01T00:00:00Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub artist_id: ArtistId,
    #[serde(flatten)]
    pub kind: EntryKind,
    /// Minor units, must not be negative.
    pub amount: Amount,
    #[serde(default)]
    pub release_id: Option<ReleaseId>,
    #[serde(default)]
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Entry this one offsets, if it is a correction.
    #[serde(default)]
    pub corrects: Option<EntryId>,
}

/// An appended, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub artist_id: ArtistId,
    #[serde(flatten)]
    pub kind: EntryKind,
    pub amount: Amount,
    pub release_id: Option<ReleaseId>,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub corrects: Option<EntryId>,
}

impl LedgerEntry {
    pub(crate) fn from_request(id: EntryId, request: NewEntry) -> Self {
        Self {
            id,
            artist_id: request.artist_id,
            kind: request.kind,
            amount: request.amount,
            release_id: request.release_id,
            description: request.description,
            recorded_at: request.recorded_at,
            corrects: request.corrects,
        }
    }

    pub fn class(&self) -> EntryClass {
        self.kind.class()
    }
}

/// Inclusive time window on `recorded_at`. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn until(to: DateTime<Utc>) -> Self {
        Self { from: None, to: Some(to) }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}
