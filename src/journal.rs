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

//! Global entry journal.
//!
//! Allocates entry ids and indexes every appended entry by id, so an entry
//! can be found without knowing its artist (corrections, audits). The
//! journal only grows.

use crate::base::EntryId;
use crate::entry::LedgerEntry;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe, append-only index of ledger entries.
///
/// Combines a [`DashMap`] for O(1) lookup and duplicate detection with an
/// id log recording the order entries were journaled in.
#[derive(Debug, Default)]
pub struct EntryJournal {
    entries: DashMap<EntryId, Arc<LedgerEntry>>,
    order: RwLock<Vec<EntryId>>,
    next_id: AtomicU64,
}

impl EntryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next entry id. Ids start at 1 and are never reused.
    pub fn allocate_id(&self) -> EntryId {
        EntryId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Records an appended entry.
    ///
    /// Returns `false` and leaves the journal untouched if the id is
    /// already present.
    pub fn record(&self, entry: Arc<LedgerEntry>) -> bool {
        let mut order = self.order.write();
        match self.entries.entry(entry.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                order.push(entry.id);
                slot.insert(entry);
                true
            }
        }
    }

    pub fn get(&self, id: EntryId) -> Option<Arc<LedgerEntry>> {
        self.entries.get(&id).map(|entry| Arc::clone(&entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ids in journaling order.
    pub fn ids(&self) -> Vec<EntryId> {
        self.order.read().clone()
    }
}
