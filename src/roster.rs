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

//! Artists, releases and payout methods.
//!
//! The ledger never owns catalog data; it only asks the roster whether an
//! artist exists, whether a release is credited to an artist, and which
//! payment method a payout targets.
//!
//! Release pipeline:
//!
//! ```text
//! Draft ──submit──► ForSubmission ──queue──► Pending ──publish──► Live ──takedown──► TakenDown
//!   ▲                    │                     │
//!   └──────return────────┴───────reject────────┘
//! ```

use crate::base::{ArtistId, BrandId, PaymentMethodId, ReleaseId};
use crate::error::{LedgerError, ValidationError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub brand: BrandId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Draft,
    ForSubmission,
    Pending,
    Live,
    TakenDown,
}

impl ReleaseStatus {
    /// Exhaustive transition table for the submission pipeline.
    pub fn can_transition_to(self, next: ReleaseStatus) -> bool {
        use ReleaseStatus::*;
        matches!(
            (self, next),
            (Draft, ForSubmission)
                | (ForSubmission, Draft)
                | (ForSubmission, Pending)
                | (Pending, Draft)
                | (Pending, Live)
                | (Live, TakenDown)
        )
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::ForSubmission => "for submission",
            Self::Pending => "pending",
            Self::Live => "live",
            Self::TakenDown => "taken down",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub catalog_number: String,
    pub title: String,
    pub status: ReleaseStatus,
    pub primary_artist: ArtistId,
    /// Featured artists that may also book entries against this release.
    #[serde(default)]
    pub collaborators: Vec<ArtistId>,
}

impl Release {
    pub fn credits(&self, artist: ArtistId) -> bool {
        self.primary_artist == artist || self.collaborators.contains(&artist)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub artist_id: ArtistId,
    pub bank_code: String,
    pub bank_name: String,
    pub account_reference: String,
    pub is_default: bool,
}

/// Payout method details supplied when an artist registers a bank account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentMethod {
    pub bank_code: String,
    pub bank_name: String,
    pub account_reference: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Concurrent registry of artists, releases and payment methods.
#[derive(Debug, Default)]
pub struct Roster {
    artists: DashMap<ArtistId, Artist>,
    releases: DashMap<ReleaseId, Release>,
    /// `(brand, catalog number)` → release, for per-tenant uniqueness.
    catalog: DashMap<(BrandId, String), ReleaseId>,
    /// Methods grouped per artist so the default flag flips atomically.
    methods: DashMap<ArtistId, Vec<PaymentMethod>>,
    method_owners: DashMap<PaymentMethodId, ArtistId>,
    next_method_id: AtomicU32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_artist(&self, artist: Artist) -> Result<(), LedgerError> {
        if artist.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("artist name").into());
        }
        match self.artists.entry(artist.id) {
            Entry::Occupied(_) => Err(ValidationError::DuplicateArtist(artist.id).into()),
            Entry::Vacant(slot) => {
                slot.insert(artist);
                Ok(())
            }
        }
    }

    pub fn artist(&self, id: ArtistId) -> Option<Artist> {
        self.artists.get(&id).map(|artist| artist.clone())
    }

    pub fn contains_artist(&self, id: ArtistId) -> bool {
        self.artists.contains_key(&id)
    }

    /// Adds a release to the catalog.
    ///
    /// The primary artist and every collaborator must exist. The catalog
    /// number is claimed under the primary artist's brand.
    pub fn register_release(&self, release: Release) -> Result<(), LedgerError> {
        if release.catalog_number.trim().is_empty() {
            return Err(ValidationError::EmptyField("catalog number").into());
        }
        let brand = self
            .artist(release.primary_artist)
            .ok_or(ValidationError::UnknownArtist(release.primary_artist))?
            .brand;
        if let Some(missing) = release
            .collaborators
            .iter()
            .find(|id| !self.contains_artist(**id))
        {
            return Err(ValidationError::UnknownArtist(*missing).into());
        }
        // The release id is held while the catalog number is claimed, so
        // neither map ever records a registration the other refused.
        let release_slot = match self.releases.entry(release.id) {
            Entry::Occupied(_) => return Err(ValidationError::DuplicateRelease(release.id).into()),
            Entry::Vacant(slot) => slot,
        };
        match self.catalog.entry((brand, release.catalog_number.clone())) {
            Entry::Occupied(_) => {
                Err(ValidationError::DuplicateCatalogNumber(release.catalog_number).into())
            }
            Entry::Vacant(catalog_slot) => {
                catalog_slot.insert(release.id);
                release_slot.insert(release);
                Ok(())
            }
        }
    }

    pub fn release(&self, id: ReleaseId) -> Option<Release> {
        self.releases.get(&id).map(|release| release.clone())
    }

    /// Moves a release along its pipeline.
    pub fn transition_release(
        &self,
        id: ReleaseId,
        next: ReleaseStatus,
    ) -> Result<Release, LedgerError> {
        let mut release = self
            .releases
            .get_mut(&id)
            .ok_or(ValidationError::UnknownRelease(id))?;
        if !release.status.can_transition_to(next) {
            return Err(LedgerError::InvalidReleaseTransition {
                from: release.status,
                to: next,
            });
        }
        release.status = next;
        Ok(release.clone())
    }

    /// Checks that `release` exists and is credited to `artist`.
    pub fn ensure_credited(&self, release: ReleaseId, artist: ArtistId) -> Result<(), ValidationError> {
        let found = self
            .releases
            .get(&release)
            .ok_or(ValidationError::UnknownRelease(release))?;
        if !found.credits(artist) {
            return Err(ValidationError::ReleaseNotCredited { release, artist });
        }
        Ok(())
    }

    /// Registers a payout method for an artist.
    ///
    /// An artist's first method becomes the default. Registering a method
    /// with `is_default` clears the flag on every other method of the artist.
    pub fn add_payment_method(
        &self,
        artist_id: ArtistId,
        method: NewPaymentMethod,
    ) -> Result<PaymentMethod, LedgerError> {
        if !self.contains_artist(artist_id) {
            return Err(ValidationError::UnknownArtist(artist_id).into());
        }
        if method.bank_code.trim().is_empty() {
            return Err(ValidationError::EmptyField("bank code").into());
        }
        if method.account_reference.trim().is_empty() {
            return Err(ValidationError::EmptyField("account reference").into());
        }

        let id = PaymentMethodId(self.next_method_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut methods = self.methods.entry(artist_id).or_default();
        let is_default = method.is_default || methods.is_empty();
        if is_default {
            methods.iter_mut().for_each(|existing| existing.is_default = false);
        }
        let created = PaymentMethod {
            id,
            artist_id,
            bank_code: method.bank_code,
            bank_name: method.bank_name,
            account_reference: method.account_reference,
            is_default,
        };
        methods.push(created.clone());
        self.method_owners.insert(id, artist_id);
        Ok(created)
    }

    /// Makes `method` the artist's only default payout method.
    pub fn set_default_payment_method(
        &self,
        artist_id: ArtistId,
        method: PaymentMethodId,
    ) -> Result<(), LedgerError> {
        self.payment_method_for(artist_id, method)?;
        if let Some(mut methods) = self.methods.get_mut(&artist_id) {
            methods
                .iter_mut()
                .for_each(|existing| existing.is_default = existing.id == method);
        }
        Ok(())
    }

    /// Looks up a method and checks it belongs to `artist_id`.
    pub fn payment_method_for(
        &self,
        artist_id: ArtistId,
        method: PaymentMethodId,
    ) -> Result<PaymentMethod, ValidationError> {
        let owner = *self
            .method_owners
            .get(&method)
            .ok_or(ValidationError::UnknownPaymentMethod(method))?;
        if owner != artist_id {
            return Err(ValidationError::PaymentMethodNotOwned {
                method,
                artist: artist_id,
            });
        }
        self.methods
            .get(&artist_id)
            .and_then(|methods| methods.iter().find(|m| m.id == method).cloned())
            .ok_or(ValidationError::UnknownPaymentMethod(method))
    }

    pub fn payment_methods(&self, artist_id: ArtistId) -> Vec<PaymentMethod> {
        self.methods
            .get(&artist_id)
            .map(|methods| methods.clone())
            .unwrap_or_default()
    }

    pub fn default_payment_method(&self, artist_id: ArtistId) -> Option<PaymentMethod> {
        self.methods
            .get(&artist_id)
            .and_then(|methods| methods.iter().find(|m| m.is_default).cloned())
    }
}
