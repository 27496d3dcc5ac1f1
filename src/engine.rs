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

//! Ledger engine.
//!
//! The [`Ledger`] is the only writer of ledger entries and payments. It
//! validates requests against the [`Roster`], routes them to the artist's
//! [`ArtistAccount`] and exposes balances.
//!
//! # Operations
//!
//! - **Append**: validate and store an earning, royalty or expense entry.
//! - **Balance**: derive the balance from entries and completed payments.
//! - **Request payment**: open a pending payment against the balance.
//! - **Dispatch**: hand a pending payment to the payout gateway.
//! - **Settle**: complete or fail a pending payment from an external status poll.
//!
//! # Thread Safety
//!
//! Accounts live in a [`DashMap`] behind `Arc`s. Every operation clones the
//! account handle out of the map before locking the account, so the map
//! shard is never held while the per-artist lock is. Operations on
//! different artists proceed in parallel.

use crate::account::ArtistAccount;
use crate::amount::Amount;
use crate::balance::BalanceBreakdown;
use crate::base::{ArtistId, EntryId, PaymentId};
use crate::config::LedgerConfig;
use crate::entry::{DateRange, EntryClass, EntryKind, LedgerEntry, NewEntry};
use crate::error::{GatewayError, LedgerError, ValidationError};
use crate::gateway::{self, PayoutGateway, PayoutInstruction};
use crate::journal::EntryJournal;
use crate::payment::{Payment, PaymentRequest, PaymentStatus};
use crate::roster::Roster;
use crate::snapshot::{BalanceSnapshot, SnapshotCheck};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// What happened when a pending payment was handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Gateway confirmed; the payment is completed.
    Completed(Payment),
    /// Gateway refused; the payment is failed and kept on record.
    Failed(Payment),
    /// No definite answer; the payment stays pending until settled
    /// externally.
    Unresolved { payment: Payment, reason: GatewayError },
}

/// Artist balance and royalty ledger.
///
/// # Invariants
///
/// - Entry amounts are never negative.
/// - Entries are never mutated or removed.
/// - At most one payment per artist is `Pending`.
/// - A payment is only opened when its amount does not exceed the balance.
pub struct Ledger {
    roster: Roster,
    accounts: DashMap<ArtistId, Arc<ArtistAccount>>,
    journal: EntryJournal,
    /// Artist of each payment, for lookups by payment id.
    payment_owners: DashMap<PaymentId, ArtistId>,
    next_payment_id: AtomicU64,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Ledger {
            roster: Roster::new(),
            accounts: DashMap::new(),
            journal: EntryJournal::new(),
            payment_owners: DashMap::new(),
            next_payment_id: AtomicU64::new(0),
            config,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn account(&self, artist_id: ArtistId) -> Option<Arc<ArtistAccount>> {
        self.accounts.get(&artist_id).map(|account| Arc::clone(&account))
    }

    fn account_or_create(&self, artist_id: ArtistId) -> Arc<ArtistAccount> {
        let account = self
            .accounts
            .entry(artist_id)
            .or_insert_with(|| Arc::new(ArtistAccount::new(artist_id)));
        Arc::clone(&account)
    }

    fn ensure_artist(&self, artist_id: ArtistId) -> Result<(), ValidationError> {
        if self.roster.contains_artist(artist_id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownArtist(artist_id))
        }
    }

    fn validate_entry(&self, entry: &NewEntry) -> Result<(), ValidationError> {
        if entry.amount.is_negative() {
            return Err(ValidationError::NegativeAmount(entry.amount));
        }
        self.ensure_artist(entry.artist_id)?;
        if let Some(release) = entry.release_id {
            self.roster.ensure_credited(release, entry.artist_id)?;
        }
        if let EntryKind::Earning { platform, .. } = &entry.kind {
            if platform.trim().is_empty() {
                return Err(ValidationError::EmptyField("platform"));
            }
        }
        if let Some(corrected) = entry.corrects {
            // Entries are never removed, so this check cannot go stale.
            let owned = self
                .journal
                .get(corrected)
                .is_some_and(|original| original.artist_id == entry.artist_id);
            if !owned {
                return Err(ValidationError::UnknownCorrectedEntry(corrected));
            }
        }
        Ok(())
    }

    /// Appends a ledger entry.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NegativeAmount`] - amount below zero.
    /// - [`ValidationError::UnknownArtist`] - artist is not on the roster.
    /// - [`ValidationError::UnknownRelease`] / [`ValidationError::ReleaseNotCredited`] -
    ///   the referenced release does not exist or is not the artist's.
    /// - [`ValidationError::EmptyField`] - earning without a platform.
    /// - [`ValidationError::UnknownCorrectedEntry`] - correction of a foreign or missing entry.
    pub fn append(&self, entry: NewEntry) -> Result<EntryId, LedgerError> {
        self.validate_entry(&entry)?;
        let account = self.account_or_create(entry.artist_id);
        let stored = account.append(&self.journal, entry);
        debug!(
            artist = %stored.artist_id,
            entry = %stored.id,
            class = %stored.class(),
            amount = %stored.amount,
            "ledger entry appended"
        );
        Ok(stored.id)
    }

    /// Lists an artist's entries in insertion order.
    pub fn list_for(
        &self,
        artist_id: ArtistId,
        class: Option<EntryClass>,
        range: Option<DateRange>,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        self.ensure_artist(artist_id)?;
        Ok(self
            .account(artist_id)
            .map(|account| account.entries(class, range))
            .unwrap_or_default())
    }

    pub fn entry(&self, id: EntryId) -> Option<Arc<LedgerEntry>> {
        self.journal.get(id)
    }

    pub fn entry_count(&self, artist_id: ArtistId) -> usize {
        self.account(artist_id)
            .map(|account| account.entry_count())
            .unwrap_or(0)
    }

    /// Total number of entries across all artists.
    pub fn total_entries(&self) -> usize {
        self.journal.len()
    }

    /// Every entry id in journaling order.
    pub fn journal_ids(&self) -> Vec<EntryId> {
        self.journal.ids()
    }

    /// Artists with at least one ledger entry, in id order.
    pub fn artists_with_entries(&self) -> Vec<ArtistId> {
        self.accounts()
            .iter()
            .filter(|account| account.entry_count() > 0)
            .map(|account| account.artist_id())
            .collect()
    }

    /// Derives an artist's balance, optionally as of a past instant.
    ///
    /// Pure over the current store contents: two calls with no write in
    /// between return the same amount.
    pub fn compute_balance(
        &self,
        artist_id: ArtistId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Amount, LedgerError> {
        Ok(self.breakdown(artist_id, as_of)?.balance)
    }

    /// Balance with its per-class totals.
    pub fn breakdown(
        &self,
        artist_id: ArtistId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<BalanceBreakdown, LedgerError> {
        self.ensure_artist(artist_id)?;
        match self.account(artist_id) {
            Some(account) => account.breakdown(as_of),
            None => Ok(BalanceBreakdown::default()),
        }
    }

    /// Display balance, served from the snapshot when one is cached.
    pub fn balance(&self, artist_id: ArtistId) -> Result<Amount, LedgerError> {
        self.ensure_artist(artist_id)?;
        self.account_or_create(artist_id).cached_balance(Utc::now())
    }

    /// Opens a pending payment.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NonPositivePayment`] - amount is zero or negative.
    /// - [`ValidationError::UnknownArtist`] - artist is not on the roster.
    /// - [`ValidationError::UnknownPaymentMethod`] / [`ValidationError::PaymentMethodNotOwned`] -
    ///   method missing or registered to another artist.
    /// - [`LedgerError::PaymentInProgress`] - the artist already has a pending payment.
    /// - [`LedgerError::InsufficientFunds`] - amount exceeds the computed balance.
    pub fn request_payment(&self, request: PaymentRequest) -> Result<PaymentId, LedgerError> {
        if request.amount <= Amount::ZERO {
            return Err(ValidationError::NonPositivePayment(request.amount).into());
        }
        self.ensure_artist(request.artist_id)?;
        self.roster
            .payment_method_for(request.artist_id, request.method_id)?;

        let account = self.account_or_create(request.artist_id);
        let payment = account
            .open_payment(
                request,
                || PaymentId(self.next_payment_id.fetch_add(1, Ordering::Relaxed) + 1),
                Utc::now(),
            )
            .inspect_err(|error| {
                info!(artist = %request.artist_id, amount = %request.amount, %error, "payment refused");
            })?;
        self.payment_owners.insert(payment.id, payment.artist_id);

        info!(
            artist = %payment.artist_id,
            payment = %payment.id,
            amount = %payment.amount,
            "payment pending"
        );
        Ok(payment.id)
    }

    pub fn payment(&self, id: PaymentId) -> Option<Payment> {
        let artist_id = *self.payment_owners.get(&id)?;
        self.account(artist_id)?.payment(id)
    }

    pub fn payments_for(&self, artist_id: ArtistId) -> Vec<Payment> {
        self.account(artist_id)
            .map(|account| account.payments())
            .unwrap_or_default()
    }

    pub fn pending_payment(&self, artist_id: ArtistId) -> Option<PaymentId> {
        self.account(artist_id)?.pending_payment()
    }

    fn payment_account(&self, id: PaymentId) -> Result<Arc<ArtistAccount>, LedgerError> {
        let artist_id = *self
            .payment_owners
            .get(&id)
            .ok_or(LedgerError::PaymentNotFound(id))?;
        self.account(artist_id).ok_or(LedgerError::PaymentNotFound(id))
    }

    /// Marks a pending payment as paid out.
    pub fn complete_payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        let payment = self
            .payment_account(id)?
            .settle(id, PaymentStatus::Completed, None, Utc::now())?;
        info!(artist = %payment.artist_id, payment = %id, amount = %payment.amount, "payment completed");
        Ok(payment)
    }

    /// Marks a pending payment as failed. The record is kept.
    pub fn fail_payment(&self, id: PaymentId, reason: impl Into<String>) -> Result<Payment, LedgerError> {
        let reason = reason.into();
        let payment = self.payment_account(id)?.settle(
            id,
            PaymentStatus::Failed,
            Some(reason.clone()),
            Utc::now(),
        )?;
        warn!(artist = %payment.artist_id, payment = %id, %reason, "payment failed");
        Ok(payment)
    }

    /// Hands a pending payment to the payout gateway and settles it from
    /// the answer.
    ///
    /// A payment is handed to the gateway at most once. The handoff is
    /// claimed under the artist's lock before the gateway is called, and any
    /// later dispatch gets [`LedgerError::PaymentAlreadyDispatched`].
    ///
    /// A timeout or lost gateway leaves the payment pending and is reported
    /// as [`DispatchOutcome::Unresolved`], not as an error: the payment
    /// record exists and an external status poll settles it later through
    /// [`Ledger::complete_payment`] or [`Ledger::fail_payment`].
    pub fn dispatch_payment(
        &self,
        id: PaymentId,
        gateway: Arc<dyn PayoutGateway>,
    ) -> Result<DispatchOutcome, LedgerError> {
        let account = self.payment_account(id)?;
        let Some(pending) = account.payment(id) else {
            return Err(LedgerError::PaymentNotFound(id));
        };
        let method = self
            .roster
            .payment_method_for(pending.artist_id, pending.method_id)?;
        let payment = account.begin_dispatch(id, Utc::now())?;
        let instruction = PayoutInstruction {
            payment_id: id,
            artist_id: payment.artist_id,
            amount: payment.amount,
            method,
        };

        match gateway::submit_with_timeout(gateway, instruction, self.config.payments.gateway_timeout()) {
            Ok(()) => self.complete_payment(id).map(DispatchOutcome::Completed),
            Err(GatewayError::Rejected(reason)) => {
                self.fail_payment(id, reason).map(DispatchOutcome::Failed)
            }
            Err(reason) => {
                warn!(artist = %payment.artist_id, payment = %id, %reason, "payout unresolved, payment left pending");
                Ok(DispatchOutcome::Unresolved { payment, reason })
            }
        }
    }

    pub fn snapshot(&self, artist_id: ArtistId) -> Option<BalanceSnapshot> {
        self.account(artist_id)?.snapshot()
    }

    /// Installs a cached balance read from persistent storage.
    pub fn load_snapshot(&self, snapshot: BalanceSnapshot) -> Result<(), LedgerError> {
        self.ensure_artist(snapshot.artist_id)?;
        self.account_or_create(snapshot.artist_id)
            .load_snapshot(snapshot);
        Ok(())
    }

    /// Compares an artist's cached balance with a fresh derivation.
    pub fn check_snapshot(&self, artist_id: ArtistId, tolerance: Amount) -> Result<SnapshotCheck, LedgerError> {
        self.ensure_artist(artist_id)?;
        self.account_or_create(artist_id).check_snapshot(tolerance)
    }

    /// Rewrites an artist's cached balance from a fresh derivation.
    pub fn refresh_snapshot(&self, artist_id: ArtistId) -> Result<BalanceSnapshot, LedgerError> {
        self.ensure_artist(artist_id)?;
        self.account_or_create(artist_id)
            .refresh_snapshot(Utc::now())
    }

    /// Handles to every account with ledger activity, in artist id order.
    pub fn accounts(&self) -> Vec<Arc<ArtistAccount>> {
        let mut accounts: Vec<(ArtistId, Arc<ArtistAccount>)> = self
            .accounts
            .iter()
            .map(|account| (*account.key(), Arc::clone(account.value())))
            .collect();
        accounts.sort_unstable_by_key(|(artist_id, _)| *artist_id);
        accounts.into_iter().map(|(_, account)| account).collect()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
