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

//! Per-artist ledger accounts.
//!
//! Each artist's entries, payments, pending-payment marker and cached
//! balance live behind one mutex. That mutex is the artist's serialization
//! point: "check balance, then open a payment" and "append, then drop the
//! snapshot" each happen under a single lock acquisition, so no reader sees
//! a half-applied write and no two payouts can be authorized against the
//! same balance.
//!
//! ```text
//!  append ──► entries += entry, snapshot = None
//!  open_payment ──► (no pending) ∧ (amount ≤ balance) ──► payments += Pending, pending = id
//!  begin_dispatch ──► Pending ∧ not yet dispatched ──► dispatched_at = now
//!  settle ──► Pending → Completed | Failed, pending = None, snapshot = None
//! ```

use crate::amount::Amount;
use crate::balance::{self, BalanceBreakdown};
use crate::base::{ArtistId, PaymentId};
use crate::entry::{DateRange, EntryClass, LedgerEntry, NewEntry};
use crate::error::LedgerError;
use crate::journal::EntryJournal;
use crate::payment::{Payment, PaymentRequest, PaymentStatus};
use crate::snapshot::{BalanceSnapshot, SnapshotCheck};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::ser::{Error as _, Serialize, SerializeStruct, Serializer};
use std::sync::Arc;

#[derive(Debug)]
struct AccountBook {
    artist_id: ArtistId,
    entries: Vec<Arc<LedgerEntry>>,
    payments: Vec<Payment>,
    pending: Option<PaymentId>,
    snapshot: Option<BalanceSnapshot>,
}

impl AccountBook {
    fn new(artist_id: ArtistId) -> Self {
        Self {
            artist_id,
            entries: Vec::new(),
            payments: Vec::new(),
            pending: None,
            snapshot: None,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.entries.iter().all(|entry| !entry.amount.is_negative()),
            "Invariant violated: negative entry amount for artist {}",
            self.artist_id
        );
        debug_assert!(
            self.payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Pending)
                .count()
                <= 1,
            "Invariant violated: more than one pending payment for artist {}",
            self.artist_id
        );
        debug_assert_eq!(
            self.pending,
            self.payments
                .iter()
                .find(|p| p.status == PaymentStatus::Pending)
                .map(|p| p.id),
            "Invariant violated: pending marker out of sync for artist {}",
            self.artist_id
        );
    }

    fn breakdown(&self, as_of: Option<DateTime<Utc>>) -> Result<BalanceBreakdown, LedgerError> {
        balance::compute(self.entries.iter().map(Arc::as_ref), &self.payments, as_of)
            .ok_or(LedgerError::BalanceOverflow(self.artist_id))
    }

    fn balance(&self) -> Result<Amount, LedgerError> {
        Ok(self.breakdown(None)?.balance)
    }

    /// Creates a pending payment if none is in flight and funds suffice.
    fn open_payment(&mut self, payment: Payment) -> Result<(), LedgerError> {
        if let Some(pending) = self.pending {
            return Err(LedgerError::PaymentInProgress(pending));
        }
        let available = self.balance()?;
        if payment.amount > available {
            return Err(LedgerError::InsufficientFunds {
                requested: payment.amount,
                available,
            });
        }
        self.pending = Some(payment.id);
        self.payments.push(payment);
        self.snapshot = None;
        self.assert_invariants();
        Ok(())
    }

    /// Claims the single gateway handoff for a pending payment.
    fn begin_dispatch(&mut self, id: PaymentId, now: DateTime<Utc>) -> Result<Payment, LedgerError> {
        let payment = self
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(LedgerError::PaymentNotFound(id))?;
        if payment.status != PaymentStatus::Pending {
            return Err(LedgerError::InvalidPaymentTransition {
                from: payment.status,
                to: PaymentStatus::Completed,
            });
        }
        if payment.dispatched_at.is_some() {
            return Err(LedgerError::PaymentAlreadyDispatched(id));
        }
        payment.dispatched_at = Some(now);
        Ok(payment.clone())
    }

    /// Moves a pending payment to a terminal status.
    fn settle(
        &mut self,
        id: PaymentId,
        next: PaymentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Payment, LedgerError> {
        let payment = self
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(LedgerError::PaymentNotFound(id))?;
        if !payment.status.can_transition_to(next) {
            return Err(LedgerError::InvalidPaymentTransition {
                from: payment.status,
                to: next,
            });
        }
        payment.status = next;
        payment.settled_at = Some(now);
        payment.failure_reason = reason;
        let settled = payment.clone();

        self.pending = None;
        self.snapshot = None;
        self.assert_invariants();
        Ok(settled)
    }
}

/// One artist's ledger: entries, payments and cached balance.
#[derive(Debug)]
pub struct ArtistAccount {
    inner: Mutex<AccountBook>,
}

impl ArtistAccount {
    pub fn new(artist_id: ArtistId) -> Self {
        Self {
            inner: Mutex::new(AccountBook::new(artist_id)),
        }
    }

    pub fn artist_id(&self) -> ArtistId {
        self.inner.lock().artist_id
    }

    /// Appends a validated entry and drops the cached balance.
    ///
    /// The id is allocated under the account lock, so an artist's entries
    /// are stored in id order.
    pub(crate) fn append(&self, journal: &EntryJournal, request: NewEntry) -> Arc<LedgerEntry> {
        let mut book = self.inner.lock();
        let entry = Arc::new(LedgerEntry::from_request(journal.allocate_id(), request));
        journal.record(Arc::clone(&entry));
        book.entries.push(Arc::clone(&entry));
        book.snapshot = None;
        book.assert_invariants();
        entry
    }

    /// Entries in insertion order, optionally filtered.
    pub fn entries(&self, class: Option<EntryClass>, range: Option<DateRange>) -> Vec<Arc<LedgerEntry>> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| class.is_none_or(|class| entry.class() == class))
            .filter(|entry| range.is_none_or(|range| range.contains(entry.recorded_at)))
            .cloned()
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn breakdown(&self, as_of: Option<DateTime<Utc>>) -> Result<BalanceBreakdown, LedgerError> {
        self.inner.lock().breakdown(as_of)
    }

    pub fn balance(&self, as_of: Option<DateTime<Utc>>) -> Result<Amount, LedgerError> {
        Ok(self.breakdown(as_of)?.balance)
    }

    /// Serves the cached balance, computing and caching it on a miss.
    pub fn cached_balance(&self, now: DateTime<Utc>) -> Result<Amount, LedgerError> {
        let mut book = self.inner.lock();
        if let Some(snapshot) = book.snapshot {
            return Ok(snapshot.balance);
        }
        let balance = book.balance()?;
        book.snapshot = Some(BalanceSnapshot::new(book.artist_id, balance, now));
        Ok(balance)
    }

    pub(crate) fn open_payment(
        &self,
        request: PaymentRequest,
        allocate_id: impl FnOnce() -> PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Payment, LedgerError> {
        let mut book = self.inner.lock();
        // Reject before allocating so refused requests burn no ids.
        if let Some(pending) = book.pending {
            return Err(LedgerError::PaymentInProgress(pending));
        }
        let payment = Payment::pending(allocate_id(), request, now);
        book.open_payment(payment.clone())?;
        Ok(payment)
    }

    /// Marks a pending payment as handed to the payout gateway.
    ///
    /// Succeeds once per payment. Later calls get
    /// [`LedgerError::PaymentAlreadyDispatched`] while it stays pending.
    pub(crate) fn begin_dispatch(&self, id: PaymentId, now: DateTime<Utc>) -> Result<Payment, LedgerError> {
        self.inner.lock().begin_dispatch(id, now)
    }

    pub(crate) fn settle(
        &self,
        id: PaymentId,
        next: PaymentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Payment, LedgerError> {
        self.inner.lock().settle(id, next, reason, now)
    }

    pub fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.inner.lock().payments.iter().find(|p| p.id == id).cloned()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.inner.lock().payments.clone()
    }

    pub fn pending_payment(&self) -> Option<PaymentId> {
        self.inner.lock().pending
    }

    pub fn snapshot(&self) -> Option<BalanceSnapshot> {
        self.inner.lock().snapshot
    }

    /// Replaces the cached balance with a persisted one.
    pub(crate) fn load_snapshot(&self, snapshot: BalanceSnapshot) {
        self.inner.lock().snapshot = Some(snapshot);
    }

    /// Recomputes the balance and compares it with the cached one.
    pub(crate) fn check_snapshot(&self, tolerance: Amount) -> Result<SnapshotCheck, LedgerError> {
        let book = self.inner.lock();
        let computed = book.balance()?;
        Ok(SnapshotCheck::compare(
            book.snapshot.map(|snapshot| snapshot.balance),
            computed,
            tolerance,
        ))
    }

    /// Rewrites the cached balance from a fresh computation.
    pub(crate) fn refresh_snapshot(&self, now: DateTime<Utc>) -> Result<BalanceSnapshot, LedgerError> {
        let mut book = self.inner.lock();
        let snapshot = BalanceSnapshot::new(book.artist_id, book.balance()?, now);
        book.snapshot = Some(snapshot);
        Ok(snapshot)
    }
}

/// Serializes an account as a statement row with decimal amounts.
impl Serialize for ArtistAccount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let book = self.inner.lock();
        let totals = book.breakdown(None).map_err(S::Error::custom)?;
        let mut state = serializer.serialize_struct("ArtistAccount", 7)?;
        state.serialize_field("artist", &book.artist_id)?;
        state.serialize_field("earnings", &totals.earnings.to_decimal())?;
        state.serialize_field("royalties", &totals.royalties.to_decimal())?;
        state.serialize_field("expenses", &totals.expenses.to_decimal())?;
        state.serialize_field("paid", &totals.paid.to_decimal())?;
        state.serialize_field("balance", &totals.balance.to_decimal())?;
        state.serialize_field("pending_payment", &book.pending)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::PaymentMethodId;
    use crate::entry::EntryKind;

    fn royalty(minor: i64) -> NewEntry {
        NewEntry {
            artist_id: ArtistId(1),
            kind: EntryKind::Royalty,
            amount: Amount::from_minor(minor),
            release_id: None,
            description: None,
            recorded_at: Utc::now(),
            corrects: None,
        }
    }

    fn request(minor: i64) -> PaymentRequest {
        PaymentRequest {
            artist_id: ArtistId(1),
            method_id: PaymentMethodId(1),
            amount: Amount::from_minor(minor),
        }
    }

    // === AccountBook Internal Tests ===

    #[test]
    fn open_payment_sets_pending_marker() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));

        let payment = account
            .open_payment(request(400), || PaymentId(1), Utc::now())
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(account.pending_payment(), Some(PaymentId(1)));
    }

    #[test]
    fn second_pending_payment_rejected_without_allocating() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));
        account
            .open_payment(request(400), || PaymentId(1), Utc::now())
            .unwrap();

        let result = account.open_payment(
            request(100),
            || panic!("id must not be allocated for a refused payment"),
            Utc::now(),
        );
        assert_eq!(result, Err(LedgerError::PaymentInProgress(PaymentId(1))));
    }

    #[test]
    fn insufficient_funds_leaves_no_payment() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));

        let result = account.open_payment(request(1_001), || PaymentId(1), Utc::now());
        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                requested: Amount::from_minor(1_001),
                available: Amount::from_minor(1_000),
            })
        );
        assert!(account.payments().is_empty());
        assert_eq!(account.pending_payment(), None);
    }

    #[test]
    fn settle_clears_pending_and_rejects_second_settlement() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));
        account
            .open_payment(request(400), || PaymentId(1), Utc::now())
            .unwrap();

        let settled = account
            .settle(PaymentId(1), PaymentStatus::Completed, None, Utc::now())
            .unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
        assert!(settled.settled_at.is_some());
        assert_eq!(account.pending_payment(), None);
        assert_eq!(account.balance(None).unwrap(), Amount::from_minor(600));

        let again = account.settle(PaymentId(1), PaymentStatus::Failed, None, Utc::now());
        assert_eq!(
            again,
            Err(LedgerError::InvalidPaymentTransition {
                from: PaymentStatus::Completed,
                to: PaymentStatus::Failed,
            })
        );
    }

    #[test]
    fn dispatch_is_claimed_once_and_settles_normally() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));
        account
            .open_payment(request(400), || PaymentId(1), Utc::now())
            .unwrap();

        let claimed = account.begin_dispatch(PaymentId(1), Utc::now()).unwrap();
        assert!(claimed.dispatched_at.is_some());
        assert_eq!(claimed.status, PaymentStatus::Pending);
        assert_eq!(
            account.begin_dispatch(PaymentId(1), Utc::now()),
            Err(LedgerError::PaymentAlreadyDispatched(PaymentId(1)))
        );
        assert_eq!(
            account.begin_dispatch(PaymentId(2), Utc::now()),
            Err(LedgerError::PaymentNotFound(PaymentId(2)))
        );

        account
            .settle(PaymentId(1), PaymentStatus::Completed, None, Utc::now())
            .unwrap();
        assert_eq!(
            account.begin_dispatch(PaymentId(1), Utc::now()),
            Err(LedgerError::InvalidPaymentTransition {
                from: PaymentStatus::Completed,
                to: PaymentStatus::Completed,
            })
        );
    }

    #[test]
    fn append_drops_cached_balance() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));
        assert_eq!(account.cached_balance(Utc::now()).unwrap(), Amount::from_minor(1_000));
        assert!(account.snapshot().is_some());

        account.append(&journal, royalty(500));
        assert!(account.snapshot().is_none());
        assert_eq!(account.cached_balance(Utc::now()).unwrap(), Amount::from_minor(1_500));
    }

    #[test]
    fn entries_filter_by_class() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(1));
        account.append(&journal, royalty(1_000));
        let mut expense = royalty(200);
        expense.kind = EntryKind::Expense;
        account.append(&journal, expense);

        assert_eq!(account.entries(None, None).len(), 2);
        let expenses = account.entries(Some(EntryClass::Expense), None);
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].amount, Amount::from_minor(200));
    }

    // === Serialization Tests ===

    #[test]
    fn serializer_writes_decimal_statement_row() {
        let journal = EntryJournal::new();
        let account = ArtistAccount::new(ArtistId(42));
        let mut entry = royalty(2_550);
        entry.artist_id = ArtistId(42);
        account.append(&journal, entry);

        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["artist"], 42);
        assert_eq!(parsed["royalties"].as_str().unwrap(), "25.50");
        assert_eq!(parsed["balance"].as_str().unwrap(), "25.50");
        assert_eq!(parsed["expenses"].as_str().unwrap(), "0.00");
        assert!(parsed["pending_payment"].is_null());
    }
}
