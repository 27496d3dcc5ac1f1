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

//! Property-based tests for the ledger engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! valid entries and payment requests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use royalty_ledger::{
    Amount, Artist, ArtistId, BrandId, EarningSource, EntryKind, Ledger, LedgerError, NewEntry,
    NewPaymentMethod, PaymentMethodId, PaymentRequest, PaymentStatus,
};

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a non-negative amount (0.00 to 10000.00).
fn arb_amount() -> impl Strategy<Value = i64> {
    0i64..=1_000_000i64
}

fn arb_kind() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        Just(EntryKind::Earning {
            source: EarningSource::Streaming,
            platform: "Spotify".into(),
        }),
        Just(EntryKind::Royalty),
        Just(EntryKind::Expense),
    ]
}

/// An entry as (kind, amount in minor units, day offset).
fn arb_entry() -> impl Strategy<Value = (EntryKind, i64, i64)> {
    (arb_kind(), arb_amount(), 0i64..60)
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn make_ledger(artists: u32) -> (Ledger, Vec<PaymentMethodId>) {
    let ledger = Ledger::new();
    let methods = (1..=artists)
        .map(|id| {
            ledger
                .roster()
                .register_artist(Artist {
                    id: ArtistId(id),
                    brand: BrandId(1),
                    name: format!("Artist {id}"),
                })
                .unwrap();
            ledger
                .roster()
                .add_payment_method(
                    ArtistId(id),
                    NewPaymentMethod {
                        bank_code: "001".into(),
                        bank_name: "First Bank".into(),
                        account_reference: format!("ACC-{id}"),
                        is_default: true,
                    },
                )
                .unwrap()
                .id
        })
        .collect();
    (ledger, methods)
}

fn make_entry(artist: u32, kind: EntryKind, minor: i64, day: i64) -> NewEntry {
    NewEntry {
        artist_id: ArtistId(artist),
        kind,
        amount: Amount::from_minor(minor),
        release_id: None,
        description: None,
        recorded_at: epoch() + Duration::days(day),
        corrects: None,
    }
}

/// Signed contribution of an entry to the balance.
fn signed(kind: &EntryKind, minor: i64) -> i64 {
    match kind {
        EntryKind::Expense => -minor,
        _ => minor,
    }
}

// =============================================================================
// Balance Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Balance is earnings plus royalties minus expenses.
    #[test]
    fn balance_matches_signed_sum(entries in prop::collection::vec(arb_entry(), 0..40)) {
        let (ledger, _) = make_ledger(1);
        let mut expected = 0i64;
        for (kind, minor, day) in entries {
            expected += signed(&kind, minor);
            ledger.append(make_entry(1, kind, minor, day)).unwrap();
        }

        prop_assert_eq!(
            ledger.compute_balance(ArtistId(1), None).unwrap(),
            Amount::from_minor(expected)
        );
    }

    /// Two reads with no write in between agree.
    #[test]
    fn compute_balance_is_idempotent(entries in prop::collection::vec(arb_entry(), 0..20)) {
        let (ledger, _) = make_ledger(1);
        for (kind, minor, day) in entries {
            ledger.append(make_entry(1, kind, minor, day)).unwrap();
        }

        let first = ledger.compute_balance(ArtistId(1), None).unwrap();
        let second = ledger.compute_balance(ArtistId(1), None).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(ledger.balance(ArtistId(1)).unwrap(), first);
    }

    /// Balance as of a day only counts entries recorded by then.
    #[test]
    fn as_of_counts_only_earlier_entries(
        entries in prop::collection::vec(arb_entry(), 0..30),
        cutoff in 0i64..60,
    ) {
        let (ledger, _) = make_ledger(1);
        let mut expected = 0i64;
        for (kind, minor, day) in entries {
            if day <= cutoff {
                expected += signed(&kind, minor);
            }
            ledger.append(make_entry(1, kind, minor, day)).unwrap();
        }

        let as_of = epoch() + Duration::days(cutoff);
        prop_assert_eq!(
            ledger.compute_balance(ArtistId(1), Some(as_of)).unwrap(),
            Amount::from_minor(expected)
        );
    }

    /// Append order does not change the balance.
    #[test]
    fn append_order_independent(entries in prop::collection::vec(arb_entry(), 1..20)) {
        let (forward, _) = make_ledger(1);
        let (backward, _) = make_ledger(1);
        for (kind, minor, day) in entries.iter().cloned() {
            forward.append(make_entry(1, kind, minor, day)).unwrap();
        }
        for (kind, minor, day) in entries.into_iter().rev() {
            backward.append(make_entry(1, kind, minor, day)).unwrap();
        }

        prop_assert_eq!(
            forward.compute_balance(ArtistId(1), None).unwrap(),
            backward.compute_balance(ArtistId(1), None).unwrap()
        );
    }
}

// =============================================================================
// Append-Only Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Entry count grows by exactly one per accepted append and never shrinks.
    #[test]
    fn entry_count_is_monotonic(
        entries in prop::collection::vec((arb_kind(), -1_000i64..1_000, 0i64..60), 1..40),
    ) {
        let (ledger, _) = make_ledger(1);
        let mut previous = 0;
        for (kind, minor, day) in entries {
            let accepted = ledger.append(make_entry(1, kind, minor, day)).is_ok();
            let count = ledger.entry_count(ArtistId(1));
            prop_assert_eq!(accepted, minor >= 0);
            prop_assert_eq!(count, previous + usize::from(accepted));
            previous = count;
        }
    }

    /// Stored entries never change after they are appended.
    #[test]
    fn stored_entries_are_immutable(
        entries in prop::collection::vec(arb_entry(), 1..20),
        more in prop::collection::vec(arb_entry(), 1..20),
    ) {
        let (ledger, _) = make_ledger(1);
        for (kind, minor, day) in entries {
            ledger.append(make_entry(1, kind, minor, day)).unwrap();
        }
        let before = ledger.list_for(ArtistId(1), None, None).unwrap();

        for (kind, minor, day) in more {
            ledger.append(make_entry(1, kind, minor, day)).unwrap();
        }
        let after = ledger.list_for(ArtistId(1), None, None).unwrap();

        prop_assert_eq!(&after[..before.len()], &before[..]);
    }

    /// Artists never see each other's entries.
    #[test]
    fn artists_are_isolated(
        first in prop::collection::vec(arb_entry(), 0..20),
        second in prop::collection::vec(arb_entry(), 0..20),
    ) {
        let (ledger, _) = make_ledger(2);
        let mut expected = 0i64;
        for (kind, minor, day) in first {
            expected += signed(&kind, minor);
            ledger.append(make_entry(1, kind, minor, day)).unwrap();
        }
        for (kind, minor, day) in second {
            ledger.append(make_entry(2, kind, minor, day)).unwrap();
        }

        prop_assert_eq!(
            ledger.compute_balance(ArtistId(1), None).unwrap(),
            Amount::from_minor(expected)
        );
    }
}

// =============================================================================
// Payment Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A payment opens exactly when it fits the balance, and completed
    /// payouts never drive the balance below zero.
    #[test]
    fn never_pays_beyond_balance(
        royalties in prop::collection::vec(arb_amount(), 1..10),
        requests in prop::collection::vec(1i64..500_000, 1..20),
    ) {
        let (ledger, methods) = make_ledger(1);
        for minor in royalties {
            ledger.append(make_entry(1, EntryKind::Royalty, minor, 0)).unwrap();
        }

        for minor in requests {
            let available = ledger.compute_balance(ArtistId(1), None).unwrap();
            let result = ledger.request_payment(PaymentRequest {
                artist_id: ArtistId(1),
                method_id: methods[0],
                amount: Amount::from_minor(minor),
            });
            match result {
                Ok(id) => {
                    prop_assert!(Amount::from_minor(minor) <= available);
                    ledger.complete_payment(id).unwrap();
                }
                Err(LedgerError::InsufficientFunds { requested, available: reported }) => {
                    prop_assert!(requested > available);
                    prop_assert_eq!(reported, available);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
            prop_assert!(ledger.compute_balance(ArtistId(1), None).unwrap() >= Amount::ZERO);
        }
    }

    /// Failed payouts leave the balance untouched.
    #[test]
    fn failed_payment_preserves_balance(
        royalty in 1i64..1_000_000,
        fraction in 1i64..=100,
    ) {
        let (ledger, methods) = make_ledger(1);
        ledger.append(make_entry(1, EntryKind::Royalty, royalty, 0)).unwrap();
        let amount = (royalty * fraction / 100).max(1);

        let id = ledger
            .request_payment(PaymentRequest {
                artist_id: ArtistId(1),
                method_id: methods[0],
                amount: Amount::from_minor(amount),
            })
            .unwrap();
        let failed = ledger.fail_payment(id, "bounced").unwrap();

        prop_assert_eq!(failed.status, PaymentStatus::Failed);
        prop_assert_eq!(
            ledger.compute_balance(ArtistId(1), None).unwrap(),
            Amount::from_minor(royalty)
        );
        prop_assert_eq!(ledger.pending_payment(ArtistId(1)), None);
    }
}
