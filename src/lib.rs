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

//! # Royalty Ledger
//!
//! This library keeps the authoritative record of what a label owes each of
//! its artists: earnings, royalties and expenses booked against an artist,
//! the payouts made from that balance, and a scheduled job that audits
//! cached balances for drift.
//!
//! ## Core Components
//!
//! - [`Ledger`]: append-only entry store, balance engine and payment processor
//! - [`ArtistAccount`]: one artist's entries and payments behind a single lock
//! - [`Roster`]: artists, releases and payout methods the ledger validates against
//! - [`ReconciliationJob`]: recomputes balances and reports snapshot drift
//! - [`LedgerError`]: error types for rejected requests
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use royalty_ledger::{
//!     Amount, Artist, ArtistId, BrandId, EarningSource, EntryKind, Ledger, NewEntry,
//! };
//!
//! let ledger = Ledger::new();
//! ledger
//!     .roster()
//!     .register_artist(Artist { id: ArtistId(1), brand: BrandId(1), name: "Ysa".into() })
//!     .unwrap();
//!
//! ledger
//!     .append(NewEntry {
//!         artist_id: ArtistId(1),
//!         kind: EntryKind::Earning {
//!             source: EarningSource::Streaming,
//!             platform: "Spotify".into(),
//!         },
//!         amount: Amount::from_minor(10_000),
//!         release_id: None,
//!         description: None,
//!         recorded_at: Utc::now(),
//!         corrects: None,
//!     })
//!     .unwrap();
//!
//! assert_eq!(ledger.compute_balance(ArtistId(1), None).unwrap(), Amount::from_minor(10_000));
//! ```
//!
//! ## Thread Safety
//!
//! Every artist has its own lock. Writes for one artist are linearizable;
//! writes for different artists run in parallel.

pub mod account;
mod amount;
pub mod balance;
mod base;
pub mod config;
mod engine;
mod entry;
pub mod error;
pub mod gateway;
mod journal;
mod payment;
pub mod reconciliation;
pub mod roster;
mod snapshot;

pub use account::ArtistAccount;
pub use amount::Amount;
pub use balance::BalanceBreakdown;
pub use base::{ArtistId, BrandId, EntryId, PaymentId, PaymentMethodId, ReleaseId};
pub use config::LedgerConfig;
pub use engine::{DispatchOutcome, Ledger};
pub use entry::{DateRange, EarningSource, EntryClass, EntryKind, LedgerEntry, NewEntry};
pub use error::{GatewayError, LedgerError, SinkError, ValidationError};
pub use gateway::{PayoutGateway, PayoutInstruction};
pub use payment::{Payment, PaymentRequest, PaymentStatus};
pub use reconciliation::{
    DivergenceAlert, LogSink, MemorySink, NotificationSink, ReconciliationJob, ReconciliationReport,
};
pub use roster::{Artist, NewPaymentMethod, PaymentMethod, Release, ReleaseStatus, Roster};
pub use snapshot::{BalanceSnapshot, SnapshotCheck};
