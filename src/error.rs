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

//! Error types for ledger, payment and reconciliation operations.

use crate::amount::Amount;
use crate::base::{ArtistId, EntryId, PaymentId, PaymentMethodId, ReleaseId};
use crate::payment::PaymentStatus;
use crate::roster::ReleaseStatus;
use std::time::Duration;
use thiserror::Error;

/// A request was malformed and nothing was stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Ledger entry amounts carry no sign; the entry kind does
    #[error("amount must not be negative (got {0})")]
    NegativeAmount(Amount),

    /// Payments of zero or less are meaningless
    #[error("payment amount must be greater than zero (got {0})")]
    NonPositivePayment(Amount),

    #[error("artist {0} does not exist")]
    UnknownArtist(ArtistId),

    #[error("artist {0} is already registered")]
    DuplicateArtist(ArtistId),

    #[error("release {0} does not exist")]
    UnknownRelease(ReleaseId),

    #[error("release {0} is already registered")]
    DuplicateRelease(ReleaseId),

    /// Release is neither owned by nor a collaboration with the artist
    #[error("release {release} is not credited to artist {artist}")]
    ReleaseNotCredited { release: ReleaseId, artist: ArtistId },

    /// Catalog numbers are unique per brand
    #[error("catalog number {0:?} is already used by this brand")]
    DuplicateCatalogNumber(String),

    #[error("payment method {0} does not exist")]
    UnknownPaymentMethod(PaymentMethodId),

    #[error("payment method {method} does not belong to artist {artist}")]
    PaymentMethodNotOwned {
        method: PaymentMethodId,
        artist: ArtistId,
    },

    /// Correction points at an entry this artist never had
    #[error("entry {0} cannot be corrected: no such entry for this artist")]
    UnknownCorrectedEntry(EntryId),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// Ledger and payment processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Payment would exceed the computed balance
    #[error("insufficient funds: requested {requested}, balance is {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    /// Another payment for the artist has not settled yet
    #[error("payment {0} is still pending for this artist; wait for it to settle")]
    PaymentInProgress(PaymentId),

    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// The payout was already handed to the gateway; only its status poll settles it
    #[error("payment {0} was already handed to the payout gateway")]
    PaymentAlreadyDispatched(PaymentId),

    #[error("payment cannot move from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("release cannot move from {from} to {to}")]
    InvalidReleaseTransition {
        from: ReleaseStatus,
        to: ReleaseStatus,
    },

    /// Entry totals do not fit in the fixed-point range
    #[error("balance for artist {0} overflowed")]
    BalanceOverflow(ArtistId),
}

/// Signals returned by a payout gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the payout; the payment fails
    #[error("payout rejected: {0}")]
    Rejected(String),

    /// No answer within the configured timeout; the payment stays pending
    #[error("payout gateway did not answer within {0:?}")]
    Timeout(Duration),

    /// The gateway worker went away without answering; outcome unknown
    #[error("payout gateway disconnected before answering")]
    Disconnected,
}

/// An alert could not be delivered to the notification sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("alert delivery failed: {0}")]
pub struct SinkError(pub String);

/// Configuration file could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
