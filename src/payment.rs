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

//! Payments.
//!
//! Payments follow a state machine:
//! - [`Pending`] → [`Completed`] (gateway confirmed the payout)
//! - [`Pending`] → [`Failed`] (gateway rejected it)
//!
//! Both outcomes are terminal. A failed payment stays on record and is
//! retried by requesting a brand-new payment.
//!
//! [`Pending`]: PaymentStatus::Pending
//! [`Completed`]: PaymentStatus::Completed
//! [`Failed`]: PaymentStatus::Failed

use crate::amount::Amount;
use crate::base::{ArtistId, PaymentId, PaymentMethodId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Completed) | (Pending, Failed))
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Payout request.
///
/// ```json
/// {"artist_id": 1, "method_id": 3, "amount": 12000}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub artist_id: ArtistId,
    pub method_id: PaymentMethodId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub artist_id: ArtistId,
    pub method_id: PaymentMethodId,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    /// When the payout was handed to the gateway. Set at most once.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// When the payment reached a terminal status.
    pub settled_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Payment {
    pub(crate) fn pending(id: PaymentId, request: PaymentRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            artist_id: request.artist_id,
            method_id: request.method_id,
            amount: request.amount,
            status: PaymentStatus::Pending,
            created_at,
            dispatched_at: None,
            settled_at: None,
            failure_reason: None,
        }
    }

    /// Whether this payment reduces the balance as of `as_of`.
    ///
    /// Only completed payments count, and only once settled.
    pub fn debits_at(&self, as_of: Option<DateTime<Utc>>) -> bool {
        if self.status != PaymentStatus::Completed {
            return false;
        }
        match (as_of, self.settled_at) {
            (None, _) => true,
            (Some(as_of), Some(settled_at)) => settled_at <= as_of,
            (Some(_), None) => false,
        }
    }
}
