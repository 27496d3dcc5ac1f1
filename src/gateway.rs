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

//! Payout gateway handoff.
//!
//! The gateway that actually moves money is an external collaborator. The
//! ledger hands it a [`PayoutInstruction`] and waits at most the configured
//! timeout for an answer. The call runs on its own thread so a stuck gateway
//! never holds up the caller, and no ledger lock is held while it runs.

use crate::amount::Amount;
use crate::base::{ArtistId, PaymentId};
use crate::error::GatewayError;
use crate::roster::PaymentMethod;
use crossbeam::channel::{self, RecvTimeoutError};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Everything a gateway needs to execute one payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutInstruction {
    pub payment_id: PaymentId,
    pub artist_id: ArtistId,
    pub amount: Amount,
    pub method: PaymentMethod,
}

/// External payout provider.
///
/// `Ok(())` confirms the payout. [`GatewayError::Rejected`] is a definite
/// refusal; any other error leaves the outcome unknown.
pub trait PayoutGateway: Send + Sync {
    fn submit(&self, instruction: &PayoutInstruction) -> Result<(), GatewayError>;
}

/// Runs `gateway.submit` on a helper thread and waits up to `timeout`.
///
/// On timeout the helper thread is left to finish on its own; its late
/// answer is dropped.
pub fn submit_with_timeout(
    gateway: Arc<dyn PayoutGateway>,
    instruction: PayoutInstruction,
    timeout: Duration,
) -> Result<(), GatewayError> {
    let (tx, rx) = channel::bounded(1);
    let spawned = thread::Builder::new()
        .name(format!("payout-{}", instruction.payment_id))
        .spawn(move || {
            let _ = tx.send(gateway.submit(&instruction));
        });
    if spawned.is_err() {
        return Err(GatewayError::Disconnected);
    }

    match rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => Err(GatewayError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(GatewayError::Disconnected),
    }
}
