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

//! Balance reconciliation.
//!
//! The job re-derives every active artist's balance from the ledger and
//! compares it with the cached [`BalanceSnapshot`]. Any drift beyond the
//! configured tolerance is a defect somewhere else in the system, so it is
//! reported to the [`NotificationSink`] and never quietly absorbed. After
//! the alert goes out the snapshot is rewritten to the derived value so the
//! next run starts from a consistent baseline and does not raise the same
//! alert twice.
//!
//! A failure for one artist is recorded in the [`ReconciliationReport`] and
//! the run moves on. That includes a panic raised by a sink while handling
//! the artist's alert.
//!
//! [`BalanceSnapshot`]: crate::BalanceSnapshot

use crate::amount::Amount;
use crate::base::ArtistId;
use crate::config::ReconciliationConfig;
use crate::engine::Ledger;
use crate::error::{LedgerError, SinkError};
use crate::snapshot::SnapshotCheck;
use chrono::{DateTime, Utc};
use crossbeam::channel;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use thiserror::Error;
use tracing::{error, info, warn};

/// Divergence between a cached and a derived balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivergenceAlert {
    pub artist_id: ArtistId,
    pub cached_balance: Amount,
    pub computed_balance: Amount,
    pub detected_at: DateTime<Utc>,
}

/// Operator-facing destination for divergence alerts (e-mail, dashboard).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, alert: &DivergenceAlert) -> Result<(), SinkError>;
}

/// Writes alerts to the log at `WARN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, alert: &DivergenceAlert) -> Result<(), SinkError> {
        warn!(
            artist = %alert.artist_id,
            cached = %alert.cached_balance,
            computed = %alert.computed_balance,
            detected_at = %alert.detected_at,
            "balance snapshot diverged from ledger"
        );
        Ok(())
    }
}

/// Keeps delivered alerts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    alerts: Mutex<Vec<DivergenceAlert>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<DivergenceAlert> {
        self.alerts.lock().clone()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, alert: &DivergenceAlert) -> Result<(), SinkError> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

/// Why one artist could not be reconciled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtistFailure {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A collaborator panicked while the artist was being reconciled
    #[error("reconciliation panicked: {0}")]
    Panicked(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// How one artist fared in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtistOutcome {
    Consistent,
    Seeded,
    Diverged(DivergenceAlert),
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Artists whose balance was re-derived (including failures).
    pub artists_checked: usize,
    /// Artists whose snapshot matched.
    pub consistent: usize,
    /// Artists that had no snapshot and got a fresh one.
    pub seeded: usize,
    /// Alerts delivered to the sink, in artist id order.
    pub divergences: Vec<DivergenceAlert>,
    /// Artists that could not be reconciled, in artist id order.
    pub failures: Vec<(ArtistId, ArtistFailure)>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.divergences.is_empty() && self.failures.is_empty()
    }
}

/// Scheduled balance audit.
///
/// The job owns no state between runs; the only thing it shares with the
/// request path is the [`Ledger`].
pub struct ReconciliationJob<'a> {
    ledger: &'a Ledger,
    sink: &'a dyn NotificationSink,
    workers: usize,
    tolerance: Amount,
}

impl<'a> ReconciliationJob<'a> {
    /// Creates a job using the ledger's reconciliation settings.
    pub fn new(ledger: &'a Ledger, sink: &'a dyn NotificationSink) -> Self {
        Self::with_config(ledger, sink, &ledger.config().reconciliation)
    }

    pub fn with_config(
        ledger: &'a Ledger,
        sink: &'a dyn NotificationSink,
        config: &ReconciliationConfig,
    ) -> Self {
        Self {
            ledger,
            sink,
            workers: config.workers.max(1),
            tolerance: config.tolerance,
        }
    }

    /// Runs one full pass over every artist with ledger entries.
    pub fn run(&self) -> ReconciliationReport {
        let started_at = Utc::now();
        let artists = self.ledger.artists_with_entries();
        info!(artists = artists.len(), workers = self.workers, "reconciliation started");

        let (work_tx, work_rx) = channel::unbounded();
        for artist_id in &artists {
            let _ = work_tx.send(*artist_id);
        }
        drop(work_tx);

        let (result_tx, result_rx) = channel::unbounded();
        thread::scope(|scope| {
            for _ in 0..self.workers.min(artists.len()) {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for artist_id in work_rx {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            self.reconcile_artist(artist_id)
                        }))
                        .unwrap_or_else(|payload| {
                            Err(ArtistFailure::Panicked(panic_message(payload.as_ref())))
                        });
                        let _ = result_tx.send((artist_id, outcome));
                    }
                });
            }
        });
        drop(result_tx);

        let mut outcomes: Vec<_> = result_rx.into_iter().collect();
        outcomes.sort_unstable_by_key(|(artist_id, _)| *artist_id);

        let mut report = ReconciliationReport {
            started_at,
            finished_at: started_at,
            artists_checked: outcomes.len(),
            consistent: 0,
            seeded: 0,
            divergences: Vec::new(),
            failures: Vec::new(),
        };
        for (artist_id, outcome) in outcomes {
            match outcome {
                Ok(ArtistOutcome::Consistent) => report.consistent += 1,
                Ok(ArtistOutcome::Seeded) => report.seeded += 1,
                Ok(ArtistOutcome::Diverged(alert)) => report.divergences.push(alert),
                Err(failure) => {
                    error!(artist = %artist_id, %failure, "reconciliation failed for artist");
                    report.failures.push((artist_id, failure));
                }
            }
        }
        report.finished_at = Utc::now();

        info!(
            checked = report.artists_checked,
            consistent = report.consistent,
            seeded = report.seeded,
            divergences = report.divergences.len(),
            failures = report.failures.len(),
            "reconciliation finished"
        );
        report
    }

    fn reconcile_artist(&self, artist_id: ArtistId) -> Result<ArtistOutcome, ArtistFailure> {
        let outcome = match self.ledger.check_snapshot(artist_id, self.tolerance)? {
            SnapshotCheck::Consistent { .. } => ArtistOutcome::Consistent,
            SnapshotCheck::Missing { .. } => ArtistOutcome::Seeded,
            SnapshotCheck::Diverged { cached, computed } => {
                let alert = DivergenceAlert {
                    artist_id,
                    cached_balance: cached,
                    computed_balance: computed,
                    detected_at: Utc::now(),
                };
                // Undelivered alerts keep the stale snapshot so the next run raises them again.
                self.sink.notify(&alert)?;
                ArtistOutcome::Diverged(alert)
            }
        };
        self.ledger.refresh_snapshot(artist_id)?;
        Ok(outcome)
    }
}
