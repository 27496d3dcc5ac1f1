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

//! Runtime configuration.
//!
//! Loaded from an optional TOML file; every field has a default.
//!
//! ```toml
//! [payments]
//! gateway_timeout_ms = 30000
//!
//! [reconciliation]
//! workers = 4
//! tolerance = 0
//! ```

use crate::amount::Amount;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub payments: PaymentConfig,
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaymentConfig {
    /// How long a payout handoff may wait for the gateway.
    pub gateway_timeout_ms: u64,
}

impl PaymentConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconciliationConfig {
    /// Artists checked concurrently.
    pub workers: usize,
    /// Largest tolerated drift between cached and derived balances.
    pub tolerance: Amount,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            tolerance: Amount::ZERO,
        }
    }
}

impl LedgerConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.payments.gateway_timeout_ms == 0 {
            return Err(ConfigError::Invalid("payments.gateway_timeout_ms must be positive".into()));
        }
        if self.reconciliation.workers == 0 {
            return Err(ConfigError::Invalid("reconciliation.workers must be at least 1".into()));
        }
        if self.reconciliation.tolerance.is_negative() {
            return Err(ConfigError::Invalid("reconciliation.tolerance must not be negative".into()));
        }
        Ok(())
    }
}
