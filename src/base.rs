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

//! Core identifier types for artists, catalog items, ledger entries and payments.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Tenant (label brand) an artist is signed to.
    BrandId(u16)
);

id_type!(
    /// Unique identifier for an artist.
    ArtistId(u32)
);

id_type!(
    /// Unique identifier for a release.
    ReleaseId(u32)
);

id_type!(
    /// Unique identifier for a ledger entry.
    ///
    /// Allocated by the ledger in append order; ids are never reused.
    EntryId(u64)
);

id_type!(
    /// Unique identifier for a payout method registered by an artist.
    PaymentMethodId(u32)
);

id_type!(
    /// Unique identifier for a payment.
    PaymentId(u64)
);
