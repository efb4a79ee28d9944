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

//! Core identifier types for the marketplace entities.
//!
//! Every entity id is a UUIDv4 wrapped in a newtype so that a proposal id
//! can never be passed where a request id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Marketplace settlement currency.
///
/// The platform operates in a single currency; transactions snapshot it for
/// the audit trail.
pub const CURRENCY: &str = "PEN";

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a client (the party posting requests).
    ClientId
);
entity_id!(
    /// Unique identifier for a provider (the party submitting proposals).
    ProviderId
);
entity_id!(
    /// Unique identifier for a service request.
    RequestId
);
entity_id!(
    /// Unique identifier for a proposal.
    ProposalId
);
entity_id!(
    /// Unique identifier for a transaction.
    TransactionId
);
entity_id!(
    /// Unique identifier for a service category.
    CategoryId
);
