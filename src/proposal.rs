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

//! Proposal entity.
//!
//! A proposal is a provider's priced bid against a request. Status follows a
//! one-way machine:
//!
//  Pending ──accept──► Accepted
//    │
//    ├──reject────► Rejected
//    └──withdraw──► Withdrawn
//!
//! A provider holds at most one *active* (pending or accepted) proposal per
//! request; withdrawn and rejected proposals free the slot for resubmission.

use crate::base::{ProposalId, ProviderId, RequestId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Submitted, awaiting the client's decision.
    Pending,
    /// Chosen by the client; at most one per request, irreversible.
    Accepted,
    /// Turned down, either singly by the client or as a sibling of the
    /// accepted proposal; irreversible.
    Rejected,
    /// Pulled back by the provider while still pending; irreversible.
    Withdrawn,
}

impl ProposalStatus {
    /// Active proposals occupy the provider's one slot on a request.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

/// A provider's priced offer against a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub request_id: RequestId,
    pub provider_id: ProviderId,
    pub price: Decimal,
    pub estimated_days: Option<u32>,
    pub message: String,
    /// Premium placement flag; sorts ahead of regular proposals in listings.
    pub is_highlighted: bool,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses() {
        assert!(ProposalStatus::Pending.is_active());
        assert!(ProposalStatus::Accepted.is_active());
        assert!(!ProposalStatus::Rejected.is_active());
        assert!(!ProposalStatus::Withdrawn.is_active());
    }
}
