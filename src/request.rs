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

//! Service request entity.
//!
//! A request is one job posting owned by a client. Its status moves
//! monotonically towards a terminal state, with client cancellation as the
//! only sideways exit and only while the request is still open:
//!
//  Open ──accept──► InProgress ──confirm──► Completed
//    │
//    ├──cancel──► Cancelled
//    └──expiry──► Expired

use crate::base::{CategoryId, ClientId, RequestId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How soon the client needs the job done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Urgent,
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Accepting proposals.
    Open,
    /// A proposal was accepted; work is underway.
    InProgress,
    /// The client confirmed the job; terminal.
    Completed,
    /// The client cancelled while still open; terminal.
    Cancelled,
    /// Passed its expiry date without an acceptance; terminal.
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }
}

/// Where the job takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// A posted job a client wants performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub client_id: ClientId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub deadline: Option<DateTime<Utc>>,
    pub urgency: Urgency,
    pub location: Location,
    pub status: RequestStatus,
    /// Denormalized count of proposals ever submitted; guards deletion.
    pub proposal_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Request {
    /// True while the request still admits new proposals.
    pub fn is_open(&self) -> bool {
        self.status == RequestStatus::Open
    }

    /// True once the expiry date has passed on a still-open request.
    pub fn is_expirable(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(status: RequestStatus) -> Request {
        let now = Utc::now();
        Request {
            id: RequestId::new(),
            client_id: ClientId::new(),
            category_id: CategoryId::new(),
            title: "fix kitchen sink".into(),
            description: "leaking trap under the sink".into(),
            budget_min: None,
            budget_max: None,
            deadline: None,
            urgency: Urgency::Medium,
            location: Location::default(),
            status,
            proposal_count: 0,
            created_at: now,
            expires_at: now + Duration::days(30),
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RequestStatus::Open.is_terminal());
        assert!(!RequestStatus::InProgress.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(RequestStatus::Expired.is_terminal());
    }

    #[test]
    fn only_open_requests_expire() {
        let mut request = sample(RequestStatus::Open);
        let past_expiry = request.expires_at + Duration::days(1);
        assert!(request.is_expirable(past_expiry));
        assert!(!request.is_expirable(request.created_at));

        request.status = RequestStatus::InProgress;
        assert!(!request.is_expirable(past_expiry));
    }
}
