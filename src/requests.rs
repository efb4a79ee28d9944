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

//! Request manager: posting, browsing, and the open-phase mutations.
//!
//! Requests are owned by their client. Edits, cancellation, and deletion are
//! open-phase operations only; once a proposal is accepted the aggregate
//! belongs to the acceptance/settlement flow.

use crate::base::{CategoryId, ClientId, RequestId};
use crate::error::MarketError;
use crate::request::{Location, Request, RequestStatus, Urgency};
use crate::store::LedgerStore;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Days an open request stays listed before the expiry sweep closes it.
pub const REQUEST_TTL_DAYS: i64 = 30;

/// Input for posting a request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub deadline: Option<DateTime<Utc>>,
    pub urgency: Urgency,
    pub location: Location,
}

/// Fields the owning client may change while the request is open.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub deadline: Option<DateTime<Utc>>,
    pub urgency: Option<Urgency>,
}

/// Browse filter over open requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring match on the city.
    pub city: Option<String>,
    pub urgency: Option<Urgency>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
}

/// Manages the request side of the marketplace over the ledger store.
pub struct RequestManager {
    store: Arc<LedgerStore>,
}

impl RequestManager {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Posts a new open request expiring [`REQUEST_TTL_DAYS`] from now.
    pub fn create_request(
        &self,
        client_id: ClientId,
        new: NewRequest,
    ) -> Result<Request, MarketError> {
        if new.title.trim().is_empty() {
            return Err(MarketError::Validation("title must not be empty"));
        }
        if new.description.trim().is_empty() {
            return Err(MarketError::Validation("description must not be empty"));
        }
        validate_budget(new.budget_min, new.budget_max)?;

        let now = Utc::now();
        let request = Request {
            id: RequestId::new(),
            client_id,
            category_id: new.category_id,
            title: new.title,
            description: new.description,
            budget_min: new.budget_min,
            budget_max: new.budget_max,
            deadline: new.deadline,
            urgency: new.urgency,
            location: new.location,
            status: RequestStatus::Open,
            proposal_count: 0,
            created_at: now,
            expires_at: now + Duration::days(REQUEST_TTL_DAYS),
        };
        self.store.insert_request(request.clone());
        Ok(request)
    }

    pub fn get_request(&self, request_id: RequestId) -> Result<Request, MarketError> {
        self.store
            .get_request(request_id)
            .ok_or(MarketError::NotFound("request"))
    }

    /// Open requests matching the filter, newest first.
    pub fn list_open(&self, filter: &RequestFilter) -> Vec<Request> {
        let mut requests = self.store.open_requests();
        requests.retain(|request| filter.matches(request));
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// The client's own requests, optionally filtered by status, newest
    /// first.
    pub fn list_for_client(
        &self,
        client_id: ClientId,
        status: Option<RequestStatus>,
    ) -> Vec<Request> {
        let mut requests = self.store.requests_for_client(client_id);
        if let Some(status) = status {
            requests.retain(|r| r.status == status);
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// Edits an open request's fields.
    pub fn update_request(
        &self,
        request_id: RequestId,
        client_id: ClientId,
        patch: RequestPatch,
    ) -> Result<Request, MarketError> {
        self.get_request(request_id)?;

        self.store.with_request(request_id, |uow| {
            let mut request = uow.request(request_id)?;
            if request.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            if !request.is_open() {
                return Err(MarketError::InvalidState("only open requests can be edited"));
            }

            if let Some(title) = patch.title.clone() {
                if title.trim().is_empty() {
                    return Err(MarketError::Validation("title must not be empty"));
                }
                request.title = title;
            }
            if let Some(description) = patch.description.clone() {
                request.description = description;
            }
            if patch.budget_min.is_some() {
                request.budget_min = patch.budget_min;
            }
            if patch.budget_max.is_some() {
                request.budget_max = patch.budget_max;
            }
            validate_budget(request.budget_min, request.budget_max)?;
            if patch.deadline.is_some() {
                request.deadline = patch.deadline;
            }
            if let Some(urgency) = patch.urgency {
                request.urgency = urgency;
            }

            uow.put_request(request.clone());
            Ok(request)
        })
    }

    /// The one sideways exit: the owner cancels a still-open request.
    pub fn cancel_request(
        &self,
        request_id: RequestId,
        client_id: ClientId,
    ) -> Result<Request, MarketError> {
        self.get_request(request_id)?;

        self.store.with_request(request_id, |uow| {
            let mut request = uow.request(request_id)?;
            if request.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            if !request.is_open() {
                return Err(MarketError::InvalidState("only open requests can be cancelled"));
            }
            request.status = RequestStatus::Cancelled;
            uow.put_request(request.clone());
            Ok(request)
        })
    }

    /// Hard delete, permitted only while the request is open and no provider
    /// has ever bid on it.
    pub fn delete_request(
        &self,
        request_id: RequestId,
        client_id: ClientId,
    ) -> Result<(), MarketError> {
        self.get_request(request_id)?;

        self.store.with_request(request_id, |uow| {
            let request = uow.request(request_id)?;
            if request.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            if !request.is_open() {
                return Err(MarketError::InvalidState("only open requests can be deleted"));
            }
            if request.proposal_count > 0 {
                return Err(MarketError::InvalidState(
                    "requests with proposals cannot be deleted",
                ));
            }
            Ok(())
        })?;

        self.store.remove_request(request_id);
        Ok(())
    }

    /// Sweeps open requests past their expiry date into `Expired`.
    ///
    /// Returns the number of requests expired. Races benignly with
    /// acceptance: the per-request lock means a request is either accepted
    /// or expired, never both.
    pub fn expire_due(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for request in self.store.open_requests() {
            if !request.is_expirable(now) {
                continue;
            }
            let swept = self.store.with_request(request.id, |uow| {
                let mut request = uow.request(request.id)?;
                // Re-check under the lock; an acceptance may have won.
                if !request.is_expirable(now) {
                    return Err(MarketError::InvalidState("request no longer expirable"));
                }
                request.status = RequestStatus::Expired;
                uow.put_request(request.clone());
                Ok(request.id)
            });
            if let Ok(request_id) = swept {
                info!(%request_id, "request expired");
                expired += 1;
            }
        }
        expired
    }
}

fn validate_budget(min: Option<Decimal>, max: Option<Decimal>) -> Result<(), MarketError> {
    if let Some(min) = min {
        if min <= Decimal::ZERO {
            return Err(MarketError::Validation("budget must be positive"));
        }
    }
    if let Some(max) = max {
        if max <= Decimal::ZERO {
            return Err(MarketError::Validation("budget must be positive"));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(MarketError::Validation("budget range is inverted"));
        }
    }
    Ok(())
}

impl RequestFilter {
    fn matches(&self, request: &Request) -> bool {
        if let Some(category_id) = self.category_id {
            if request.category_id != category_id {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if !request
                .location
                .city
                .to_lowercase()
                .contains(&city.to_lowercase())
            {
                return false;
            }
        }
        if let Some(urgency) = self.urgency {
            if request.urgency != urgency {
                return false;
            }
        }
        if let Some(min) = self.budget_min {
            match request.budget_min {
                Some(budget) if budget >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.budget_max {
            match request.budget_max {
                Some(budget) if budget <= max => {}
                _ => return false,
            }
        }
        true
    }
}
