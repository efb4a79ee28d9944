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

//! Proposal manager: submission, edit/withdraw windows, and per-provider
//! uniqueness.
//!
//! All status mutations run under the owning request's aggregate lock so a
//! concurrent acceptance cannot interleave with an edit or withdrawal.

use crate::base::{ClientId, ProposalId, ProviderId, RequestId};
use crate::error::MarketError;
use crate::event::{LifecycleEvent, Notifier};
use crate::proposal::{Proposal, ProposalStatus};
use crate::store::LedgerStore;
use chrono::{Duration, Utc};
use dashmap::DashSet;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Hours after submission during which a pending proposal may be edited.
pub const EDIT_WINDOW_HOURS: i64 = 24;

/// Read-only view of the provider registry (an external collaborator).
///
/// The engine trusts the ids handed to it by the auth boundary; the only
/// question it ever asks is whether a provider finished onboarding.
pub trait ProviderDirectory: Send + Sync {
    fn is_verified(&self, provider_id: ProviderId) -> bool;
}

/// Directory that verifies everyone. Demo and bench wiring.
#[derive(Debug, Default)]
pub struct AllVerified;

impl ProviderDirectory for AllVerified {
    fn is_verified(&self, _provider_id: ProviderId) -> bool {
        true
    }
}

/// Directory backed by an explicit set of verified providers.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    verified: DashSet<ProviderId>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify(&self, provider_id: ProviderId) {
        self.verified.insert(provider_id);
    }
}

impl ProviderDirectory for StaticDirectory {
    fn is_verified(&self, provider_id: ProviderId) -> bool {
        self.verified.contains(&provider_id)
    }
}

/// Input for a new proposal.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub request_id: RequestId,
    pub price: Decimal,
    pub estimated_days: Option<u32>,
    pub message: String,
}

/// Fields a provider may change while the edit window is open. `None` leaves
/// the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProposalPatch {
    pub price: Option<Decimal>,
    pub estimated_days: Option<u32>,
    pub message: Option<String>,
}

/// Enforces proposal lifecycle rules over the ledger store.
pub struct ProposalManager {
    store: Arc<LedgerStore>,
    directory: Arc<dyn ProviderDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl ProposalManager {
    pub fn new(
        store: Arc<LedgerStore>,
        directory: Arc<dyn ProviderDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    /// Submits a new proposal for an open request.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] if the provider is unverified or the
    ///   request is no longer open,
    /// - [`MarketError::NotFound`] if the request does not exist,
    /// - [`MarketError::Conflict`] if the provider already holds an active
    ///   proposal on this request,
    /// - [`MarketError::Validation`] for a non-positive price or zero
    ///   estimate.
    pub fn submit_proposal(
        &self,
        provider_id: ProviderId,
        new: NewProposal,
    ) -> Result<Proposal, MarketError> {
        if !self.directory.is_verified(provider_id) {
            return Err(MarketError::Forbidden);
        }
        if new.price <= Decimal::ZERO {
            return Err(MarketError::Validation("price must be positive"));
        }
        if new.estimated_days == Some(0) {
            return Err(MarketError::Validation("estimated days must be positive"));
        }
        // Existence check before taking the aggregate lock keeps NotFound
        // from ever allocating a lock entry for a request that isn't there.
        if self.store.get_request(new.request_id).is_none() {
            return Err(MarketError::NotFound("request"));
        }

        let proposal = self.store.with_request(new.request_id, |uow| {
            let mut request = uow.request(new.request_id)?;
            if !request.is_open() {
                return Err(MarketError::Forbidden);
            }
            if uow.has_active_proposal(new.request_id, provider_id) {
                return Err(MarketError::Conflict(
                    "proposal already submitted for this request",
                ));
            }

            let proposal = Proposal {
                id: ProposalId::new(),
                request_id: new.request_id,
                provider_id,
                price: new.price,
                estimated_days: new.estimated_days,
                message: new.message.clone(),
                is_highlighted: false,
                status: ProposalStatus::Pending,
                created_at: Utc::now(),
            };
            uow.put_proposal(proposal.clone());

            request.proposal_count += 1;
            uow.put_request(request);
            Ok(proposal)
        })?;

        self.notifier.notify(LifecycleEvent::ProposalCreated {
            request_id: proposal.request_id,
            proposal_id: proposal.id,
            provider_id,
        });
        Ok(proposal)
    }

    /// Edits a pending proposal within the 24-hour window from submission.
    pub fn edit_proposal(
        &self,
        proposal_id: ProposalId,
        provider_id: ProviderId,
        patch: ProposalPatch,
    ) -> Result<Proposal, MarketError> {
        if let Some(price) = patch.price {
            if price <= Decimal::ZERO {
                return Err(MarketError::Validation("price must be positive"));
            }
        }
        if patch.estimated_days == Some(0) {
            return Err(MarketError::Validation("estimated days must be positive"));
        }

        let proposal = self
            .store
            .get_proposal(proposal_id)
            .ok_or(MarketError::NotFound("proposal"))?;

        self.store.with_request(proposal.request_id, |uow| {
            let mut proposal = uow.proposal(proposal_id)?;
            if proposal.provider_id != provider_id {
                return Err(MarketError::Forbidden);
            }
            if !proposal.is_pending() {
                return Err(MarketError::InvalidState("only pending proposals can be edited"));
            }
            if Utc::now() - proposal.created_at > Duration::hours(EDIT_WINDOW_HOURS) {
                return Err(MarketError::InvalidState("edit window has closed"));
            }

            if let Some(price) = patch.price {
                proposal.price = price;
            }
            if let Some(days) = patch.estimated_days {
                proposal.estimated_days = Some(days);
            }
            if let Some(message) = &patch.message {
                proposal.message = message.clone();
            }
            uow.put_proposal(proposal.clone());
            Ok(proposal)
        })
    }

    /// Withdraws a pending proposal.
    ///
    /// Not idempotent: withdrawing twice fails with
    /// [`MarketError::InvalidState`], since a silent no-op would hide caller
    /// bugs.
    pub fn withdraw_proposal(
        &self,
        proposal_id: ProposalId,
        provider_id: ProviderId,
    ) -> Result<Proposal, MarketError> {
        let proposal = self
            .store
            .get_proposal(proposal_id)
            .ok_or(MarketError::NotFound("proposal"))?;

        self.store.with_request(proposal.request_id, |uow| {
            let mut proposal = uow.proposal(proposal_id)?;
            if proposal.provider_id != provider_id {
                return Err(MarketError::Forbidden);
            }
            if !proposal.is_pending() {
                return Err(MarketError::InvalidState(
                    "only pending proposals can be withdrawn",
                ));
            }
            proposal.status = ProposalStatus::Withdrawn;
            uow.put_proposal(proposal.clone());
            Ok(proposal)
        })
    }

    /// Client-side rejection of a single pending proposal.
    pub fn reject_proposal(
        &self,
        proposal_id: ProposalId,
        client_id: ClientId,
    ) -> Result<Proposal, MarketError> {
        let proposal = self
            .store
            .get_proposal(proposal_id)
            .ok_or(MarketError::NotFound("proposal"))?;

        self.store.with_request(proposal.request_id, |uow| {
            let request = uow.request(proposal.request_id)?;
            if request.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            let mut proposal = uow.proposal(proposal_id)?;
            if !proposal.is_pending() {
                return Err(MarketError::InvalidState(
                    "only pending proposals can be rejected",
                ));
            }
            proposal.status = ProposalStatus::Rejected;
            uow.put_proposal(proposal.clone());
            Ok(proposal)
        })
    }

    /// All proposals for a request, visible only to the owning client.
    ///
    /// Ordered highlighted-first, then oldest-first within each group.
    pub fn list_for_request(
        &self,
        request_id: RequestId,
        requester_id: ClientId,
    ) -> Result<Vec<Proposal>, MarketError> {
        let request = self
            .store
            .get_request(request_id)
            .ok_or(MarketError::NotFound("request"))?;
        if request.client_id != requester_id {
            return Err(MarketError::Forbidden);
        }

        let mut proposals = self.store.proposals_for_request(request_id);
        proposals.sort_by(|a, b| {
            b.is_highlighted
                .cmp(&a.is_highlighted)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(proposals)
    }

    /// A provider's own proposals, optionally filtered by status, newest
    /// first.
    pub fn list_for_provider(
        &self,
        provider_id: ProviderId,
        status: Option<ProposalStatus>,
    ) -> Vec<Proposal> {
        let mut proposals = self.store.proposals_for_provider(provider_id);
        if let Some(status) = status {
            proposals.retain(|p| p.status == status);
        }
        proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        proposals
    }
}
