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

//! Acceptance coordinator: single-winner semantics per request.
//!
//! Turning "client picks proposal P" into a consistent new world state is one
//! unit of work under the request's aggregate lock: reject every sibling
//! pending proposal, accept P, flip the request to in-progress, and open the
//! pending transaction with the fee split snapshotted. A failure anywhere in
//! the sequence applies nothing.
//!
//! When two acceptances race on the same request, the lock serializes them;
//! the loser re-reads P after the winner committed, finds it no longer
//! pending, and gets [`MarketError::InvalidState`] ("proposal no longer
//! available") — the expected answer under normal concurrent marketplace use,
//! not a system fault.

use crate::base::{ClientId, ProposalId, RequestId};
use crate::error::MarketError;
use crate::event::{LifecycleEvent, Notifier};
use crate::pricing::compute_split;
use crate::proposal::ProposalStatus;
use crate::request::RequestStatus;
use crate::store::{LedgerStore, UnitOfWork};
use crate::transaction::{PaymentStatus, Transaction};
use chrono::Utc;
use std::sync::Arc;

/// Coordinates proposal acceptance and payment-intent opening.
pub struct AcceptanceCoordinator {
    store: Arc<LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl AcceptanceCoordinator {
    pub fn new(store: Arc<LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Accepts proposal P on behalf of the request's client.
    ///
    /// On success every sibling pending proposal is rejected, P is accepted,
    /// the request moves to in-progress, and the returned pending transaction
    /// snapshots P's price and fee split. Emits `proposal.accepted` after the
    /// commit; notification delivery can never roll the acceptance back.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if P does not exist,
    /// - [`MarketError::Forbidden`] if the caller does not own the request,
    /// - [`MarketError::InvalidState`] if P is no longer pending — covers a
    ///   lost acceptance race as well as a retry after success — or if the
    ///   request left the open state (cancelled, expired),
    /// - [`MarketError::Conflict`] if a live transaction already exists
    ///   anywhere on the request.
    pub fn accept_proposal(
        &self,
        proposal_id: ProposalId,
        client_id: ClientId,
    ) -> Result<Transaction, MarketError> {
        let proposal = self
            .store
            .get_proposal(proposal_id)
            .ok_or(MarketError::NotFound("proposal"))?;

        let transaction = self.store.with_request(proposal.request_id, |uow| {
            // Re-read under the aggregate lock; the pre-lock copy may be stale.
            let proposal = uow.proposal(proposal_id)?;
            let mut request = uow.request(proposal.request_id)?;

            if request.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            if !proposal.is_pending() {
                return Err(MarketError::InvalidState("proposal no longer available"));
            }
            if !request.is_open() {
                return Err(MarketError::InvalidState("request is no longer open"));
            }
            ensure_no_live_transaction(uow, request.id)?;

            let split = compute_split(proposal.price)?;

            for mut sibling in uow.proposals_for_request(request.id) {
                if sibling.id != proposal_id && sibling.is_pending() {
                    sibling.status = ProposalStatus::Rejected;
                    uow.put_proposal(sibling);
                }
            }

            let mut accepted = proposal.clone();
            accepted.status = ProposalStatus::Accepted;
            uow.put_proposal(accepted);

            request.status = RequestStatus::InProgress;
            uow.put_request(request);

            let transaction = Transaction::open(
                proposal.request_id,
                proposal_id,
                client_id,
                proposal.provider_id,
                proposal.price,
                split,
                Utc::now(),
            );
            uow.put_transaction(transaction.clone());
            Ok(transaction)
        })?;

        self.notifier.notify(LifecycleEvent::ProposalAccepted {
            request_id: transaction.request_id,
            proposal_id: transaction.proposal_id,
            client_id: transaction.client_id,
            provider_id: transaction.provider_id,
            transaction_id: transaction.id,
        });
        Ok(transaction)
    }

    /// Opens a pending transaction for the pay-intent path.
    ///
    /// Unlike [`accept_proposal`](Self::accept_proposal) this flips no
    /// statuses: the proposal stays pending and the request open until the
    /// payment provider confirms via webhook. The external reference is
    /// recorded for webhook correlation.
    ///
    /// # Errors
    ///
    /// As for acceptance, including [`MarketError::Conflict`] if a live
    /// transaction was already opened anywhere on the request — one payment
    /// in flight per request, never two. A failed payment does not block a
    /// retry: the failed transaction stays in the ledger and a fresh one
    /// takes over the proposal slot.
    pub fn open_payment_intent(
        &self,
        proposal_id: ProposalId,
        client_id: ClientId,
        external_ref: String,
    ) -> Result<Transaction, MarketError> {
        let proposal = self
            .store
            .get_proposal(proposal_id)
            .ok_or(MarketError::NotFound("proposal"))?;

        self.store.with_request(proposal.request_id, |uow| {
            let proposal = uow.proposal(proposal_id)?;
            let request = uow.request(proposal.request_id)?;

            if request.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            if !proposal.is_pending() {
                return Err(MarketError::InvalidState("proposal no longer available"));
            }
            if !request.is_open() {
                return Err(MarketError::InvalidState("request is no longer open"));
            }
            ensure_no_live_transaction(uow, request.id)?;

            let split = compute_split(proposal.price)?;
            let mut transaction = Transaction::open(
                proposal.request_id,
                proposal_id,
                client_id,
                proposal.provider_id,
                proposal.price,
                split,
                Utc::now(),
            );
            transaction.external_payment_ref = Some(external_ref.clone());
            uow.index_payment_ref(external_ref.clone(), transaction.id);
            uow.put_transaction(transaction.clone());
            Ok(transaction)
        })
    }
}

/// No double-charge: while any proposal on the request carries a pending or
/// settled-successful transaction, no further transaction may be opened for
/// the request — not for the same proposal and not for a sibling. Only a
/// failed payment frees the request for a retry; the failed record remains
/// in the ledger as audit trail.
fn ensure_no_live_transaction(
    uow: &UnitOfWork<'_>,
    request_id: RequestId,
) -> Result<(), MarketError> {
    for proposal in uow.proposals_for_request(request_id) {
        if let Some(existing) = uow.transaction_for_proposal(proposal.id) {
            let existing = uow.transaction(existing)?;
            if existing.payment_status != PaymentStatus::Failed {
                return Err(MarketError::Conflict(
                    "payment already initiated for this request",
                ));
            }
        }
    }
    Ok(())
}
