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

//! Payment settlement: webhook consumption and participant confirmations.
//!
//! The payment provider delivers events at least once and possibly out of
//! order, so the handler is a converging state machine rather than a command
//! executor: once a transaction is settled (paid, completed, failed), any
//! further settlement event is a logged no-op. Events referencing unknown
//! transactions are logged and dropped; they never create records.
//!
//! Signature verification of incoming webhooks is the transport boundary's
//! job — by the time an event reaches this handler its authenticity is
//! established and `metadata.transactionId` is the sole correlation key.

use crate::base::{ClientId, ProposalId, ProviderId, RequestId, TransactionId};
use crate::error::MarketError;
use crate::event::{LifecycleEvent, Notifier};
use crate::proposal::ProposalStatus;
use crate::request::RequestStatus;
use crate::store::LedgerStore;
use crate::transaction::{PaymentStatus, Transaction};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Event kinds the payment provider delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventKind {
    #[serde(rename = "payment.succeeded")]
    Succeeded,
    #[serde(rename = "payment.failed")]
    Failed,
}

/// Correlation ids embedded in the provider's event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    pub transaction_id: TransactionId,
    pub proposal_id: ProposalId,
    pub request_id: RequestId,
}

/// A signed webhook event, post signature verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub kind: PaymentEventKind,
    pub metadata: PaymentMetadata,
}

/// What the settlement handler did with an event.
///
/// Duplicates and unknown references are successful outcomes, not errors:
/// at-least-once delivery makes them part of normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The event advanced the transaction.
    Applied,
    /// The transaction had already reached a sticky state; nothing changed.
    AlreadySettled,
    /// No transaction matched the reference; the event was discarded.
    Dropped,
}

/// Consumes payment-provider events and participant confirmations.
pub struct SettlementHandler {
    store: Arc<LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementHandler {
    pub fn new(store: Arc<LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Applies a payment-provider event idempotently.
    ///
    /// Success advances the transaction to paid and re-asserts the aggregate
    /// state the acceptance path would have produced: proposal accepted,
    /// request in progress, sibling pending proposals rejected. That makes
    /// the webhook path and the direct-accept path converge on the same
    /// world state regardless of which ran first. A success arriving after
    /// the proposal was rejected or withdrawn, or after the request reached
    /// a terminal state, settles the transaction as failed instead — a stale
    /// payment never awards the job or creates a second accepted proposal.
    ///
    /// Failure marks the transaction failed and touches nothing else, so the
    /// client can still accept a different proposal or retry payment.
    pub fn handle_payment_event(&self, event: PaymentEvent) -> Settled {
        let transaction_id = event.metadata.transaction_id;
        let Some(transaction) = self.store.get_transaction(transaction_id) else {
            warn!(
                %transaction_id,
                kind = ?event.kind,
                "payment event for unknown transaction dropped"
            );
            return Settled::Dropped;
        };

        let outcome = self.store.with_request(transaction.request_id, |uow| {
            let mut transaction = uow.transaction(transaction_id)?;
            if transaction.payment_status.is_settled() {
                return Ok((Settled::AlreadySettled, None));
            }

            match event.kind {
                PaymentEventKind::Succeeded => {
                    let mut winner = uow.proposal(transaction.proposal_id)?;
                    let mut request = uow.request(transaction.request_id)?;

                    // A success can land after the job moved on: the proposal
                    // was rejected or withdrawn, or the request reached a
                    // terminal state. The job must not be awarded off a stale
                    // payment, so the transaction settles as failed and the
                    // aggregate is left untouched.
                    if !winner.status.is_active() || request.status.is_terminal() {
                        warn!(
                            transaction_id = %transaction.id,
                            proposal_status = ?winner.status,
                            request_status = ?request.status,
                            "payment succeeded for an unavailable proposal; transaction failed"
                        );
                        transaction.payment_status = PaymentStatus::Failed;
                        uow.put_transaction(transaction);
                        return Ok((Settled::Applied, None));
                    }

                    transaction.payment_status = PaymentStatus::Paid;
                    transaction.started_at = Some(Utc::now());

                    // Re-assert acceptance-path state. The transaction's own
                    // foreign keys are trusted over the event metadata.
                    winner.status = ProposalStatus::Accepted;
                    uow.put_proposal(winner);

                    request.status = RequestStatus::InProgress;
                    uow.put_request(request);

                    for mut sibling in uow.proposals_for_request(transaction.request_id) {
                        if sibling.id != transaction.proposal_id && sibling.is_pending() {
                            sibling.status = ProposalStatus::Rejected;
                            uow.put_proposal(sibling);
                        }
                    }

                    uow.put_transaction(transaction.clone());
                    Ok((Settled::Applied, Some(transaction)))
                }
                PaymentEventKind::Failed => {
                    transaction.payment_status = PaymentStatus::Failed;
                    uow.put_transaction(transaction);
                    Ok((Settled::Applied, None))
                }
            }
        });

        match outcome {
            Ok((Settled::Applied, Some(transaction))) => {
                self.notifier.notify(LifecycleEvent::PaymentSucceeded {
                    request_id: transaction.request_id,
                    proposal_id: transaction.proposal_id,
                    transaction_id: transaction.id,
                });
                Settled::Applied
            }
            Ok((settled, _)) => {
                if settled == Settled::AlreadySettled {
                    info!(%transaction_id, kind = ?event.kind, "duplicate or late payment event ignored");
                }
                settled
            }
            Err(error) => {
                warn!(%transaction_id, %error, "payment event dropped: aggregate incomplete");
                Settled::Dropped
            }
        }
    }

    /// Client confirmation: releases funds and closes the job.
    ///
    /// Only valid from paid to completed; bumps the provider's completed-jobs
    /// counter in the same unit of work so the two writes cannot diverge.
    pub fn confirm_transaction(
        &self,
        transaction_id: TransactionId,
        client_id: ClientId,
    ) -> Result<Transaction, MarketError> {
        let transaction = self
            .store
            .get_transaction(transaction_id)
            .ok_or(MarketError::NotFound("transaction"))?;

        self.store.with_request(transaction.request_id, |uow| {
            let mut transaction = uow.transaction(transaction_id)?;
            if transaction.client_id != client_id {
                return Err(MarketError::Forbidden);
            }
            if transaction.payment_status != PaymentStatus::Paid {
                return Err(MarketError::InvalidState(
                    "transaction is not awaiting confirmation",
                ));
            }

            transaction.payment_status = PaymentStatus::Completed;
            uow.put_transaction(transaction.clone());
            uow.bump_completed_jobs(transaction.provider_id);

            let mut request = uow.request(transaction.request_id)?;
            request.status = RequestStatus::Completed;
            uow.put_request(request);

            Ok(transaction)
        })
    }

    /// Provider's "job done" signal.
    ///
    /// Stamps `completed_at` without touching the payment status; the
    /// client's confirmation is an independent signal and both are required
    /// before the job is fully closed.
    pub fn complete_transaction(
        &self,
        transaction_id: TransactionId,
        provider_id: ProviderId,
    ) -> Result<Transaction, MarketError> {
        let transaction = self
            .store
            .get_transaction(transaction_id)
            .ok_or(MarketError::NotFound("transaction"))?;

        self.store.with_request(transaction.request_id, |uow| {
            let mut transaction = uow.transaction(transaction_id)?;
            if transaction.provider_id != provider_id {
                return Err(MarketError::Forbidden);
            }

            transaction.completed_at = Some(Utc::now());
            uow.put_transaction(transaction.clone());
            Ok(transaction)
        })
    }

    /// A client's transactions, newest first.
    pub fn list_for_client(&self, client_id: ClientId) -> Vec<Transaction> {
        let mut transactions = self.store.transactions_for_client(client_id);
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions
    }

    /// A provider's transactions, newest first.
    pub fn list_for_provider(&self, provider_id: ProviderId) -> Vec<Transaction> {
        let mut transactions = self.store.transactions_for_provider(provider_id);
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions
    }
}
