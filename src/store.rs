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

//! Ledger store: durable-store stand-in for requests, proposals, and
//! transactions.
//!
//! Three concurrent tables plus the secondary indexes the lifecycle engine
//! depends on:
//!
//! - `(request_id, provider_id) -> proposal` for the one-active-proposal-per-
//!   provider-per-request constraint,
//! - `proposal_id -> transaction` for the one-transaction-per-proposal
//!   constraint,
//! - `external payment ref -> transaction` for webhook correlation.
//!
//! # Unit of work
//!
//! Any mutation touching a request aggregate goes through
//! [`LedgerStore::with_request`]: it acquires that request's lock, hands the
//! closure a [`UnitOfWork`] that stages writes, and commits them as one block
//! only if the closure returns `Ok`. An `Err` return drops the staged writes,
//! so the caller never observes a half-applied aggregate. Because every
//! read-then-write on one request runs under the same lock, two concurrent
//! acceptances cannot both observe a pending proposal.

use crate::base::{ClientId, ProposalId, ProviderId, RequestId, TransactionId};
use crate::error::MarketError;
use crate::proposal::Proposal;
use crate::request::Request;
use crate::transaction::Transaction;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory ledger with per-request aggregate locking.
#[derive(Debug, Default)]
pub struct LedgerStore {
    requests: DashMap<RequestId, Request>,
    proposals: DashMap<ProposalId, Proposal>,
    transactions: DashMap<TransactionId, Transaction>,

    /// Active (pending/accepted) proposal per (request, provider) slot.
    active_proposals: DashMap<(RequestId, ProviderId), ProposalId>,
    /// All proposals ever submitted for a request, in insertion order.
    request_proposals: DashMap<RequestId, Vec<ProposalId>>,
    /// At most one transaction per proposal.
    proposal_transactions: DashMap<ProposalId, TransactionId>,
    /// Payment-provider reference to transaction correlation.
    payment_refs: DashMap<String, TransactionId>,
    /// Append-only completed-jobs counter per provider.
    completed_jobs: DashMap<ProviderId, u64>,

    /// Aggregate locks serializing multi-entity mutations per request.
    request_locks: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, request_id: RequestId) -> Arc<Mutex<()>> {
        // Clone the Arc and release the shard before locking the mutex, so a
        // held aggregate lock never overlaps a map shard lock.
        self.request_locks.entry(request_id).or_default().value().clone()
    }

    /// Runs `work` as one atomic unit against the request's aggregate.
    ///
    /// Writes staged through the [`UnitOfWork`] become visible only when the
    /// closure returns `Ok`; on `Err` nothing is applied.
    pub fn with_request<T>(
        &self,
        request_id: RequestId,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock();
        let mut uow = UnitOfWork::new(self);
        let value = work(&mut uow)?;
        uow.commit();
        Ok(value)
    }

    // === Direct writes (single-entity, no aggregate to tear) ===

    /// Inserts a freshly created request.
    pub fn insert_request(&self, request: Request) {
        self.requests.insert(request.id, request);
    }

    /// Inserts a proposal, maintaining the aggregate indexes.
    pub fn insert_proposal(&self, proposal: Proposal) {
        let lock = self.lock_for(proposal.request_id);
        let _guard = lock.lock();
        let mut uow = UnitOfWork::new(self);
        uow.put_proposal(proposal);
        uow.commit();
    }

    /// Inserts a transaction, maintaining the aggregate indexes.
    pub fn insert_transaction(&self, transaction: Transaction) {
        let lock = self.lock_for(transaction.request_id);
        let _guard = lock.lock();
        let mut uow = UnitOfWork::new(self);
        if let Some(reference) = transaction.external_payment_ref.clone() {
            uow.index_payment_ref(reference, transaction.id);
        }
        uow.put_transaction(transaction);
        uow.commit();
    }

    /// Removes a request outright. Only legal for open, proposal-free
    /// requests; the manager enforces that policy.
    pub fn remove_request(&self, request_id: RequestId) {
        self.requests.remove(&request_id);
        self.request_proposals.remove(&request_id);
        self.request_locks.remove(&request_id);
    }

    // === Reads ===

    pub fn get_request(&self, request_id: RequestId) -> Option<Request> {
        self.requests.get(&request_id).map(|r| r.value().clone())
    }

    pub fn get_proposal(&self, proposal_id: ProposalId) -> Option<Proposal> {
        self.proposals.get(&proposal_id).map(|p| p.value().clone())
    }

    pub fn get_transaction(&self, transaction_id: TransactionId) -> Option<Transaction> {
        self.transactions.get(&transaction_id).map(|t| t.value().clone())
    }

    /// All proposals for a request in submission order.
    pub fn proposals_for_request(&self, request_id: RequestId) -> Vec<Proposal> {
        let Some(ids) = self.request_proposals.get(&request_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.proposals.get(id).map(|p| p.value().clone()))
            .collect()
    }

    pub fn transaction_for_proposal(&self, proposal_id: ProposalId) -> Option<Transaction> {
        let id = *self.proposal_transactions.get(&proposal_id)?;
        self.get_transaction(id)
    }

    /// Resolves an external payment reference to its transaction.
    pub fn transaction_by_ref(&self, reference: &str) -> Option<Transaction> {
        let id = *self.payment_refs.get(reference)?;
        self.get_transaction(id)
    }

    pub fn completed_jobs(&self, provider_id: ProviderId) -> u64 {
        self.completed_jobs.get(&provider_id).map(|c| *c).unwrap_or(0)
    }

    pub fn requests_for_client(&self, client_id: ClientId) -> Vec<Request> {
        self.requests
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn open_requests(&self) -> Vec<Request> {
        self.requests
            .iter()
            .filter(|entry| entry.is_open())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn proposals_for_provider(&self, provider_id: ProviderId) -> Vec<Proposal> {
        self.proposals
            .iter()
            .filter(|entry| entry.provider_id == provider_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn transactions_for_client(&self, client_id: ClientId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn transactions_for_provider(&self, provider_id: ProviderId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|entry| entry.provider_id == provider_id)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

/// A staged set of writes against one request aggregate.
///
/// Reads see staged writes first (read-your-writes), then the committed
/// tables. Dropping the unit without commit discards everything.
pub struct UnitOfWork<'a> {
    store: &'a LedgerStore,
    requests: Vec<Request>,
    proposals: Vec<Proposal>,
    transactions: Vec<Transaction>,
    payment_refs: Vec<(String, TransactionId)>,
    job_counters: Vec<ProviderId>,
}

impl<'a> UnitOfWork<'a> {
    fn new(store: &'a LedgerStore) -> Self {
        Self {
            store,
            requests: Vec::new(),
            proposals: Vec::new(),
            transactions: Vec::new(),
            payment_refs: Vec::new(),
            job_counters: Vec::new(),
        }
    }

    // === Reads (staged-first) ===

    pub fn request(&self, request_id: RequestId) -> Result<Request, MarketError> {
        if let Some(staged) = self.requests.iter().rev().find(|r| r.id == request_id) {
            return Ok(staged.clone());
        }
        self.store
            .get_request(request_id)
            .ok_or(MarketError::NotFound("request"))
    }

    pub fn proposal(&self, proposal_id: ProposalId) -> Result<Proposal, MarketError> {
        if let Some(staged) = self.proposals.iter().rev().find(|p| p.id == proposal_id) {
            return Ok(staged.clone());
        }
        self.store
            .get_proposal(proposal_id)
            .ok_or(MarketError::NotFound("proposal"))
    }

    pub fn transaction(&self, transaction_id: TransactionId) -> Result<Transaction, MarketError> {
        if let Some(staged) = self.transactions.iter().rev().find(|t| t.id == transaction_id) {
            return Ok(staged.clone());
        }
        self.store
            .get_transaction(transaction_id)
            .ok_or(MarketError::NotFound("transaction"))
    }

    /// All proposals for the request, with staged versions overlaid.
    pub fn proposals_for_request(&self, request_id: RequestId) -> Vec<Proposal> {
        let mut all = self.store.proposals_for_request(request_id);
        for staged in &self.proposals {
            if staged.request_id != request_id {
                continue;
            }
            match all.iter_mut().find(|p| p.id == staged.id) {
                Some(existing) => *existing = staged.clone(),
                None => all.push(staged.clone()),
            }
        }
        all
    }

    /// Whether the provider already holds an active proposal on the request.
    pub fn has_active_proposal(&self, request_id: RequestId, provider_id: ProviderId) -> bool {
        if let Some(staged) = self
            .proposals
            .iter()
            .rev()
            .find(|p| p.request_id == request_id && p.provider_id == provider_id)
        {
            return staged.status.is_active();
        }
        self.store
            .active_proposals
            .contains_key(&(request_id, provider_id))
    }

    pub fn transaction_for_proposal(&self, proposal_id: ProposalId) -> Option<TransactionId> {
        if let Some(staged) = self.transactions.iter().rev().find(|t| t.proposal_id == proposal_id) {
            return Some(staged.id);
        }
        self.store.proposal_transactions.get(&proposal_id).map(|id| *id)
    }

    // === Staged writes ===

    pub fn put_request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn put_proposal(&mut self, proposal: Proposal) {
        self.proposals.push(proposal);
    }

    pub fn put_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn index_payment_ref(&mut self, reference: String, transaction_id: TransactionId) {
        self.payment_refs.push((reference, transaction_id));
    }

    /// Stages a +1 on the provider's completed-jobs counter.
    pub fn bump_completed_jobs(&mut self, provider_id: ProviderId) {
        self.job_counters.push(provider_id);
    }

    /// Applies all staged writes to the tables and indexes.
    fn commit(self) {
        let Self {
            store,
            requests,
            proposals,
            transactions,
            payment_refs,
            job_counters,
        } = self;

        for request in requests {
            store.requests.insert(request.id, request);
        }

        for proposal in proposals {
            let key = (proposal.request_id, proposal.provider_id);
            let id = proposal.id;
            let active = proposal.status.is_active();
            let prior = store.proposals.insert(id, proposal.clone());
            match prior {
                None => {
                    store
                        .request_proposals
                        .entry(proposal.request_id)
                        .or_default()
                        .push(id);
                    if active {
                        store.active_proposals.insert(key, id);
                    }
                }
                Some(old) => {
                    // Leaving the active set frees the provider's slot, but
                    // only if the slot still points at this proposal.
                    if old.status.is_active() && !active {
                        store.active_proposals.remove_if(&key, |_, held| *held == id);
                    }
                }
            }
        }

        for transaction in transactions {
            let proposal_id = transaction.proposal_id;
            let id = transaction.id;
            let prior = store.transactions.insert(id, transaction);
            if prior.is_none() {
                store.proposal_transactions.insert(proposal_id, id);
            }
        }

        for (reference, transaction_id) in payment_refs {
            store.payment_refs.insert(reference, transaction_id);
        }

        for provider_id in job_counters {
            *store.completed_jobs.entry(provider_id).or_insert(0) += 1;
        }
    }
}
