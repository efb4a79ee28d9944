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

//! Marketplace facade.
//!
//! Wires the lifecycle components over one shared ledger store. One
//! [`Marketplace`] is constructed at process start and passed by reference
//! to request handlers; there is no hidden shared state beyond the store
//! itself.

use crate::acceptance::AcceptanceCoordinator;
use crate::event::{LogNotifier, Notifier};
use crate::proposals::{AllVerified, ProposalManager, ProviderDirectory};
use crate::requests::RequestManager;
use crate::settlement::SettlementHandler;
use crate::store::LedgerStore;
use std::sync::Arc;

/// The assembled lifecycle engine.
pub struct Marketplace {
    store: Arc<LedgerStore>,
    requests: RequestManager,
    proposals: ProposalManager,
    acceptance: AcceptanceCoordinator,
    settlement: SettlementHandler,
}

impl Marketplace {
    /// Builds a marketplace with explicit collaborators.
    pub fn new(directory: Arc<dyn ProviderDirectory>, notifier: Arc<dyn Notifier>) -> Self {
        let store = Arc::new(LedgerStore::new());
        Self {
            requests: RequestManager::new(Arc::clone(&store)),
            proposals: ProposalManager::new(
                Arc::clone(&store),
                directory,
                Arc::clone(&notifier),
            ),
            acceptance: AcceptanceCoordinator::new(Arc::clone(&store), Arc::clone(&notifier)),
            settlement: SettlementHandler::new(Arc::clone(&store), notifier),
            store,
        }
    }

    /// Demo wiring: every provider verified, events logged only.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(AllVerified), Arc::new(LogNotifier))
    }

    pub fn requests(&self) -> &RequestManager {
        &self.requests
    }

    pub fn proposals(&self) -> &ProposalManager {
        &self.proposals
    }

    pub fn acceptance(&self) -> &AcceptanceCoordinator {
        &self.acceptance
    }

    pub fn settlement(&self) -> &SettlementHandler {
        &self.settlement
    }

    /// Direct store access, mainly for seeding and inspection in tests and
    /// tooling.
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }
}

impl Default for Marketplace {
    fn default() -> Self {
        Self::with_defaults()
    }
}
