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

//! Lifecycle events and the notification collaborator interface.
//!
//! The engine emits events *after* a unit of work commits; delivery is
//! best-effort and a notifier must never influence core state. Events carry
//! only the ids a downstream dispatcher needs to look up display data.

use crate::base::{ClientId, ProposalId, ProviderId, RequestId, TransactionId};
use crossbeam::queue::SegQueue;
use serde::Serialize;
use tracing::info;

/// Events emitted on lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    #[serde(rename = "proposal.created")]
    ProposalCreated {
        request_id: RequestId,
        proposal_id: ProposalId,
        provider_id: ProviderId,
    },
    #[serde(rename = "proposal.accepted")]
    ProposalAccepted {
        request_id: RequestId,
        proposal_id: ProposalId,
        client_id: ClientId,
        provider_id: ProviderId,
        transaction_id: TransactionId,
    },
    #[serde(rename = "payment.succeeded")]
    PaymentSucceeded {
        request_id: RequestId,
        proposal_id: ProposalId,
        transaction_id: TransactionId,
    },
}

/// Notification collaborator.
///
/// Implementations dispatch emails, push, or socket messages. Failures are
/// theirs to swallow; the trait gives them no way to report one back.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: LifecycleEvent);
}

/// Notifier that logs events and does nothing else. Default wiring for
/// deployments where dispatch happens out of process.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: LifecycleEvent) {
        info!(?event, "lifecycle event");
    }
}

/// Notifier that records events in arrival order.
///
/// Used by tests to assert on emissions; the lock-free queue keeps it safe to
/// share across the threads of a concurrency test.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: SegQueue<LifecycleEvent>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all recorded events in FIFO order.
    pub fn drain(&self) -> Vec<LifecycleEvent> {
        let mut drained = Vec::new();
        while let Some(event) = self.events.pop() {
            drained.push(event);
        }
        drained
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: LifecycleEvent) {
        self.events.push(event);
    }
}
