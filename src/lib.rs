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

//! # Servimarket
//!
//! A service-marketplace lifecycle engine: clients post requests, providers
//! bid proposals, the client accepts exactly one, and the resulting
//! transaction settles through an asynchronous payment provider.
//!
//! ## Core components
//!
//! - [`LedgerStore`]: concurrent tables with per-request aggregate locking
//!   and an all-or-nothing unit of work
//! - [`RequestManager`] / [`ProposalManager`]: lifecycle rules for the two
//!   sides of the market
//! - [`AcceptanceCoordinator`]: single-winner acceptance per request
//! - [`SettlementHandler`]: idempotent payment-webhook state machine
//! - [`Marketplace`]: the assembled engine, built once and shared
//!
//! ## Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use servimarket::{
//!     CategoryId, ClientId, Location, Marketplace, NewProposal, NewRequest,
//!     PaymentStatus, ProviderId, Urgency,
//! };
//!
//! let market = Marketplace::with_defaults();
//! let client = ClientId::new();
//! let provider = ProviderId::new();
//!
//! let request = market
//!     .requests()
//!     .create_request(
//!         client,
//!         NewRequest {
//!             category_id: CategoryId::new(),
//!             title: "mount a TV".into(),
//!             description: "55 inch, drywall anchors needed".into(),
//!             budget_min: None,
//!             budget_max: Some(dec!(150)),
//!             deadline: None,
//!             urgency: Urgency::Medium,
//!             location: Location::default(),
//!         },
//!     )
//!     .unwrap();
//!
//! let proposal = market
//!     .proposals()
//!     .submit_proposal(
//!         provider,
//!         NewProposal {
//!             request_id: request.id,
//!             price: dec!(100),
//!             estimated_days: Some(1),
//!             message: "can do it Friday".into(),
//!         },
//!     )
//!     .unwrap();
//!
//! let transaction = market.acceptance().accept_proposal(proposal.id, client).unwrap();
//! assert_eq!(transaction.amount, dec!(100));
//! assert_eq!(transaction.platform_fee, dec!(10));
//! assert_eq!(transaction.payment_status, PaymentStatus::Pending);
//! ```
//!
//! ## Concurrency
//!
//! Every multi-entity mutation runs under its request's aggregate lock, so
//! concurrent acceptances, webhook deliveries, and edits serialize per
//! request while different requests proceed in parallel.

pub mod acceptance;
mod base;
pub mod engine;
pub mod error;
pub mod event;
pub mod pricing;
mod proposal;
pub mod proposals;
mod request;
pub mod requests;
pub mod settlement;
pub mod store;
mod transaction;

pub use acceptance::AcceptanceCoordinator;
pub use base::{
    CURRENCY, CategoryId, ClientId, ProposalId, ProviderId, RequestId, TransactionId,
};
pub use engine::Marketplace;
pub use error::MarketError;
pub use event::{LifecycleEvent, LogNotifier, Notifier, RecordingNotifier};
pub use pricing::{FeeSplit, compute_split};
pub use proposal::{Proposal, ProposalStatus};
pub use proposals::{
    AllVerified, EDIT_WINDOW_HOURS, NewProposal, ProposalManager, ProposalPatch,
    ProviderDirectory, StaticDirectory,
};
pub use request::{Location, Request, RequestStatus, Urgency};
pub use requests::{NewRequest, REQUEST_TTL_DAYS, RequestFilter, RequestManager, RequestPatch};
pub use settlement::{
    PaymentEvent, PaymentEventKind, PaymentMetadata, Settled, SettlementHandler,
};
pub use store::{LedgerStore, UnitOfWork};
pub use transaction::{PaymentStatus, Transaction};
