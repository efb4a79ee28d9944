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

//! Transaction entity.
//!
//! The financial record opened when a proposal is accepted (or a payment
//! intent is created). Transactions are append-mostly: they are never
//! deleted, only advanced through the payment state machine:
//!
//  Pending ──payment succeeded──► Paid ──client confirms──► Completed
//    │
//    └──payment failed──► Failed
//!
//! `Paid`, `Completed`, `Failed`, and `Refunded` are sticky: settlement
//! events arriving after one of them is reached are no-ops, which is what
//! makes at-least-once webhook delivery safe.

use crate::base::{CURRENCY, ClientId, ProposalId, ProviderId, RequestId, TransactionId};
use crate::pricing::FeeSplit;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Opened, awaiting payment-provider confirmation.
    Pending,
    /// Funds captured by the payment provider.
    Paid,
    /// Client confirmed the job and released funds; terminal.
    Completed,
    /// Payment provider reported failure; terminal.
    Failed,
    /// Reserved for the out-of-scope dispute/refund flow; terminal.
    Refunded,
}

impl PaymentStatus {
    /// True once the payment provider has spoken; settlement events are
    /// no-ops from here on.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Refunded)
    }
}

/// The financial record tied to one accepted proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub request_id: RequestId,
    pub proposal_id: ProposalId,
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    /// Immutable snapshot of the proposal price at acceptance time.
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub provider_earnings: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    /// Opaque correlation reference issued by the payment provider.
    pub external_payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Stamped when the payment succeeds.
    pub started_at: Option<DateTime<Utc>>,
    /// Stamped when the provider reports the job done.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Opens a pending transaction snapshotting the accepted price and split.
    pub fn open(
        request_id: RequestId,
        proposal_id: ProposalId,
        client_id: ClientId,
        provider_id: ProviderId,
        amount: Decimal,
        split: FeeSplit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            request_id,
            proposal_id,
            client_id,
            provider_id,
            amount,
            platform_fee: split.platform_fee,
            provider_earnings: split.provider_earnings,
            currency: CURRENCY.to_string(),
            payment_status: PaymentStatus::Pending,
            external_payment_ref: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::compute_split;
    use rust_decimal_macros::dec;

    #[test]
    fn settled_and_terminal_states() {
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Completed.is_settled());
        assert!(PaymentStatus::Failed.is_settled());
        assert!(PaymentStatus::Refunded.is_settled());

        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn open_snapshots_amount_and_split() {
        let amount = dec!(200.00);
        let split = compute_split(amount).unwrap();
        let tx = Transaction::open(
            RequestId::new(),
            ProposalId::new(),
            ClientId::new(),
            ProviderId::new(),
            amount,
            split,
            Utc::now(),
        );

        assert_eq!(tx.amount, dec!(200.00));
        assert_eq!(tx.platform_fee, dec!(20.000));
        assert_eq!(tx.provider_earnings, dec!(180.000));
        assert_eq!(tx.amount, tx.platform_fee + tx.provider_earnings);
        assert_eq!(tx.payment_status, PaymentStatus::Pending);
        assert_eq!(tx.currency, CURRENCY);
        assert!(tx.started_at.is_none());
        assert!(tx.completed_at.is_none());
    }
}
