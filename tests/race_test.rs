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

//! Concurrency tests: racing acceptances, duplicate submissions, and
//! at-least-once webhook delivery under thread pressure.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use servimarket::{
    CategoryId, ClientId, Location, Marketplace, NewProposal, NewRequest, PaymentEvent,
    PaymentEventKind, PaymentMetadata, PaymentStatus, Proposal, ProposalStatus, ProviderId,
    Request, RequestId, Settled, Urgency,
};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

/// Background deadlock detector; panics the test process if any test in this
/// binary deadlocks instead of hanging until the CI timeout.
fn spawn_deadlock_detector() {
    thread::spawn(|| {
        loop {
            thread::sleep(Duration::from_secs(2));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                panic!("{} deadlocked threads detected", deadlocks.len());
            }
        }
    });
}

fn post_request(market: &Marketplace, client: ClientId) -> Request {
    market
        .requests()
        .create_request(
            client,
            NewRequest {
                category_id: CategoryId::new(),
                title: "move a piano".into(),
                description: "third floor, no elevator".into(),
                budget_min: None,
                budget_max: None,
                deadline: None,
                urgency: Urgency::High,
                location: Location::default(),
            },
        )
        .unwrap()
}

fn bid(
    market: &Marketplace,
    provider: ProviderId,
    request_id: RequestId,
    price: Decimal,
) -> Proposal {
    market
        .proposals()
        .submit_proposal(
            provider,
            NewProposal {
                request_id,
                price,
                estimated_days: Some(1),
                message: String::new(),
            },
        )
        .unwrap()
}

#[test]
fn concurrent_accepts_produce_exactly_one_winner() {
    spawn_deadlock_detector();
    let market = Marketplace::with_defaults();
    let client = ClientId::new();
    let request = post_request(&market, client);

    let proposals: Vec<Proposal> = (0..4)
        .map(|i| bid(&market, ProviderId::new(), request.id, dec!(100) + Decimal::from(i)))
        .collect();

    let threads = 8;
    let barrier = Barrier::new(threads);
    let successes: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let proposal_id = proposals[i % proposals.len()].id;
                let market = &market;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    market.acceptance().accept_proposal(proposal_id, client).is_ok()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).filter(|&ok| ok).count()
    });

    assert_eq!(successes, 1);

    let accepted: Vec<_> = market
        .store()
        .proposals_for_request(request.id)
        .into_iter()
        .filter(|p| p.status == ProposalStatus::Accepted)
        .collect();
    assert_eq!(accepted.len(), 1);

    // Exactly one transaction exists, and it belongs to the winner.
    let winner = &accepted[0];
    let transaction = market.store().transaction_for_proposal(winner.id).unwrap();
    assert_eq!(transaction.amount, winner.price);
    for proposal in &proposals {
        if proposal.id != winner.id {
            assert_eq!(
                market.store().get_proposal(proposal.id).unwrap().status,
                ProposalStatus::Rejected
            );
            assert!(market.store().transaction_for_proposal(proposal.id).is_none());
        }
    }
}

#[test]
fn concurrent_duplicate_submissions_keep_one_active_proposal() {
    spawn_deadlock_detector();
    let market = Marketplace::with_defaults();
    let client = ClientId::new();
    let provider = ProviderId::new();
    let request = post_request(&market, client);

    let threads = 8;
    let barrier = Barrier::new(threads);
    let successes: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let market = &market;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    market
                        .proposals()
                        .submit_proposal(
                            provider,
                            NewProposal {
                                request_id: request.id,
                                price: dec!(100),
                                estimated_days: None,
                                message: String::new(),
                            },
                        )
                        .is_ok()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).filter(|&ok| ok).count()
    });

    assert_eq!(successes, 1);
    assert_eq!(market.store().proposals_for_request(request.id).len(), 1);
    assert_eq!(
        market.requests().get_request(request.id).unwrap().proposal_count,
        1
    );
}

#[test]
fn duplicate_webhook_deliveries_apply_once() {
    spawn_deadlock_detector();
    let market = Marketplace::with_defaults();
    let client = ClientId::new();
    let request = post_request(&market, client);
    let proposal = bid(&market, ProviderId::new(), request.id, dec!(100));
    let transaction = market
        .acceptance()
        .open_payment_intent(proposal.id, client, "pi_dup".into())
        .unwrap();

    let event = PaymentEvent {
        kind: PaymentEventKind::Succeeded,
        metadata: PaymentMetadata {
            transaction_id: transaction.id,
            proposal_id: proposal.id,
            request_id: request.id,
        },
    };

    let threads = 8;
    let barrier = Barrier::new(threads);
    let outcomes: Vec<Settled> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let market = &market;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    market.settlement().handle_payment_event(event)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let applied = outcomes.iter().filter(|o| **o == Settled::Applied).count();
    let ignored = outcomes.iter().filter(|o| **o == Settled::AlreadySettled).count();
    assert_eq!(applied, 1);
    assert_eq!(ignored, threads - 1);
    assert_eq!(
        market.store().get_transaction(transaction.id).unwrap().payment_status,
        PaymentStatus::Paid
    );
}

#[test]
fn independent_requests_settle_in_parallel() {
    spawn_deadlock_detector();
    let market = Marketplace::with_defaults();

    // One client and provider pair per lane; lanes share nothing.
    let lanes = 16;
    thread::scope(|scope| {
        for _ in 0..lanes {
            let market = &market;
            scope.spawn(move || {
                let client = ClientId::new();
                let provider = ProviderId::new();
                let request = post_request(market, client);
                let proposal = bid(market, provider, request.id, dec!(60));
                let transaction = market
                    .acceptance()
                    .accept_proposal(proposal.id, client)
                    .unwrap();
                let outcome = market.settlement().handle_payment_event(PaymentEvent {
                    kind: PaymentEventKind::Succeeded,
                    metadata: PaymentMetadata {
                        transaction_id: transaction.id,
                        proposal_id: proposal.id,
                        request_id: request.id,
                    },
                });
                assert_eq!(outcome, Settled::Applied);
                market
                    .settlement()
                    .confirm_transaction(transaction.id, client)
                    .unwrap();
                assert_eq!(market.store().completed_jobs(provider), 1);
            });
        }
    });

    assert_eq!(market.requests().list_open(&Default::default()).len(), 0);
}
