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

//! Benchmarks for the marketplace engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded request/proposal throughput
//! - Full lifecycle (post, bid, accept, settle, confirm)
//! - Parallel lifecycles across independent requests
//! - Lock contention when many bidders target one request

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;
use servimarket::{
    CategoryId, ClientId, Location, Marketplace, NewProposal, NewRequest, PaymentEvent,
    PaymentEventKind, PaymentMetadata, ProviderId, Request, RequestId, Urgency,
};
use std::thread;

// =============================================================================
// Helper Functions
// =============================================================================

fn post(market: &Marketplace, client: ClientId) -> Request {
    market
        .requests()
        .create_request(
            client,
            NewRequest {
                category_id: CategoryId::new(),
                title: "benchmark job".into(),
                description: "benchmark description".into(),
                budget_min: None,
                budget_max: None,
                deadline: None,
                urgency: Urgency::Medium,
                location: Location::default(),
            },
        )
        .unwrap()
}

fn bid(market: &Marketplace, provider: ProviderId, request_id: RequestId) -> servimarket::Proposal {
    market
        .proposals()
        .submit_proposal(
            provider,
            NewProposal {
                request_id,
                price: dec!(100),
                estimated_days: Some(2),
                message: String::new(),
            },
        )
        .unwrap()
}

fn run_lifecycle(market: &Marketplace) {
    let client = ClientId::new();
    let provider = ProviderId::new();
    let request = post(market, client);
    let proposal = bid(market, provider, request.id);
    let transaction = market.acceptance().accept_proposal(proposal.id, client).unwrap();
    market.settlement().handle_payment_event(PaymentEvent {
        kind: PaymentEventKind::Succeeded,
        metadata: PaymentMetadata {
            transaction_id: transaction.id,
            proposal_id: proposal.id,
            request_id: request.id,
        },
    });
    market.settlement().confirm_transaction(transaction.id, client).unwrap();
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_request(c: &mut Criterion) {
    c.bench_function("single_request", |b| {
        let market = Marketplace::with_defaults();
        let client = ClientId::new();
        b.iter(|| {
            black_box(post(&market, client));
        })
    });
}

fn bench_single_proposal(c: &mut Criterion) {
    c.bench_function("single_proposal", |b| {
        let market = Marketplace::with_defaults();
        let client = ClientId::new();
        let request = post(&market, client);
        b.iter(|| {
            // A fresh provider each round keeps the uniqueness slot open.
            black_box(bid(&market, ProviderId::new(), request.id));
        })
    });
}

fn bench_full_lifecycle(c: &mut Criterion) {
    c.bench_function("full_lifecycle", |b| {
        let market = Marketplace::with_defaults();
        b.iter(|| run_lifecycle(black_box(&market)))
    });
}

fn bench_proposal_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("proposal_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let market = Marketplace::with_defaults();
                let client = ClientId::new();
                let request = post(&market, client);
                for _ in 0..count {
                    bid(&market, ProviderId::new(), request.id);
                }
                black_box(&market);
            })
        });
    }
    group.finish();
}

fn bench_acceptance_with_siblings(c: &mut Criterion) {
    let mut group = c.benchmark_group("acceptance_with_siblings");

    // Acceptance cost grows with the number of pending siblings to reject.
    for siblings in [1, 10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(siblings),
            siblings,
            |b, &siblings| {
                b.iter_batched(
                    || {
                        let market = Marketplace::with_defaults();
                        let client = ClientId::new();
                        let request = post(&market, client);
                        let winner = bid(&market, ProviderId::new(), request.id);
                        for _ in 0..siblings {
                            bid(&market, ProviderId::new(), request.id);
                        }
                        (market, winner.id, client)
                    },
                    |(market, winner, client)| {
                        market.acceptance().accept_proposal(winner, client).unwrap();
                        black_box(&market);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_lifecycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_lifecycles");

    for num_threads in [2, 4, 8].iter() {
        let lifecycles_per_thread = 50u64;
        group.throughput(Throughput::Elements(*num_threads as u64 * lifecycles_per_thread));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let market = Marketplace::with_defaults();
                    thread::scope(|scope| {
                        for _ in 0..num_threads {
                            let market = &market;
                            scope.spawn(move || {
                                for _ in 0..lifecycles_per_thread {
                                    run_lifecycle(market);
                                }
                            });
                        }
                    });
                    black_box(&market);
                })
            },
        );
    }
    group.finish();
}

fn bench_contended_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_request");
    let total_bids = 1_000u64;

    // Fewer requests means more threads fighting over the same aggregate lock.
    for num_requests in [1, 10, 100].iter() {
        group.throughput(Throughput::Elements(total_bids));
        group.bench_with_input(
            BenchmarkId::new("requests", num_requests),
            num_requests,
            |b, &num_requests| {
                b.iter_batched(
                    || {
                        let market = Marketplace::with_defaults();
                        let client = ClientId::new();
                        let requests: Vec<_> =
                            (0..num_requests).map(|_| post(&market, client).id).collect();
                        (market, requests)
                    },
                    |(market, requests)| {
                        let threads = 8;
                        thread::scope(|scope| {
                            for t in 0..threads {
                                let market = &market;
                                let requests = &requests;
                                scope.spawn(move || {
                                    let per_thread = total_bids / threads as u64;
                                    for i in 0..per_thread {
                                        let target =
                                            requests[(t + i as usize) % requests.len()];
                                        bid(market, ProviderId::new(), target);
                                    }
                                });
                            }
                        });
                        black_box(&market);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_single_request,
    bench_single_proposal,
    bench_full_lifecycle,
    bench_proposal_throughput,
    bench_acceptance_with_siblings,
);

criterion_group!(multi_threaded, bench_parallel_lifecycles, bench_contended_request,);

criterion_main!(single_threaded, multi_threaded);
