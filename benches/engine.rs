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

//! Benchmarks for the royalty ledger.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded appends and balance derivation
//! - Payment request and settlement
//! - Parallel appends across artists and under contention
//! - Reconciliation over many artists

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use royalty_ledger::{
    Amount, Artist, ArtistId, BrandId, EarningSource, EntryKind, Ledger, MemorySink, NewEntry,
    NewPaymentMethod, PaymentMethodId, PaymentRequest, ReconciliationJob,
};
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn make_ledger(artists: u32) -> (Ledger, Vec<PaymentMethodId>) {
    let ledger = Ledger::new();
    let methods = (1..=artists)
        .map(|id| {
            ledger
                .roster()
                .register_artist(Artist {
                    id: ArtistId(id),
                    brand: BrandId(1),
                    name: format!("Artist {id}"),
                })
                .unwrap();
            ledger
                .roster()
                .add_payment_method(
                    ArtistId(id),
                    NewPaymentMethod {
                        bank_code: "001".into(),
                        bank_name: "First Bank".into(),
                        account_reference: format!("ACC-{id}"),
                        is_default: true,
                    },
                )
                .unwrap()
                .id
        })
        .collect();
    (ledger, methods)
}

fn make_earning(artist: u32, amount: i64) -> NewEntry {
    NewEntry {
        artist_id: ArtistId(artist),
        kind: EntryKind::Earning {
            source: EarningSource::Streaming,
            platform: "Spotify".into(),
        },
        amount: Amount::from_minor(amount),
        release_id: None,
        description: None,
        recorded_at: Utc::now(),
        corrects: None,
    }
}

fn make_entry(artist: u32, i: usize, amount: i64) -> NewEntry {
    let kind = match i % 3 {
        0 => EntryKind::Royalty,
        1 => EntryKind::Expense,
        _ => return make_earning(artist, amount),
    };
    NewEntry {
        kind,
        ..make_earning(artist, amount)
    }
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_append(c: &mut Criterion) {
    let (ledger, _) = make_ledger(1);
    c.bench_function("single_append", |b| {
        b.iter(|| {
            ledger.append(black_box(make_earning(1, 10_000))).unwrap();
        })
    });
}

fn bench_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (ledger, _) = make_ledger(1);
                for i in 0..count {
                    ledger.append(make_entry(1, i, 100)).unwrap();
                }
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_compute_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_balance");

    for entries in [10, 1_000, 100_000].iter() {
        let (ledger, _) = make_ledger(1);
        for i in 0..*entries {
            ledger.append(make_entry(1, i, 100)).unwrap();
        }
        group.throughput(Throughput::Elements(*entries as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), entries, |b, _| {
            b.iter(|| black_box(ledger.compute_balance(ArtistId(1), None).unwrap()))
        });
    }
    group.finish();
}

fn bench_cached_balance(c: &mut Criterion) {
    let (ledger, _) = make_ledger(1);
    for i in 0..100_000 {
        ledger.append(make_entry(1, i, 100)).unwrap();
    }
    c.bench_function("cached_balance", |b| {
        b.iter(|| black_box(ledger.balance(ArtistId(1)).unwrap()))
    });
}

fn bench_payment_cycle(c: &mut Criterion) {
    let (ledger, methods) = make_ledger(1);
    ledger.append(make_earning(1, i64::MAX / 2)).unwrap();
    let request = PaymentRequest {
        artist_id: ArtistId(1),
        method_id: methods[0],
        amount: Amount::from_minor(100),
    };

    c.bench_function("payment_cycle", |b| {
        b.iter(|| {
            let id = ledger.request_payment(black_box(request)).unwrap();
            ledger.complete_payment(id).unwrap();
        })
    });
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_appends_same_artist(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_appends_same_artist");

    for count in [1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (ledger, _) = make_ledger(1);
                (0..count).into_par_iter().for_each(|i| {
                    ledger.append(make_entry(1, i, 100)).unwrap();
                });
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 10_000usize;

    // Fewer artists means more threads competing for the same account lock.
    for num_artists in [1u32, 10, 100, 1_000].iter() {
        let (ledger, methods) = make_ledger(*num_artists);
        let ledger = Arc::new(ledger);
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("artists", num_artists),
            num_artists,
            |b, &num_artists| {
                b.iter(|| {
                    (0..total_ops).into_par_iter().for_each(|i| {
                        let artist = (i as u32 % num_artists) + 1;
                        if i % 10 == 9 {
                            let request = PaymentRequest {
                                artist_id: ArtistId(artist),
                                method_id: methods[artist as usize - 1],
                                amount: Amount::from_minor(50),
                            };
                            if let Ok(id) = ledger.request_payment(request) {
                                let _ = ledger.complete_payment(id);
                            }
                        } else {
                            ledger.append(make_earning(artist, 100)).unwrap();
                        }
                    });
                    black_box(&ledger);
                })
            },
        );
    }
    group.finish();
}

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let total_entries = 100_000usize;

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(total_entries as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();

                b.iter(|| {
                    let (ledger, _) = make_ledger(1_000);
                    pool.install(|| {
                        (0..total_entries).into_par_iter().for_each(|i| {
                            let artist = (i % 1_000) as u32 + 1;
                            ledger.append(make_entry(artist, i, 100)).unwrap();
                        });
                    });
                    black_box(&ledger);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Reconciliation Benchmarks
// =============================================================================

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for num_artists in [10u32, 100, 1_000].iter() {
        let (ledger, _) = make_ledger(*num_artists);
        (1..=*num_artists).into_par_iter().for_each(|artist| {
            for i in 0..100 {
                ledger.append(make_entry(artist, i, 100)).unwrap();
            }
        });
        let sink = MemorySink::new();
        group.throughput(Throughput::Elements(*num_artists as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_artists), num_artists, |b, _| {
            b.iter(|| black_box(ReconciliationJob::new(&ledger, &sink).run()))
        });
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_single_append,
    bench_append_throughput,
    bench_compute_balance,
    bench_cached_balance,
    bench_payment_cycle,
);

criterion_group!(
    multi_threaded,
    bench_parallel_appends_same_artist,
    bench_contention,
);

criterion_group!(scaling, bench_thread_scaling,);

criterion_group!(reconciliation, bench_reconciliation,);

criterion_main!(single_threaded, multi_threaded, scaling, reconciliation);
