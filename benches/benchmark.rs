// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 性能基准测试套件
//!
//! 覆盖进度汇总、规则校验与内存作业仓库的并发写入。

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mailvet::domain::models::item::{ItemOutcome, ItemResult, ItemStatus, ReasonCode};
use mailvet::domain::repositories::job_repository::JobRepository;
use mailvet::domain::services::address_check::{AddressCheck, RuleBasedChecker};
use mailvet::domain::services::progress_aggregator::ProgressAggregator;
use mailvet::infrastructure::repositories::memory_job_repo::InMemoryJobRepository;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user{}@example.com", i)).collect()
}

/// 基准测试：从条目状态统计作业计数
fn benchmark_tally(c: &mut Criterion) {
    let mut group = c.benchmark_group("progress_tally");

    for size in [100, 1_000, 10_000].iter() {
        let statuses: Vec<ItemStatus> = (0..*size)
            .map(|i| match i % 5 {
                0 => ItemStatus::Queued,
                1 => ItemStatus::InProgress,
                2 => ItemStatus::Valid,
                3 => ItemStatus::Invalid,
                _ => ItemStatus::Error,
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("tally", size), &statuses, |b, statuses| {
            b.iter(|| black_box(ProgressAggregator::tally(statuses.iter().copied())))
        });
    }

    group.finish();
}

/// 基准测试：单地址规则校验（不做在线解析）
fn benchmark_rule_check(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let checker = RuleBasedChecker::offline();
    let mut group = c.benchmark_group("rule_check");

    for address in ["john.doe@example.com", "jane@gmial.com", "bad-address"] {
        group.bench_with_input(BenchmarkId::new("check", address), address, |b, address| {
            b.to_async(&rt)
                .iter(|| async { black_box(checker.check(address).await.unwrap()) })
        });
    }

    group.finish();
}

/// 基准测试：同一作业的并发条目写入
///
/// 每次写入都要在作业锁内重新统计全部条目
fn benchmark_concurrent_updates(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("memory_update_item");
    group.sample_size(20);

    for size in [100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::new("concurrent", size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let repo = Arc::new(InMemoryJobRepository::new());
                let job = repo.create_job(&addresses(size)).await.unwrap();
                repo.mark_dispatched(job.id).await.unwrap();

                let updates = (0..size).map(|index| {
                    let repo = repo.clone();
                    async move {
                        let outcome = ItemOutcome::new(
                            ItemStatus::Valid,
                            ItemResult {
                                is_valid: true,
                                reason: ReasonCode::Ok,
                                report: None,
                                message: None,
                            },
                        );
                        repo.update_item(job.id, index, outcome).await.unwrap()
                    }
                });
                black_box(futures::future::join_all(updates).await)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_tally,
    benchmark_rule_check,
    benchmark_concurrent_updates
);
criterion_main!(benches);
