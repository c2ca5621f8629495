//! # Card Emulation Benchmarks
//!
//! | Component | Operation | Path |
//! |-----------|-----------|------|
//! | ce-01 Resolution | `resolve(aid)`, cold, cached and random | APDU path, every SELECT |
//! | ce-02 Routing | `configure_routing`, full reprogram | maintenance path |
//! | ce-03 Session | `find_select_aid` | APDU path, every command |

use std::time::Duration;

use ce_01_aid_resolution::AidResolutionApi;
use ce_02_aid_routing::AidRoutingApi;
use ce_03_host_emulation::{find_select_aid, select_apdu};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nfc_tests::integration::fixtures::{build_stack, host_service, stack_config};
use rand::Rng;
use shared_types::{CardEmulationService, Category};

fn aid(i: usize) -> String {
    format!("F0{:012X}", i)
}

fn services(count: usize) -> Vec<CardEmulationService> {
    (0..count)
        .map(|i| host_service(&format!("com.svc{i}"), &aid(i), Category::Other))
        .collect()
}

// ============================================================================
// CE-01: AID Resolution
// ============================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("ce-01-aid-resolution");
    group.measurement_time(Duration::from_secs(5));

    for count in [10, 100, 500] {
        let (stack, _driver) = build_stack(stack_config(services(count)));
        let target = aid(count / 2);

        group.bench_with_input(BenchmarkId::new("resolve_cached", count), &target, |b, target| {
            b.iter(|| black_box(stack.resolver.resolve(target)))
        });

        group.bench_with_input(BenchmarkId::new("resolve_cold", count), &target, |b, target| {
            b.iter(|| {
                stack.resolver.on_nfc_enabled();
                black_box(stack.resolver.resolve(target))
            })
        });

        let aids: Vec<String> = (0..count).map(aid).collect();
        group.bench_with_input(BenchmarkId::new("resolve_random", count), &aids, |b, aids| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let target = &aids[rng.gen_range(0..aids.len())];
                black_box(stack.resolver.resolve(target))
            })
        });
    }

    group.finish();
}

// ============================================================================
// CE-02: Routing Table Synthesis
// ============================================================================

fn bench_configure_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("ce-02-aid-routing");
    group.measurement_time(Duration::from_secs(5));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for count in [10, 50, 200] {
        let mut config = stack_config(services(count));
        config.controller.capacity_bytes = 64 * 1024;
        let (stack, _driver) = build_stack(config);
        let assignments = stack.resolver.routing_assignments();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("configure_forced", count),
            &assignments,
            |b, assignments| {
                b.iter(|| {
                    runtime.block_on(async {
                        black_box(stack.routing.configure_routing(assignments, true).await)
                    })
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("configure_unchanged", count),
            &assignments,
            |b, assignments| {
                b.iter(|| {
                    runtime.block_on(async {
                        black_box(stack.routing.configure_routing(assignments, false).await)
                    })
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// CE-03: APDU Parsing
// ============================================================================

fn bench_find_select_aid(c: &mut Criterion) {
    let mut group = c.benchmark_group("ce-03-host-emulation");
    let select = select_apdu("A0000000031010").unwrap();
    let read_record = vec![0x00, 0xB2, 0x01, 0x0C, 0x00];

    group.bench_function("find_select_aid_select", |b| {
        b.iter(|| black_box(find_select_aid(black_box(&select))))
    });
    group.bench_function("find_select_aid_other", |b| {
        b.iter(|| black_box(find_select_aid(black_box(&read_record))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_configure_routing,
    bench_find_select_aid,
);

criterion_main!(benches);
