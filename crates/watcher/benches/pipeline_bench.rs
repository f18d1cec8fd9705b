//! Hot-path benchmarks for the change pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::{ChangeEvent, EventBus, Fingerprint};
use watcher::{ChannelSource, ChangeWatcher, DebounceConfig, Debouncer, RawFlag, RawNotification};

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    for size in [1024usize, 1024 * 1024] {
        let data = vec![0x5au8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(Fingerprint::of_bytes(data)));
        });
    }
    group.finish();
}

fn bench_bus_publish(c: &mut Criterion) {
    let bus = EventBus::new("bench");
    for _ in 0..4 {
        bus.subscribe(|event: &ChangeEvent| {
            black_box(&event.path);
            Ok(())
        });
    }
    let event = ChangeEvent::new(Path::new("/data"), "notes.txt");

    c.bench_function("bus_publish_4_subscribers", |b| {
        b.iter(|| black_box(bus.publish(&event)));
    });
}

fn bench_debouncer_push(c: &mut Criterion) {
    // Never started: measures the insert path only
    let debouncer = Debouncer::new(DebounceConfig::new(Duration::from_secs(60))).unwrap();
    let events: Vec<ChangeEvent> = (0..1000)
        .map(|i| ChangeEvent::new(Path::new("/data"), &format!("file-{}.txt", i % 64)))
        .collect();

    c.bench_function("debouncer_push_64_keys", |b| {
        b.iter(|| {
            for event in &events {
                debouncer.push(event.clone());
            }
        });
    });
}

fn bench_watcher_dispatch(c: &mut Criterion) {
    let dir = std::env::temp_dir().canonicalize().unwrap();
    let paths: Vec<PathBuf> = (0..32).map(|i| dir.join(format!("watched-{}.txt", i))).collect();
    let watcher = ChangeWatcher::new(ChannelSource::new(), paths).unwrap();
    watcher.subscribe(|_event: &ChangeEvent| Ok(()));

    let hit = RawNotification {
        directory: dir.clone(),
        name: Some("watched-7.txt".to_string()),
        flags: vec![RawFlag::CloseWrite],
    };
    let miss = RawNotification {
        directory: dir,
        name: Some(".watched-7.txt.swp".to_string()),
        flags: vec![RawFlag::CloseWrite],
    };

    c.bench_function("watcher_dispatch_hit", |b| {
        b.iter(|| black_box(watcher.dispatch(hit.clone())));
    });
    c.bench_function("watcher_dispatch_miss", |b| {
        b.iter(|| black_box(watcher.dispatch(miss.clone())));
    });
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_bus_publish,
    bench_debouncer_push,
    bench_watcher_dispatch
);
criterion_main!(benches);
