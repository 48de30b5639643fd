//! Synchronization cell handoff scenarios across runtime tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft_runtime::runtime::{EndCount, LocaleId, Runtime, SingleVar, SyncVar};
use weft_runtime::RuntimeConfig;

fn runtime(locales: u16, workers: usize) -> Runtime {
    Runtime::with_config(RuntimeConfig {
        num_locales: locales,
        workers_per_locale: workers,
        ..RuntimeConfig::default()
    })
    .unwrap()
}

#[test]
fn basic_handoff_through_tasks() {
    // Task A EF-writes 42; tasks B and C FF-read and must both observe 42;
    // the cell stays full afterwards.
    let rt = runtime(1, 2);
    let cell: Arc<SyncVar<u32>> = Arc::new(SyncVar::new());
    let seen = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    for _ in 0..2 {
        let cell = cell.clone();
        let seen = seen.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            let v = cell.read_ff();
            seen.fetch_add(v as usize, Ordering::SeqCst);
        })
        .unwrap();
    }

    {
        let cell = cell.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            cell.write_ef(42);
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(seen.load(Ordering::SeqCst), 84);
    assert!(cell.is_full());
}

#[test]
fn producer_consumer_pipeline() {
    // A bounded producer/consumer chain over one cell: each value written
    // EF is consumed FE exactly once, in order per the cell's depth-one
    // queue semantics.
    let rt = runtime(1, 2);
    let cell: Arc<SyncVar<u64>> = Arc::new(SyncVar::new());
    let sum = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    {
        let cell = cell.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            for i in 1..=100u64 {
                cell.write_ef(i);
            }
        })
        .unwrap();
    }
    {
        let cell = cell.clone();
        let sum = sum.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            for _ in 0..100 {
                sum.fetch_add(cell.read_fe() as usize, Ordering::SeqCst);
            }
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(sum.load(Ordering::SeqCst), 5050);
    assert!(!cell.is_full());
}

#[test]
fn single_var_broadcast() {
    // Many readers park on a write-once cell; one writer releases them
    // all, and late readers take the lock-free fast path.
    let rt = runtime(1, 4);
    let cell: Arc<SingleVar<String>> = Arc::new(SingleVar::new());
    let matched = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    for _ in 0..8 {
        let cell = cell.clone();
        let matched = matched.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            if cell.read_ff() == "ready" {
                matched.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
    }
    {
        let cell = cell.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            cell.write_ef("ready".to_string()).unwrap();
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(matched.load(Ordering::SeqCst), 8);
    assert_eq!(cell.try_read().as_deref(), Some("ready"));
}

#[test]
fn blocking_depth_beyond_worker_count() {
    // More simultaneously blocked tasks than workers on the locale; the
    // pool must keep making progress via the blocking hook.
    let rt = runtime(1, 2);
    let gate: Arc<SyncVar<u32>> = Arc::new(SyncVar::new());
    let released = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    for _ in 0..6 {
        let gate = gate.clone();
        let released = released.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            let v = gate.read_ff();
            released.fetch_add(v as usize, Ordering::SeqCst);
        })
        .unwrap();
    }
    {
        let gate = gate.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            gate.write_ef(1);
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(released.load(Ordering::SeqCst), 6);
}
