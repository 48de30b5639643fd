//! Remote execution scenarios: locality of spawned tasks and completion
//! routing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft_runtime::runtime::{here, EndCount, LocaleId, Runtime};
use weft_runtime::RuntimeConfig;

fn runtime(locales: u16) -> Runtime {
    Runtime::with_config(RuntimeConfig {
        num_locales: locales,
        workers_per_locale: 2,
        ..RuntimeConfig::default()
    })
    .unwrap()
}

#[test]
fn tasks_observe_their_locale() {
    let rt = runtime(4);
    let hits = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    for l in 0..4u16 {
        let hits = hits.clone();
        rt.spawn(LocaleId(l), &scope, move || {
            if here() == LocaleId(l) {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[test]
fn remote_task_spawns_further_tasks() {
    // A remote task fans out again from its own locale, into the same
    // origin-owned scope.
    let rt = Arc::new(runtime(3));
    let count = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    let rt2 = Arc::clone(&rt);
    let scope2 = Arc::clone(&scope);
    let count2 = count.clone();
    rt.spawn(LocaleId(1), &scope, move || {
        count2.fetch_add(1, Ordering::SeqCst);
        for l in 0..3u16 {
            let count3 = count2.clone();
            rt2.spawn(LocaleId(l), &scope2, move || {
                count3.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    })
    .unwrap();

    scope.wait();
    assert_eq!(count.load(Ordering::SeqCst), 4);
}

#[test]
fn remote_panic_still_joins_at_origin() {
    // A panicking remote task must still send its completion home.
    let rt = runtime(2);
    let scope = EndCount::new();

    rt.spawn(LocaleId(1), &scope, || panic!("remote failure"))
        .unwrap();
    rt.spawn(LocaleId(1), &scope, || {}).unwrap();

    scope.wait();
    assert_eq!(scope.pending(), 0);
}

#[test]
fn wide_remote_fan_out_joins_at_origin() {
    // Every completion of a non-origin task crosses back to locale 0; the
    // origin-side wait must see all of them.
    let rt = runtime(2);
    let count = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    for _ in 0..200 {
        let count = count.clone();
        rt.spawn(LocaleId(1), &scope, move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(count.load(Ordering::SeqCst), 200);
    assert_eq!(scope.pending(), 0);
}
