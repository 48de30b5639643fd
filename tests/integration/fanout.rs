//! Join-scope fan-out scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft_runtime::runtime::{EndCount, LocaleId, Runtime};
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
fn hundred_task_join() {
    // 100 tasks into one scope, each draining a shared counter from 100:
    // after wait() the counter is 0 and nothing is outstanding.
    let rt = runtime(1, 4);
    let counter = Arc::new(AtomicUsize::new(100));

    let scope = EndCount::new();
    for _ in 0..100 {
        let counter = counter.clone();
        rt.spawn(LocaleId(0), &scope, move || {
            counter.fetch_sub(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(scope.pending(), 0);
}

#[test]
fn fan_out_across_locales() {
    // Tasks spread over every locale, all joining one origin-side scope;
    // remote completions come home as messages.
    let rt = runtime(4, 2);
    let counter = Arc::new(AtomicUsize::new(0));

    let scope = EndCount::new();
    for i in 0..64 {
        let target = LocaleId(i % 4);
        let counter = counter.clone();
        rt.spawn(target, &scope, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    scope.wait();
    assert_eq!(counter.load(Ordering::SeqCst), 64);
}

#[test]
fn nested_scopes_inside_main_run() {
    // run() owns the main scope; tasks open private child scopes and wait
    // on them without disturbing the main one.
    let rt = Arc::new(runtime(2, 2));
    let total = Arc::new(AtomicUsize::new(0));

    let rt2 = Arc::clone(&rt);
    let total2 = total.clone();
    rt.run(move || {
        let inner = EndCount::new();
        for l in 0..2 {
            let total3 = total2.clone();
            rt2.spawn(LocaleId(l), &inner, move || {
                total3.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        inner.wait();
        total2.fetch_add(10, Ordering::SeqCst);
    });

    assert_eq!(total.load(Ordering::SeqCst), 12);
}

#[test]
fn panicking_children_still_join() {
    let rt = runtime(1, 2);
    let scope = EndCount::new();

    for i in 0..10 {
        rt.spawn(LocaleId(0), &scope, move || {
            if i % 3 == 0 {
                panic!("intentional failure");
            }
        })
        .unwrap();
    }

    // Every child, panicked or not, leaves the scope.
    scope.wait();
    assert_eq!(scope.pending(), 0);
}
