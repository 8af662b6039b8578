//! Ordering guarantees of the dependency scheduler.
//!
//! Tests verify that:
//! - A write completes before any later-submitted access begins
//! - Writes on one variable serialize in submission order
//! - Readers with no intervening write run concurrently
//! - Work on disjoint variables runs concurrently
//! - Copy work is bounded by the configured transfer channels
//! - `Async` work may complete from a foreign thread

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use strom_core::prelude::*;
use strom_engine::{Engine, EngineExt};

use common::test_engine;

#[test]
fn write_completes_before_later_read_begins() {
    let engine = test_engine();
    let x = engine.new_variable();

    let written = Arc::new(AtomicBool::new(false));
    let read_saw_write = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&written);
    engine
        .push_sync_fn(
            move |_rc| {
                thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            },
            ExecContext::cpu(),
            vec![],
            vec![x],
            FnProperty::Normal,
        )
        .unwrap();

    let flag = Arc::clone(&written);
    let saw = Arc::clone(&read_saw_write);
    engine
        .push_sync_fn(
            move |_rc| {
                saw.store(flag.load(Ordering::SeqCst), Ordering::SeqCst);
            },
            ExecContext::cpu(),
            vec![x],
            vec![],
            FnProperty::Normal,
        )
        .unwrap();

    engine.wait_for_var(x).unwrap();
    assert!(
        read_saw_write.load(Ordering::SeqCst),
        "read started before the earlier write completed"
    );
}

#[test]
fn writes_on_one_variable_serialize_in_submission_order() {
    let engine = test_engine();
    let x = engine.new_variable();

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..4u32 {
        let order = Arc::clone(&order);
        engine
            .push_sync_fn(
                move |_rc| {
                    // Later writers sleep less, so any reordering would show.
                    thread::sleep(Duration::from_millis(10 * (4 - u64::from(i))));
                    order.lock().unwrap().push(i);
                },
                ExecContext::cpu(),
                vec![],
                vec![x],
                FnProperty::Normal,
            )
            .unwrap();
    }

    engine.wait_for_all();
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn readers_run_concurrently() {
    let engine = test_engine();
    let x = engine.new_variable();

    let inside = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));
    for _ in 0..2 {
        let inside = Arc::clone(&inside);
        let overlapped = Arc::clone(&overlapped);
        engine
            .push_sync_fn(
                move |_rc| {
                    inside.fetch_add(1, Ordering::SeqCst);
                    // Wait to see the other reader inside at the same time.
                    // Panics inside pushed work are contained by the engine,
                    // so the verdict is reported through the flag instead.
                    let deadline = Instant::now() + Duration::from_secs(2);
                    while Instant::now() < deadline {
                        if inside.load(Ordering::SeqCst) == 2 {
                            overlapped.store(true, Ordering::SeqCst);
                            break;
                        }
                        thread::yield_now();
                    }
                    inside.fetch_sub(1, Ordering::SeqCst);
                },
                ExecContext::cpu(),
                vec![x],
                vec![],
                FnProperty::Normal,
            )
            .unwrap();
    }

    engine.wait_for_all();
    assert!(overlapped.load(Ordering::SeqCst), "readers did not overlap");
}

#[test]
fn disjoint_variables_run_concurrently() {
    let engine = test_engine();
    let x = engine.new_variable();
    let y = engine.new_variable();

    // Both writers must reach the barrier; if the engine serialized them the
    // rendezvous would never happen and the test would time out.
    let rendezvous = Arc::new(Barrier::new(2));
    for var in [x, y] {
        let rendezvous = Arc::clone(&rendezvous);
        engine
            .push_sync_fn(
                move |_rc| {
                    rendezvous.wait();
                },
                ExecContext::cpu(),
                vec![],
                vec![var],
                FnProperty::Normal,
            )
            .unwrap();
    }

    engine.wait_for_all();
}

#[test]
fn copy_work_is_bounded_by_transfer_channels() {
    let engine = test_engine(); // copy_channels = 2
    let current = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..6 {
        let var = engine.new_variable();
        let current = Arc::clone(&current);
        let max_observed = Arc::clone(&max_observed);
        let completed = Arc::clone(&completed);
        engine
            .push_sync_fn(
                move |_rc| {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(25));
                    current.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                },
                ExecContext::accel(0),
                vec![],
                vec![var],
                FnProperty::CopyToDevice,
            )
            .unwrap();
    }

    engine.wait_for_all();
    assert_eq!(completed.load(Ordering::SeqCst), 6);
    let max = max_observed.load(Ordering::SeqCst);
    assert!(max <= 2, "transfer bound exceeded: {max} concurrent copies");
    assert!(max >= 2, "transfer channels never ran concurrently");
}

#[test]
fn async_work_completes_from_foreign_thread() {
    let engine = test_engine();
    let x = engine.new_variable();

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    engine
        .push_async_fn(
            move |_rc, on_complete| {
                // Simulates a device driver signaling completion later, from
                // a thread the engine knows nothing about.
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(30));
                    flag.store(true, Ordering::SeqCst);
                    on_complete.complete();
                });
            },
            ExecContext::accel(0),
            vec![],
            vec![x],
            FnProperty::Async,
        )
        .unwrap();

    engine.wait_for_var(x).unwrap();
    assert!(done.load(Ordering::SeqCst));
}
