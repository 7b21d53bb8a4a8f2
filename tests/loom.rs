#![cfg(loom)]

use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::Arc as LoomArc;
use loom::thread;

use allocrc::Arc;

/// Payload that records every drop in a shared tally.
struct DropTally(LoomArc<AtomicUsize>);

impl Drop for DropTally {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Payload whose drop asserts that the store made through the other handle
/// is visible to whichever thread tears the block down.
struct Canary(AtomicUsize);

impl Drop for Canary {
    fn drop(&mut self) {
        assert_eq!(self.0.load(Ordering::Relaxed), 1);
    }
}

#[test]
fn concurrent_handles_release_once() {
    loom::model(|| {
        let drops = LoomArc::new(AtomicUsize::new(0));
        let a = Arc::new(DropTally(drops.clone()));
        let b = Arc::clone(&a);
        let t1 = thread::spawn(move || {
            let extra = a.clone();
            drop(a);
            drop(extra);
        });
        let t2 = thread::spawn(move || drop(b));
        t1.join().unwrap();
        t2.join().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn teardown_observes_writes_from_other_handles() {
    loom::model(|| {
        let a = Arc::new(Canary(AtomicUsize::new(0)));
        let b = Arc::clone(&a);
        let writer = thread::spawn(move || {
            b.0.store(1, Ordering::Relaxed);
            drop(b);
        });
        // if the writer releases last, its own store is trivially visible;
        // if this thread releases last, the release and acquire edge on the
        // counter must carry the store across
        drop(a);
        writer.join().unwrap();
    });
}

#[test]
fn racing_into_inner_yields_one_value() {
    loom::model(|| {
        let x = Arc::new(9usize);
        let y = Arc::clone(&x);
        let t1 = thread::spawn(move || Arc::into_inner(x));
        let t2 = thread::spawn(move || Arc::into_inner(y));
        let a = t1.join().unwrap();
        let b = t2.join().unwrap();
        assert!(matches!((a, b), (None, Some(9)) | (Some(9), None)));
    });
}
