use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc as StdArc, Mutex};

use allocrc::{AllocError, Arc, Backend, Global};
use proptest::prelude::*;

/// Payload that records every drop in a shared tally.
struct DropTally<'a>(&'a AtomicUsize);

impl Drop for DropTally<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that forwards to [`Global`] and tallies traffic.
#[derive(Clone, Default)]
struct Counting {
    allocs: StdArc<AtomicUsize>,
    deallocs: StdArc<AtomicUsize>,
}

unsafe impl Backend for Counting {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = Global.allocate(layout)?;
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocs.fetch_add(1, Ordering::SeqCst);
        unsafe { Global.deallocate(ptr, layout) };
    }
}

/// Backend that refuses every request.
#[derive(Clone, Copy)]
struct Exhausted;

unsafe impl Backend for Exhausted {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError::new(layout))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("nothing was ever handed out");
    }
}

/// Backend that remembers every live block and checks that releases come
/// back with the pointer and layout they were handed out with.
#[derive(Clone, Default)]
struct Mirror {
    live: StdArc<Mutex<Vec<(usize, Layout)>>>,
}

unsafe impl Backend for Mirror {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = Global.allocate(layout)?;
        self.live.lock().unwrap().push((ptr.as_ptr() as usize, layout));
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let mut live = self.live.lock().unwrap();
        let pos = live
            .iter()
            .position(|&(addr, l)| addr == ptr.as_ptr() as usize && l == layout)
            .expect("released with a pointer or layout that was never handed out");
        live.remove(pos);
        unsafe { Global.deallocate(ptr, layout) };
    }
}

#[test]
fn one_allocation_per_value() {
    let backend = Counting::default();
    let a = Arc::new_in(41u64, backend.clone());
    assert_eq!(backend.allocs.load(Ordering::SeqCst), 1);
    let b = Arc::clone(&a);
    let c = Arc::clone(&b);
    // handles share the one block, cloning never allocates
    assert_eq!(backend.allocs.load(Ordering::SeqCst), 1);
    drop(a);
    drop(b);
    assert_eq!(backend.deallocs.load(Ordering::SeqCst), 0);
    drop(c);
    assert_eq!(backend.deallocs.load(Ordering::SeqCst), 1);
}

#[test]
fn refused_allocation_surfaces_and_drops_the_value() {
    let drops = AtomicUsize::new(0);
    let err = Arc::try_new_in(DropTally(&drops), Exhausted).err().unwrap();
    assert!(err.layout().size() >= std::mem::size_of::<DropTally>());
    // the moved-in payload is torn down normally, nothing leaks
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn release_mirrors_the_allocation_layout() {
    let mirror = Mirror::default();
    let a = Arc::new_in([1u32; 4], mirror.clone());
    let b = Arc::new_in("two".to_string(), mirror.clone());
    assert_eq!(mirror.live.lock().unwrap().len(), 2);
    drop(a);
    drop(b);
    assert!(mirror.live.lock().unwrap().is_empty());
}

#[test]
fn backends_can_be_borrowed() {
    let meter = Counting::default();
    let a = Arc::new_in(5u8, &meter);
    let b = Arc::clone(&a);
    assert_eq!(meter.allocs.load(Ordering::SeqCst), 1);
    drop(a);
    drop(b);
    assert_eq!(meter.deallocs.load(Ordering::SeqCst), 1);
}

#[test]
fn backend_rides_with_the_block() {
    let backend = Counting::default();
    let a = Arc::new_in("payload".to_string(), backend.clone());
    // the handle exposes the very backend value stored in the block
    assert!(StdArc::ptr_eq(&Arc::backend(&a).allocs, &backend.allocs));
}

/// Payload whose clone always panics partway through a copy-on-write.
struct RefusesClone;

impl Clone for RefusesClone {
    fn clone(&self) -> Self {
        panic!("clone refused");
    }
}

#[test]
fn make_mut_clone_panic_leaves_no_unowned_block() {
    let backend = Counting::default();
    let mut a = Arc::new_in(RefusesClone, backend.clone());
    let b = Arc::clone(&a);
    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = Arc::make_mut(&mut a);
    }));
    assert!(unwound.is_err());
    drop(a);
    drop(b);
    // every block the backend handed out came back to it
    assert_eq!(backend.allocs.load(Ordering::SeqCst), 1);
    assert_eq!(backend.deallocs.load(Ordering::SeqCst), 1);
}

#[test]
fn global_is_the_default_backend() {
    let a = Arc::new(1u8);
    assert_eq!(Arc::backend(&a), &Global);
}

#[test]
fn global_round_trips_a_block() {
    let layout = Layout::new::<[u64; 4]>();
    let ptr = Global.allocate(layout).unwrap();
    unsafe {
        ptr.as_ptr().write_bytes(0xab, layout.size());
        Global.deallocate(ptr, layout);
    }
}

#[test]
fn global_refuses_zero_sized_requests() {
    let layout = Layout::new::<()>();
    let err = Global.allocate(layout).unwrap_err();
    assert_eq!(err.layout(), layout);
}

#[test]
fn alloc_error_reports_the_layout() {
    let layout = Layout::new::<u64>();
    let err = AllocError::new(layout);
    assert_eq!(err.layout(), layout);
    let message = err.to_string();
    assert!(message.contains("8 bytes"), "{message}");
}

proptest! {
    #[test]
    fn balanced_retains_release_exactly_once(extra in 0usize..64) {
        let backend = Counting::default();
        let a = Arc::new_in(extra, backend.clone());
        let clones: Vec<_> = (0..extra).map(|_| Arc::clone(&a)).collect();
        prop_assert_eq!(backend.allocs.load(Ordering::SeqCst), 1);
        prop_assert_eq!(Arc::strong_count(&a), extra + 1);
        drop(clones);
        prop_assert_eq!(backend.deallocs.load(Ordering::SeqCst), 0);
        drop(a);
        prop_assert_eq!(backend.deallocs.load(Ordering::SeqCst), 1);
    }
}
