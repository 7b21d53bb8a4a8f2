#![no_std]
//! # allocrc: atomic reference counting with explicit allocation backends
//!
//! allocrc provides [`Arc<T, A>`], a thread-safe reference-counting pointer
//! with the familiar `std::sync::Arc` API, whose memory comes from an
//! injectable allocation backend instead of an implicit global one. The
//! backend is an ordinary value implementing [`Backend`]: it is handed over
//! when the object is created, travels inside the very block it allocated,
//! and is handed that block back when the last reference goes away. Handles
//! stay a single pointer wide no matter which backend is plugged in.
//!
//! ## Why use allocrc?
//!
//! - Allocation is a parameter, not ambient state: pools, metered wrappers,
//!   and fault-injecting backends attach per object, with no global
//!   registration to mutate and nothing to restore afterwards
//! - Allocation failure is an explicit [`AllocError`] result on the `try_`
//!   constructors, never a null pointer to trip over
//! - The backend seam works on stable Rust, where the standard library's
//!   equivalent (`allocator_api`) is still nightly-only
//! - It supports `no_std` with extern alloc
//!
//! ## Why not use allocrc?
//!
//! - It does not provide weak references
//! - It does not support data as DSTs
//! - On 64-bit systems the counter is 32 bits wide, so a single object is
//!   limited to roughly four billion simultaneous handles; holding that many
//!   would already take about 32GB of memory, but if you need more, use the
//!   standard library
//!
//! ## Comparison
//!
//! |                               | allocrc::Arc | std::sync::Arc |
//! | ----------------------------- | :----------: | :------------: |
//! | Swappable allocation backend  |    stable    |  nightly-only  |
//! | Allocation failure as Result  |    stable    |  nightly-only  |
//! | Count overhead, 64-bit        |   4 bytes    |    16 bytes    |
//! | Weak references               |      ❌      |       ✅       |
//! | DST support                   |      ❌      |       ✅       |
//!
//! ## Plugging in a backend
//!
//! Anything implementing [`Backend`] can source the memory, including a
//! borrowed backend, which lets one instrumented allocator serve many
//! objects:
//!
//! ```
//! use allocrc::{AllocError, Arc, Backend, Global};
//! use core::alloc::Layout;
//! use core::ptr::NonNull;
//! use core::sync::atomic::{AtomicUsize, Ordering};
//!
//! /// Forwards to the global allocator and meters what passes through.
//! #[derive(Debug, Default)]
//! struct Metered {
//!     bytes: AtomicUsize,
//! }
//!
//! unsafe impl Backend for Metered {
//!     fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
//!         self.bytes.fetch_add(layout.size(), Ordering::Relaxed);
//!         Global.allocate(layout)
//!     }
//!
//!     unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
//!         unsafe { Global.deallocate(ptr, layout) }
//!     }
//! }
//!
//! let meter = Metered::default();
//! let a = Arc::try_new_in([0u64; 8], &meter)?;
//! let b = a.clone(); // cloning touches the counter, never the backend
//! drop((a, b));
//! assert!(meter.bytes.load(Ordering::Relaxed) >= 64);
//! # Ok::<(), allocrc::AllocError>(())
//! ```
//!
//! ## Counter width
//!
//! On 64-bit systems the counter is an `AtomicU32` so it can ride in padding
//! the allocator would waste anyway; `Arc<u32>` allocates no more than
//! `Box<u32>` does. Other targets use `AtomicUsize`. Overflowing the counter
//! is detected and panics long before it could wrap into a premature free.
//! Platforms without 32-bit atomic read-modify-write support are not
//! supported.

#![warn(missing_docs, missing_debug_implementations)]
extern crate alloc;

// Counter definition. Loom builds substitute the model's atomics so the
// checker can explore interleavings of retain and release.

#[cfg(all(target_pointer_width = "64", not(loom)))]
pub(crate) use core::sync::atomic::AtomicU32 as AtomicCounter;

#[cfg(all(not(target_pointer_width = "64"), not(loom)))]
pub(crate) use core::sync::atomic::AtomicUsize as AtomicCounter;

#[cfg(loom)]
pub(crate) use loom::sync::atomic::AtomicU32 as AtomicCounter;

#[cfg(any(target_pointer_width = "64", loom))]
pub(crate) use core::primitive::u32 as ucount;

#[cfg(not(any(target_pointer_width = "64", loom)))]
pub(crate) use core::primitive::usize as ucount;

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::fence;

#[cfg(loom)]
pub(crate) use loom::sync::atomic::fence;

mod arc;
mod backend;
pub use arc::*;
pub use backend::*;
