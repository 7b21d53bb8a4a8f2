use crate::backend::{AllocError, Backend, Global};
use crate::{fence, ucount, AtomicCounter};
use alloc::alloc::handle_alloc_error;
use branches::unlikely;
use core::{
    alloc::Layout,
    cell::UnsafeCell,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops::Deref,
    pin::Pin,
    ptr::{self, NonNull},
    sync::atomic::Ordering,
};

// The barrier keeps the counter from ever wrapping: clone panics once the
// count comes within BARRIER of the maximum, and BARRIER leaves room for
// every plausibly concurrent increment, so no pile-up of racing clones can
// carry the count across the wrap to a value that would free the block while
// handles remain. After the panicking threads unwind, the surviving handles
// stay fully usable.
#[cfg(any(target_pointer_width = "64", loom))]
const BARRIER: ucount = 512;
#[cfg(not(any(target_pointer_width = "64", loom)))]
const BARRIER: ucount = 64;

// repr(C) keeps the payload at offset zero, which as_ptr and from_raw rely
// on. The backend sits behind it and is moved back out when the block is
// released.
#[repr(C)]
struct ArcInner<T, A> {
    data: UnsafeCell<T>,
    counter: AtomicCounter,
    backend: A,
}

/// A thread-safe reference-counting pointer over an explicit allocation
/// backend. "Arc" stands for "Atomically Reference Counted".
///
/// [`Arc<T, A>`] provides shared ownership of a value of type `T`, stored in
/// a single heap block obtained from the backend `A`. Calling the clone
/// method on an Arc produces a new handle to the same block and bumps the
/// shared count. When the last handle is dropped, the payload is dropped and
/// the block is handed back to the backend that produced it. The backend
/// rides inside the block, so a handle is always exactly one pointer wide
/// and the release path never needs the backend passed back in from outside.
///
/// Because shared references in Rust are read-only by default, you cannot
/// modify the value stored inside an Arc. If you need to modify it, wrap the
/// payload in a `Mutex`, `RwLock`, or one of the atomic types.
///
/// ## Thread Safety
///
/// The count is maintained with atomic read-modify-write operations, so
/// handles can be cloned and dropped freely from any number of threads and
/// the block is freed exactly once, by whichever thread drops the last
/// handle. Note that this protects the count only: the payload itself is not
/// synchronized by this type, and sharing it across threads requires
/// `T: Send + Sync` as usual. The backend must also be `Send + Sync`,
/// because the thread that ends up releasing the block is decided at
/// runtime.
///
/// Misusing the raw surface ([`from_raw`], [`increment_count`],
/// [`decrement_count`]) by releasing a reference that was already released,
/// or touching a block after its last release, is undefined behavior: in
/// production builds it manifests as memory corruption or a crash, not as a
/// clean error. The safe surface makes such states unrepresentable, and
/// debug builds additionally assert that the count never underflows.
///
/// # Cloning references
///
/// Creating a new reference from an existing reference-counted pointer is
/// done using the `Clone` trait implemented for [`Arc<T, A>`][Arc]:
///
/// ```
/// use allocrc::Arc;
/// let foo = Arc::new(vec![1.0, 2.0, 3.0]);
/// // The two syntaxes below are equivalent.
/// let a = foo.clone();
/// let b = Arc::clone(&foo);
/// // a, b, and foo are all handles to the same block
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
///
/// [`from_raw`]: Arc::from_raw
/// [`increment_count`]: Arc::increment_count
/// [`decrement_count`]: Arc::decrement_count
pub struct Arc<T, A: Backend = Global> {
    ptr: NonNull<ArcInner<T, A>>,
    phantom: PhantomData<ArcInner<T, A>>,
}

// The thread that releases the block is decided at runtime, so the backend
// has to travel with whoever drops last, and `Arc::backend` hands out &A
// from any holder.
unsafe impl<T: Sync + Send, A: Backend + Send + Sync> Send for Arc<T, A> {}
unsafe impl<T: Sync + Send, A: Backend + Send + Sync> Sync for Arc<T, A> {}

impl<T> Arc<T> {
    /// Constructs a new [`Arc<T>`] backed by the global allocator.
    ///
    /// If the allocator cannot supply the block, the process is taken down
    /// through `handle_alloc_error`; use [`try_new`][Arc::try_new] to handle
    /// that case instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let tada = Arc::new("Tada!".to_string());
    /// ```
    #[inline]
    pub fn new(data: T) -> Arc<T> {
        Arc::new_in(data, Global)
    }

    /// Constructs a new [`Arc<T>`] backed by the global allocator, reporting
    /// allocation failure instead of aborting.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let five = Arc::try_new(5)?;
    /// assert_eq!(*five, 5);
    /// # Ok::<(), allocrc::AllocError>(())
    /// ```
    #[inline]
    pub fn try_new(data: T) -> Result<Arc<T>, AllocError> {
        Arc::try_new_in(data, Global)
    }

    /// Constructs a new `Pin<Arc<T>>`. If `T` does not implement `Unpin`,
    /// then `data` will be pinned in memory and unable to be moved.
    #[inline]
    #[must_use]
    pub fn pin(data: T) -> Pin<Arc<T>> {
        unsafe { Pin::new_unchecked(Arc::new(data)) }
    }
}

impl<T, A: Backend> Arc<T, A> {
    /// Constructs a new [`Arc<T, A>`] whose block is requested from
    /// `backend`.
    ///
    /// The backend moves into the block it allocates and receives the block
    /// back when the last handle goes away. If the backend refuses the
    /// request, the process is taken down through `handle_alloc_error`; use
    /// [`try_new_in`][Arc::try_new_in] to handle refusal as a value.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::{Arc, Global};
    ///
    /// let a = Arc::new_in([0u8; 16], Global);
    /// assert_eq!(a.len(), 16);
    /// ```
    #[inline]
    pub fn new_in(data: T, backend: A) -> Arc<T, A> {
        match Arc::try_new_in(data, backend) {
            Ok(arc) => arc,
            Err(err) => handle_alloc_error(err.layout()),
        }
    }

    /// Constructs a new [`Arc<T, A>`] whose block is requested from
    /// `backend`, reporting allocation failure instead of aborting.
    ///
    /// Exactly one allocation is made, sized for the payload, the count, and
    /// the backend together, and the count starts at one. On failure the
    /// payload and the backend are dropped in place and the error says how
    /// big the refused request was; no memory is left behind.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::{Arc, Global};
    ///
    /// let config = Arc::try_new_in(vec![1, 2, 3], Global)?;
    /// assert_eq!(config.len(), 3);
    /// # Ok::<(), allocrc::AllocError>(())
    /// ```
    pub fn try_new_in(data: T, backend: A) -> Result<Arc<T, A>, AllocError> {
        let ptr = backend.allocate(Self::block_layout())?.cast::<ArcInner<T, A>>();
        // SAFETY: the block is fresh and correctly sized and aligned for
        // ArcInner<T, A>; every field is initialized before a handle exists.
        unsafe {
            let raw = ptr.as_ptr();
            ptr::addr_of_mut!((*raw).data).write(UnsafeCell::new(data));
            ptr::addr_of_mut!((*raw).counter).write(AtomicCounter::new(1));
            ptr::addr_of_mut!((*raw).backend).write(backend);
        }
        Ok(Arc {
            ptr,
            phantom: PhantomData,
        })
    }

    /// Gives you a pointer to the data. The reference count stays the same
    /// and the [`Arc<T, A>`] isn't used up. The pointer stays valid as long
    /// as there are live handles to the block.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let x = Arc::new("hello".to_owned());
    /// let y = Arc::clone(&x);
    /// let x_ptr = Arc::as_ptr(&x);
    /// assert_eq!(x_ptr, Arc::as_ptr(&y));
    /// assert_eq!(unsafe { &*x_ptr }, "hello");
    /// ```
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        // SAFETY: the payload sits at offset zero of the block, so the block
        // pointer is the payload pointer.
        self.ptr.as_ptr() as *const T
    }

    /// Turns the [`Arc<T, A>`] into a raw payload pointer without touching
    /// the count. Must be converted back with [`Arc::from_raw`] to avoid a
    /// memory leak.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let x = Arc::new("hello".to_owned());
    /// let x_ptr = Arc::into_raw(x);
    /// assert_eq!(unsafe { &*x_ptr }, "hello");
    /// // reconstruct the Arc to drop the reference and avoid a memory leak
    /// drop(unsafe { Arc::<String>::from_raw(x_ptr) });
    /// ```
    #[inline]
    pub fn into_raw(this: Self) -> *const T {
        let ptr = Self::as_ptr(&this);
        mem::forget(this);
        ptr
    }

    /// Constructs an [`Arc<T, A>`] from a raw payload pointer.
    ///
    /// # Safety
    ///
    /// The pointer must have come from [`Arc::into_raw`] on an Arc with the
    /// same payload and backend types, the block must not have been released
    /// yet, and each pointer produced by `into_raw` may be reconstructed at
    /// most once. Converting anything else is undefined behavior.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let x = Arc::new("hello".to_owned());
    /// let x_ptr = Arc::into_raw(x);
    ///
    /// unsafe {
    ///     // Convert back to an Arc to prevent a leak.
    ///     let x: Arc<String> = Arc::from_raw(x_ptr);
    ///     assert_eq!(&*x, "hello");
    ///
    ///     // Further calls to `Arc::from_raw(x_ptr)` would be memory-unsafe.
    /// }
    ///
    /// // The memory was freed when `x` went out of scope above, so `x_ptr` is now dangling!
    /// ```
    #[inline]
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        // Safety: the payload sits at offset zero of repr(C) ArcInner, no
        // offset recalculation is required.
        Arc {
            ptr: unsafe { NonNull::new_unchecked(ptr as *mut ArcInner<T, A>) },
            phantom: PhantomData,
        }
    }

    /// Atomically bumps the reference count of the block `ptr` points into,
    /// as if an [`Arc<T, A>`] had been cloned and forgotten.
    ///
    /// This is the retain operation for callers that traffic in raw payload
    /// pointers from [`Arc::into_raw`], typically across an FFI boundary.
    /// The matching release is [`decrement_count`][Arc::decrement_count] or
    /// dropping a handle rebuilt with [`from_raw`][Arc::from_raw].
    ///
    /// # Safety
    ///
    /// The pointer must have come from `into_raw` on an Arc with the same
    /// payload and backend types, and the block must still be live (count at
    /// least one). Retaining a block after its last release is undefined
    /// behavior, exactly as with any use-after-free.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let five = Arc::new(5);
    /// let ptr = Arc::into_raw(five);
    ///
    /// unsafe {
    ///     Arc::<i32>::increment_count(ptr);
    ///     let five: Arc<i32> = Arc::from_raw(ptr);
    ///     assert_eq!(Arc::strong_count(&five), 2);
    ///     // release the count we added above
    ///     Arc::<i32>::decrement_count(ptr);
    ///     assert_eq!(Arc::strong_count(&five), 1);
    /// }
    /// ```
    #[inline]
    pub unsafe fn increment_count(ptr: *const T) {
        // SAFETY: caller guarantees the block is live, so borrowing a handle
        // long enough to clone it is sound.
        let arc = unsafe { ManuallyDrop::new(Arc::<T, A>::from_raw(ptr)) };
        let _retained: ManuallyDrop<Arc<T, A>> = arc.clone();
    }

    /// Atomically drops the reference count of the block `ptr` points into,
    /// releasing the block if this was the last reference.
    ///
    /// This is the release operation matching
    /// [`increment_count`][Arc::increment_count]. If the count reaches zero
    /// the payload is dropped and the block returns to its backend.
    ///
    /// # Safety
    ///
    /// The pointer must have come from [`Arc::into_raw`] on an Arc with the
    /// same payload and backend types, and this call must consume a count
    /// the caller actually owns. Releasing a count twice is a double free
    /// and undefined behavior; the type furnishes no runtime protection
    /// against it in release builds.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let ptr = Arc::into_raw(Arc::new("raw".to_owned()));
    /// unsafe {
    ///     // consume the count `into_raw` left behind, freeing the block
    ///     Arc::<String>::decrement_count(ptr);
    /// }
    /// ```
    #[inline]
    pub unsafe fn decrement_count(ptr: *const T) {
        // SAFETY: caller transfers ownership of one count to us; dropping
        // the rebuilt handle releases it.
        unsafe { drop(Arc::<T, A>::from_raw(ptr)) };
    }

    /// Borrows the backend that allocated this block and will eventually
    /// receive it back.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::{Arc, Global};
    ///
    /// let a = Arc::new(1u8);
    /// assert_eq!(Arc::backend(&a), &Global);
    /// ```
    #[inline]
    #[must_use]
    pub fn backend(this: &Self) -> &A {
        &this.inner().backend
    }

    /// Gets the number of handles to this block. Be careful as another
    /// thread can change the count at any time.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let five = Arc::new(5);
    /// let _also_five = Arc::clone(&five);
    ///
    /// // This assertion is deterministic because we haven't shared
    /// // the Arc between threads.
    /// assert_eq!(2, Arc::strong_count(&five));
    /// ```
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.inner().counter.load(Ordering::Acquire) as usize
    }

    /// Compares if two Arcs reference the same block, similar to `ptr::eq`.
    /// Note: The same caveats apply when comparing dyn Trait pointers.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let five = Arc::new(5);
    /// let same_five = Arc::clone(&five);
    /// let other_five = Arc::new(5);
    ///
    /// assert!(Arc::ptr_eq(&five, &same_five));
    /// assert!(!Arc::ptr_eq(&five, &other_five));
    /// ```
    ///
    /// [`ptr::eq`]: core::ptr::eq "ptr::eq"
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr.as_ptr() == other.ptr.as_ptr()
    }

    /// If there's only one handle, returns the inner value. If not, returns
    /// an error with the Arc passed in.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let x = Arc::new(3);
    /// assert_eq!(Arc::try_unwrap(x).unwrap(), 3);
    ///
    /// let x = Arc::new(4);
    /// let _y = Arc::clone(&x);
    /// assert_eq!(*Arc::try_unwrap(x).unwrap_err(), 4);
    /// ```
    #[inline]
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        if this.is_unique() {
            // SAFETY: there is only one handle, so it is safe to move the
            // value out and release the emptied block.
            unsafe {
                let ptr = this.ptr;
                mem::forget(this);
                let val = ptr::read((*ptr.as_ptr()).data.get());
                Self::release_block(ptr);
                Ok(val)
            }
        } else {
            Err(this)
        }
    }

    #[inline(always)]
    fn block_layout() -> Layout {
        Layout::new::<ArcInner<T, A>>()
    }

    #[inline(always)]
    fn inner(&self) -> &ArcInner<T, A> {
        // SAFETY: inner is protected by counter, it will not get released
        // unless drop of the last owner gets called.
        unsafe { self.ptr.as_ref() }
    }

    // Frees an emptied block. The backend is moved out first: a block cannot
    // be handed back through a value that still lives inside it.
    unsafe fn release_block(ptr: NonNull<ArcInner<T, A>>) {
        let raw = ptr.as_ptr();
        // SAFETY: caller guarantees this is the sole surviving access to a
        // block whose payload slot has already been moved out or dropped.
        unsafe {
            ptr::drop_in_place(ptr::addr_of_mut!((*raw).counter));
            let backend = ptr::read(ptr::addr_of!((*raw).backend));
            backend.deallocate(ptr.cast::<u8>(), Self::block_layout());
        }
    }

    /// Returns `true` if this is the only handle to the block.
    #[inline]
    fn is_unique(&self) -> bool {
        self.inner().counter.load(Ordering::Acquire) == 1
    }

    /// Returns a mutable reference to the inner value of the given `Arc` if
    /// this is the only handle to it.
    ///
    /// Returns [`None`] otherwise, because it is not safe to mutate a shared
    /// value.
    ///
    /// See also [`make_mut`][Arc::make_mut], which clones the inner value
    /// when there are other handles.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let mut x = Arc::new(3);
    ///
    /// // Get a mutable reference to the inner value.
    /// *Arc::get_mut(&mut x).unwrap() = 4;
    /// assert_eq!(*x, 4);
    ///
    /// // There are now two handles to the same value, so `get_mut()` returns `None`.
    /// let _y = Arc::clone(&x);
    /// assert!(Arc::get_mut(&mut x).is_none());
    /// ```
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.is_unique() {
            // It is safe to return a mutable reference to the inner value
            // because this is the only handle to it.
            unsafe { Some(Arc::get_mut_unchecked(this)) }
        } else {
            None
        }
    }

    /// Returns a mutable reference into the given `Arc` without checking if
    /// it is safe to do so.
    ///
    /// This method is faster than [`get_mut`] since it avoids any runtime
    /// checks. However, it is unsafe to use unless you can guarantee that no
    /// other handles to the same block exist and that they are not
    /// dereferenced or have active borrows for the duration of the returned
    /// borrow.
    ///
    /// # Safety
    ///
    /// You can use `get_mut_unchecked` if all of the following conditions
    /// are met:
    ///
    /// * No other handles to the same block exist.
    /// * The inner type of all handles is exactly the same (including
    ///   lifetimes).
    /// * No other handles are dereferenced or have active borrows for the
    ///   duration of the returned mutable borrow.
    ///
    /// These conditions are trivially satisfied immediately after creating a
    /// new `Arc` with `Arc::new`.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let mut x = Arc::new(String::new());
    /// unsafe {
    ///     Arc::get_mut_unchecked(&mut x).push_str("foo")
    /// }
    /// assert_eq!(*x, "foo");
    /// ```
    ///
    /// [`get_mut`]: Arc::get_mut
    #[inline]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        unsafe { &mut *(*this.ptr.as_ptr()).data.get() }
    }

    // The non-inlined portion of `drop` that tears the payload down and
    // returns the block to its backend. We rely on the compiler to determine
    // whether it is beneficial to inline the destructor or not, rather than
    // explicitly marking this section inline(never) like the standard
    // library does.
    unsafe fn drop_slow(&mut self) {
        // SAFETY: this is the last owner of the ptr, nothing else can reach
        // the block anymore.
        unsafe {
            ptr::drop_in_place(self.inner().data.get());
            Self::release_block(self.ptr);
        }
    }

    /// Returns the inner value of the `Arc` if this handle is the last one.
    ///
    /// If the block has other handles, `None` is returned and this handle's
    /// reference is given up. If `Arc::into_inner` is called on every clone
    /// of an Arc, exactly one of the calls returns the inner value, ensuring
    /// it is not dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let x = Arc::new(3);
    /// let y = Arc::clone(&x);
    ///
    /// let x_thread = std::thread::spawn(|| Arc::into_inner(x));
    /// let y_thread = std::thread::spawn(|| Arc::into_inner(y));
    ///
    /// let x_inner_value = x_thread.join().unwrap();
    /// let y_inner_value = y_thread.join().unwrap();
    ///
    /// assert!(matches!(
    ///     (x_inner_value, y_inner_value),
    ///     (None, Some(3)) | (Some(3), None)
    /// ));
    /// ```
    pub fn into_inner(this: Self) -> Option<T> {
        let this = ManuallyDrop::new(this);

        let inner = this.inner();

        if inner.counter.fetch_sub(1, Ordering::Release) != 1 {
            // another handle survives and will release the block; our
            // reference was consumed by the decrement, nothing to drop here
            return None;
        }

        inner.counter.load(Ordering::Acquire);

        let ptr = this.ptr;
        // SAFETY: the decrement above observed one, making this the sole
        // surviving access to the block.
        Some(unsafe {
            let value = ptr::read(inner.data.get());
            Self::release_block(ptr);
            value
        })
    }
}

impl<T: Clone, A: Backend> Arc<T, A> {
    /// If there is only one handle to T, removes it and returns it.
    /// Otherwise, creates a copy of T and returns it. If `rc_t` is an
    /// [`Arc<T, A>`], this function behaves like calling `(*rc_t).clone()`,
    /// but avoids copying the value if possible.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let inner = String::from("test");
    /// let ptr = inner.as_ptr();
    ///
    /// let rc = Arc::new(inner);
    /// let inner = Arc::unwrap_or_clone(rc);
    /// // The inner value was not cloned
    /// assert_eq!(ptr, inner.as_ptr());
    ///
    /// let rc = Arc::new(inner);
    /// let rc2 = rc.clone();
    /// let inner = Arc::unwrap_or_clone(rc);
    /// // Because there were 2 references, we had to clone the inner value.
    /// assert_ne!(ptr, inner.as_ptr());
    /// // `rc2` is the last reference, so when we unwrap it we get back
    /// // the original `String`.
    /// let inner = Arc::unwrap_or_clone(rc2);
    /// assert_eq!(ptr, inner.as_ptr());
    /// ```
    #[inline]
    pub fn unwrap_or_clone(this: Self) -> T {
        Arc::try_unwrap(this).unwrap_or_else(|rc| (*rc).clone())
    }
}

impl<T: Clone, A: Backend + Clone> Arc<T, A> {
    // Builds a private copy of the payload in a fresh block requested from a
    // clone of this block's backend. The payload is cloned before the block
    // is requested, so a panicking Clone unwinds with no unowned allocation
    // in flight. The infallible path: a refused allocation diverts through
    // handle_alloc_error inside new_in.
    fn optimized_clone(&self) -> Arc<T, A> {
        Arc::new_in(T::clone(self), self.inner().backend.clone())
    }

    /// Returns a mutable reference to the inner value of the given `Arc`,
    /// ensuring that it has unique ownership.
    ///
    /// If there are other handles to the same block, then `make_mut` will
    /// clone the inner value into a new block, requested from a clone of the
    /// originating backend, to ensure unique ownership. This is also
    /// referred to as "clone-on-write".
    ///
    /// Unlike `get_mut`, which only returns a mutable reference if there are
    /// no other handles to the same block, `make_mut` always returns a
    /// mutable reference to the unique allocation.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let mut data = Arc::new(5);
    ///
    /// *Arc::make_mut(&mut data) += 1;         // Won't clone anything
    /// let mut other_data = Arc::clone(&data); // Won't clone inner data
    /// *Arc::make_mut(&mut data) += 1;         // Clones inner data
    /// *Arc::make_mut(&mut data) += 1;         // Won't clone anything
    /// *Arc::make_mut(&mut other_data) *= 2;   // Won't clone anything
    ///
    /// // Now `data` and `other_data` point to different blocks.
    /// assert_eq!(*data, 8);
    /// assert_eq!(*other_data, 12);
    /// ```
    ///
    /// # See also
    ///
    /// * [`get_mut`]: Returns a mutable reference to the inner value of the
    ///   given `Arc`, but only if there are no other handles to the same
    ///   block.
    /// * [`clone`]: Clones the `Arc` pointer, but not the inner value.
    ///
    /// [`get_mut`]: Arc::get_mut
    /// [`clone`]: Clone::clone
    #[inline]
    pub fn make_mut(this: &mut Arc<T, A>) -> &mut T {
        if !this.is_unique() {
            *this = this.optimized_clone();
        }
        unsafe { Self::get_mut_unchecked(this) }
    }
}

impl<T, A: Backend> Deref for Arc<T, A> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        unsafe { &*(self.inner().data.get() as *const T) }
    }
}

impl<T> From<T> for Arc<T> {
    #[inline(always)]
    fn from(value: T) -> Self {
        Arc::new(value)
    }
}

#[inline(never)]
fn drop_arc_and_panic_no_inline<T, A: Backend>(ptr: NonNull<ArcInner<T, A>>) {
    drop(Arc {
        ptr,
        phantom: PhantomData,
    });
    panic!("reference counter overflow");
}

impl<T, A: Backend> Clone for Arc<T, A> {
    #[inline]
    fn clone(&self) -> Self {
        let count = self.inner().counter.fetch_add(1, Ordering::Relaxed);
        if unlikely(count >= ucount::MAX - BARRIER) {
            // give the count back before panicking, as this call will not
            // return a valid handle; the no_inline helper keeps the cold
            // path out of inlined clone sites
            drop_arc_and_panic_no_inline(self.ptr);
        }
        Self {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }
}

impl<T, A: Backend> Drop for Arc<T, A> {
    #[inline]
    fn drop(&mut self) {
        let count = self.inner().counter.fetch_sub(1, Ordering::Release);
        debug_assert!(count != 0, "reference count underflow");
        if count != 1 {
            return;
        }
        fence(Ordering::Acquire);
        // SAFETY: this is the last owner of the ptr, it is safe to drop data
        unsafe { self.drop_slow() };
    }
}

impl<T: Hash, A: Backend> Hash for Arc<T, A> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state);
    }
}

impl<T: fmt::Display, A: Backend> fmt::Display for Arc<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: fmt::Debug, A: Backend> fmt::Debug for Arc<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T, A: Backend> fmt::Pointer for Arc<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(&**self as *const T), f)
    }
}

impl<T: Default> Default for Arc<T> {
    #[inline]
    fn default() -> Arc<T> {
        Arc::new(Default::default())
    }
}

impl<T: PartialEq, A: Backend> PartialEq for Arc<T, A> {
    #[inline]
    fn eq(&self, other: &Arc<T, A>) -> bool {
        self.deref().eq(other)
    }
}

impl<T: Eq, A: Backend> Eq for Arc<T, A> {}

impl<T: PartialOrd, A: Backend> PartialOrd for Arc<T, A> {
    #[inline]
    fn partial_cmp(&self, other: &Arc<T, A>) -> Option<core::cmp::Ordering> {
        (**self).partial_cmp(&**other)
    }

    #[inline]
    fn lt(&self, other: &Arc<T, A>) -> bool {
        **self < **other
    }

    #[inline]
    fn le(&self, other: &Arc<T, A>) -> bool {
        **self <= **other
    }

    #[inline]
    fn gt(&self, other: &Arc<T, A>) -> bool {
        **self > **other
    }

    #[inline]
    fn ge(&self, other: &Arc<T, A>) -> bool {
        **self >= **other
    }
}

impl<T: Ord, A: Backend> Ord for Arc<T, A> {
    #[inline]
    fn cmp(&self, other: &Arc<T, A>) -> core::cmp::Ordering {
        (**self).cmp(&**other)
    }
}

/// This trait allows for a value to be borrowed as a reference to a given
/// type. It is typically used for generic code that can work with borrowed
/// values of different types.
///
/// This implementation allows an [`Arc<T, A>`] to be borrowed as a shared
/// reference to `T`.
impl<T, A: Backend> core::borrow::Borrow<T> for Arc<T, A> {
    #[inline(always)]
    fn borrow(&self) -> &T {
        self
    }
}

/// An implementation of the `AsRef` trait for [`Arc<T, A>`].
///
/// This allows an [`Arc<T, A>`] to be treated as a reference to `T`.
///
/// # Examples
///
/// ```
/// use allocrc::Arc;
///
/// let data = Arc::new(42);
/// let reference: &i32 = data.as_ref();
/// assert_eq!(*reference, 42);
/// ```
impl<T, A: Backend> AsRef<T> for Arc<T, A> {
    /// Returns a reference to the inner value of the [`Arc<T, A>`].
    ///
    /// # Examples
    ///
    /// ```
    /// use allocrc::Arc;
    ///
    /// let data = Arc::new("Hello, world!".to_string());
    /// let reference: &String = data.as_ref();
    /// assert_eq!(reference, "Hello, world!");
    /// ```
    #[inline(always)]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T, A: Backend> Unpin for Arc<T, A> {}
