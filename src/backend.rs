use branches::unlikely;
use core::{alloc::Layout, fmt, ptr::NonNull};

/// The error returned when an allocation backend cannot supply storage.
///
/// Carries the [`Layout`] that was refused, so callers can report how much
/// memory the failed request asked for. Backends return it instead of a null
/// sentinel; a failed request can never be mistaken for a usable pointer.
///
/// # Examples
///
/// ```
/// use allocrc::Arc;
///
/// let err = Arc::<[u8; 64]>::try_new([0; 64]).err();
/// // the global allocator had 64 bytes to spare, so creation succeeded
/// assert!(err.is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    /// Creates an error recording the layout the backend refused.
    #[inline]
    #[must_use]
    pub fn new(layout: Layout) -> AllocError {
        AllocError { layout }
    }

    /// The layout of the request that failed.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocation backend failed to supply {} bytes (align {})",
            self.layout.size(),
            self.layout.align()
        )
    }
}

impl core::error::Error for AllocError {}

/// A source of raw memory for [`Arc<T, A>`][crate::Arc] blocks.
///
/// The backend is injected at creation time ([`Arc::new_in`][crate::Arc::new_in],
/// [`Arc::try_new_in`][crate::Arc::try_new_in]) and moves into the block it
/// allocates; when the last handle releases the block, the backend is moved
/// back out and handed the memory it produced. A block is therefore always
/// returned to the very backend value that allocated it, so implementations
/// need no shared free-lists or identity checks, and tests can substitute a
/// failing or instrumented backend without touching any global state.
///
/// [`Global`] forwards to the registered global allocator and is the default
/// backend parameter of [`Arc`][crate::Arc].
///
/// # Safety
///
/// Implementations must guarantee that a pointer returned by [`allocate`]
/// refers to a block of at least `layout.size()` bytes aligned to
/// `layout.align()`, valid for reads and writes, and that the block stays
/// valid until it is passed to [`deallocate`] on the same backend value with
/// the same layout. Returning memory that aliases another live allocation is
/// undefined behavior.
///
/// [`allocate`]: Backend::allocate
/// [`deallocate`]: Backend::deallocate
///
/// # Examples
///
/// A backend that refuses every request, for exercising failure paths:
///
/// ```
/// use allocrc::{AllocError, Arc, Backend};
/// use core::alloc::Layout;
/// use core::ptr::NonNull;
///
/// struct Exhausted;
///
/// unsafe impl Backend for Exhausted {
///     fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
///         Err(AllocError::new(layout))
///     }
///
///     unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
///         unreachable!("nothing was ever handed out");
///     }
/// }
///
/// assert!(Arc::try_new_in("payload", Exhausted).is_err());
/// ```
pub unsafe trait Backend {
    /// Requests a block of memory described by `layout`.
    ///
    /// On success the returned pointer satisfies the guarantees listed in the
    /// [trait-level safety contract](Backend#safety). On failure the backend
    /// reports [`AllocError`]; it must not return a dangling or null-like
    /// sentinel.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block previously obtained from [`allocate`] on this backend
    /// value.
    ///
    /// # Safety
    ///
    /// `ptr` must denote a block currently allocated by this backend, and
    /// `layout` must be the layout that allocated it. The block must not be
    /// accessed after this call.
    ///
    /// [`allocate`]: Backend::allocate
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

// A borrowed backend allocates and frees through the borrowed value, so the
// contract carries over unchanged.
unsafe impl<B: Backend + ?Sized> Backend for &B {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded verbatim, caller upholds the contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// The default backend: forwards every request to the registered global
/// allocator.
///
/// Requests the global allocator cannot satisfy surface as [`AllocError`],
/// never as a null pointer, and zero-size requests are refused outright
/// rather than answered with a sentinel.
///
/// # Examples
///
/// ```
/// use allocrc::{Arc, Global};
///
/// let a = Arc::new_in(7, Global);
/// let b = Arc::new(7); // equivalent, `Global` is the default
/// assert_eq!(*a, *b);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

unsafe impl Backend for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if unlikely(layout.size() == 0) {
            return Err(AllocError::new(layout));
        }
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::new(layout))
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr came out of `allocate` with this
        // layout, which only hands out non-zero-size global allocations.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}
