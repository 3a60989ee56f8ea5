//! Inline, type-erased callbacks
//!
//! A [`Callback`] owns an `FnMut()` closure stored directly inside a fixed
//! number of machine words, so event slots have a size known at compile
//! time. Closures that do not fit are rejected when the callback is built,
//! never when it fires.

use core::fmt;
use core::mem::{self, MaybeUninit};
use core::ptr;

use evq_core::{EvqError, EvqResult};

/// Default inline storage, in machine words
pub const DEFAULT_CALLBACK_WORDS: usize = 4;

#[derive(Clone, Copy)]
struct Erased {
    call: unsafe fn(*mut u8),
    drop: unsafe fn(*mut u8),
}

/// Type-erased `FnMut()` stored in `W` machine words
pub struct Callback<const W: usize = DEFAULT_CALLBACK_WORDS> {
    storage: MaybeUninit<[usize; W]>,
    erased: Option<Erased>,
}

// SAFETY: every constructor requires the stored closure to be `Send`.
unsafe impl<const W: usize> Send for Callback<W> {}

impl<const W: usize> Callback<W> {
    /// The null callable; posting it is rejected
    pub const NULL: Self = Self {
        storage: MaybeUninit::uninit(),
        erased: None,
    };

    /// Check at compile-time-known sizes whether `F` fits the storage
    pub const fn fits<F>() -> bool {
        mem::size_of::<F>() <= mem::size_of::<[usize; W]>()
            && mem::align_of::<F>() <= mem::align_of::<usize>()
    }

    /// Store a closure inline
    pub fn new<F>(f: F) -> EvqResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if !Self::fits::<F>() {
            return Err(EvqError::CallbackTooLarge);
        }

        let mut storage = MaybeUninit::<[usize; W]>::uninit();
        // SAFETY: `fits` checked that `F` is no larger and no more aligned
        // than the storage array.
        unsafe { storage.as_mut_ptr().cast::<F>().write(f) };

        Ok(Self {
            storage,
            erased: Some(Erased {
                call: call_erased::<F>,
                drop: drop_erased::<F>,
            }),
        })
    }

    /// Wrap a plain function pointer; `None` is the null callable
    pub fn from_fn(f: Option<fn()>) -> EvqResult<Self> {
        let f = f.ok_or(EvqError::InvalidCallback)?;
        Self::new(f)
    }

    /// Check if this is the null callable
    pub fn is_null(&self) -> bool {
        self.erased.is_none()
    }

    /// Invoke the callback; returns `false` for the null callable
    pub fn call(&mut self) -> bool {
        match self.erased {
            Some(erased) => {
                // SAFETY: `erased` was built for the closure type written
                // into `storage`, which is still initialized.
                unsafe { (erased.call)(self.storage.as_mut_ptr().cast()) };
                true
            }
            None => false,
        }
    }

    /// Move the callback out, leaving the null callable behind
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::NULL)
    }
}

impl<const W: usize> Drop for Callback<W> {
    fn drop(&mut self) {
        if let Some(erased) = self.erased.take() {
            // SAFETY: the closure is initialized and dropped exactly once
            // because `erased` is cleared first.
            unsafe { (erased.drop)(self.storage.as_mut_ptr().cast()) };
        }
    }
}

impl<const W: usize> Default for Callback<W> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<const W: usize> fmt::Debug for Callback<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("words", &W)
            .field("null", &self.is_null())
            .finish()
    }
}

unsafe fn call_erased<F: FnMut()>(data: *mut u8) {
    (*data.cast::<F>())()
}

unsafe fn drop_erased<F>(data: *mut u8) {
    ptr::drop_in_place(data.cast::<F>())
}

/// Bound-argument constructors, one per arity
///
/// Arguments are cloned into every invocation so that periodic callbacks
/// see the same bound values each time they fire.
macro_rules! bound_constructors {
    ($($name:ident($($arg:ident: $ty:ident),+);)+) => {
        impl<const W: usize> Callback<W> {
            $(
                #[doc = concat!("Bind a function pointer to its arguments (`", stringify!($name), "`)")]
                pub fn $name<$($ty),+>(f: Option<fn($($ty),+)>, $($arg: $ty),+) -> EvqResult<Self>
                where
                    $($ty: Clone + Send + 'static),+
                {
                    let f = f.ok_or(EvqError::InvalidCallback)?;
                    Self::new(move || f($($arg.clone()),+))
                }
            )+
        }
    };
}

bound_constructors! {
    from_fn1(a: A);
    from_fn2(a: A, b: B);
    from_fn3(a: A, b: B, c: C);
    from_fn4(a: A, b: B, c: C, d: D);
    from_fn5(a: A, b: B, c: C, d: D, e: E);
}
