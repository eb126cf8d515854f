//! A Chase–Lev work-stealing deque.
//!
//! One [`Worker`] owns the deque and pushes/pops at the bottom (LIFO); any
//! number of [`Stealer`] handles take from the top (FIFO) with a CAS. The
//! `bottom` and `top` indices are monotonic counters that are never reduced
//! modulo the capacity; the ring buffer masks them on access. When the owner
//! runs out of room it installs a doubled buffer and retires the old one to a
//! garbage list that lives until the deque drops, so a stealer holding a
//! stale buffer pointer always reads valid memory.
//!
//! The orderings at the two race windows are deliberately the strongest
//! available: the owner's speculative `bottom` decrement in `pop` and the
//! stealers' `top` CAS commit are all sequentially consistent, which is what
//! guarantees that exactly one side claims the final element. Only the
//! non-contending loads are relaxed.

use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};
use std::sync::Arc;

const MIN_CAPACITY: usize = 64;

/// Result of a steal attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Steal<T> {
    /// The deque was observed empty.
    Empty,
    /// Lost a race with the owner or another stealer; trying again may work.
    Retry,
    Success(T),
}

struct Buffer<T> {
    storage: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

impl<T> Buffer<T> {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let storage = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Buffer { storage }
    }

    fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bit-copies the slot at `index`. The caller owns deciding whether that
    /// copy represents a transfer of ownership.
    unsafe fn read(&self, index: isize) -> T {
        let slot = self
            .storage
            .get_unchecked(index as usize & (self.capacity() - 1));
        ptr::read((*slot.get()).as_ptr())
    }

    unsafe fn write(&self, index: isize, value: T) {
        let slot = self
            .storage
            .get_unchecked(index as usize & (self.capacity() - 1));
        (*slot.get()).write(value);
    }
}

struct Inner<T> {
    bottom: AtomicIsize,
    top: AtomicIsize,
    buffer: AtomicPtr<Buffer<T>>,
    /// Buffers replaced by growth; only the owner pushes here.
    retired: UnsafeCell<Vec<*mut Buffer<T>>>,
}

unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // Sole remaining reference: plain accesses are fine.
        let buffer = *self.buffer.get_mut();
        let b = *self.bottom.get_mut();
        let t = *self.top.get_mut();
        unsafe {
            let mut i = t;
            while i < b {
                drop((*buffer).read(i));
                i += 1;
            }
            drop(Box::from_raw(buffer));
            for old in self.retired.get_mut().drain(..) {
                drop(Box::from_raw(old));
            }
        }
    }
}

/// The owning side of the deque. `Send` but deliberately not `Sync`: all
/// pushes and pops must come from one thread.
pub struct Worker<T> {
    inner: Arc<Inner<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

/// The stealing side. Freely clonable and shareable.
pub struct Stealer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send> Worker<T> {
    pub fn new() -> Self {
        let buffer = Box::into_raw(Box::new(Buffer::new(MIN_CAPACITY)));
        Worker {
            inner: Arc::new(Inner {
                bottom: AtomicIsize::new(0),
                top: AtomicIsize::new(0),
                buffer: AtomicPtr::new(buffer),
                retired: UnsafeCell::new(Vec::new()),
            }),
            _not_sync: PhantomData,
        }
    }

    pub fn stealer(&self) -> Stealer<T> {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Pushes onto the bottom. The release store of `bottom` is what
    /// publishes the slot write to stealers.
    pub fn push(&self, value: T) {
        let inner = &*self.inner;
        let b = inner.bottom.load(Ordering::Relaxed);
        let t = inner.top.load(Ordering::Acquire);
        let mut buffer = inner.buffer.load(Ordering::Relaxed);

        if b - t >= unsafe { (*buffer).capacity() } as isize {
            buffer = self.grow(t, b, buffer);
        }

        unsafe { (*buffer).write(b, value) };
        inner.bottom.store(b + 1, Ordering::Release);
    }

    /// Pops from the bottom (most recently pushed first).
    pub fn pop(&self) -> Option<T> {
        let inner = &*self.inner;
        let b = inner.bottom.load(Ordering::Relaxed) - 1;
        let buffer = inner.buffer.load(Ordering::Relaxed);
        inner.bottom.store(b, Ordering::SeqCst);
        let t = inner.top.load(Ordering::SeqCst);

        if t < b {
            return Some(unsafe { (*buffer).read(b) });
        }
        if t == b {
            // One element left; whoever moves `top` first owns it.
            let won = inner
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();
            inner.bottom.store(b + 1, Ordering::Relaxed);
            return if won {
                Some(unsafe { (*buffer).read(b) })
            } else {
                None
            };
        }
        // Already empty; undo the speculative decrement.
        inner.bottom.store(b + 1, Ordering::Relaxed);
        None
    }

    /// Installs a doubled buffer containing the live range and retires the
    /// old one. Owner-only.
    fn grow(&self, t: isize, b: isize, old: *mut Buffer<T>) -> *mut Buffer<T> {
        let inner = &*self.inner;
        unsafe {
            let new = Box::into_raw(Box::new(Buffer::new((*old).capacity() * 2)));
            let mut i = t;
            while i < b {
                (*new).write(i, (*old).read(i));
                i += 1;
            }
            inner.buffer.store(new, Ordering::Release);
            // A stealer may still be reading through the old pointer, so the
            // allocation stays alive until the deque itself drops.
            (*inner.retired.get()).push(old);
            new
        }
    }
}

impl<T: Send> Default for Worker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Stealer<T> {
    /// Takes the oldest element, racing other stealers and the owner's
    /// last-element pop via CAS on `top`.
    pub fn steal(&self) -> Steal<T> {
        let inner = &*self.inner;
        let t = inner.top.load(Ordering::Acquire);
        let b = inner.bottom.load(Ordering::SeqCst);
        if t >= b {
            return Steal::Empty;
        }

        let buffer = inner.buffer.load(Ordering::Acquire);
        let value = unsafe { (*buffer).read(t) };
        if inner
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            Steal::Success(value)
        } else {
            // Someone else claimed the slot; our copy is not ours to drop.
            std::mem::forget(value);
            Steal::Retry
        }
    }
}
