//! Implementation of the reader/writer-locked FIFO queue.
//!
//! All mutating operations serialize on the writer side of an [`RwLock`]
//! around the backing sequence, so the queue's logical history is exactly the
//! order in which writer-lock holders ran. Read-only operations share the
//! reader side. Consumers that want to block until an element arrives wait on
//! a condition pair that carries a push-generation counter, which lets them
//! tell a real wake from a spurious one and closes the window between
//! releasing the data lock and parking.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ptr;
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::guard::{ReadGuard, WriteGuard};

/// Signal state for consumers blocked until the queue becomes non-empty.
///
/// The counter records completed pushes. A waiter samples it while still
/// holding the writer lock on the storage, so any push that slips in between
/// the waiter releasing that lock and parking on the condvar must first bump
/// the counter under this mutex, and the waiter cannot miss the wake.
pub(crate) struct NotEmpty {
    pub(crate) pushes: Mutex<u64>,
    pub(crate) cond: Condvar,
}

impl NotEmpty {
    fn new() -> Self {
        Self {
            pushes: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    /// Records a completed push and wakes one blocked consumer.
    ///
    /// Called with the writer lock on the storage held, so the push count
    /// stays in step with the serialized mutation history.
    pub(crate) fn signal(&self) {
        let mut pushes = self.pushes.lock();
        *pushes += 1;
        self.cond.notify_one();
    }
}

/// A thread-safe FIFO queue with explicit reader/writer lock acquisition.
///
/// Elements come out in the order they were pushed. Mutating operations
/// ([`push`], [`try_pop`], [`clear`]) take the writer lock; size queries take
/// the reader lock, so any number of readers proceed in parallel while
/// writers are excluded. [`try_pop_for`] additionally blocks until an element
/// arrives or the timeout elapses.
///
/// Iteration requires holding a lock guard obtained from [`read`] or
/// [`write`]; the iterators borrow from the guard, so traversing without the
/// lock held does not compile.
///
/// The queue is unbounded. `push` never blocks waiting for space, only on
/// lock contention.
///
/// # Examples
///
/// ```
/// use concurrent_queue_rs::ConcurrentQueue;
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// let queue = Arc::new(ConcurrentQueue::new());
///
/// let consumer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || queue.try_pop_for(Duration::from_secs(5)))
/// };
///
/// queue.push(42);
/// assert_eq!(consumer.join().unwrap(), Some(42));
/// ```
///
/// [`push`]: ConcurrentQueue::push
/// [`try_pop`]: ConcurrentQueue::try_pop
/// [`try_pop_for`]: ConcurrentQueue::try_pop_for
/// [`clear`]: ConcurrentQueue::clear
/// [`read`]: ConcurrentQueue::read
/// [`write`]: ConcurrentQueue::write
pub struct ConcurrentQueue<T> {
    /// The backing sequence, behind the reader/writer lock.
    items: RwLock<VecDeque<T>>,

    /// "Queue became non-empty" signal.
    ///
    /// Padded onto its own cache line so parked consumers bumping the push
    /// count don't share a line with the data lock's state word.
    not_empty: CachePadded<NotEmpty>,
}

impl<T> ConcurrentQueue<T> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::from_deque(VecDeque::new())
    }

    /// Creates a new empty queue with storage reserved for at least
    /// `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_deque(VecDeque::with_capacity(capacity))
    }

    fn from_deque(items: VecDeque<T>) -> Self {
        Self {
            items: RwLock::new(items),
            not_empty: CachePadded::new(NotEmpty::new()),
        }
    }

    /// Appends `value` to the back of the queue.
    ///
    /// Takes the writer lock, inserts, and wakes one consumer blocked in
    /// [`try_pop_for`]. Blocks only on lock contention, never for space.
    ///
    /// [`try_pop_for`]: ConcurrentQueue::try_pop_for
    pub fn push(&self, value: T) {
        let mut items = self.items.write();
        items.push_back(value);
        self.not_empty.signal();
    }

    /// Constructs an element at the back of the queue.
    ///
    /// Same locking and signaling contract as [`push`], but the element is
    /// built by `make` after the writer lock is held. If `make` panics, the
    /// lock is released on unwind and the queue is left unchanged.
    ///
    /// [`push`]: ConcurrentQueue::push
    pub fn push_with<F>(&self, make: F)
    where
        F: FnOnce() -> T,
    {
        let mut items = self.items.write();
        items.push_back(make());
        self.not_empty.signal();
    }

    /// Removes and returns the front element, or `None` if the queue is empty.
    ///
    /// May block briefly on lock contention but never waits for an element to
    /// arrive.
    pub fn try_pop(&self) -> Option<T> {
        self.items.write().pop_front()
    }

    /// Removes and returns the front element, waiting up to `timeout` for one
    /// to arrive.
    ///
    /// Returns `None` if the queue is still empty when the timeout elapses.
    /// A zero timeout behaves exactly like [`try_pop`]: one check, no wait.
    ///
    /// When several consumers are blocked here, each push wakes one of them;
    /// which one is unspecified.
    ///
    /// [`try_pop`]: ConcurrentQueue::try_pop
    pub fn try_pop_for(&self, timeout: Duration) -> Option<T> {
        if timeout.is_zero() {
            return self.try_pop();
        }

        let deadline = Instant::now() + timeout;
        let mut items = self.items.write();
        loop {
            if let Some(value) = items.pop_front() {
                return Some(value);
            }

            // Sample the push count before giving up the writer lock. A push
            // landing after our emptiness check must bump the count under
            // this mutex, which we hold until the condvar parks us, so the
            // wake cannot slip past.
            let mut pushes = self.not_empty.pushes.lock();
            let seen = *pushes;
            drop(items);

            loop {
                let timed_out = self
                    .not_empty
                    .cond
                    .wait_until(&mut pushes, deadline)
                    .timed_out();
                if *pushes != seen {
                    break;
                }
                if timed_out {
                    return None;
                }
                // Spurious wakeup: the count didn't move, keep waiting.
            }

            // A push landed. Retake the writer lock and race the other
            // consumers for it; if one of them wins we wait again.
            drop(pushes);
            items = self.items.write();
        }
    }

    /// Removes all elements.
    ///
    /// Takes the writer lock and destroys every element. Does not signal
    /// blocked consumers: becoming empty never satisfies a waiter.
    pub fn clear(&self) {
        self.items.write().clear();
    }

    /// Returns the number of elements currently in the queue.
    ///
    /// Takes the reader lock; the count is maintained by the storage, not
    /// recomputed by traversal.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the queue currently holds no elements.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Acquires the reader lock and returns a guard for shared access.
    ///
    /// Any number of read guards coexist; all writers are excluded while one
    /// is held. The lock is released when the guard drops, on every exit path
    /// including unwinding.
    pub fn read(&self) -> ReadGuard<'_, T> {
        ReadGuard::new(self.items.read())
    }

    /// Acquires the writer lock and returns a guard for exclusive access.
    ///
    /// The guard combines traversal with mutation under one critical section.
    /// The lock is not re-entrant: acquiring a second guard on the same
    /// thread while one is held deadlocks.
    pub fn write(&self) -> WriteGuard<'_, T> {
        WriteGuard::new(self.items.write(), &self.not_empty)
    }

    /// Exchanges the contents of two queues.
    ///
    /// Writer locks on both operands are taken in a fixed address order, so
    /// two threads swapping the same pair with the operands flipped cannot
    /// deadlock. Swapping a queue with itself is a no-op. The storage is
    /// exchanged wholesale; blocked consumers are not signaled (only pushes
    /// signal).
    pub fn swap(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        let (first, second) = Self::lock_order(self, other);
        let mut a = first.items.write();
        let mut b = second.items.write();
        mem::swap(&mut *a, &mut *b);
    }

    /// Orders two instances by address so dual-queue operations always lock
    /// in the same sequence regardless of which operand is `self`.
    fn lock_order<'a>(a: &'a Self, b: &'a Self) -> (&'a Self, &'a Self) {
        if (a as *const Self) < (b as *const Self) {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for ConcurrentQueue<T> {
    /// Duplicates the queue, holding the source's reader lock for the
    /// duration of the read. The clone has its own lock and signal state and
    /// is independent of the source from then on.
    fn clone(&self) -> Self {
        let items = self.items.read();
        Self::from_deque(items.clone())
    }

    fn clone_from(&mut self, source: &Self) {
        // `&mut self` is exclusive, so only the source needs its lock.
        let source_items = source.items.read();
        self.items.get_mut().clone_from(&source_items);
    }
}

impl<T> From<VecDeque<T>> for ConcurrentQueue<T> {
    fn from(items: VecDeque<T>) -> Self {
        Self::from_deque(items)
    }
}

impl<T> From<Vec<T>> for ConcurrentQueue<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_deque(items.into())
    }
}

impl<T, const N: usize> From<[T; N]> for ConcurrentQueue<T> {
    fn from(items: [T; N]) -> Self {
        Self::from_deque(items.into())
    }
}

impl<T> FromIterator<T> for ConcurrentQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_deque(iter.into_iter().collect())
    }
}

impl<T> Extend<T> for ConcurrentQueue<T> {
    /// Appends every element of `iter` in order.
    ///
    /// Requires exclusive access, so no locking is needed and no consumer can
    /// be parked while the borrow exists. The push count still advances.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let items = self.items.get_mut();
        let before = items.len();
        items.extend(iter);
        let added = (items.len() - before) as u64;
        *self.not_empty.pushes.get_mut() += added;
    }
}

impl<T> IntoIterator for ConcurrentQueue<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    /// Consumes the queue and yields its elements in FIFO order.
    fn into_iter(self) -> Self::IntoIter {
        self.items.into_inner().into_iter()
    }
}

impl<T: PartialEq> PartialEq for ConcurrentQueue<T> {
    /// Two queues are equal iff they hold the same number of elements and
    /// the elements compare equal pairwise in order.
    ///
    /// Reader locks on both operands are taken in the same fixed address
    /// order as [`swap`], so concurrent comparisons from different threads
    /// cannot deadlock however the operands are arranged. Comparing an
    /// instance with itself short-circuits without locking twice.
    ///
    /// [`swap`]: ConcurrentQueue::swap
    fn eq(&self, other: &Self) -> bool {
        if ptr::eq(self, other) {
            return true;
        }
        let (first, second) = Self::lock_order(self, other);
        let a = first.items.read();
        let b = second.items.read();
        *a == *b
    }
}

impl<T: Eq> Eq for ConcurrentQueue<T> {}

impl<T: fmt::Debug> fmt::Debug for ConcurrentQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Locked;
        impl fmt::Debug for Locked {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("<locked>")
            }
        }

        // Non-blocking so a queue can be printed while a writer holds it.
        match self.items.try_read() {
            Some(items) => f.debug_tuple("ConcurrentQueue").field(&*items).finish(),
            None => f.debug_tuple("ConcurrentQueue").field(&Locked).finish(),
        }
    }
}
