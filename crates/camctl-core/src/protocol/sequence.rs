//! Sequence counter for the strict camera transport.
//!
//! # What is a sequence number? (for beginners)
//!
//! Cameras on the strict transport expect every datagram to carry a 32-bit
//! sequence number in its header.  The camera echoes the number back in its
//! acknowledgement so a controller can tell which command a reply belongs to.
//!
//! The counter is owned by one camera connection.  It starts at 1, advances by
//! exactly one per transmitted frame and is never reset.  When it passes
//! `u32::MAX` it wraps to 0 with ordinary unsigned arithmetic; cameras accept
//! the wraparound, so there is no special handling for it.

use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonically increasing 32-bit counter for strict transport frames.
///
/// # Examples
///
/// ```rust
/// use camctl_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// First sequence number handed out by a fresh counter.
    pub const FIRST: u32 = 1;

    /// Creates a new counter whose first value is [`SequenceCounter::FIRST`].
    pub fn new() -> Self {
        Self::starting_at(Self::FIRST)
    }

    /// Creates a counter that hands out `first` on the next call to [`next`].
    ///
    /// [`next`]: SequenceCounter::next
    pub fn starting_at(first: u32) -> Self {
        Self {
            inner: AtomicU32::new(first),
        }
    }

    /// Returns the next sequence number and advances the counter.
    ///
    /// `fetch_add` on atomics wraps on overflow, so `u32::MAX` is followed by 0.
    pub fn next(&self) -> u32 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](SequenceCounter::next)
    /// would produce, without advancing.
    pub fn peek(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
