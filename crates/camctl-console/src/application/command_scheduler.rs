//! CommandScheduler: single-flight queue of deferred device commands.
//!
//! # How it works (for beginners)
//!
//! Cameras on UDP do not reliably acknowledge commands, and a slow camera
//! that receives commands faster than it can execute them drops or reorders
//! them.  The scheduler therefore keeps **at most one command in flight**:
//!
//! 1. Callers push *thunks* (boxed closures) with [`CommandScheduler::enqueue`].
//! 2. When the scheduler is idle it runs the front thunk immediately.
//! 3. A thunk returns `Ok(true)` if it put bytes on the wire.  The scheduler
//!    then arms a deadline (500 ms by default) and waits.
//! 4. When the deadline passes ([`CommandScheduler::on_timeout`]) or the
//!    camera sends anything back ([`CommandScheduler::on_liveness_signal`])
//!    the next thunk runs.
//! 5. A thunk that returns `Ok(false)` collapsed to nothing (for example a
//!    zoom update equal to the last one sent); the next thunk runs at once.
//!
//! Thunks receive the scheduler's context by `&mut` so they can read and
//! update long-lived session state without locks: everything runs on the
//! task that owns the scheduler.  The scheduler never sleeps itself; the
//! owning event loop waits until [`CommandScheduler::deadline`].

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::camera_control::TransportError;

/// Wait between a transmitted command and the next one when the device
/// stays silent.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// Failure raised by a thunk after it attempted to transmit.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A deferred command.  Returns whether anything was transmitted.
pub type CommandThunk<C> =
    Box<dyn FnOnce(&mut C, &mut FollowUps<C>) -> Result<bool, DispatchError> + Send>;

/// Thunks queued by a running thunk.  They are appended to the back of the
/// queue once the running thunk returns.
pub struct FollowUps<C> {
    thunks: Vec<CommandThunk<C>>,
}

impl<C> FollowUps<C> {
    fn new() -> Self {
        Self { thunks: Vec::new() }
    }

    pub fn push<F>(&mut self, thunk: F)
    where
        F: FnOnce(&mut C, &mut FollowUps<C>) -> Result<bool, DispatchError> + Send + 'static,
    {
        self.thunks.push(Box::new(thunk));
    }
}

/// Single-flight command queue owning its session context `C`.
pub struct CommandScheduler<C> {
    context: C,
    queue: VecDeque<CommandThunk<C>>,
    idle: bool,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl<C> CommandScheduler<C> {
    pub fn new(context: C, timeout: Duration) -> Self {
        Self {
            context,
            queue: VecDeque::new(),
            idle: true,
            deadline: None,
            timeout,
        }
    }

    /// Appends `thunk`.  If nothing is in flight, starts draining right away.
    ///
    /// Never blocks: at most the thunks that transmit nothing run inline.
    pub fn enqueue<F>(&mut self, thunk: F)
    where
        F: FnOnce(&mut C, &mut FollowUps<C>) -> Result<bool, DispatchError> + Send + 'static,
    {
        self.queue.push_back(Box::new(thunk));
        if self.idle {
            self.idle = false;
            self.drain();
        }
    }

    /// Disarms the deadline and runs queued thunks until one transmits or
    /// the queue is empty.
    pub fn drain(&mut self) {
        self.deadline = None;
        while let Some(thunk) = self.queue.pop_front() {
            let mut follow_ups = FollowUps::new();
            let outcome = thunk(&mut self.context, &mut follow_ups);
            self.queue.extend(follow_ups.thunks);

            match outcome {
                Ok(true) => {
                    self.arm();
                    return;
                }
                Ok(false) => {
                    debug!("command collapsed to nothing; continuing");
                }
                Err(e) => {
                    // The bytes may or may not have left; wait as if they did.
                    warn!("command dispatch failed: {e}");
                    self.arm();
                    return;
                }
            }
        }
        self.idle = true;
    }

    /// The armed deadline passed.
    pub fn on_timeout(&mut self) {
        self.drain();
    }

    /// The device sent something back; treat it like the deadline passing.
    pub fn on_liveness_signal(&mut self) {
        self.drain();
    }

    /// Drops every queued thunk without running it and disarms the deadline.
    ///
    /// A command already on the wire cannot be recalled.
    pub fn clear(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        self.deadline = None;
        self.idle = true;
        if dropped > 0 {
            debug!(dropped, "cleared pending commands");
        }
    }

    /// When the owning loop should call [`on_timeout`](Self::on_timeout).
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Number of thunks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }
}

impl<C: fmt::Debug> fmt::Debug for CommandScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandScheduler")
            .field("context", &self.context)
            .field("pending", &self.queue.len())
            .field("idle", &self.idle)
            .field("deadline", &self.deadline)
            .finish()
    }
}
