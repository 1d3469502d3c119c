//! A lazy promise: a single-assignment value that settles exactly once into
//! one of three outcomes (success, failed or abort) and replays that outcome
//! to every subscriber, early or late.
//!
//! A [`Lazy`] is created by the producer, which keeps its [`Signal`] and hands
//! [`PromisedLazy`] views to consumers. Views can subscribe, chain and query
//! but can never resolve. [`Parallel`] waits on many lazies at once: it
//! succeeds when all members succeed and fails (or aborts) as soon as one
//! member does.
//!
//! # Examples
//!
//! ```
//! use lazy_promise::{Lazy, Resolve};
//! use std::sync::{Arc, Mutex};
//!
//! let (signal, promised) = Lazy::<String>::pair();
//! let seen = Arc::new(Mutex::new(None));
//! let sink = seen.clone();
//! promised.on_success(move |msg| *sink.lock().unwrap() = Some(msg.clone()));
//!
//! signal.succeed("🍓".into());
//! signal.fail("too late".into());
//!
//! assert!(promised.is_success());
//! assert_eq!(seen.lock().unwrap().as_deref(), Some("🍓"));
//! ```
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

mod lazy;
mod parallel;
mod promised;
mod registry;
mod settled;
mod signal;

pub use lazy::{Handler, Lazy, Pipe, Step};
pub use parallel::Parallel;
pub use promised::{Deferred, PromisedLazy};
pub use registry::Registry;
pub use settled::{Outcome, Settled};
pub use signal::{InertSignal, Signal};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The parallel is still pending but its registry is gone, so new
    /// members could never report to it.
    #[error("parallel {appointment} is no longer registered")]
    Detached { appointment: AppointmentId },
}

/// Bound shared by every message a lazy can carry.
pub trait Message: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Message for T {}

/// Where a lazy stands. Leaves `Pending` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    Success,
    Failed,
    Abort,
}

impl Status {
    pub const TERMINAL: [Status; 3] = [Status::Success, Status::Failed, Status::Abort];

    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }

    /// Slot in the per-status callback and pipe tables.
    pub(crate) fn slot(self) -> Option<usize> {
        match self {
            Status::Pending => None,
            Status::Success => Some(0),
            Status::Failed => Some(1),
            Status::Abort => Some(2),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "pending",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Abort => "abort",
        })
    }
}

/// The capability to settle a lazy.
///
/// Every method is fire-and-forget: once the lazy has settled, further
/// calls are silently dropped so racing producers need no coordination.
pub trait Resolve<T> {
    fn send(&self, status: Status, message: T);

    /// Report out-of-band progress while still pending.
    fn notify(&self, message: T);

    fn succeed(&self, message: T) {
        self.send(Status::Success, message)
    }

    fn fail(&self, message: T) {
        self.send(Status::Failed, message)
    }

    fn abort(&self, message: T) {
        self.send(Status::Abort, message)
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Process-unique identity of a [`Lazy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LazyId(u64);

impl LazyId {
    pub(crate) fn next() -> Self {
        Self(next_id())
    }
}

impl fmt::Display for LazyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key under which a [`Parallel`] is known to its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppointmentId(u64);

impl AppointmentId {
    pub(crate) fn next() -> Self {
        Self(next_id())
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
