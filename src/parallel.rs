use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::lazy::{Handler, Lazy, Pipe};
use crate::promised::{Deferred, PromisedLazy};
use crate::registry::{Appointed, Appointment, Registry};
use crate::settled::Settled;
use crate::signal::InertSignal;
use crate::{AppointmentId, Error, LazyId, Message, Result, Status};

/// Waits on many lazies at once.
///
/// Settles as success once every member succeeded, or as failed (abort) as
/// soon as any member failed (aborted). The message lists each member's
/// message in membership order; members still pending show up as `None`.
///
/// A parallel without members never settles on its own.
///
/// # Examples
///
/// ```
/// use lazy_promise::{Lazy, Parallel, Registry, Resolve};
///
/// let registry = Registry::new();
/// let (a, b) = (Lazy::<i32>::new(), Lazy::<i32>::new());
/// let parallel = Parallel::new(&registry, [&a, &b]);
///
/// b.signal().succeed(2);
/// assert!(parallel.is_pending());
/// a.signal().succeed(1);
/// assert!(parallel.is_success());
/// assert_eq!(parallel.message(), Some(vec![Some(1), Some(2)]));
/// assert!(registry.is_empty());
/// ```
pub struct Parallel<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    appointment: Appointment,
    lazy: Lazy<Vec<Option<T>>>,
    members: Mutex<Vec<Lazy<T>>>,
}

impl<T> Clone for Parallel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Debug for Parallel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parallel")
            .field("appointment", &self.shared.appointment.id())
            .field("lazy", &self.shared.lazy)
            .field("members", &self.shared.lock_members().len())
            .finish()
    }
}

impl<T: Message> Parallel<T> {
    /// Register a new parallel in `registry` over `members`.
    ///
    /// A lazy may belong to several parallels at once. Members that have
    /// already settled are evaluated right away.
    pub fn new<I>(registry: &Registry, members: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Deferred<T>>,
    {
        let id = AppointmentId::next();
        let shared = Arc::new(Shared {
            appointment: registry.appointment(id),
            lazy: Lazy::new(),
            members: Mutex::new(Vec::new()),
        });
        registry.insert(id, shared.clone());
        let parallel = Self { shared };

        for member in members {
            parallel.enlist(member.into());
        }
        trace!(appointment = %id, members = parallel.shared.lock_members().len(), "created");
        parallel.replay();
        parallel
    }

    /// Add a member. Appending after the parallel settled is allowed but
    /// changes nothing.
    ///
    /// Fails while pending if the registry this parallel was created in has
    /// been dropped, since members could no longer reach it.
    pub fn append(&self, member: impl Into<Deferred<T>>) -> Result<&Self> {
        if !self.shared.lazy.is_proceeded() && !self.shared.appointment.is_live() {
            return Err(Error::Detached {
                appointment: self.appointment(),
            });
        }
        let member = self.enlist(member.into());
        let status = member.status();
        if status.is_terminal() {
            self.shared.member_settled(status);
        }
        Ok(self)
    }

    pub fn appointment(&self) -> AppointmentId {
        self.shared.appointment.id()
    }

    /// Read-only views of the members, in membership order.
    pub fn members(&self) -> Vec<PromisedLazy<T>> {
        self.shared
            .lock_members()
            .iter()
            .map(Lazy::promise)
            .collect()
    }

    pub fn id(&self) -> LazyId {
        self.shared.lazy.id()
    }

    /// Parallels settle only through their members, so the signal is inert
    /// apart from progress.
    pub fn signal(&self) -> InertSignal<Vec<Option<T>>> {
        self.promise().signal()
    }

    pub fn promise(&self) -> PromisedLazy<Vec<Option<T>>> {
        self.shared.lazy.promise()
    }

    pub fn status(&self) -> Status {
        self.shared.lazy.status()
    }

    pub fn is_pending(&self) -> bool {
        self.shared.lazy.is_pending()
    }

    pub fn is_success(&self) -> bool {
        self.shared.lazy.is_success()
    }

    pub fn is_failed(&self) -> bool {
        self.shared.lazy.is_failed()
    }

    pub fn is_abort(&self) -> bool {
        self.shared.lazy.is_abort()
    }

    pub fn message(&self) -> Option<Vec<Option<T>>> {
        self.shared.lazy.message()
    }

    pub fn settled(&self) -> Settled<Vec<Option<T>>> {
        self.shared.lazy.settled()
    }

    pub fn on_success<F>(&self, callback: F) -> PromisedLazy<Vec<Option<T>>>
    where
        F: FnOnce(&Vec<Option<T>>) + Send + 'static,
    {
        self.shared.lazy.on_success(callback)
    }

    pub fn on_failed<F>(&self, callback: F) -> PromisedLazy<Vec<Option<T>>>
    where
        F: FnOnce(&Vec<Option<T>>) + Send + 'static,
    {
        self.shared.lazy.on_failed(callback)
    }

    pub fn on_abort<F>(&self, callback: F) -> PromisedLazy<Vec<Option<T>>>
    where
        F: FnOnce(&Vec<Option<T>>) + Send + 'static,
    {
        self.shared.lazy.on_abort(callback)
    }

    pub fn always<F>(&self, callback: F) -> PromisedLazy<Vec<Option<T>>>
    where
        F: FnOnce(&Vec<Option<T>>) + Send + 'static,
    {
        self.shared.lazy.always(callback)
    }

    pub fn pipe(
        &self,
        on_success: Option<Pipe<Vec<Option<T>>>>,
        on_failed: Option<Pipe<Vec<Option<T>>>>,
        on_abort: Option<Pipe<Vec<Option<T>>>>,
    ) -> &Self {
        self.shared.lazy.pipe(on_success, on_failed, on_abort);
        self
    }

    pub fn progress<F>(&self, callback: F) -> &Self
    where
        F: FnMut(&Vec<Option<T>>) + Send + 'static,
    {
        self.shared.lazy.progress(callback);
        self
    }

    pub fn chain(&self) -> Lazy<Vec<Option<T>>> {
        self.shared.lazy.chain()
    }

    pub fn then<U: Message>(
        &self,
        on_success: Option<Handler<Vec<Option<T>>, U>>,
        on_failed: Option<Handler<Vec<Option<T>>, U>>,
        on_abort: Option<Handler<Vec<Option<T>>, U>>,
    ) -> PromisedLazy<U> {
        self.shared.lazy.then(on_success, on_failed, on_abort)
    }

    fn enlist(&self, member: Deferred<T>) -> Lazy<T> {
        let member = member.into_lazy();
        member.appoint(self.shared.appointment.clone());
        self.shared.lock_members().push(member.clone());
        member
    }

    /// Evaluate members that settled before they were enlisted, as if each
    /// had just reported, in membership order.
    fn replay(&self) {
        let settled: Vec<Status> = self
            .shared
            .lock_members()
            .iter()
            .map(Lazy::status)
            .filter(|status| status.is_terminal())
            .collect();
        for status in settled {
            self.shared.member_settled(status);
        }
    }
}

impl<T> Shared<T> {
    fn lock_members(&self) -> MutexGuard<'_, Vec<Lazy<T>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Message> Appointed for Shared<T> {
    fn member_settled(&self, status: Status) {
        if self.lazy.is_proceeded() {
            return;
        }
        let members = self.lock_members().clone();
        let reached = match status {
            Status::Pending => false,
            Status::Success => {
                !members.is_empty() && members.iter().all(|member| member.is_success())
            }
            settled => members.iter().any(|member| member.status() == settled),
        };
        let id = self.appointment.id();
        if !reached {
            trace!(appointment = %id, %status, "still waiting");
            return;
        }

        let messages = members.iter().map(Lazy::message).collect();
        debug!(appointment = %id, %status, members = members.len(), "parallel settled");
        self.lazy.resolve(status, messages);
        if self.appointment.release() {
            trace!(appointment = %id, "deregistered");
        }
    }
}

impl<T: Message> From<Parallel<T>> for Deferred<Vec<Option<T>>> {
    fn from(parallel: Parallel<T>) -> Self {
        Deferred::Promised(parallel.promise())
    }
}

impl<T: Message> From<&Parallel<T>> for Deferred<Vec<Option<T>>> {
    fn from(parallel: &Parallel<T>) -> Self {
        Deferred::Promised(parallel.promise())
    }
}
