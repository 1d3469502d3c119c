use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Waker;

use tracing::{debug, trace, warn};

use crate::promised::{Deferred, PromisedLazy};
use crate::registry::Appointment;
use crate::settled::{Outcome, Settled};
use crate::signal::Signal;
use crate::{LazyId, Message, Resolve, Status};

type Callback<T> = Box<dyn FnOnce(&T) + Send>;
type Progress<T> = Box<dyn FnMut(&T) + Send>;

/// What a pipe or a `then` handler produced: a plain message, or another
/// lazy whose outcome should be waited for instead.
pub enum Step<T> {
    Value(T),
    Deferred(Deferred<T>),
}

impl<T> Step<T> {
    pub fn deferred(deferred: impl Into<Deferred<T>>) -> Self {
        Step::Deferred(deferred.into())
    }
}

/// A per-status transform applied once to the message before dispatch.
pub struct Pipe<T>(Box<dyn FnOnce(T) -> Step<T> + Send>);

impl<T> Pipe<T> {
    pub fn new<F>(transform: F) -> Self
    where
        F: FnOnce(T) -> Step<T> + Send + 'static,
    {
        Self(Box::new(transform))
    }

    /// Shorthand for a pipe that never defers.
    pub fn map<F>(transform: F) -> Self
    where
        F: FnOnce(T) -> T + Send + 'static,
    {
        Self::new(move |message| Step::Value(transform(message)))
    }

    fn apply(self, message: T) -> Step<T> {
        (self.0)(message)
    }
}

/// One positional argument of [`Lazy::then`]: either something to call with
/// the settled message or a literal substitute.
pub enum Handler<T, U> {
    Call(Box<dyn FnOnce(&T) -> Step<U> + Send>),
    Value(Step<U>),
}

impl<T, U> Handler<T, U> {
    pub fn call<F>(handler: F) -> Self
    where
        F: FnOnce(&T) -> Step<U> + Send + 'static,
    {
        Handler::Call(Box::new(handler))
    }

    pub fn value(value: U) -> Self {
        Handler::Value(Step::Value(value))
    }

    pub fn deferred(deferred: impl Into<Deferred<U>>) -> Self {
        Handler::Value(Step::deferred(deferred))
    }

    fn invoke(self, message: &T) -> Step<U> {
        match self {
            Handler::Call(handler) => handler(message),
            Handler::Value(step) => step,
        }
    }
}

/// A single-assignment value with three terminal outcomes.
///
/// `Lazy` is a handle: clones share the same state. Whoever holds a `Lazy`
/// can obtain its [`Signal`]; hand out [`PromisedLazy`] views to code that
/// should only observe.
///
/// # Examples
///
/// ```
/// use lazy_promise::{Lazy, Pipe, Resolve};
/// use std::sync::{Arc, Mutex};
///
/// let lazy = Lazy::<i32>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// lazy.pipe(Some(Pipe::map(|n| n * 10)), None, None)
///     .on_success(move |n| sink.lock().unwrap().push(*n));
///
/// lazy.signal().succeed(4);
/// assert_eq!(*seen.lock().unwrap(), vec![40]);
/// assert_eq!(lazy.message(), Some(4));
/// ```
pub struct Lazy<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    id: LazyId,
    proceeded: bool,
    status: Status,
    message: Option<T>,
    // Post-pipe message. Stays `None` while a pipe is waiting on another lazy.
    effective: Option<Arc<T>>,
    progress: Option<Progress<T>>,
    // Set while one caller is draining `backlog` through the progress hook.
    notifying: bool,
    backlog: VecDeque<T>,
    pipes: [Option<Pipe<T>>; 3],
    // `None` marks a callback that already fired. Emptied once all have.
    callbacks: [Vec<Option<Callback<T>>>; 3],
    appointments: Vec<Appointment>,
    successor: Option<Lazy<T>>,
    wakers: Vec<Waker>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Lazy")
            .field("id", &inner.id)
            .field("status", &inner.status)
            .finish_non_exhaustive()
    }
}

impl<T: Message> Default for Lazy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Message> Lazy<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id: LazyId::next(),
                proceeded: false,
                status: Status::Pending,
                message: None,
                effective: None,
                progress: None,
                notifying: false,
                backlog: VecDeque::new(),
                pipes: [None, None, None],
                callbacks: [Vec::new(), Vec::new(), Vec::new()],
                appointments: Vec::new(),
                successor: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Create a lazy and split it into the producer's signal and a
    /// read-only view for consumers.
    pub fn pair() -> (Signal<T>, PromisedLazy<T>) {
        let lazy = Self::new();
        (lazy.signal(), lazy.promise())
    }

    pub fn id(&self) -> LazyId {
        self.lock().id
    }

    pub fn signal(&self) -> Signal<T> {
        Signal::new(self.clone())
    }

    pub fn promise(&self) -> PromisedLazy<T> {
        PromisedLazy::new(self.clone())
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    pub fn is_abort(&self) -> bool {
        self.status() == Status::Abort
    }

    /// The message this lazy was resolved with, before any pipe ran.
    pub fn message(&self) -> Option<T> {
        self.lock().message.clone()
    }

    /// A future that completes once subscribers for the outcome have run.
    pub fn settled(&self) -> Settled<T> {
        Settled::new(self.clone())
    }

    pub fn on_success<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.subscribe(Status::Success, callback);
        self.promise()
    }

    pub fn on_failed<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.subscribe(Status::Failed, callback);
        self.promise()
    }

    pub fn on_abort<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.subscribe(Status::Abort, callback);
        self.promise()
    }

    /// Run `callback` whichever way this lazy settles.
    pub fn always<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Some(callback)));
        for status in Status::TERMINAL {
            let shared = shared.clone();
            self.subscribe(status, move |message| {
                let callback = shared.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    callback(message)
                }
            });
        }
        self.promise()
    }

    /// Install per-status pipes. `None` keeps whatever was installed before.
    ///
    /// A pipe runs once, when this lazy settles into its status. Pipes
    /// installed after that point have no effect.
    pub fn pipe(
        &self,
        on_success: Option<Pipe<T>>,
        on_failed: Option<Pipe<T>>,
        on_abort: Option<Pipe<T>>,
    ) -> &Self {
        let mut inner = self.lock();
        for (slot, pipe) in [on_success, on_failed, on_abort].into_iter().enumerate() {
            if let Some(pipe) = pipe {
                inner.pipes[slot] = Some(pipe);
            }
        }
        drop(inner);
        self
    }

    /// Install the hook called by [`Resolve::notify`] while still pending.
    pub fn progress<F>(&self, callback: F) -> &Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.lock().progress = Some(Box::new(callback));
        self
    }

    /// A new lazy that settles the same way this one does.
    ///
    /// Only the most recent successor is fed; one created after this lazy
    /// settled is fed immediately.
    pub fn chain(&self) -> Lazy<T> {
        let successor = Lazy::new();
        let settled = {
            let mut inner = self.lock();
            inner.successor = Some(successor.clone());
            inner.effective.clone().map(|message| (inner.status, message))
        };
        if let Some((status, message)) = settled {
            successor.resolve(status, T::clone(&message));
        }
        successor
    }

    /// Derive a lazy from this one's outcome.
    ///
    /// Each handler is bound to its status by position. When it produces
    /// [`Step::Deferred`], the derived lazy follows that lazy's outcome for
    /// the same status instead.
    pub fn then<U: Message>(
        &self,
        on_success: Option<Handler<T, U>>,
        on_failed: Option<Handler<T, U>>,
        on_abort: Option<Handler<T, U>>,
    ) -> PromisedLazy<U> {
        let derived = Lazy::<U>::new();
        let handlers = [
            (Status::Success, on_success),
            (Status::Failed, on_failed),
            (Status::Abort, on_abort),
        ];
        for (status, handler) in handlers {
            let Some(handler) = handler else { continue };
            let signal = derived.signal();
            self.subscribe(status, move |message| match handler.invoke(message) {
                Step::Value(value) => signal.send(status, value),
                Step::Deferred(deferred) => deferred
                    .into_lazy()
                    .subscribe(status, move |value| signal.send(status, value.clone())),
            });
        }
        derived.promise()
    }

    pub(crate) fn is_proceeded(&self) -> bool {
        self.lock().proceeded
    }

    pub(crate) fn subscribe<F>(&self, status: Status, callback: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let Some(slot) = status.slot() else { return };
        let ready = {
            let mut inner = self.lock();
            if inner.proceeded && inner.status != status {
                return;
            }
            inner.callbacks[slot].push(Some(Box::new(callback)));
            inner.effective.is_some()
        };
        if ready {
            self.execute();
        }
    }

    pub(crate) fn resolve(&self, status: Status, message: T) {
        let Some(slot) = status.slot() else {
            debug!(lazy = %self.id(), "ignoring resolution back to pending");
            return;
        };
        let unreachable = {
            let mut inner = self.lock();
            if inner.proceeded {
                debug!(lazy = %inner.id, %status, current = %inner.status, "already proceeded");
                return;
            }
            inner.proceeded = true;
            inner.status = status;
            inner.message = Some(message);
            trace!(lazy = %inner.id, %status, "resolved");

            let mut unreachable = Vec::new();
            for other in (0..3).filter(|other| *other != slot) {
                unreachable.append(&mut inner.callbacks[other]);
                inner.pipes[other] = None;
            }
            unreachable
        };
        drop(unreachable);
        self.settle(status);
    }

    /// Hand `message` to the progress hook. Calls arriving while the hook
    /// runs, from another thread or from the hook itself, are queued and
    /// delivered in order by the caller already running it.
    pub(crate) fn notify(&self, message: T) {
        let hook = {
            let mut inner = self.lock();
            if inner.status.is_terminal() {
                trace!(lazy = %inner.id, "progress after settling dropped");
                return;
            }
            if inner.notifying {
                inner.backlog.push_back(message);
                return;
            }
            let Some(hook) = inner.progress.take() else { return };
            inner.notifying = true;
            inner.backlog.push_back(message);
            hook
        };
        self.drain_progress(hook);
    }

    /// Report to `appointment` as well, from now on.
    pub(crate) fn appoint(&self, appointment: Appointment) {
        let mut inner = self.lock();
        inner.appointments.retain(Appointment::is_live);
        if inner.appointments.iter().all(|known| known.id() != appointment.id()) {
            inner.appointments.push(appointment);
        }
    }

    pub(crate) fn poll_settled(&self, waker: &Waker) -> Option<Outcome<T>> {
        let mut inner = self.lock();
        match (inner.status, inner.effective.clone()) {
            (Status::Success, Some(message)) => Some(Outcome::Success(message)),
            (Status::Failed, Some(message)) => Some(Outcome::Failed(message)),
            (Status::Abort, Some(message)) => Some(Outcome::Abort(message)),
            _ => {
                if !inner.wakers.iter().any(|known| known.will_wake(waker)) {
                    inner.wakers.push(waker.clone());
                }
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain_progress(&self, mut hook: Progress<T>) {
        loop {
            let message = {
                let mut inner = self.lock();
                if let Some(newer) = inner.progress.take() {
                    hook = newer;
                }
                let next = if inner.status.is_terminal() {
                    inner.backlog.clear();
                    None
                } else {
                    inner.backlog.pop_front()
                };
                match next {
                    Some(message) => message,
                    None => {
                        inner.progress = Some(hook);
                        inner.notifying = false;
                        return;
                    }
                }
            };
            hook(&message);
        }
    }

    fn settle(&self, status: Status) {
        let (pipe, message) = {
            let mut inner = self.lock();
            let pipe = status.slot().and_then(|slot| inner.pipes[slot].take());
            (pipe, inner.message.clone())
        };
        let Some(message) = message else { return };
        let step = match pipe {
            Some(pipe) => pipe.apply(message),
            None => Step::Value(message),
        };
        match step {
            Step::Value(effective) => self.finish(status, effective),
            Step::Deferred(deferred) if deferred.id() == self.id() => {
                warn!(lazy = %self.id(), %status, "pipe deferred to its own lazy, using the message as is");
                if let Some(message) = self.message() {
                    self.finish(status, message);
                }
            }
            Step::Deferred(deferred) => {
                let source = deferred.into_lazy();
                debug!(lazy = %self.id(), source = %source.id(), %status, "pipe deferred");
                let this = self.clone();
                // The pipe already ran, so the source's message is used as is.
                source.subscribe(status, move |message| {
                    this.lock().message = Some(message.clone());
                    this.finish(status, message.clone());
                });
            }
        }
    }

    fn finish(&self, status: Status, effective: T) {
        let effective = Arc::new(effective);
        self.lock().effective = Some(effective.clone());
        self.execute();

        let wakers = std::mem::take(&mut self.lock().wakers);
        for waker in wakers {
            waker.wake()
        }
        self.propagate(status, effective);
    }

    /// Fire untouched callbacks for the settled status one at a time, so a
    /// callback that subscribes again keeps registration order intact.
    fn execute(&self) {
        loop {
            let (callback, message) = {
                let mut inner = self.lock();
                let (Some(slot), Some(message)) = (inner.status.slot(), inner.effective.clone())
                else {
                    return;
                };
                let next = inner.callbacks[slot].iter_mut().find_map(Option::take);
                match next {
                    Some(callback) => (callback, message),
                    None => {
                        inner.callbacks[slot].clear();
                        return;
                    }
                }
            };
            callback(&message);
        }
    }

    fn propagate(&self, status: Status, effective: Arc<T>) {
        let (id, appointments, successor) = {
            let inner = self.lock();
            (inner.id, inner.appointments.clone(), inner.successor.clone())
        };
        for appointment in appointments {
            match appointment.lookup() {
                Some(parallel) => parallel.member_settled(status),
                None => trace!(lazy = %id, appointment = %appointment.id(), "parallel gone"),
            }
        }
        if let Some(successor) = successor {
            successor.resolve(status, T::clone(&effective));
        }
    }
}
