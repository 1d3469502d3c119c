use crate::lazy::{Handler, Lazy, Pipe};
use crate::settled::Settled;
use crate::signal::InertSignal;
use crate::{LazyId, Message, Status};

/// A read-only view of a [`Lazy`].
///
/// Everything that observes is forwarded. Methods that configure hand back
/// another view, never the lazy itself, and [`PromisedLazy::signal`] only
/// lets progress through.
///
/// # Examples
///
/// ```
/// use lazy_promise::{Lazy, Resolve};
///
/// let lazy = Lazy::<i32>::new();
/// let promised = lazy.on_success(|_| {});
/// promised.signal().succeed(1);
/// assert!(lazy.is_pending());
///
/// lazy.signal().abort(2);
/// assert!(promised.is_abort());
/// ```
#[derive(Debug)]
pub struct PromisedLazy<T> {
    lazy: Lazy<T>,
}

impl<T> Clone for PromisedLazy<T> {
    fn clone(&self) -> Self {
        Self {
            lazy: self.lazy.clone(),
        }
    }
}

impl<T: Message> PromisedLazy<T> {
    pub(crate) fn new(lazy: Lazy<T>) -> Self {
        Self { lazy }
    }

    pub fn id(&self) -> LazyId {
        self.lazy.id()
    }

    pub fn signal(&self) -> InertSignal<T> {
        InertSignal::new(self.lazy.clone())
    }

    pub fn status(&self) -> Status {
        self.lazy.status()
    }

    pub fn is_pending(&self) -> bool {
        self.lazy.is_pending()
    }

    pub fn is_success(&self) -> bool {
        self.lazy.is_success()
    }

    pub fn is_failed(&self) -> bool {
        self.lazy.is_failed()
    }

    pub fn is_abort(&self) -> bool {
        self.lazy.is_abort()
    }

    pub fn message(&self) -> Option<T> {
        self.lazy.message()
    }

    pub fn settled(&self) -> Settled<T> {
        self.lazy.settled()
    }

    pub fn on_success<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.lazy.on_success(callback)
    }

    pub fn on_failed<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.lazy.on_failed(callback)
    }

    pub fn on_abort<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.lazy.on_abort(callback)
    }

    pub fn always<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.lazy.always(callback)
    }

    pub fn pipe(
        &self,
        on_success: Option<Pipe<T>>,
        on_failed: Option<Pipe<T>>,
        on_abort: Option<Pipe<T>>,
    ) -> PromisedLazy<T> {
        self.lazy.pipe(on_success, on_failed, on_abort);
        self.clone()
    }

    pub fn progress<F>(&self, callback: F) -> PromisedLazy<T>
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.lazy.progress(callback);
        self.clone()
    }

    /// Like [`Lazy::chain`], but the successor comes back read-only too.
    pub fn chain(&self) -> PromisedLazy<T> {
        self.lazy.chain().promise()
    }

    pub fn then<U: Message>(
        &self,
        on_success: Option<Handler<T, U>>,
        on_failed: Option<Handler<T, U>>,
        on_abort: Option<Handler<T, U>>,
    ) -> PromisedLazy<U> {
        self.lazy.then(on_success, on_failed, on_abort)
    }

    pub fn promise(&self) -> PromisedLazy<T> {
        self.clone()
    }
}

/// Anything that settles like a lazy: the lazy itself or a view of it.
#[derive(Debug)]
pub enum Deferred<T> {
    Lazy(Lazy<T>),
    Promised(PromisedLazy<T>),
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        match self {
            Deferred::Lazy(lazy) => Deferred::Lazy(lazy.clone()),
            Deferred::Promised(promised) => Deferred::Promised(promised.clone()),
        }
    }
}

impl<T: Message> Deferred<T> {
    pub fn id(&self) -> LazyId {
        self.as_lazy().id()
    }

    pub fn status(&self) -> Status {
        self.as_lazy().status()
    }

    /// A read-only view, whichever variant this is.
    pub fn promise(&self) -> PromisedLazy<T> {
        self.as_lazy().promise()
    }

    pub(crate) fn into_lazy(self) -> Lazy<T> {
        match self {
            Deferred::Lazy(lazy) => lazy,
            Deferred::Promised(promised) => promised.lazy,
        }
    }

    fn as_lazy(&self) -> &Lazy<T> {
        match self {
            Deferred::Lazy(lazy) => lazy,
            Deferred::Promised(promised) => &promised.lazy,
        }
    }
}

impl<T> From<Lazy<T>> for Deferred<T> {
    fn from(lazy: Lazy<T>) -> Self {
        Deferred::Lazy(lazy)
    }
}

impl<T> From<&Lazy<T>> for Deferred<T> {
    fn from(lazy: &Lazy<T>) -> Self {
        Deferred::Lazy(lazy.clone())
    }
}

impl<T> From<PromisedLazy<T>> for Deferred<T> {
    fn from(promised: PromisedLazy<T>) -> Self {
        Deferred::Promised(promised)
    }
}

impl<T> From<&PromisedLazy<T>> for Deferred<T> {
    fn from(promised: &PromisedLazy<T>) -> Self {
        Deferred::Promised(promised.clone())
    }
}
