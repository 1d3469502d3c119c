use tracing::trace;

use crate::lazy::Lazy;
use crate::{Message, Resolve, Status};

/// The producer's side of a [`Lazy`]: the only way to move it out of
/// pending.
///
/// # Examples
///
/// ```
/// use lazy_promise::{Lazy, Resolve};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (signal, promised) = Lazy::<String>::pair();
/// let task1 = thread::spawn(move || block_on(async {
///     promised.settled().await
/// }));
/// signal.succeed("🍓".into());
/// let outcome = task1.join().expect("The task1 thread has panicked");
/// assert_eq!(outcome.message(), "🍓");
/// ```
#[derive(Debug)]
pub struct Signal<T> {
    lazy: Lazy<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            lazy: self.lazy.clone(),
        }
    }
}

impl<T: Message> Signal<T> {
    pub(crate) fn new(lazy: Lazy<T>) -> Self {
        Self { lazy }
    }
}

impl<T: Message> Resolve<T> for Signal<T> {
    fn send(&self, status: Status, message: T) {
        self.lazy.resolve(status, message)
    }

    fn notify(&self, message: T) {
        self.lazy.notify(message)
    }
}

/// The signal reachable through a read-only handle. Resolutions are
/// dropped; progress still goes through.
#[derive(Debug)]
pub struct InertSignal<T> {
    lazy: Lazy<T>,
}

impl<T> Clone for InertSignal<T> {
    fn clone(&self) -> Self {
        Self {
            lazy: self.lazy.clone(),
        }
    }
}

impl<T: Message> InertSignal<T> {
    pub(crate) fn new(lazy: Lazy<T>) -> Self {
        Self { lazy }
    }
}

impl<T: Message> Resolve<T> for InertSignal<T> {
    fn send(&self, status: Status, _message: T) {
        trace!(lazy = %self.lazy.id(), %status, "read-only signal ignored");
    }

    fn notify(&self, message: T) {
        self.lazy.notify(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_racing_producers_resolve_once() {
        let lazy = Lazy::<usize>::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        lazy.always(move |n| sink.lock().unwrap().push(*n));

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let signal = lazy.signal();
                thread::spawn(move || {
                    if n % 2 == 0 {
                        signal.succeed(n)
                    } else {
                        signal.fail(n)
                    }
                })
            })
            .collect();
        for task in tasks {
            task.join().expect("The producer thread has panicked");
        }

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(lazy.message(), Some(fired[0]));
        assert!(lazy.status().is_terminal());
    }

    #[test]
    fn test_inert_signal_only_notifies() {
        let lazy = Lazy::<i32>::new();
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        lazy.progress(move |p| sink.lock().unwrap().push(*p));

        let inert = InertSignal::new(lazy.clone());
        inert.succeed(1);
        inert.fail(2);
        inert.abort(3);
        inert.notify(4);

        assert!(lazy.is_pending());
        assert_eq!(*progress.lock().unwrap(), vec![4]);
    }
}
