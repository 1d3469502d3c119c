use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::lazy::Lazy;
use crate::{Message, Status};

/// How a lazy settled, with the message its subscribers saw.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(Arc<T>),
    Failed(Arc<T>),
    Abort(Arc<T>),
}

impl<T> Clone for Outcome<T> {
    fn clone(&self) -> Self {
        match self {
            Outcome::Success(message) => Outcome::Success(message.clone()),
            Outcome::Failed(message) => Outcome::Failed(message.clone()),
            Outcome::Abort(message) => Outcome::Abort(message.clone()),
        }
    }
}

impl<T> Outcome<T> {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Success(_) => Status::Success,
            Outcome::Failed(_) => Status::Failed,
            Outcome::Abort(_) => Status::Abort,
        }
    }

    pub fn message(&self) -> &T {
        match self {
            Outcome::Success(message) | Outcome::Failed(message) | Outcome::Abort(message) => {
                message
            }
        }
    }

    /// Success as `Ok`, failed or abort as `Err`.
    pub fn into_result(self) -> Result<Arc<T>, Arc<T>> {
        match self {
            Outcome::Success(message) => Ok(message),
            Outcome::Failed(message) | Outcome::Abort(message) => Err(message),
        }
    }
}

/// Waits for a lazy to settle. Any number of these may wait on the same
/// lazy; each sees the same outcome.
#[derive(Debug)]
pub struct Settled<T> {
    lazy: Lazy<T>,
}

impl<T> Clone for Settled<T> {
    fn clone(&self) -> Self {
        Self {
            lazy: self.lazy.clone(),
        }
    }
}

impl<T: Message> Settled<T> {
    pub(crate) fn new(lazy: Lazy<T>) -> Self {
        Self { lazy }
    }
}

impl<T: Message> Future for Settled<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.lazy.poll_settled(cx.waker()) {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Pipe, Resolve, Step};
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn test_settled_after_resolution() {
        let lazy = Lazy::<String>::new();
        lazy.signal().fail("💥".into());
        let outcome = block_on(lazy.settled());
        assert_eq!(outcome.status(), Status::Failed);
        assert_eq!(outcome.message(), "💥");
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_two_waiters_resolve() {
        let (signal, promised) = Lazy::<String>::pair();
        let waiter_a = promised.settled();
        let waiter_b = waiter_a.clone();
        let task1 = thread::spawn(move || block_on(waiter_a));
        let task2 = thread::spawn(move || block_on(waiter_b));
        let task3 = thread::spawn(move || signal.succeed(String::from("🍓")));
        task3.join().expect("The task3 thread has panicked");
        let a = task1.join().expect("The task1 thread has panicked");
        let b = task2.join().expect("The task2 thread has panicked");
        assert_eq!(a, b);
        assert_eq!(a.into_result().unwrap().as_str(), "🍓");
    }

    #[test]
    fn test_waits_for_deferred_pipe() {
        let source = Lazy::<i32>::new();
        let lazy = Lazy::<i32>::new();
        let deferred = source.clone();
        lazy.pipe(Some(Pipe::new(move |_| Step::deferred(deferred))), None, None);
        lazy.signal().succeed(1);

        let waiter = lazy.settled();
        let task = thread::spawn(move || block_on(waiter));
        source.signal().succeed(2);
        let outcome = task.join().expect("The waiter thread has panicked");
        assert_eq!(outcome, Outcome::Success(Arc::new(2)));
    }
}
