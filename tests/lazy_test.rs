#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use lazy_promise::{Handler, Lazy, Outcome, Pipe, Resolve, Status, Step};
    use std::sync::{Arc, Mutex};
    use std::{thread, time::Duration};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_late_subscriber_fires_once() {
        init_tracing();
        let lazy = Lazy::<i32>::new();
        lazy.signal().succeed(42);

        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        lazy.on_success(move |n| *sink.lock().unwrap() += *n);
        lazy.signal().succeed(1);
        assert_eq!(*count.lock().unwrap(), 42);
    }

    #[test]
    fn test_same_callback_registered_twice_fires_twice() {
        let lazy = Lazy::<i32>::new();
        let count = Arc::new(Mutex::new(0));
        let bump = {
            let count = count.clone();
            move |_: &i32| *count.lock().unwrap() += 1
        };
        lazy.on_failed(bump.clone());
        lazy.on_failed(bump);
        lazy.signal().fail(0);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_always_fires_for_abort() {
        let lazy = Lazy::<String>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        lazy.always(move |msg| sink.lock().unwrap().push(msg.clone()));
        lazy.signal().abort("cancelled".into());
        lazy.signal().succeed("ignored".into());
        assert_eq!(*seen.lock().unwrap(), vec!["cancelled".to_string()]);
    }

    #[test]
    fn test_then_follows_returned_lazy() {
        init_tracing();
        let f = Lazy::<i32>::new();
        let g = Lazy::<i32>::new();
        let follow = g.promise();
        let derived = f.then::<i32>(
            Some(Handler::call(move |_| Step::deferred(follow))),
            None,
            None,
        );

        f.signal().succeed(1);
        assert!(derived.is_pending());
        g.signal().succeed(2);
        assert!(derived.is_success());
        assert_eq!(derived.message(), Some(2));
    }

    #[test]
    fn test_then_returned_lazy_that_fails_elsewhere() {
        let f = Lazy::<i32>::new();
        let g = Lazy::<i32>::new();
        let derived = f.then::<i32>(Some(Handler::deferred(&g)), None, None);
        f.signal().succeed(1);
        g.signal().fail(7);
        // only the success status of `g` is followed
        assert!(derived.is_pending());
    }

    #[test]
    fn test_then_maps_message_type() {
        let f = Lazy::<i32>::new();
        let derived = f.then(
            Some(Handler::call(|n: &i32| Step::Value(format!("ok {n}")))),
            Some(Handler::call(|n: &i32| Step::Value(format!("err {n}")))),
            None,
        );
        f.signal().fail(3);
        assert!(derived.is_failed());
        assert_eq!(derived.message().as_deref(), Some("err 3"));
    }

    #[test]
    fn test_pipe_deferring_to_another_lazy() {
        let source = Lazy::<i32>::new();
        let lazy = Lazy::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let deferred = source.clone();
        lazy.pipe(Some(Pipe::new(move |_| Step::deferred(deferred))), None, None)
            .on_success(move |n| sink.lock().unwrap().push(*n));

        lazy.signal().succeed(1);
        assert!(lazy.is_success());
        assert!(seen.lock().unwrap().is_empty());

        source.signal().succeed(5);
        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert_eq!(lazy.message(), Some(5));
    }

    #[test]
    fn test_chain_feeds_successor_with_piped_message() {
        let lazy = Lazy::<i32>::new();
        lazy.pipe(None, Some(Pipe::map(|n| n * 2)), None);
        let successor = lazy.chain();
        let grandchild = successor.chain();
        lazy.signal().fail(21);
        assert!(successor.is_failed());
        assert_eq!(successor.message(), Some(42));
        assert_eq!(grandchild.message(), Some(42));
    }

    #[test]
    fn test_view_cannot_resolve() {
        let (signal, promised) = Lazy::<i32>::pair();
        for status in Status::TERMINAL {
            promised.signal().send(status, 1);
        }
        assert!(promised.is_pending());
        signal.abort(2);
        assert!(promised.is_abort());
    }

    #[test]
    fn test_settled_across_threads() {
        let (signal, promised) = Lazy::<i32>::pair();
        let task1 = thread::spawn(move || block_on(promised.settled()));
        let task2 = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signal.succeed(42);
        });
        task2.join().expect("The task2 thread has panicked");
        let outcome = task1.join().expect("The task1 thread has panicked");
        assert_eq!(outcome, Outcome::Success(Arc::new(42)));
    }

    #[test]
    fn test_progress_from_another_thread_is_not_lost() {
        init_tracing();
        let lazy = Lazy::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (entered, hook_running) = std::sync::mpsc::channel();
        lazy.progress(move |p| {
            let _ = entered.send(());
            thread::sleep(Duration::from_millis(80));
            sink.lock().unwrap().push(*p);
        });

        let first = lazy.signal();
        let task1 = thread::spawn(move || first.notify(1));
        hook_running.recv().expect("The hook never ran");
        let second = lazy.signal();
        let task2 = thread::spawn(move || second.notify(2));

        task2.join().expect("The task2 thread has panicked");
        task1.join().expect("The task1 thread has panicked");
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
