#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_chain::{
        Promise, RejectFn, Resolution, ResolveFn, Schedule, SelfResolutionError, State, Thenable,
        ThreadScheduler, WaitError,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn only_the_first_settlement_takes_effect() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        producer.resolve(Resolution::Value(1)).unwrap();
        producer.resolve(Resolution::Value(2)).unwrap();
        producer.reject("late");
        assert_eq!(promise.state(), State::Fulfilled(1));
    }

    #[test]
    fn self_resolution_is_fatal_and_leaves_the_promise_pending() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        let err = producer
            .resolve(Resolution::Chain(promise.clone()))
            .unwrap_err();
        assert_eq!(err, SelfResolutionError);
        assert!(promise.is_pending());
    }

    #[test]
    fn adoption_unwraps_arbitrarily_nested_promises() {
        let (a, pa) = Promise::<i32, &str>::pending();
        let (b, pb) = Promise::<i32, &str>::pending();
        let (c, pc) = Promise::<i32, &str>::pending();
        pa.resolve(Resolution::Chain(b)).unwrap();
        pb.resolve(Resolution::Chain(c)).unwrap();
        pc.resolve(Resolution::Value(42)).unwrap();
        assert_eq!(block_on(a.waiter()), Ok(42));
    }

    #[test]
    fn continuations_fire_in_registration_order() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        let (tx, rx) = mpsc::channel();
        for tag in ["first", "second", "third"] {
            let tx = tx.clone();
            promise.then(
                Some(Box::new(move |v| {
                    tx.send(tag).unwrap();
                    Ok(Resolution::Value(v))
                })),
                None,
            );
        }
        producer.resolve(Resolution::Value(0)).unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "first");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "second");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "third");
    }

    #[test]
    fn handlers_never_run_inside_then() {
        let scheduler = Arc::new(ThreadScheduler::new());
        let promise = Promise::<i32, &str>::fulfilled_with(scheduler.clone(), 5);

        // Hold the worker hostage so nothing scheduled by `then` can run
        // until the gate opens.
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        scheduler.schedule(Box::new(move || {
            gate_rx.recv().unwrap();
        }));

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let (done_tx, done_rx) = mpsc::channel();
        promise.then(
            Some(Box::new(move |v| {
                flag.store(true, Ordering::SeqCst);
                done_tx.send(v).unwrap();
                Ok(Resolution::Value(v))
            })),
            None,
        );
        assert!(!ran.load(Ordering::SeqCst));

        gate_tx.send(()).unwrap();
        assert_eq!(done_rx.recv_timeout(TIMEOUT).unwrap(), 5);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn a_handled_rejection_recovers_into_fulfillment() {
        let promise = Promise::<&str, &str>::rejected("e");
        let recovered = promise
            .then(None, Some(Box::new(|_| Ok(Resolution::Value("recovered")))))
            .then(Some(Box::new(|v| Ok(Resolution::Value(v)))), None);
        assert_eq!(block_on(recovered.waiter()), Ok("recovered"));
    }

    #[test]
    fn a_rejection_handler_does_not_intercept_fulfillment() {
        let promise = Promise::<i32, &str>::fulfilled(5);
        let chained = promise
            .then(None, Some(Box::new(|_| Ok(Resolution::Value(-1)))))
            .then(Some(Box::new(|v| Ok(Resolution::Value(v)))), None);
        assert_eq!(block_on(chained.waiter()), Ok(5));
    }

    #[test]
    fn an_unhandled_rejection_propagates_unchanged() {
        let promise = Promise::<i32, &str>::rejected("boom");
        let derived = promise
            .then(Some(Box::new(|v| Ok(Resolution::Value(v)))), None)
            .then(None, None);
        assert_eq!(
            block_on(derived.waiter()),
            Err(WaitError::Rejected("boom"))
        );
    }

    #[test]
    fn a_failing_handler_rejects_the_derived_promise() {
        let promise = Promise::<i32, &str>::fulfilled(1);
        let derived = promise.then(Some(Box::new(|_| Err("handler blew up"))), None);
        assert_eq!(
            block_on(derived.waiter()),
            Err(WaitError::Rejected("handler blew up"))
        );
    }

    #[test]
    fn a_handler_returned_promise_is_adopted() {
        let promise = Promise::<i32, &str>::fulfilled(1);
        let derived = promise.then(
            Some(Box::new(|v| {
                let inner = Promise::new(move |p| {
                    p.resolve(Resolution::Value(v + 10)).unwrap();
                });
                Ok(inner.into())
            })),
            None,
        );
        assert_eq!(block_on(derived.waiter()), Ok(11));
    }

    #[test]
    fn a_delayed_rejection_reaches_the_rejection_handler() {
        let promise = Promise::<&str, &str>::new(|producer| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                producer.reject("boom");
            });
        });
        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();
        promise.then(
            Some(Box::new(move |v| {
                tx.send(("value", v)).unwrap();
                Ok(Resolution::Value(v))
            })),
            Some(Box::new(move |e| {
                err_tx.send(("error", e)).unwrap();
                Ok(Resolution::Value(e))
            })),
        );
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("error", "boom"));
    }

    #[test]
    fn an_initializer_may_resolve_with_a_nested_promise() {
        let promise = Promise::<i32, &str>::new(|outer| {
            let inner = Promise::new(|p| {
                p.resolve(Resolution::Value(7)).unwrap();
            });
            outer.resolve(Resolution::Chain(inner)).unwrap();
        });
        assert_eq!(block_on(promise.waiter()), Ok(7));
    }

    struct Immediate(i32);

    impl Thenable<i32, &'static str> for Immediate {
        fn then(
            self: Box<Self>,
            resolve: ResolveFn<i32, &'static str>,
            _reject: RejectFn<&'static str>,
        ) -> Result<(), &'static str> {
            resolve(Resolution::Value(self.0));
            Ok(())
        }
    }

    #[test]
    fn a_foreign_thenable_is_adopted() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        producer
            .resolve(Resolution::Foreign(Box::new(Immediate(9))))
            .unwrap();
        assert_eq!(block_on(promise.waiter()), Ok(9));
    }

    struct NoCapability;

    impl Thenable<i32, &'static str> for NoCapability {
        fn then(
            self: Box<Self>,
            _resolve: ResolveFn<i32, &'static str>,
            _reject: RejectFn<&'static str>,
        ) -> Result<(), &'static str> {
            Err("no capability")
        }
    }

    #[test]
    fn a_thenable_that_cannot_hand_over_rejects_the_adopter() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        producer
            .resolve(Resolution::Foreign(Box::new(NoCapability)))
            .unwrap();
        assert_eq!(
            block_on(promise.waiter()),
            Err(WaitError::Rejected("no capability"))
        );
    }

    struct Rechain(Promise<i32, &'static str>);

    impl Thenable<i32, &'static str> for Rechain {
        fn then(
            self: Box<Self>,
            resolve: ResolveFn<i32, &'static str>,
            _reject: RejectFn<&'static str>,
        ) -> Result<(), &'static str> {
            resolve(Resolution::Chain(self.0));
            Ok(())
        }
    }

    #[test]
    fn a_thenable_may_itself_resolve_with_a_promise() {
        let inner = Promise::<i32, &str>::fulfilled(21);
        let (promise, producer) = Promise::<i32, &str>::pending();
        producer
            .resolve(Resolution::Foreign(Box::new(Rechain(inner))))
            .unwrap();
        assert_eq!(block_on(promise.waiter()), Ok(21));
    }

    #[test]
    fn dropping_the_last_producer_fails_waiters() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        drop(producer);
        assert_eq!(
            block_on(promise.waiter()),
            Err(WaitError::ProducerDropped)
        );
    }

    #[test]
    fn abandonment_cascades_through_then() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        let derived = promise.then(None, None);
        drop(producer);
        assert_eq!(
            block_on(derived.waiter()),
            Err(WaitError::ProducerDropped)
        );
    }

    #[test]
    fn then_on_an_abandoned_promise_abandons_the_derived_promise() {
        let (promise, producer) = Promise::<i32, &str>::pending();
        drop(producer);
        let derived = promise.then(Some(Box::new(|v| Ok(Resolution::Value(v)))), None);
        assert_eq!(
            block_on(derived.waiter()),
            Err(WaitError::ProducerDropped)
        );
    }

    #[test]
    fn continuations_registered_after_settlement_still_run() {
        let promise = Promise::<i32, &str>::fulfilled(8);
        let (tx, rx) = mpsc::channel();
        promise.then(
            Some(Box::new(move |v| {
                tx.send(v).unwrap();
                Ok(Resolution::Value(v))
            })),
            None,
        );
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 8);
    }
}
