//! The core primitive: a write-once deferred value with ordered
//! asynchronous continuations and recursive adoption of promise-valued
//! settlements.

use log::{debug, trace};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};
use std::task::Waker;

use crate::scheduler::{default_scheduler, Schedule};
use crate::thenable::{RejectFn, ResolveFn, Thenable};
use crate::waiter::Waiter;
use crate::SelfResolutionError;

/// A promise's lifecycle, `Pending` until it settles exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, State::Rejected(_))
    }
}

/// What a promise is being resolved with: one of ours, something
/// then-shaped, or a plain value, decided at the call site instead of by a
/// runtime shape probe.
pub enum Resolution<T, E> {
    /// A plain value; the promise fulfills with it directly.
    Value(T),
    /// Another promise of this crate; the resolved promise adopts its
    /// eventual state, however many levels deep the chain goes.
    Chain(Promise<T, E>),
    /// A foreign future-like value; adopted through its [`Thenable`]
    /// capability.
    Foreign(Box<dyn Thenable<T, E>>),
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Chain(promise) => f.debug_tuple("Chain").field(promise).finish(),
            Resolution::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Chain(promise)
    }
}

impl<T, E> From<Box<dyn Thenable<T, E>>> for Resolution<T, E> {
    fn from(thenable: Box<dyn Thenable<T, E>>) -> Self {
        Resolution::Foreign(thenable)
    }
}

/// Fulfillment handler for [`Promise::then`]. `Ok` feeds the returned
/// resolution into the derived promise (so returning a promise chains);
/// `Err` rejects the derived promise.
pub type OnFulfilled<T, E> = Box<dyn FnOnce(T) -> Result<Resolution<T, E>, E> + Send>;

/// Rejection handler for [`Promise::then`]. `Ok` *fulfills* the derived
/// promise: handling a rejection recovers from it.
pub type OnRejected<T, E> = Box<dyn FnOnce(E) -> Result<Resolution<T, E>, E> + Send>;

pub(crate) type Route<V> = Box<dyn FnOnce(V) + Send>;

/// One registered continuation: a branch per settlement direction. Only the
/// branch matching the settlement runs; the other is dropped.
pub(crate) struct Continuation<T, E> {
    on_fulfilled: Route<T>,
    on_rejected: Route<E>,
}

pub(crate) struct Inner<T, E> {
    pub(crate) state: State<T, E>,
    pub(crate) continuations: Vec<Continuation<T, E>>,
    pub(crate) wakers: Vec<Waker>,
    /// Live settle capabilities: `Producer` handles plus the adoption and
    /// `then` routes that captured one.
    pub(crate) producers: usize,
    /// Set when the last capability for a still-pending promise is dropped.
    /// An abandoned promise can never settle.
    pub(crate) abandoned: bool,
}

/// A handle to a deferred value.
///
/// Handles are cheap clones sharing one interior; settlement is write-once
/// no matter how many handles exist.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Resolution};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (promise, producer) = Promise::<String, String>::pending();
/// let worker = thread::spawn(move || {
///     producer.resolve(Resolution::Value("done".into())).unwrap();
/// });
/// assert_eq!(block_on(promise.waiter()), Ok("done".to_string()));
/// worker.join().unwrap();
/// ```
pub struct Promise<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    scheduler: Arc<dyn Schedule>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Promise {
            inner: Arc::clone(&self.inner),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        let state = match inner.state {
            State::Pending if inner.abandoned => "Abandoned",
            State::Pending => "Pending",
            State::Fulfilled(_) => "Fulfilled",
            State::Rejected(_) => "Rejected",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

/// The fulfill/reject capability bound to one promise.
///
/// Clones share the same write-once interior: whichever settles first wins
/// and the rest become no-ops. When the last clone of a pending promise's
/// producer is dropped, the promise is abandoned and its waiters report
/// [`WaitError::ProducerDropped`](crate::WaitError::ProducerDropped).
pub struct Producer<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    scheduler: Arc<dyn Schedule>,
}

impl<T, E> fmt::Debug for Producer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

impl<T, E> Clone for Producer<T, E> {
    fn clone(&self) -> Self {
        self.inner.lock().unwrap().producers += 1;
        Producer {
            inner: Arc::clone(&self.inner),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<T, E> Drop for Producer<T, E> {
    fn drop(&mut self) {
        let (continuations, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            inner.producers -= 1;
            if inner.producers > 0 || !inner.state.is_pending() || inner.abandoned {
                return;
            }
            inner.abandoned = true;
            (
                mem::take(&mut inner.continuations),
                mem::take(&mut inner.wakers),
            )
        };
        debug!("promise {:p} abandoned", Arc::as_ptr(&self.inner));
        // Dropping the continuations outside the lock releases their
        // captured producers, cascading abandonment to derived promises.
        drop(continuations);
        for waker in wakers {
            waker.wake();
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Builds a promise and runs `init` with its settle capability before
    /// returning. The initializer may settle synchronously or hand the
    /// producer to another thread.
    ///
    /// A panicking initializer is not caught; the panic propagates to the
    /// caller and the promise is abandoned.
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce(Producer<T, E>),
    {
        Self::new_with(default_scheduler(), init)
    }

    /// [`Promise::new`] with an explicit deferred-execution service.
    pub fn new_with<F>(scheduler: Arc<dyn Schedule>, init: F) -> Self
    where
        F: FnOnce(Producer<T, E>),
    {
        let (promise, producer) = Self::pending_with(scheduler);
        init(producer);
        promise
    }

    /// A pending promise plus the capability that settles it.
    pub fn pending() -> (Self, Producer<T, E>) {
        Self::pending_with(default_scheduler())
    }

    pub fn pending_with(scheduler: Arc<dyn Schedule>) -> (Self, Producer<T, E>) {
        let inner = Arc::new(Mutex::new(Inner {
            state: State::Pending,
            continuations: Vec::new(),
            wakers: Vec::new(),
            producers: 1,
            abandoned: false,
        }));
        let promise = Promise {
            inner: Arc::clone(&inner),
            scheduler: Arc::clone(&scheduler),
        };
        (promise, Producer { inner, scheduler })
    }

    /// An already-fulfilled promise. Continuations registered on it still
    /// dispatch asynchronously.
    pub fn fulfilled(value: T) -> Self {
        Self::settled_with(default_scheduler(), State::Fulfilled(value))
    }

    pub fn fulfilled_with(scheduler: Arc<dyn Schedule>, value: T) -> Self {
        Self::settled_with(scheduler, State::Fulfilled(value))
    }

    /// An already-rejected promise.
    pub fn rejected(reason: E) -> Self {
        Self::settled_with(default_scheduler(), State::Rejected(reason))
    }

    pub fn rejected_with(scheduler: Arc<dyn Schedule>, reason: E) -> Self {
        Self::settled_with(scheduler, State::Rejected(reason))
    }

    fn settled_with(scheduler: Arc<dyn Schedule>, state: State<T, E>) -> Self {
        Promise {
            inner: Arc::new(Mutex::new(Inner {
                state,
                continuations: Vec::new(),
                wakers: Vec::new(),
                producers: 0,
                abandoned: false,
            })),
            scheduler,
        }
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> State<T, E> {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().unwrap().state.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.inner.lock().unwrap().state.is_fulfilled()
    }

    pub fn is_rejected(&self) -> bool {
        self.inner.lock().unwrap().state.is_rejected()
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// A [`std::future::Future`] over this promise's eventual outcome.
    pub fn waiter(&self) -> Waiter<T, E> {
        Waiter::new(Arc::clone(&self.inner))
    }

    /// Chains a derived promise off this one.
    ///
    /// Once this promise settles, the matching handler runs inside a task on
    /// the deferred-execution service, never inside the call that settled
    /// it, and never inside this call, even when the promise is already
    /// settled. The derived promise settles from the handler's result:
    ///
    /// - fulfilled, `on_fulfilled` present: `Ok(resolution)` resolves the
    ///   derived promise (a returned promise is adopted), `Err(e)` rejects
    ///   it;
    /// - fulfilled, no handler: the value passes through unchanged;
    /// - rejected, `on_rejected` present: `Ok` *fulfills* the derived
    ///   promise (recovery), `Err` rejects it;
    /// - rejected, no handler: the rejection propagates unchanged.
    pub fn then(
        &self,
        on_fulfilled: Option<OnFulfilled<T, E>>,
        on_rejected: Option<OnRejected<T, E>>,
    ) -> Promise<T, E> {
        let (derived, producer) = Promise::pending_with(Arc::clone(&self.scheduler));

        let fulfil_route: Route<T> = {
            let producer = producer.clone();
            let scheduler = Arc::clone(&self.scheduler);
            Box::new(move |value: T| {
                scheduler.schedule(Box::new(move || {
                    let settled = match on_fulfilled {
                        Some(handler) => handler(value),
                        None => Ok(Resolution::Value(value)),
                    };
                    match settled {
                        Ok(resolution) => {
                            if let Err(err) = producer.resolve(resolution) {
                                panic!("{err}");
                            }
                        }
                        Err(reason) => producer.reject(reason),
                    }
                }));
            })
        };

        let reject_route: Route<E> = {
            let scheduler = Arc::clone(&self.scheduler);
            Box::new(move |reason: E| {
                scheduler.schedule(Box::new(move || match on_rejected {
                    Some(handler) => match handler(reason) {
                        Ok(resolution) => {
                            if let Err(err) = producer.resolve(resolution) {
                                panic!("{err}");
                            }
                        }
                        Err(next) => producer.reject(next),
                    },
                    None => producer.reject(reason),
                }));
            })
        };

        self.subscribe(fulfil_route, reject_route);
        derived
    }

    /// Registers a raw continuation pair. Pending: queued in registration
    /// order. Settled: the matching branch runs immediately (it defers
    /// through the scheduler itself). Abandoned: both branches are dropped,
    /// which cascades abandonment into whatever they captured.
    pub(crate) fn subscribe(&self, on_fulfilled: Route<T>, on_rejected: Route<E>) {
        enum Ready<T, E> {
            Fulfilled(T),
            Rejected(E),
            Abandoned,
        }

        let ready = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            match &inner.state {
                State::Pending if !inner.abandoned => {
                    trace!("continuation queued on promise {:p}", Arc::as_ptr(&self.inner));
                    inner.continuations.push(Continuation {
                        on_fulfilled,
                        on_rejected,
                    });
                    return;
                }
                State::Pending => Ready::Abandoned,
                State::Fulfilled(value) => Ready::Fulfilled(value.clone()),
                State::Rejected(reason) => Ready::Rejected(reason.clone()),
            }
        };
        match ready {
            Ready::Fulfilled(value) => (on_fulfilled)(value),
            Ready::Rejected(reason) => (on_rejected)(reason),
            Ready::Abandoned => {}
        }
    }
}

impl<T, E> Producer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Another handle to the promise this producer settles.
    pub fn promise(&self) -> Promise<T, E> {
        Promise {
            inner: Arc::clone(&self.inner),
            scheduler: Arc::clone(&self.scheduler),
        }
    }

    /// The resolution procedure. Settles the promise according to the shape
    /// of `resolution`:
    ///
    /// - already settled: no-op;
    /// - [`Resolution::Chain`] of this very promise: returns
    ///   [`SelfResolutionError`] and the promise stays pending; a cycle is
    ///   a usage bug, not a settlement;
    /// - [`Resolution::Chain`] of another promise: adopts it, mirroring its
    ///   eventual state through the scheduler;
    /// - [`Resolution::Foreign`]: hands settle callbacks to the thenable; an
    ///   `Err` from the hand-over rejects the promise;
    /// - [`Resolution::Value`]: fulfills directly.
    pub fn resolve(&self, resolution: Resolution<T, E>) -> Result<(), SelfResolutionError> {
        if !self.inner.lock().unwrap().state.is_pending() {
            return Ok(());
        }
        match resolution {
            Resolution::Value(value) => {
                self.fulfill(value);
                Ok(())
            }
            Resolution::Chain(promise) => {
                if Arc::ptr_eq(&self.inner, &promise.inner) {
                    return Err(SelfResolutionError);
                }
                let on_fulfilled: Route<T> = {
                    let producer = self.clone();
                    let scheduler = Arc::clone(&self.scheduler);
                    Box::new(move |value: T| {
                        scheduler.schedule(Box::new(move || producer.fulfill(value)));
                    })
                };
                let on_rejected: Route<E> = {
                    let producer = self.clone();
                    let scheduler = Arc::clone(&self.scheduler);
                    Box::new(move |reason: E| {
                        scheduler.schedule(Box::new(move || producer.reject(reason)));
                    })
                };
                promise.subscribe(on_fulfilled, on_rejected);
                Ok(())
            }
            Resolution::Foreign(thenable) => {
                let resolve_cb: ResolveFn<T, E> = {
                    let producer = self.clone();
                    Box::new(move |resolution: Resolution<T, E>| {
                        if let Err(err) = producer.resolve(resolution) {
                            panic!("{err}");
                        }
                    })
                };
                let reject_cb: RejectFn<E> = {
                    let producer = self.clone();
                    Box::new(move |reason: E| producer.reject(reason))
                };
                // Only the capability hand-over is guarded; a panic inside
                // the thenable propagates to whoever resolved.
                if let Err(reason) = thenable.then(resolve_cb, reject_cb) {
                    self.reject(reason);
                }
                Ok(())
            }
        }
    }

    /// Rejects the promise. A no-op if it already settled.
    pub fn reject(&self, reason: E) {
        let Some((continuations, wakers)) = self.transition(State::Rejected(reason.clone()))
        else {
            return;
        };
        debug!("promise {:p} rejected", Arc::as_ptr(&self.inner));
        for continuation in continuations {
            (continuation.on_rejected)(reason.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    fn fulfill(&self, value: T) {
        let Some((continuations, wakers)) = self.transition(State::Fulfilled(value.clone()))
        else {
            return;
        };
        debug!("promise {:p} fulfilled", Arc::as_ptr(&self.inner));
        for continuation in continuations {
            (continuation.on_fulfilled)(value.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// The write-once transition. Returns the continuations and wakers to
    /// dispatch, which must happen outside the lock: routes and dropped
    /// branches reach into other promises' interiors.
    #[allow(clippy::type_complexity)]
    fn transition(&self, next: State<T, E>) -> Option<(Vec<Continuation<T, E>>, Vec<Waker>)> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.is_pending() {
            return None;
        }
        inner.state = next;
        Some((
            mem::take(&mut inner.continuations),
            mem::take(&mut inner.wakers),
        ))
    }
}
