//! Awaiting a promise's outcome as a [`std::future::Future`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use crate::promise::{Inner, State};
use crate::WaitError;

/// A future over a promise's eventual outcome.
///
/// Any number of waiters may observe one promise; each receives its own
/// clone of the payload. A waiter on a promise whose every producer was
/// dropped resolves to [`WaitError::ProducerDropped`].
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Resolution};
/// use futures::executor::block_on;
///
/// let promise = Promise::<i32, String>::new(|producer| {
///     producer.resolve(Resolution::Value(3)).unwrap();
/// });
/// assert_eq!(block_on(promise.waiter()), Ok(3));
/// ```
pub struct Waiter<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Waiter<T, E> {
    pub(crate) fn new(inner: Arc<Mutex<Inner<T, E>>>) -> Self {
        Waiter { inner }
    }
}

impl<T, E> Clone for Waiter<T, E> {
    fn clone(&self) -> Self {
        Waiter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Future for Waiter<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, WaitError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().unwrap();
        match &inner.state {
            State::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            State::Rejected(reason) => Poll::Ready(Err(WaitError::Rejected(reason.clone()))),
            State::Pending if inner.abandoned => Poll::Ready(Err(WaitError::ProducerDropped)),
            State::Pending => {
                // Park every poll's waker. Keeping only the latest loses
                // wakes when several tasks wait on one promise.
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
