//! Adoption of foreign future-like values.

use crate::promise::Resolution;

/// Routes a resolution back into the adopting promise. Passing another
/// promise (or another thenable) here restarts the resolution procedure, so
/// foreign values chain as deep as they like.
pub type ResolveFn<T, E> = Box<dyn FnOnce(Resolution<T, E>) + Send>;

/// Routes a rejection reason back into the adopting promise.
pub type RejectFn<E> = Box<dyn FnOnce(E) + Send>;

/// A value that is not a [`Promise`](crate::Promise) of this crate but still
/// knows how to deliver an eventual outcome. Resolving a promise with
/// `Resolution::Foreign` hands the promise's settle callbacks to the value,
/// which must invoke at most one of them, at most once.
///
/// Returning `Err` reports that the value could not hand over its capability
/// at all; the adopting promise rejects with that reason. Failures *inside*
/// a handed-over capability are the implementor's problem: a panicking
/// `then` propagates to whoever triggered the resolution.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, RejectFn, Resolution, ResolveFn, Thenable};
/// use futures::executor::block_on;
///
/// struct Ready(i32);
///
/// impl Thenable<i32, String> for Ready {
///     fn then(
///         self: Box<Self>,
///         resolve: ResolveFn<i32, String>,
///         _reject: RejectFn<String>,
///     ) -> Result<(), String> {
///         resolve(Resolution::Value(self.0));
///         Ok(())
///     }
/// }
///
/// let (promise, producer) = Promise::<i32, String>::pending();
/// producer
///     .resolve(Resolution::Foreign(Box::new(Ready(9))))
///     .unwrap();
/// assert_eq!(block_on(promise.waiter()), Ok(9));
/// ```
pub trait Thenable<T, E>: Send {
    fn then(self: Box<Self>, resolve: ResolveFn<T, E>, reject: RejectFn<E>) -> Result<(), E>;
}
