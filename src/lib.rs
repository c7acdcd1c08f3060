//! JavaScript-style chaining promises.
//!
//! A [`Promise`] is a write-once deferred value: it starts pending and
//! settles exactly once, fulfilled or rejected. Continuations registered
//! with [`Promise::then`] run asynchronously on a [`Schedule`]
//! implementation, in registration order, whether they were attached before
//! or after settlement. A settlement that is itself a promise, or any
//! foreign [`Thenable`], is adopted: the outer promise mirrors the
//! innermost settlement, however deep the chain.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{Promise, Resolution};
//! use futures::executor::block_on;
//!
//! let promise = Promise::<u32, String>::new(|producer| {
//!     producer.resolve(Resolution::Value(6)).unwrap();
//! });
//! let chained = promise.then(
//!     Some(Box::new(|v| Ok(Resolution::Value(v * 7)))),
//!     None,
//! );
//! assert_eq!(block_on(chained.waiter()), Ok(42));
//! ```

pub mod promise;
pub mod scheduler;
pub mod thenable;
pub mod waiter;

pub use crate::promise::{OnFulfilled, OnRejected, Producer, Promise, Resolution, State};
pub use crate::scheduler::{default_scheduler, Schedule, Task, ThreadScheduler};
pub use crate::thenable::{RejectFn, ResolveFn, Thenable};
pub use crate::waiter::Waiter;

use thiserror::Error;

/// Resolving a promise with itself would chain it to its own settlement, a
/// cycle that could never complete. The attempt is refused and the promise
/// is left pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a promise cannot be resolved with itself")]
pub struct SelfResolutionError;

/// Why a [`Waiter`] finished without a fulfillment value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError<E> {
    /// The promise settled by rejecting.
    #[error("promise rejected")]
    Rejected(E),
    /// Every producer was dropped while the promise was still pending, so
    /// it can never settle.
    #[error("producer dropped before the promise settled")]
    ProducerDropped,
}
