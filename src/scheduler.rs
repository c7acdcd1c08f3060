//! The deferred-execution service promises dispatch their continuations
//! through. The default implementation uses a multi-producer, single-consumer
//! channel feeding one worker thread, so tasks run after the submitting call
//! returns and in submission order.

use log::{debug, trace};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Accepts tasks and runs each exactly once, after the submitting call has
/// returned. Tasks submitted from the same synchronous context run in
/// submission order.
pub trait Schedule: Send + Sync {
    fn schedule(&self, task: Task);
}

/// The shipped [`Schedule`] implementation: a channel draining into a single
/// named worker thread. One consumer means global FIFO order.
///
/// Dropping the scheduler closes the channel; the worker finishes whatever
/// was already queued and exits.
#[derive(Debug)]
pub struct ThreadScheduler {
    sender: Sender<Task>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let (sender, receiver) = channel::<Task>();
        thread::Builder::new()
            .name("promise-scheduler".into())
            .spawn(move || {
                debug!("scheduler worker started");
                for task in receiver {
                    task();
                }
                debug!("scheduler worker exiting");
            })
            .expect("failed to spawn the scheduler worker");
        ThreadScheduler { sender }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule for ThreadScheduler {
    fn schedule(&self, task: Task) {
        trace!("task enqueued");
        // The worker only stops once every sender is gone, so a failed send
        // means a task panicked the worker out from under us.
        self.sender.send(task).expect("scheduler worker stopped");
    }
}

/// The process-wide scheduler backing the plain `Promise` constructors.
/// Created on first use and never torn down.
pub fn default_scheduler() -> Arc<dyn Schedule> {
    static DEFAULT: OnceLock<Arc<ThreadScheduler>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(ThreadScheduler::new()))
        .clone()
}
