//! Marshalling work onto the host's main context
//!
//! The search-path variable and host module loading belong to the thread that
//! created the queue. Installs may run anywhere; they post their finalize step
//! through a [`MainThreadHandle`] and block until the owning thread has run it.
//!
//! # Examples
//!
//! ```
//! use plugpm::main_thread::main_thread;
//! use std::thread;
//!
//! let (handle, queue) = main_thread();
//! let worker = thread::spawn(move || handle.execute(|| 40 + 2));
//!
//! // The owning thread drains tasks until every handle is gone
//! queue.run();
//! assert_eq!(worker.join().unwrap().unwrap(), 42);
//! ```

use crate::{Error, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, ThreadId};
use tracing::debug;

type Task = Box<dyn FnOnce() + Send>;

/// Create a queue owned by the calling thread, plus a handle to post into it
pub fn main_thread() -> (MainThreadHandle, MainThreadQueue) {
    let (tx, rx) = mpsc::channel();
    let owner = thread::current().id();
    (MainThreadHandle { owner, tx }, MainThreadQueue { owner, rx })
}

/// Posting side; cheap to clone and send to workers
#[derive(Clone)]
pub struct MainThreadHandle {
    owner: ThreadId,
    tx: Sender<Task>,
}

impl std::fmt::Debug for MainThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadHandle")
            .field("owner", &self.owner)
            .finish()
    }
}

impl MainThreadHandle {
    /// Whether the caller already is the owning thread
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Run `task` on the owning thread and wait for its result
    ///
    /// Called from the owning thread itself, the task runs inline; waiting on
    /// our own queue would never return.
    pub fn execute<F, R>(&self, task: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            return Ok(task());
        }

        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let wrapped: Task = Box::new(move || {
            let _ = done_tx.send(task());
        });

        self.tx
            .send(wrapped)
            .map_err(|_| Error::MainThreadUnavailable)?;
        debug!("Waiting for main context");
        done_rx.recv().map_err(|_| Error::MainThreadUnavailable)
    }
}

/// Consuming side; stays on the owning thread
pub struct MainThreadQueue {
    owner: ThreadId,
    rx: Receiver<Task>,
}

impl MainThreadQueue {
    /// Run every task that is already waiting, returning how many ran
    pub fn run_pending(&self) -> usize {
        self.assert_owner();
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Run tasks until every handle has been dropped
    pub fn run(self) {
        self.assert_owner();
        while let Ok(task) = self.rx.recv() {
            task();
        }
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "main-thread queue drained from a foreign thread"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_inline_on_owner() {
        let (handle, queue) = main_thread();
        assert!(handle.is_main_thread());
        assert_eq!(handle.execute(|| "inline").unwrap(), "inline");
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn test_worker_task_runs_on_owner() {
        let (handle, queue) = main_thread();
        let owner = thread::current().id();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        let worker = thread::spawn(move || {
            assert!(!handle.is_main_thread());
            handle.execute(move || {
                *seen_clone.lock().unwrap() = Some(thread::current().id());
                7
            })
        });

        queue.run();
        assert_eq!(worker.join().unwrap().unwrap(), 7);
        assert_eq!(*seen.lock().unwrap(), Some(owner));
    }

    #[test]
    fn test_dropped_queue_is_an_error() {
        let (handle, queue) = main_thread();
        drop(queue);
        let result = thread::spawn(move || handle.execute(|| ())).join().unwrap();
        assert!(matches!(result, Err(Error::MainThreadUnavailable)));
    }
}
