// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Dispatchers
//!
//! A [`Worker`] is one unit of actor work: "process the next mailbox entry of
//! actor A". A [`Dispatcher`] decides when and where workers run. The actor
//! system never runs two workers of the same actor at once, whatever the
//! dispatcher, so a concurrent dispatcher only adds parallelism across actors.
//!

use crate::Error;

use tokio::runtime::Handle;
use tracing::{debug, error};

use std::{cell::RefCell, collections::VecDeque, fmt};

/// One unit of deferred actor work.
pub struct Worker(Box<dyn FnOnce() + Send + 'static>);

impl Worker {
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Worker(Box::new(work))
    }

    /// Runs the work on the current thread.
    pub fn execute(self) {
        (self.0)()
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Worker")
    }
}

/// Scheduling strategy for workers.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, worker: Worker);
}

thread_local! {
    /// Workers queued on this thread while another one is running.
    static PENDING: RefCell<Option<VecDeque<Worker>>> = const { RefCell::new(None) };
}

/// Clears the trampoline of the current thread, even if a worker unwinds.
struct Trampoline;

impl Drop for Trampoline {
    fn drop(&mut self) {
        PENDING.with(|pending| pending.borrow_mut().take());
    }
}

/// Runs workers synchronously on the dispatching thread.
///
/// Dispatching from inside a running worker does not recurse: the new worker is
/// queued and runs on the same thread as soon as the current one returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleThreadDispatcher;

impl Dispatcher for SingleThreadDispatcher {
    fn dispatch(&self, worker: Worker) {
        let nested = PENDING.with(|pending| {
            let mut pending = pending.borrow_mut();
            match pending.as_mut() {
                Some(queue) => {
                    queue.push_back(worker);
                    None
                }
                None => {
                    *pending = Some(VecDeque::new());
                    Some(worker)
                }
            }
        });
        let Some(first) = nested else {
            return;
        };

        let _trampoline = Trampoline;
        let mut next = Some(first);
        while let Some(worker) = next {
            worker.execute();
            next = PENDING.with(|pending| {
                pending.borrow_mut().as_mut().and_then(VecDeque::pop_front)
            });
        }
    }
}

/// Runs workers on the blocking pool of a tokio runtime.
#[derive(Clone, Debug)]
pub struct ThreadPoolDispatcher {
    handle: Handle,
}

impl ThreadPoolDispatcher {
    pub fn new(handle: Handle) -> Self {
        debug!("Creating thread pool dispatcher.");
        Self { handle }
    }

    /// Dispatcher on the runtime of the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Functional`] outside of a tokio runtime.
    pub fn current() -> Result<Self, Error> {
        Handle::try_current().map(Self::new).map_err(|e| {
            error!("Thread pool dispatcher needs a tokio runtime: {}", e);
            Error::Functional(e.to_string())
        })
    }
}

impl Dispatcher for ThreadPoolDispatcher {
    fn dispatch(&self, worker: Worker) {
        drop(self.handle.spawn_blocking(move || worker.execute()));
    }
}
