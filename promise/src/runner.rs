// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Deferred function runners
//!
//! A runner decides where the function producing a promise value executes:
//! inline, on a dedicated thread, or on a pool.
//!

use crate::Error;

use tokio::runtime::Handle;

/// Unit of deferred work handed to a runner.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Strategy executing deferred functions.
pub trait DeferredRunner: Send + Sync {
    /// Runs (or schedules) the task.
    ///
    /// # Errors
    ///
    /// [`Error::NotStarted`] if the task could not be handed over. The task is
    /// dropped without running.
    fn execute(&self, task: DeferredTask) -> Result<(), Error>;
}

/// Runs the task synchronously on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncRunner;

impl DeferredRunner for SyncRunner {
    fn execute(&self, task: DeferredTask) -> Result<(), Error> {
        task();
        Ok(())
    }
}

/// Runs every task on its own, freshly spawned thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRunner;

impl DeferredRunner for ThreadRunner {
    fn execute(&self, task: DeferredTask) -> Result<(), Error> {
        std::thread::Builder::new()
            .name("deferred".to_owned())
            .spawn(task)
            .map(|_| ())
            .map_err(|e| Error::NotStarted(e.to_string()))
    }
}

/// Runs tasks on the blocking pool of a tokio runtime.
#[derive(Clone, Debug)]
pub struct PoolRunner {
    handle: Handle,
}

impl PoolRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Pool runner on the runtime of the current thread.
    pub fn current() -> Result<Self, Error> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::NoRuntime(e.to_string()))
    }
}

impl DeferredRunner for PoolRunner {
    fn execute(&self, task: DeferredTask) -> Result<(), Error> {
        // Detached: the promise is the only observer of the outcome.
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}
