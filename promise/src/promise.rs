// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Promise and deferred
//!
//! A [`Promise`] is the consumer side of a single-assignment settlement cell, a
//! [`Deferred`] is its producer side. Exactly one of [`Deferred::resolve`] and
//! [`Deferred::reject`] succeeds for a given cell; every other attempt fails with
//! the duplicate error matching the attempted verb and never reaches a handler.
//!
//! Handlers may be registered before or after settlement:
//!
//! - success handlers ([`Promise::then`]) all fire once on resolution;
//! - error handlers ([`Promise::error`], [`Promise::error_of`]) form an ordered
//!   chain and the rejection goes to the first one that matches it;
//! - finalizers ([`Promise::finalize`]) all fire once whatever the outcome.
//!
//! Handlers registered while the promise is pending run on the thread that
//! settles it. Handlers registered later run immediately on the registering
//! thread.
//!

use crate::{
    Error, Failure,
    error::panic_message,
    runner::{DeferredRunner, SyncRunner, ThreadRunner},
    timer::Timeout,
};

use futures::channel::oneshot;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use std::{
    error::Error as StdError,
    fmt,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::{Duration, Instant},
};

/// Settled value of a promise.
pub type Outcome<T> = Result<T, Failure>;

/// Handler invocation prepared under the lock and run outside of it.
type Reaction = Box<dyn FnOnce() + Send + 'static>;

enum Handler<T> {
    Then(Box<dyn FnOnce(T) + Send + 'static>),
    Error {
        matches: Box<dyn Fn(&Failure) -> bool + Send + 'static>,
        handle: Box<dyn FnOnce(Failure) + Send + 'static>,
    },
    Finalize(Box<dyn FnOnce() + Send + 'static>),
    /// Sees every outcome and never consumes the rejection.
    Observe(Box<dyn FnOnce(Outcome<T>) + Send + 'static>),
}

struct State<T> {
    outcome: Option<Outcome<T>>,
    handlers: Vec<Handler<T>>,
    rejection_handled: bool,
}

struct Settlement<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

impl<T> Settlement<T>
where
    T: Clone + Send + 'static,
{
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                outcome: None,
                handlers: Vec::new(),
                rejection_handled: false,
            }),
            settled: Condvar::new(),
        }
    }

    /// Check-and-set of the outcome. Gives the outcome back if the cell was
    /// already settled.
    fn settle(&self, outcome: Outcome<T>) -> Result<(), Outcome<T>> {
        let reactions = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.outcome.is_some() {
                return Err(outcome);
            }
            let handlers = std::mem::take(&mut state.handlers);
            let reactions: Vec<Reaction> = handlers
                .into_iter()
                .filter_map(|handler| {
                    react(handler, &outcome, &mut state.rejection_handled)
                })
                .collect();
            state.outcome = Some(outcome);
            reactions
        };
        self.settled.notify_all();
        run_reactions(reactions);
        Ok(())
    }

    fn register(&self, handler: Handler<T>) {
        let reaction = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match &state.outcome {
                None => {
                    state.handlers.push(handler);
                    None
                }
                Some(outcome) => {
                    react(handler, outcome, &mut state.rejection_handled)
                }
            }
        };
        if let Some(reaction) = reaction {
            run_reactions(vec![reaction]);
        }
    }

    fn is_settled(&self) -> bool {
        self.state.lock().outcome.is_some()
    }
}

/// Decides whether `handler` fires for `outcome`.
fn react<T>(
    handler: Handler<T>,
    outcome: &Outcome<T>,
    rejection_handled: &mut bool,
) -> Option<Reaction>
where
    T: Clone + Send + 'static,
{
    match (handler, outcome) {
        (Handler::Then(then), Ok(value)) => {
            let value = value.clone();
            Some(Box::new(move || then(value)))
        }
        (Handler::Error { matches, handle }, Err(failure)) => {
            if *rejection_handled || !matches(failure) {
                return None;
            }
            *rejection_handled = true;
            let failure = failure.clone();
            Some(Box::new(move || handle(failure)))
        }
        (Handler::Finalize(finalize), _) => Some(finalize),
        (Handler::Observe(observe), outcome) => {
            let outcome = outcome.clone();
            Some(Box::new(move || observe(outcome)))
        }
        _ => None,
    }
}

fn run_reactions(reactions: Vec<Reaction>) {
    for reaction in reactions {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(reaction)) {
            error!(
                "Promise handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Runs a deferred function, turning a returned error or a panic into an
/// implicit rejection.
fn run_deferred<T, F>(function: F, deferred: Deferred<T>)
where
    T: Clone + Send + 'static,
    F: FnOnce(Deferred<T>) -> Result<(), Failure>,
{
    let producer = deferred.clone();
    let failure = match catch_unwind(AssertUnwindSafe(move || function(producer))) {
        Ok(Ok(())) => return,
        Ok(Err(failure)) => failure,
        Err(payload) => Failure::from_panic(payload),
    };
    debug!("Deferred function failed: {}", failure);
    if deferred.reject(failure.clone()).is_err() {
        warn!(
            "Deferred function failed after its promise was settled: {}",
            failure
        );
    }
}

/// Producer side of a promise.
pub struct Deferred<T> {
    cell: Arc<Settlement<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + 'static,
{
    /// Settles the promise with a value.
    ///
    /// # Errors
    ///
    /// [`Error::ResolutionDuplicate`] if the promise is already settled.
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        self.cell
            .settle(Ok(value))
            .map_err(|_| Error::ResolutionDuplicate)
    }

    /// Settles the promise with an error.
    ///
    /// # Errors
    ///
    /// [`Error::RejectionDuplicate`] if the promise is already settled.
    pub fn reject(&self, error: impl Into<Failure>) -> Result<(), Error> {
        self.cell
            .settle(Err(error.into()))
            .map_err(|_| Error::RejectionDuplicate)
    }

    pub fn is_settled(&self) -> bool {
        self.cell.is_settled()
    }

    /// Consumer side of the same cell.
    pub fn promise(&self) -> Promise<T> {
        Promise {
            cell: self.cell.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

/// Consumer side of a single-assignment future value.
pub struct Promise<T> {
    cell: Arc<Settlement<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an unsettled promise together with its producer.
    pub fn pending() -> (Promise<T>, Deferred<T>) {
        let cell = Arc::new(Settlement::new());
        (
            Promise { cell: cell.clone() },
            Deferred { cell },
        )
    }

    /// Runs `function` on the calling thread and returns the promise it settles.
    pub fn of<F>(function: F) -> Self
    where
        F: FnOnce(Deferred<T>) -> Result<(), Failure> + Send + 'static,
    {
        Self::run_with(&SyncRunner, function)
    }

    /// Runs `function` on a dedicated background thread.
    pub fn spawn<F>(function: F) -> Self
    where
        F: FnOnce(Deferred<T>) -> Result<(), Failure> + Send + 'static,
    {
        Self::run_with(&ThreadRunner, function)
    }

    /// Runs `function` through the given runner.
    ///
    /// An error returned by the function, or a panic raised by it, rejects the
    /// promise unless it was settled already. A runner unable to start the
    /// function rejects it with [`Error::NotStarted`].
    pub fn run_with<R, F>(runner: &R, function: F) -> Self
    where
        R: DeferredRunner + ?Sized,
        F: FnOnce(Deferred<T>) -> Result<(), Failure> + Send + 'static,
    {
        let (promise, deferred) = Self::pending();
        let producer = deferred.clone();
        if let Err(e) =
            runner.execute(Box::new(move || run_deferred(function, producer)))
        {
            warn!("Deferred function not started: {}", e);
            let _ = deferred.reject(e);
        }
        promise
    }

    pub fn resolved_by(value: T) -> Self {
        let (promise, deferred) = Self::pending();
        let _ = deferred.resolve(value);
        promise
    }

    pub fn rejected_by(error: impl Into<Failure>) -> Self {
        let (promise, deferred) = Self::pending();
        let _ = deferred.reject(error);
        promise
    }

    /// Registers a success handler.
    pub fn then<F>(self, handler: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.cell.register(Handler::Then(Box::new(handler)));
        self
    }

    /// Registers a catch-all error handler.
    pub fn error<F>(self, handler: F) -> Self
    where
        F: FnOnce(Failure) + Send + 'static,
    {
        self.cell.register(Handler::Error {
            matches: Box::new(|_| true),
            handle: Box::new(handler),
        });
        self
    }

    /// Registers an error handler that only takes rejections caused by `E`.
    /// Any other rejection is left for the handlers registered after it.
    pub fn error_of<E, F>(self, handler: F) -> Self
    where
        E: StdError + Send + Sync + 'static,
        F: FnOnce(&E) + Send + 'static,
    {
        self.cell.register(Handler::Error {
            matches: Box::new(|failure| failure.is::<E>()),
            handle: Box::new(move |failure| {
                if let Some(error) = failure.downcast_ref::<E>() {
                    handler(error);
                }
            }),
        });
        self
    }

    /// Registers a handler invoked once whatever the outcome.
    pub fn finalize<F>(self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cell.register(Handler::Finalize(Box::new(handler)));
        self
    }

    /// Builds a dependent promise.
    ///
    /// `function` runs on the thread that resolves this promise and receives the
    /// resolved value. If this promise is rejected, `function` is never called and
    /// the derived promise is rejected with the very same failure.
    pub fn chain<U, F>(self, function: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T, Deferred<U>) -> Result<(), Failure> + Send + 'static,
    {
        let (derived, deferred) = Promise::<U>::pending();
        self.cell
            .register(Handler::Observe(Box::new(move |outcome| match outcome {
                Ok(value) => {
                    run_deferred(move |next| function(value, next), deferred)
                }
                Err(failure) => {
                    let _ = deferred.reject(failure);
                }
            })));
        derived
    }

    pub fn is_settled(&self) -> bool {
        self.cell.is_settled()
    }

    /// Blocks until the promise settles or `timeout` elapses.
    ///
    /// Must not be called from actor behavior code: it would hold the thread a
    /// dispatcher needs to run other workers.
    ///
    /// # Errors
    ///
    /// The rejection's failure, or an [`Error::Timeout`] failure if nothing
    /// settled the promise in time.
    pub fn get(&self, timeout: Duration) -> Result<T, Failure> {
        let mut state = self.cell.state.lock();
        if state.outcome.is_none() {
            match Instant::now().checked_add(timeout) {
                Some(deadline) => {
                    while state.outcome.is_none() {
                        if self.cell.settled.wait_until(&mut state, deadline).timed_out() {
                            break;
                        }
                    }
                }
                // Too far to represent: no deadline.
                None => {
                    while state.outcome.is_none() {
                        self.cell.settled.wait(&mut state);
                    }
                }
            }
        }
        match &state.outcome {
            Some(outcome) => outcome.clone(),
            None => Err(Error::Timeout(Timeout::from(timeout)).into()),
        }
    }

    /// Bridges the promise into async code.
    pub fn into_future(self) -> impl Future<Output = Outcome<T>> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        self.cell.register(Handler::Observe(Box::new(move |outcome| {
            let _ = sender.send(outcome);
        })));
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(Error::Abandoned.into()))
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.state.lock();
        let status = match &state.outcome {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("Promise").field("status", &status).finish()
    }
}
