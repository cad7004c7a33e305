// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!
//! Protocol errors of the promise engine and the [`Failure`] value that every
//! rejection carries.
//!

use crate::timer::Timeout;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::{any::Any, error::Error as StdError, fmt, sync::Arc};

/// Error type for the promise engine.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// `resolve` was called on an already settled promise.
    #[error("The promise has already been settled, it can not be resolved again.")]
    ResolutionDuplicate,
    /// `reject` was called on an already settled promise.
    #[error("The promise has already been settled, it can not be rejected again.")]
    RejectionDuplicate,
    /// Waiting time elapsed before a result became available.
    #[error("The response waiting time is over. Timeout is {0}.")]
    Timeout(Timeout),
    /// The deferred code panicked.
    #[error("Deferred code panicked: {0}")]
    Panicked(String),
    /// The runner could not start the deferred function.
    #[error("The deferred function could not be started: {0}")]
    NotStarted(String),
    /// No tokio runtime is reachable from the current thread.
    #[error("There is no tokio runtime available: {0}")]
    NoRuntime(String),
    /// Every producer was dropped before the promise settled.
    #[error("The promise was abandoned before being settled.")]
    Abandoned,
}

/// Shared, cheaply clonable cause of a rejection.
///
/// Any `std::error::Error + Send + Sync` converts into a `Failure`, so the `?`
/// operator works inside deferred functions and actor behavior. Clones share
/// the same underlying error, which makes "rejects with the identical error"
/// checkable with [`Failure::ptr_eq`].
///
/// `Failure` does not implement `std::error::Error` itself, otherwise the
/// blanket `From` conversion would overlap with `From<T> for T`.
#[derive(Clone)]
pub struct Failure(Arc<dyn StdError + Send + Sync + 'static>);

impl Failure {
    /// Wraps an error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Failure(Arc::new(error))
    }

    /// Creates a failure from a plain text message.
    pub fn msg(message: impl Into<String>) -> Self {
        Failure::new(Message(message.into()))
    }

    /// Creates a failure from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Failure::new(Error::Panicked(panic_message(payload.as_ref())))
    }

    /// True if the underlying error is of type `E`.
    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.0.is::<E>()
    }

    /// Returns the underlying error as `E`, if it is one.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// True if both failures share the very same underlying error.
    pub fn ptr_eq(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the underlying error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Failure::new(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

/// Text-only error behind [`Failure::msg`].
#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[derive(Debug, Error)]
    #[error("typed")]
    struct Typed;

    #[test]
    fn test_failure_downcast() {
        let failure = Failure::from(Typed);
        assert!(failure.is::<Typed>());
        assert!(failure.downcast_ref::<Error>().is_none());
        assert_eq!(failure.to_string(), "typed");
        assert!(failure.as_error().is::<Typed>());
        assert!(failure.as_error().source().is_none());
    }

    #[test]
    fn test_failure_identity() {
        let failure = Failure::msg("boom");
        let clone = failure.clone();
        assert!(failure.ptr_eq(&clone));
        assert!(!failure.ptr_eq(&Failure::msg("boom")));
    }

    #[test]
    fn test_panic_message() {
        let failure = Failure::from_panic(Box::new("exploded"));
        assert_eq!(
            failure.downcast_ref::<Error>(),
            Some(&Error::Panicked("exploded".to_owned()))
        );
    }
}
