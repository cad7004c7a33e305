// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Promises
//!
//! Single-assignment future values usable from plain threads and from actor
//! code alike.
//!
//! ## Overview
//!
//! A value is produced by a *deferred function*, a closure receiving the
//! [`Deferred`] half of a promise. The function settles the promise by resolving
//! it with a value or rejecting it with a [`Failure`]. If the function returns an
//! error or panics, the promise is rejected for it. Where the function runs is
//! decided by a [`DeferredRunner`]:
//!
//! - [`SyncRunner`] runs it inline on the calling thread ([`Promise::of`]);
//! - [`ThreadRunner`] gives it a dedicated thread ([`Promise::spawn`]);
//! - [`PoolRunner`] puts it on the blocking pool of a tokio runtime.
//!
//! ```ignore
//! use promise::{Failure, Promise};
//! use std::time::Duration;
//!
//! let length = Promise::of(|deferred| {
//!     deferred.resolve("100".to_owned())?;
//!     Ok(())
//! })
//! .chain(|text, deferred| {
//!     deferred.resolve(text.len())?;
//!     Ok(())
//! });
//! assert_eq!(length.get(Duration::from_secs(1)).unwrap(), 3);
//! ```
//!
//! ## Handlers
//!
//! Success handlers all fire, error handlers are tried in registration order
//! until one accepts the rejection, finalizers always fire. A handler that
//! panics is logged and does not prevent the rest from running.
//!
//! ## Timers
//!
//! [`Timer`] and [`TimeoutSupervisor`] provide the one-shot timeouts used by
//! request/response interactions.
//!

mod error;
mod promise;
mod runner;
mod timer;

pub use error::{Error, Failure};
pub use promise::{Deferred, Outcome, Promise};
pub use runner::{DeferredRunner, DeferredTask, PoolRunner, SyncRunner, ThreadRunner};
pub use timer::{Timeout, TimeoutSupervisor, Timer};
