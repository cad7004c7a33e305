// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Interactions
//!
//! Collaborators built only on the public surface of the runtime:
//!
//! - [`ask`]: request/response bounded by a timeout, answered through a
//!   [`Promise`](promise::Promise).
//! - [`pubsub`]: topics whose publications are republished to every current
//!   subscriber.
//!

pub mod ask;
pub mod pubsub;

pub use ask::{Interactor, InteractorFactory};
pub use pubsub::{PubSub, Publisher, Subscription, Topic};
