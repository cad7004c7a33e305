// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor runtime
//!
//! An in-process actor runtime. Actors are values implementing [`Actor`],
//! registered by name in an [`ActorSystem`] and reachable only through their
//! [`ActorAddress`]. Every actor owns a FIFO mailbox; the system processes it
//! one letter at a time through a pluggable [`Dispatcher`], so behavior code is
//! single-threaded even when distinct actors run in parallel.
//!
//! ## Overview
//!
//! - Addressing: [`ActorName`] is a validated dot-separated name, and
//!   [`ActorAddress`] its canonical `urn:actor:<name>` form. The reserved
//!   address [`DEAD_LETTER_URN`] receives every undeliverable message.
//! - Messages: a [`Message`] carries sender, destination, [`CorrelationKey`]
//!   and body. Replies built with [`Message::reply_with`] keep the correlation
//!   key and swap the addresses.
//! - Lifecycle: an actor is built by its factory, then runs `before_start`.
//!   A restart discards the instance and calls the factory again, between
//!   `before_restart` and `after_restart`. `after_stop` runs once at the end.
//! - Supervision: an error or panic escaping [`Actor::receive`] is handed to
//!   the actor's [`FaultResolver`], which resumes, restarts or stops it.
//! - Interactions: [`interaction::ask`] builds promise-based request/response
//!   on top of the runtime, and [`interaction::pubsub`] topics.
//!
//! ## Example
//!
//! ```ignore
//! use actor::{Actor, ActorContext, ActorSystem, Message};
//! use promise::Failure;
//!
//! struct Greeter;
//!
//! impl Actor for Greeter {
//!     type Body = String;
//!
//!     fn receive(
//!         &mut self,
//!         ctx: &ActorContext,
//!         message: Message<String>,
//!     ) -> Result<(), Failure> {
//!         ctx.tell(message.reply_with(format!("Hello, {}!", message.body())))?;
//!         Ok(())
//!     }
//! }
//!
//! let system = ActorSystem::new();
//! system.start()?;
//! let greeter = system.actor_of("GREETER", |_ctx: &ActorContext| Greeter)?;
//! let key = system.tell(Message::create_for(greeter, "world".to_owned()))?;
//! ```
//!

mod actor;
mod address;
mod correlation;
mod dispatcher;
mod error;
pub mod interaction;
mod mailbox;
mod message;
mod runner;
mod supervision;
mod system;

pub use actor::{Actor, ActorContext, ActorFactory, ActorLifecycle};
pub use address::{ActorAddress, ActorName, DEAD_LETTER_URN};
pub use correlation::{CorrelationKey, CorrelationKeyGenerator, InstanceKeyGenerator};
pub use dispatcher::{Dispatcher, SingleThreadDispatcher, ThreadPoolDispatcher, Worker};
pub use error::Error;
pub use message::{AnyBody, BodyMatch, Message};
pub use supervision::{FaultAction, FaultResolver};
pub use system::{ActorSystem, SystemBuilder};
