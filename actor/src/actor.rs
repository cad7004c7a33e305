// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor
//!
//! Behavior of an actor is a value implementing [`Actor`], built by a factory
//! bound to an [`ActorContext`]. Restarting an actor discards the value and
//! calls the same factory again, so no in-memory state survives a restart.
//!

use crate::{
    ActorAddress, ActorName, ActorSystem, CorrelationKey, Error, FaultAction,
    FaultResolver, Message,
    message::AnyBody,
    system::SystemCore,
};

use promise::Failure;
use serde::{Deserialize, Serialize};

use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

/// Builds a fresh actor instance. Called at start and on every restart.
pub type ActorFactory<A> = Box<dyn Fn(&ActorContext) -> A + Send + 'static>;

/// Behavior of an actor.
///
/// Every hook runs on the actor's own worker, one at a time, so `&mut self`
/// never needs internal locking. Returning an error from [`Actor::receive`]
/// (or panicking in it) hands control to the actor's [`FaultResolver`].
///
/// ```ignore
/// use actor::{Actor, ActorContext, Message};
/// use promise::Failure;
///
/// struct Parser;
///
/// impl Actor for Parser {
///     type Body = String;
///
///     fn receive(
///         &mut self,
///         ctx: &ActorContext,
///         message: Message<String>,
///     ) -> Result<(), Failure> {
///         let value: i64 = message.body().parse()?;
///         ctx.tell(message.reply_with(value))?;
///         Ok(())
///     }
/// }
/// ```
pub trait Actor: Send + Sized + 'static {
    /// Type of the message bodies the actor accepts. Messages carrying another
    /// body type are routed to the dead letter. Use [`AnyBody`] to accept any
    /// body and select a handler with [`Message::dispatch`].
    type Body: Any + Send;

    /// Called once the instance is built, before the first message.
    /// An error terminates the actor.
    fn before_start(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        Ok(())
    }

    /// Handles one message.
    fn receive(
        &mut self,
        ctx: &ActorContext,
        message: Message<Self::Body>,
    ) -> Result<(), Failure>;

    /// Called on the instance about to be discarded by a restart.
    fn before_restart(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        Ok(())
    }

    /// Called on the fresh instance built by a restart.
    fn after_restart(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        Ok(())
    }

    /// Called once when the actor terminates.
    fn after_stop(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        Ok(())
    }

    /// Policy applied when `receive` fails. Stops the actor by default.
    fn fault_resolver(&self) -> Box<dyn FaultResolver> {
        Box::new(FaultAction::Stop)
    }
}

/// Lifecycle state of an actor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ActorLifecycle {
    /// Registered, the instance is not built yet.
    Created,
    /// Processing messages.
    Running,
    /// Swapping instances.
    Restarting,
    /// Terminal.
    Stopped,
}

/// Handle given to behavior code.
///
/// The context holds its system weakly: it never keeps a system alive on its
/// own, and every operation fails with [`Error::NotRunning`] once the system is
/// gone.
#[derive(Clone)]
pub struct ActorContext {
    address: ActorAddress,
    system: Weak<SystemCore>,
}

impl ActorContext {
    pub(crate) fn new(address: ActorAddress, system: Weak<SystemCore>) -> Self {
        Self { address, system }
    }

    /// Address of the actor owning this context.
    pub fn self_address(&self) -> &ActorAddress {
        &self.address
    }

    /// Handle to the actor system.
    pub fn system(&self) -> Result<ActorSystem, Error> {
        self.core().map(ActorSystem::from_core)
    }

    /// Sends a message to any address, including self.
    /// Returns the correlation key of the send.
    pub fn tell<T>(&self, message: Message<T>) -> Result<CorrelationKey, Error>
    where
        T: Any + Send,
    {
        self.core()?.tell(message.into_any())
    }

    /// Spawns a child registered as `<self name>.<name>`.
    pub fn actor_of<A, F>(&self, name: &str, factory: F) -> Result<ActorAddress, Error>
    where
        A: Actor,
        F: Fn(&ActorContext) -> A + Send + 'static,
    {
        let child = self.address.actor_name().derive_with(&ActorName::of(name)?);
        self.core()?.register(child, Box::new(factory))
    }

    /// Requests the termination of the actor at `address`.
    pub fn stop(&self, address: &ActorAddress) -> Result<(), Error> {
        self.core()?.stop(address)
    }

    /// Requests a restart of the actor at `address`.
    pub fn restart(&self, address: &ActorAddress) -> Result<(), Error> {
        self.core()?.restart(address)
    }

    pub(crate) fn forward_to_dead_letter(&self, message: Message<AnyBody>) {
        if let Ok(core) = self.core() {
            core.to_dead_letter(message);
        }
    }

    fn core(&self) -> Result<Arc<SystemCore>, Error> {
        self.system.upgrade().ok_or(Error::NotRunning)
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
