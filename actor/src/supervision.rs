// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Fault supervision
//!
//! When `receive` fails, the runner asks the actor's [`FaultResolver`] what to
//! do with it. A resolver is a function from the failure to a [`FaultAction`];
//! composing policies is ordinary function composition:
//!
//! ```ignore
//! fn fault_resolver(&self) -> Box<dyn FaultResolver> {
//!     let monitor = self.monitor.clone();
//!     Box::new(move |ctx: &ActorContext, message: &Message<()>, failure: &Failure| {
//!         let _ = ctx.tell(Message::create_from(
//!             ctx.self_address().clone(),
//!             monitor.clone(),
//!             failure.to_string(),
//!         ));
//!         FaultAction::Restart.resolve_fault(ctx, message, failure)
//!     })
//! }
//! ```
//!

use crate::{ActorContext, Message};

use promise::Failure;
use serde::{Deserialize, Serialize};

/// Fate of an actor whose behavior failed.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub enum FaultAction {
    /// Keep the current instance; the failing message is dropped.
    Resume,
    /// Rebuild the instance from its factory.
    Restart,
    /// Terminate the actor.
    #[default]
    Stop,
}

/// Policy invoked on a failure escaping `receive`.
///
/// `message` is the envelope (addresses and correlation key) of the message
/// being processed when the failure happened.
pub trait FaultResolver: Send {
    fn resolve_fault(
        &self,
        ctx: &ActorContext,
        message: &Message<()>,
        failure: &Failure,
    ) -> FaultAction;
}

impl FaultResolver for FaultAction {
    fn resolve_fault(
        &self,
        _ctx: &ActorContext,
        _message: &Message<()>,
        _failure: &Failure,
    ) -> FaultAction {
        *self
    }
}

impl<F> FaultResolver for F
where
    F: Fn(&ActorContext, &Message<()>, &Failure) -> FaultAction + Send,
{
    fn resolve_fault(
        &self,
        ctx: &ActorContext,
        message: &Message<()>,
        failure: &Failure,
    ) -> FaultAction {
        self(ctx, message, failure)
    }
}
