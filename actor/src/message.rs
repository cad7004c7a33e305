// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Message envelope
//!
//! A [`Message`] carries a body together with its sender, its destination and
//! a correlation key. Messages are values: every transformation consumes or
//! borrows the original and returns a new message.
//!
//! Bodies travel through mailboxes type-erased as [`AnyBody`]; the runner
//! recovers the concrete type with [`Message::downcast`]. Actors accepting
//! several body types can take [`AnyBody`] themselves and select a handler with
//! [`Message::dispatch`].
//!

use crate::{ActorAddress, CorrelationKey};

use serde::{Deserialize, Serialize};

use std::any::{Any, TypeId};

/// Type-erased message body.
pub type AnyBody = Box<dyn Any + Send>;

/// Immutable request/reply carrier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message<T> {
    sender: ActorAddress,
    destination: ActorAddress,
    correlation_key: CorrelationKey,
    body: T,
}

impl<T> Message<T> {
    /// Message from the dead letter to `destination`, uncorrelated.
    pub fn create_for(destination: ActorAddress, body: T) -> Self {
        Self::create_from(ActorAddress::dead_letter(), destination, body)
    }

    /// Message from `sender` to `destination`, uncorrelated.
    pub fn create_from(
        sender: ActorAddress,
        destination: ActorAddress,
        body: T,
    ) -> Self {
        Self {
            sender,
            destination,
            correlation_key: CorrelationKey::UNCORRELATED,
            body,
        }
    }

    pub fn sender(&self) -> &ActorAddress {
        &self.sender
    }

    pub fn destination(&self) -> &ActorAddress {
        &self.destination
    }

    pub fn correlation_key(&self) -> &CorrelationKey {
        &self.correlation_key
    }

    pub fn body(&self) -> &T {
        &self.body
    }

    pub fn into_body(self) -> T {
        self.body
    }

    /// Sets the correlation key unless the message is already correlated.
    /// The first key written wins.
    pub fn correlate_by(mut self, key: CorrelationKey) -> Self {
        if !self.correlation_key.is_represent_correlated() {
            self.correlation_key = key;
        }
        self
    }

    pub fn with_sender(mut self, sender: ActorAddress) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_destination(mut self, destination: ActorAddress) -> Self {
        self.destination = destination;
        self
    }

    /// Transforms the body, keeping addresses and correlation key.
    pub fn map<U, F>(self, f: F) -> Message<U>
    where
        F: FnOnce(T) -> U,
    {
        Message {
            sender: self.sender,
            destination: self.destination,
            correlation_key: self.correlation_key,
            body: f(self.body),
        }
    }

    /// Reply to the sender of this message: addresses are swapped and the
    /// correlation key is kept.
    pub fn reply_with<U>(&self, body: U) -> Message<U> {
        self.reply_to(self.sender.clone(), body)
    }

    /// Reply sent on behalf of this message's destination to another address,
    /// keeping the correlation key.
    pub fn reply_to<U>(&self, destination: ActorAddress, body: U) -> Message<U> {
        Message {
            sender: self.destination.clone(),
            destination,
            correlation_key: self.correlation_key.clone(),
            body,
        }
    }

    /// Body-less copy of the message.
    pub fn envelope(&self) -> Message<()> {
        Message {
            sender: self.sender.clone(),
            destination: self.destination.clone(),
            correlation_key: self.correlation_key.clone(),
            body: (),
        }
    }

    /// Splits the message into its envelope and its body.
    pub fn into_parts(self) -> (Message<()>, T) {
        let Message {
            sender,
            destination,
            correlation_key,
            body,
        } = self;
        (
            Message {
                sender,
                destination,
                correlation_key,
                body: (),
            },
            body,
        )
    }

    /// Calls `handler` with the message if `predicate` accepts its body.
    pub fn when_matched<P, H, R>(self, predicate: P, handler: H) -> Option<R>
    where
        P: FnOnce(&T) -> bool,
        H: FnOnce(Self) -> R,
    {
        if predicate(&self.body) {
            Some(handler(self))
        } else {
            None
        }
    }

    /// Calls exactly one of `handler` and `otherwise`.
    pub fn when_matched_or<P, H, O, R>(
        self,
        predicate: P,
        handler: H,
        otherwise: O,
    ) -> R
    where
        P: FnOnce(&T) -> bool,
        H: FnOnce(Self) -> R,
        O: FnOnce(Self) -> R,
    {
        if predicate(&self.body) {
            handler(self)
        } else {
            otherwise(self)
        }
    }
}

impl<T> Message<T>
where
    T: Any + Send,
{
    /// Erases the body type. A body that is already an [`AnyBody`] is kept as is.
    pub fn into_any(self) -> Message<AnyBody> {
        self.map(|body| {
            let boxed: AnyBody = Box::new(body);
            match boxed.downcast::<AnyBody>() {
                Ok(inner) => *inner,
                Err(boxed) => boxed,
            }
        })
    }
}

impl Message<AnyBody> {
    /// True if the body is a `U`. Every body is an [`AnyBody`].
    pub fn is<U: Any>(&self) -> bool {
        TypeId::of::<U>() == TypeId::of::<AnyBody>() || self.body.is::<U>()
    }

    /// Recovers the body type, giving the message back untouched on mismatch.
    /// Downcasting to [`AnyBody`] itself always succeeds.
    pub fn downcast<U: Any>(self) -> Result<Message<U>, Message<AnyBody>> {
        let message = if TypeId::of::<U>() == TypeId::of::<AnyBody>() {
            self.map(|body| Box::new(body) as AnyBody)
        } else {
            self
        };
        let Message {
            sender,
            destination,
            correlation_key,
            body,
        } = message;
        match body.downcast::<U>() {
            Ok(body) => Ok(Message {
                sender,
                destination,
                correlation_key,
                body: *body,
            }),
            Err(body) => Err(Message {
                sender,
                destination,
                correlation_key,
                body,
            }),
        }
    }

    /// Starts an ordered match over the body type.
    ///
    /// ```ignore
    /// let text = message
    ///     .dispatch()
    ///     .on::<String, _>(|m| m.into_body())
    ///     .on::<i64, _>(|m| m.body().to_string())
    ///     .otherwise(|_| "unknown".to_owned());
    /// ```
    pub fn dispatch<R>(self) -> BodyMatch<R> {
        BodyMatch(Arm::Pending(self))
    }
}

enum Arm<R> {
    Pending(Message<AnyBody>),
    Matched(R),
}

/// Ordered body matcher built by [`Message::dispatch`]. The first arm that
/// matches consumes the message; later arms are skipped.
#[must_use]
pub struct BodyMatch<R>(Arm<R>);

impl<R> BodyMatch<R> {
    /// Arm taken when the body is a `U`.
    pub fn on<U, F>(self, handler: F) -> Self
    where
        U: Any,
        F: FnOnce(Message<U>) -> R,
    {
        match self.0 {
            Arm::Pending(message) => match message.downcast::<U>() {
                Ok(message) => BodyMatch(Arm::Matched(handler(message))),
                Err(message) => BodyMatch(Arm::Pending(message)),
            },
            matched => BodyMatch(matched),
        }
    }

    /// Arm taken when `predicate` accepts the message.
    pub fn when<P, F>(self, predicate: P, handler: F) -> Self
    where
        P: FnOnce(&Message<AnyBody>) -> bool,
        F: FnOnce(Message<AnyBody>) -> R,
    {
        match self.0 {
            Arm::Pending(message) => {
                if predicate(&message) {
                    BodyMatch(Arm::Matched(handler(message)))
                } else {
                    BodyMatch(Arm::Pending(message))
                }
            }
            matched => BodyMatch(matched),
        }
    }

    /// Fallthrough for a message no arm matched.
    pub fn otherwise<F>(self, handler: F) -> R
    where
        F: FnOnce(Message<AnyBody>) -> R,
    {
        match self.0 {
            Arm::Pending(message) => handler(message),
            Arm::Matched(result) => result,
        }
    }

    /// Result of the matching arm, or the unmatched message.
    pub fn matched(self) -> Result<R, Message<AnyBody>> {
        match self.0 {
            Arm::Pending(message) => Err(message),
            Arm::Matched(result) => Ok(result),
        }
    }
}
