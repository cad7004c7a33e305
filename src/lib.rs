// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Core library for the Ensemble framework.
//! Re-exports the actor runtime and the promise engine it builds on, so an
//! application depends on a single crate.

pub use actor::{
    Actor, ActorAddress, ActorContext, ActorFactory, ActorLifecycle, ActorName,
    ActorSystem, AnyBody, BodyMatch, CorrelationKey, CorrelationKeyGenerator,
    DEAD_LETTER_URN, Dispatcher, Error as ActorError, FaultAction,
    FaultResolver, InstanceKeyGenerator, Message, SingleThreadDispatcher,
    SystemBuilder, ThreadPoolDispatcher, Worker,
    interaction::{
        Interactor, InteractorFactory, PubSub, Publisher, Subscription, Topic,
    },
};

pub use promise::{
    Deferred, DeferredRunner, DeferredTask, Error as PromiseError, Failure,
    Outcome, PoolRunner, Promise, SyncRunner, ThreadRunner, Timeout,
    TimeoutSupervisor, Timer,
};
