// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Ask pattern
//!
//! Every call spawns a one-shot `INTERACTION--<uuid>` actor. It forwards the
//! request to the target, arms a [`TimeoutSupervisor`], and settles the call's
//! promise with the correlated reply. A timeout arrives as an ordinary message
//! carrying a [`promise::Error::Timeout`] failure, so every failure mode ends
//! in the same rejection path: the actor's fault resolver.
//!
//! ```ignore
//! let factory = InteractorFactory::new(system.clone(), Timer::current()?);
//! let parser = factory.create_interactor::<String, i64>(target, Timeout::of_secs(10));
//! let value = parser.invoke("100".to_owned()).get(Duration::from_secs(11))?;
//! ```
//!

use crate::{
    Actor, ActorAddress, ActorContext, ActorSystem, CorrelationKey, Error,
    FaultAction, FaultResolver, Message, message::AnyBody,
};

use promise::{Deferred, Failure, Promise, Timeout, TimeoutSupervisor, Timer};
use tracing::{debug, warn};
use uuid::Uuid;

use std::{any::Any, fmt, marker::PhantomData};

/// Prefix of the names given to interaction actors.
const INTERACTION_PREFIX: &str = "INTERACTION--";

/// Builds interactors sharing a system and a timer.
#[derive(Clone, Debug)]
pub struct InteractorFactory {
    system: ActorSystem,
    timer: Timer,
}

impl InteractorFactory {
    pub fn new(system: ActorSystem, timer: Timer) -> Self {
        Self { system, timer }
    }

    /// Interactor sending `Q` requests to `target` and expecting `S` replies
    /// within `timeout`.
    pub fn create_interactor<Q, S>(
        &self,
        target: ActorAddress,
        timeout: Timeout,
    ) -> Interactor<Q, S>
    where
        Q: Any + Send,
        S: Any + Clone + Send,
    {
        Interactor {
            system: self.system.clone(),
            timer: self.timer.clone(),
            target,
            timeout,
            _types: PhantomData,
        }
    }
}

/// Typed request/response channel to one actor.
pub struct Interactor<Q, S> {
    system: ActorSystem,
    timer: Timer,
    target: ActorAddress,
    timeout: Timeout,
    _types: PhantomData<fn(Q) -> S>,
}

impl<Q, S> Clone for Interactor<Q, S> {
    fn clone(&self) -> Self {
        Self {
            system: self.system.clone(),
            timer: self.timer.clone(),
            target: self.target.clone(),
            timeout: self.timeout,
            _types: PhantomData,
        }
    }
}

impl<Q, S> fmt::Debug for Interactor<Q, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interactor")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<Q, S> Interactor<Q, S>
where
    Q: Any + Send,
    S: Any + Clone + Send,
{
    pub fn target(&self) -> &ActorAddress {
        &self.target
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Sends `request` and returns the promise of the reply.
    pub fn invoke(&self, request: Q) -> Promise<S> {
        self.invoke_any(Box::new(request))
    }

    /// Sends a request whose type is only known at runtime. A body that is not
    /// a `Q` rejects the promise with [`Error::WrongRequestType`].
    pub fn invoke_any(&self, request: AnyBody) -> Promise<S> {
        let system = self.system.clone();
        let timer = self.timer.clone();
        let target = self.target.clone();
        let timeout = self.timeout;
        Promise::of(move |deferred: Deferred<S>| {
            let name = format!("{}{}", INTERACTION_PREFIX, Uuid::new_v4());
            let interaction = system.actor_of(&name, move |_ctx: &ActorContext| {
                InteractionActor::<Q, S> {
                    target: target.clone(),
                    timer: timer.clone(),
                    timeout,
                    deferred: deferred.clone(),
                    stage: Stage::RequestWaiting,
                    _request: PhantomData,
                }
            })?;
            system.tell(Message::create_for(interaction, request))?;
            Ok(())
        })
    }
}

enum Stage {
    RequestWaiting,
    ResponseWaiting {
        key: CorrelationKey,
        supervisor: TimeoutSupervisor,
    },
    Completed,
}

/// One-shot actor correlating a request with its reply.
struct InteractionActor<Q, S> {
    target: ActorAddress,
    timer: Timer,
    timeout: Timeout,
    deferred: Deferred<S>,
    stage: Stage,
    _request: PhantomData<fn(Q)>,
}

impl<Q, S> InteractionActor<Q, S>
where
    Q: Any + Send,
    S: Any + Clone + Send,
{
    fn on_request(
        &mut self,
        ctx: &ActorContext,
        message: Message<AnyBody>,
    ) -> Result<(), Failure> {
        let request = message
            .downcast::<Q>()
            .map_err(|_| Error::wrong_request_type::<Q>())?;
        let key = ctx.tell(Message::create_from(
            ctx.self_address().clone(),
            self.target.clone(),
            request.into_body(),
        ))?;
        debug!(
            "Request {:?} forwarded from {} to {}.",
            key,
            ctx.self_address(),
            self.target
        );

        let notifier = ctx.clone();
        let timeout = self.timeout;
        let timeout_key = key.clone();
        let supervisor = self.timer.supervisor(timeout, move || {
            let notice = Message::create_for(
                notifier.self_address().clone(),
                Failure::new(promise::Error::Timeout(timeout)),
            )
            .correlate_by(timeout_key);
            if let Err(e) = notifier.tell(notice) {
                debug!("Timeout of {} not delivered: {}", notifier.self_address(), e);
            }
        });
        supervisor.start_supervision();
        self.stage = Stage::ResponseWaiting { key, supervisor };
        Ok(())
    }

    fn on_response(
        &mut self,
        ctx: &ActorContext,
        message: Message<AnyBody>,
        key: CorrelationKey,
        supervisor: TimeoutSupervisor,
    ) -> Result<(), Failure> {
        if message.correlation_key() != &key {
            warn!(
                "Interaction {} ignores uncorrelated message {:?} from {}.",
                ctx.self_address(),
                message.correlation_key(),
                message.sender()
            );
            self.stage = Stage::ResponseWaiting { key, supervisor };
            return Ok(());
        }
        supervisor.stop_supervision();
        let deferred = &self.deferred;
        message
            .dispatch::<Result<(), Failure>>()
            .on::<Failure, _>(|failure| Err(failure.into_body()))
            .on::<S, _>(|reply| {
                deferred.resolve(reply.into_body())?;
                ctx.stop(ctx.self_address())?;
                Ok(())
            })
            .otherwise(|_| Err(Error::wrong_response_type::<S>().into()))
    }
}

impl<Q, S> Actor for InteractionActor<Q, S>
where
    Q: Any + Send,
    S: Any + Clone + Send,
{
    type Body = AnyBody;

    fn receive(
        &mut self,
        ctx: &ActorContext,
        message: Message<AnyBody>,
    ) -> Result<(), Failure> {
        match std::mem::replace(&mut self.stage, Stage::Completed) {
            Stage::RequestWaiting => self.on_request(ctx, message),
            Stage::ResponseWaiting { key, supervisor } => {
                self.on_response(ctx, message, key, supervisor)
            }
            Stage::Completed => {
                debug!(
                    "Interaction {} is completed, message from {} is ignored.",
                    ctx.self_address(),
                    message.sender()
                );
                Ok(())
            }
        }
    }

    fn after_stop(&mut self, ctx: &ActorContext) -> Result<(), Failure> {
        if let Stage::ResponseWaiting { supervisor, .. } = &self.stage {
            supervisor.stop_supervision();
        }
        if !self.deferred.is_settled() {
            debug!("Interaction {} stopped before its reply.", ctx.self_address());
            let _ = self.deferred.reject(Error::NotRunning);
        }
        Ok(())
    }

    fn fault_resolver(&self) -> Box<dyn FaultResolver> {
        let deferred = self.deferred.clone();
        Box::new(
            move |ctx: &ActorContext, _message: &Message<()>, failure: &Failure| {
                if deferred.reject(failure.clone()).is_err() {
                    debug!(
                        "Interaction {} failed after settling: {}",
                        ctx.self_address(),
                        failure
                    );
                }
                FaultAction::Stop
            },
        )
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use crate::SingleThreadDispatcher;

    use std::time::Duration;

    /// Doubles numbers, answers text with its length.
    struct Doubler;

    impl Actor for Doubler {
        type Body = AnyBody;

        fn receive(
            &mut self,
            ctx: &ActorContext,
            message: Message<AnyBody>,
        ) -> Result<(), Failure> {
            let reply = message
                .dispatch()
                .on::<i64, _>(|m| m.reply_with(m.body() * 2).into_any())
                .on::<String, _>(|m| m.reply_with(m.body().len()).into_any())
                .otherwise(|m| m.reply_with(()).into_any());
            ctx.tell(reply)?;
            Ok(())
        }
    }

    fn fixture() -> (tokio::runtime::Runtime, ActorSystem, ActorAddress, InteractorFactory) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .unwrap();
        let system = ActorSystem::builder()
            .dispatcher(SingleThreadDispatcher)
            .build();
        system.start().unwrap();
        let doubler = system.actor_of("DOUBLER", |_ctx: &ActorContext| Doubler).unwrap();
        let factory =
            InteractorFactory::new(system.clone(), Timer::new(runtime.handle().clone()));
        (runtime, system, doubler, factory)
    }

    fn interactions(system: &ActorSystem) -> usize {
        system
            .addresses()
            .iter()
            .filter(|address| address.actor_name().as_str().starts_with(INTERACTION_PREFIX))
            .count()
    }

    #[test]
    fn test_reply_resolves_and_actor_leaves() {
        let (_runtime, system, doubler, factory) = fixture();
        let interactor = factory.create_interactor::<i64, i64>(doubler, Timeout::of_secs(5));
        let promise = interactor.invoke(21);
        assert_eq!(promise.get(Duration::from_secs(1)).unwrap(), 42);
        assert_eq!(interactions(&system), 0);
    }

    #[test]
    fn test_wrong_types_reject() {
        let (_runtime, system, doubler, factory) = fixture();
        let interactor =
            factory.create_interactor::<String, String>(doubler, Timeout::of_secs(5));
        let failure = interactor
            .invoke("four".to_owned())
            .get(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(
            failure.downcast_ref::<Error>(),
            Some(Error::WrongResponseType { .. })
        ));
        let failure = interactor
            .invoke_any(Box::new(4u8))
            .get(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(
            failure.downcast_ref::<Error>(),
            Some(Error::WrongRequestType { .. })
        ));
        assert_eq!(interactions(&system), 0);
    }

    #[test]
    fn test_stopped_system_rejects() {
        let (_runtime, system, doubler, factory) = fixture();
        system.shutdown();
        let interactor = factory.create_interactor::<i64, i64>(doubler, Timeout::of_secs(5));
        let failure = interactor.invoke(1).get(Duration::from_secs(1)).unwrap_err();
        assert_eq!(failure.downcast_ref::<Error>(), Some(&Error::NotRunning));
    }
}
