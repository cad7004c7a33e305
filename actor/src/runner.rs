// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor runner
//!
//! The runner owns an actor instance together with its factory and context,
//! and drives the lifecycle state machine one mailbox letter at a time:
//!
//! ```text
//! Created --Start--> Running --Restart--> Restarting --> Running
//!    |                  |                     |
//!    +------------------+---------Stop--------+--> Stopped
//! ```
//!
//! Panics raised by behavior code are caught here and handled like returned
//! errors.
//!

use crate::{
    ActorContext, ActorLifecycle, Error, FaultAction,
    actor::{Actor, ActorFactory},
    mailbox::Letter,
    message::{AnyBody, Message},
};

use promise::Failure;
use tracing::{debug, error, warn};

use std::{
    any::{Any, type_name},
    panic::{AssertUnwindSafe, catch_unwind},
};

/// Result of handling one letter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Status {
    Running,
    Terminated,
}

/// Type-erased runner, as stored in an actor cell.
pub(crate) trait Behavior: Send {
    fn handle(&mut self, letter: Letter) -> Status;

    /// Terminates the actor outside of the mailbox flow.
    fn terminate(&mut self);

    fn lifecycle(&self) -> ActorLifecycle;
}

pub(crate) struct ActorRunner<A: Actor> {
    factory: ActorFactory<A>,
    ctx: ActorContext,
    actor: Option<A>,
    lifecycle: ActorLifecycle,
}

impl<A: Actor> ActorRunner<A> {
    pub(crate) fn new(factory: ActorFactory<A>, ctx: ActorContext) -> Self {
        debug!("Creating new actor runner for {}.", ctx.self_address());
        Self {
            factory,
            ctx,
            actor: None,
            lifecycle: ActorLifecycle::Created,
        }
    }

    fn start(&mut self) -> Status {
        if self.lifecycle != ActorLifecycle::Created {
            debug!("Actor {} is already started.", self.ctx.self_address());
            return Status::Running;
        }
        let address = self.ctx.self_address().clone();
        debug!("Starting actor {}.", address);

        let mut actor = match guard(|| Ok((self.factory)(&self.ctx))) {
            Ok(actor) => actor,
            Err(failure) => {
                error!("Actor '{}' could not be built: {}", address, failure);
                self.lifecycle = ActorLifecycle::Stopped;
                return Status::Terminated;
            }
        };
        debug!("Actor {} is created.", address);

        if let Err(failure) = guard(|| actor.before_start(&self.ctx)) {
            error!("Actor '{}' failed to start: {}", address, failure);
            self.lifecycle = ActorLifecycle::Stopped;
            return Status::Terminated;
        }
        self.actor = Some(actor);
        self.lifecycle = ActorLifecycle::Running;
        debug!("Actor {} is started.", address);
        Status::Running
    }

    fn deliver(&mut self, message: Message<AnyBody>) -> Status {
        if self.lifecycle != ActorLifecycle::Running {
            warn!(
                "Actor {} is not running, message from {} goes to dead letter.",
                self.ctx.self_address(),
                message.sender()
            );
            self.ctx.forward_to_dead_letter(message);
            return Status::Running;
        }
        let message = match message.downcast::<A::Body>() {
            Ok(message) => message,
            Err(message) => {
                warn!(
                    "Actor {} does not accept the body sent by {} (expected {}), message goes to dead letter.",
                    self.ctx.self_address(),
                    message.sender(),
                    type_name::<A::Body>()
                );
                self.ctx.forward_to_dead_letter(message);
                return Status::Running;
            }
        };

        let envelope = message.envelope();
        let Some(actor) = self.actor.as_mut() else {
            return Status::Running;
        };
        match guard(|| actor.receive(&self.ctx, message)) {
            Ok(()) => Status::Running,
            Err(failure) => self.fault(envelope, failure),
        }
    }

    fn fault(&mut self, envelope: Message<()>, failure: Failure) -> Status {
        let address = self.ctx.self_address().clone();
        debug!(
            "Actor {} is faulty handling message from {}: {}",
            address,
            envelope.sender(),
            failure
        );
        let action = match self.actor.as_ref() {
            Some(actor) => {
                let resolver = actor.fault_resolver();
                catch_unwind(AssertUnwindSafe(|| {
                    resolver.resolve_fault(&self.ctx, &envelope, &failure)
                }))
                .unwrap_or_else(|_| {
                    error!("Fault resolver of actor '{}' panicked.", address);
                    FaultAction::Stop
                })
            }
            None => FaultAction::Stop,
        };

        match action {
            FaultAction::Resume => {
                debug!("Actor {} resumes.", address);
                Status::Running
            }
            FaultAction::Restart => self.restart(),
            FaultAction::Stop => {
                self.terminate();
                Status::Terminated
            }
        }
    }

    fn restart(&mut self) -> Status {
        if self.lifecycle != ActorLifecycle::Running {
            debug!(
                "Actor {} is {:?}, restart ignored.",
                self.ctx.self_address(),
                self.lifecycle
            );
            return Status::Running;
        }
        let Some(mut old) = self.actor.take() else {
            return Status::Running;
        };
        let address = self.ctx.self_address().clone();
        debug!("Restarting actor {}.", address);
        self.lifecycle = ActorLifecycle::Restarting;

        if let Err(failure) = guard(|| old.before_restart(&self.ctx)) {
            error!("Actor '{}' failed before restart: {}", address, failure);
            self.actor = Some(old);
            self.terminate();
            return Status::Terminated;
        }
        drop(old);

        let mut fresh = match guard(|| Ok((self.factory)(&self.ctx))) {
            Ok(actor) => actor,
            Err(failure) => {
                error!("Actor '{}' could not be rebuilt: {}", address, failure);
                self.lifecycle = ActorLifecycle::Stopped;
                return Status::Terminated;
            }
        };
        let restarted = guard(|| fresh.after_restart(&self.ctx));
        self.actor = Some(fresh);
        if let Err(failure) = restarted {
            error!("Actor '{}' failed after restart: {}", address, failure);
            self.terminate();
            return Status::Terminated;
        }
        self.lifecycle = ActorLifecycle::Running;
        debug!("Actor {} is restarted.", address);
        Status::Running
    }
}

impl<A: Actor> Behavior for ActorRunner<A> {
    fn handle(&mut self, letter: Letter) -> Status {
        match letter {
            Letter::Start => self.start(),
            Letter::Deliver(message) => self.deliver(message),
            Letter::Restart => self.restart(),
            Letter::Stop => {
                self.terminate();
                Status::Terminated
            }
        }
    }

    fn terminate(&mut self) {
        if self.lifecycle == ActorLifecycle::Stopped {
            return;
        }
        self.lifecycle = ActorLifecycle::Stopped;
        if let Some(mut actor) = self.actor.take() {
            if let Err(failure) = guard(|| actor.after_stop(&self.ctx)) {
                error!(
                    "Actor '{}' failed to stop: {}",
                    self.ctx.self_address(),
                    failure
                );
            }
        }
        debug!("Actor {} is stopped.", self.ctx.self_address());
    }

    fn lifecycle(&self) -> ActorLifecycle {
        self.lifecycle
    }
}

/// Runs behavior code, turning a panic into a failure.
fn guard<R>(code: impl FnOnce() -> Result<R, Failure>) -> Result<R, Failure> {
    catch_unwind(AssertUnwindSafe(code))
        .unwrap_or_else(|payload| Err(Error::Panicked(panic_text(payload)).into()))
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(text) => *text,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .unwrap_or_else(|| "unknown panic".to_owned()),
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use crate::{ActorAddress, ActorName, FaultResolver};

    use parking_lot::Mutex;
    use std::sync::{Arc, Weak};
    use tracing_test::traced_test;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Probe {
        id: usize,
        journal: Journal,
        action: FaultAction,
        /// Lifecycle hook that returns an error.
        failing: Option<&'static str>,
    }

    impl Probe {
        fn hook(&self, name: &str) -> Result<(), Failure> {
            self.journal.lock().push(format!("{} {}", name, self.id));
            if self.failing == Some(name) {
                return Err(Error::Functional(format!("{} refused", name)).into());
            }
            Ok(())
        }
    }

    impl Actor for Probe {
        type Body = &'static str;

        fn before_start(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
            self.hook("before_start")
        }

        fn receive(
            &mut self,
            _ctx: &ActorContext,
            message: Message<&'static str>,
        ) -> Result<(), Failure> {
            self.journal.lock().push(format!("{} {}", message.body(), self.id));
            match *message.body() {
                "fail" => Err(Error::Functional("failed".to_owned()).into()),
                "panic" => panic!("behavior panic"),
                _ => Ok(()),
            }
        }

        fn before_restart(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
            self.hook("before_restart")
        }

        fn after_restart(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
            self.hook("after_restart")
        }

        fn after_stop(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
            self.hook("after_stop")
        }

        fn fault_resolver(&self) -> Box<dyn FaultResolver> {
            let journal = self.journal.clone();
            let action = self.action;
            Box::new(
                move |_ctx: &ActorContext, _message: &Message<()>, failure: &Failure| {
                    journal.lock().push(format!("fault {}", failure));
                    action
                },
            )
        }
    }

    fn runner(
        action: FaultAction,
        failing: Option<&'static str>,
    ) -> (ActorRunner<Probe>, Journal) {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(Mutex::new(0));
        let shared = journal.clone();
        let factory: ActorFactory<Probe> = Box::new(move |_ctx: &ActorContext| {
            let mut built = counter.lock();
            *built += 1;
            Probe {
                id: *built,
                journal: shared.clone(),
                action,
                failing,
            }
        });
        let address = ActorAddress::of_name(ActorName::of("PROBE").unwrap());
        let ctx = ActorContext::new(address, Weak::new());
        (ActorRunner::new(factory, ctx), journal)
    }

    fn letter(body: &'static str) -> Letter {
        Letter::Deliver(
            Message::create_for(ActorAddress::dead_letter(), body).into_any(),
        )
    }

    #[test]
    fn test_restart_swaps_instance() {
        let (mut runner, journal) = runner(FaultAction::Restart, None);
        assert_eq!(runner.handle(Letter::Start), Status::Running);
        assert_eq!(runner.handle(letter("fail")), Status::Running);
        assert_eq!(runner.handle(letter("ok")), Status::Running);
        assert_eq!(
            *journal.lock(),
            vec![
                "before_start 1",
                "fail 1",
                "fault Error: failed",
                "before_restart 1",
                "after_restart 2",
                "ok 2",
            ]
        );
    }

    #[test]
    fn test_resume_keeps_instance() {
        let (mut runner, journal) = runner(FaultAction::Resume, None);
        runner.handle(Letter::Start);
        runner.handle(letter("panic"));
        runner.handle(letter("ok"));
        assert_eq!(runner.lifecycle(), ActorLifecycle::Running);
        let journal = journal.lock();
        assert_eq!(journal[2], "fault Actor behavior panicked: behavior panic");
        assert_eq!(journal[3], "ok 1");
    }

    #[test]
    fn test_stop_runs_after_stop_once() {
        let (mut runner, journal) = runner(FaultAction::Stop, None);
        runner.handle(Letter::Start);
        assert_eq!(runner.handle(letter("fail")), Status::Terminated);
        runner.terminate();
        assert_eq!(runner.lifecycle(), ActorLifecycle::Stopped);
        let stops = journal
            .lock()
            .iter()
            .filter(|entry| entry.starts_with("after_stop"))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_failed_start_skips_after_stop() {
        let (mut runner, journal) = runner(FaultAction::Stop, Some("before_start"));
        assert_eq!(runner.handle(Letter::Start), Status::Terminated);
        runner.terminate();
        assert_eq!(*journal.lock(), vec!["before_start 1"]);
    }

    #[test]
    fn test_failing_before_restart_stops() {
        let (mut runner, journal) = runner(FaultAction::Restart, Some("before_restart"));
        runner.handle(Letter::Start);
        assert_eq!(runner.handle(letter("fail")), Status::Terminated);
        assert_eq!(runner.lifecycle(), ActorLifecycle::Stopped);
        assert_eq!(
            *journal.lock(),
            vec![
                "before_start 1",
                "fail 1",
                "fault Error: failed",
                "before_restart 1",
                "after_stop 1",
            ]
        );
    }

    #[test]
    fn test_failing_after_restart_stops_fresh_instance() {
        let (mut runner, journal) = runner(FaultAction::Stop, Some("after_restart"));
        runner.handle(Letter::Start);
        assert_eq!(runner.handle(Letter::Restart), Status::Terminated);
        assert_eq!(runner.lifecycle(), ActorLifecycle::Stopped);
        assert_eq!(
            *journal.lock(),
            vec![
                "before_start 1",
                "before_restart 1",
                "after_restart 2",
                "after_stop 2",
            ]
        );
    }

    #[test]
    #[traced_test]
    fn test_failing_after_stop_is_logged() {
        let (mut runner, journal) = runner(FaultAction::Stop, Some("after_stop"));
        runner.handle(Letter::Start);
        assert_eq!(runner.handle(Letter::Stop), Status::Terminated);
        assert_eq!(runner.lifecycle(), ActorLifecycle::Stopped);
        assert_eq!(*journal.lock(), vec!["before_start 1", "after_stop 1"]);
        assert!(logs_contain(
            "Actor 'urn:actor:PROBE' failed to stop: Error: after_stop refused"
        ));
    }

    #[test]
    fn test_restart_before_start_is_ignored() {
        let (mut runner, journal) = runner(FaultAction::Stop, None);
        assert_eq!(runner.handle(Letter::Restart), Status::Running);
        assert_eq!(runner.lifecycle(), ActorLifecycle::Created);
        assert!(journal.lock().is_empty());
    }

    #[test]
    fn test_wrong_body_is_not_delivered() {
        let (mut runner, journal) = runner(FaultAction::Stop, None);
        runner.handle(Letter::Start);
        let wrong = Message::create_for(ActorAddress::dead_letter(), 5u8).into_any();
        assert_eq!(runner.handle(Letter::Deliver(wrong)), Status::Running);
        assert_eq!(*journal.lock(), vec!["before_start 1"]);
    }
}
