// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Fault policies and lifecycle requests.

use actor::{
    Actor, ActorAddress, ActorContext, ActorSystem, Error, FaultAction,
    FaultResolver, Message,
};
use promise::Failure;

use parking_lot::Mutex;

use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, Debug)]
enum Command {
    Add,
    Fail,
    Panic,
}

/// Counts `Add` commands. The count lives in the instance only.
struct Counter {
    count: u32,
    journal: Journal,
    policy: Policy,
}

#[derive(Clone)]
enum Policy {
    Default,
    Fixed(FaultAction),
    /// Reports the failure to a monitor, then restarts.
    Reporting(ActorAddress),
}

impl Actor for Counter {
    type Body = Command;

    fn receive(
        &mut self,
        _ctx: &ActorContext,
        message: Message<Command>,
    ) -> Result<(), Failure> {
        match message.body() {
            Command::Add => {
                self.count += 1;
                self.journal.lock().push(format!("count {}", self.count));
                Ok(())
            }
            Command::Fail => Err(Failure::msg("refused")),
            Command::Panic => panic!("kaboom"),
        }
    }

    fn before_restart(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        self.journal.lock().push(format!("before restart {}", self.count));
        Ok(())
    }

    fn after_restart(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        self.journal.lock().push("after restart".to_owned());
        Ok(())
    }

    fn after_stop(&mut self, _ctx: &ActorContext) -> Result<(), Failure> {
        self.journal.lock().push("stopped".to_owned());
        Ok(())
    }

    fn fault_resolver(&self) -> Box<dyn FaultResolver> {
        match self.policy.clone() {
            Policy::Default => Box::new(FaultAction::default()),
            Policy::Fixed(action) => Box::new(action),
            Policy::Reporting(monitor) => Box::new(
                move |ctx: &ActorContext, message: &Message<()>, failure: &Failure| {
                    let _ = ctx.tell(Message::create_from(
                        ctx.self_address().clone(),
                        monitor.clone(),
                        failure.to_string(),
                    ));
                    FaultAction::Restart.resolve_fault(ctx, message, failure)
                },
            ),
        }
    }
}

/// Collects text messages.
struct Monitor {
    journal: Journal,
}

impl Actor for Monitor {
    type Body = String;

    fn receive(
        &mut self,
        _ctx: &ActorContext,
        message: Message<String>,
    ) -> Result<(), Failure> {
        self.journal.lock().push(format!("report {}", message.body()));
        Ok(())
    }
}

fn counter(system: &ActorSystem, journal: &Journal, policy: Policy) -> ActorAddress {
    let journal = journal.clone();
    system
        .actor_of("COUNTER", move |_ctx: &ActorContext| Counter {
            count: 0,
            journal: journal.clone(),
            policy: policy.clone(),
        })
        .unwrap()
}

fn started() -> (ActorSystem, Journal) {
    let system = ActorSystem::new();
    system.start().unwrap();
    (system, Arc::new(Mutex::new(Vec::new())))
}

fn send(system: &ActorSystem, to: &ActorAddress, commands: &[Command]) {
    for command in commands {
        system
            .tell(Message::create_for(to.clone(), *command))
            .unwrap();
    }
}

#[test]
fn test_default_policy_stops() {
    let (system, journal) = started();
    let address = counter(&system, &journal, Policy::Default);

    send(&system, &address, &[Command::Add, Command::Fail, Command::Add]);

    assert_eq!(*journal.lock(), vec!["count 1", "stopped"]);
    assert!(!system.contains(&address));
    assert_eq!(system.dead_letter_count(), 1);
}

#[test]
fn test_resume_keeps_state() {
    let (system, journal) = started();
    let address = counter(&system, &journal, Policy::Fixed(FaultAction::Resume));

    send(
        &system,
        &address,
        &[Command::Add, Command::Fail, Command::Panic, Command::Add],
    );

    assert_eq!(*journal.lock(), vec!["count 1", "count 2"]);
    assert!(system.contains(&address));
}

#[test]
fn test_restart_builds_fresh_instance() {
    let (system, journal) = started();
    let address = counter(&system, &journal, Policy::Fixed(FaultAction::Restart));

    send(
        &system,
        &address,
        &[Command::Add, Command::Add, Command::Fail, Command::Add],
    );

    assert_eq!(
        *journal.lock(),
        vec![
            "count 1",
            "count 2",
            "before restart 2",
            "after restart",
            "count 1"
        ]
    );
}

#[test]
fn test_composed_policy_reports_then_restarts() {
    let (system, journal) = started();
    let sink = journal.clone();
    let monitor = system
        .actor_of("MONITOR", move |_ctx: &ActorContext| Monitor {
            journal: sink.clone(),
        })
        .unwrap();
    let address = counter(&system, &journal, Policy::Reporting(monitor));

    send(&system, &address, &[Command::Add, Command::Panic, Command::Add]);

    assert_eq!(
        *journal.lock(),
        vec![
            "count 1",
            "before restart 1",
            "after restart",
            "report Actor behavior panicked: kaboom",
            "count 1"
        ]
    );
}

#[test]
fn test_restart_and_stop_requests() {
    let (system, journal) = started();
    let address = counter(&system, &journal, Policy::Default);

    send(&system, &address, &[Command::Add]);
    system.restart(&address).unwrap();
    send(&system, &address, &[Command::Add]);
    system.stop(&address).unwrap();

    assert_eq!(
        *journal.lock(),
        vec![
            "count 1",
            "before restart 1",
            "after restart",
            "count 1",
            "stopped"
        ]
    );
    assert_eq!(system.restart(&address), Err(Error::NotFound(address)));
}
