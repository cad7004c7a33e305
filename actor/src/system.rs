// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor system
//!
//! The `system` module provides the [`ActorSystem`] type, responsible for
//! registering actors, routing messages to their mailboxes and driving mailbox
//! processing through the configured [`Dispatcher`].
//!
//! Each registered actor lives in a cell made of its mailbox and its runner.
//! Posting a letter to an idle mailbox dispatches one worker; the worker handles
//! a single letter and dispatches the next worker only if letters remain. This
//! is what keeps every actor single-threaded under a concurrent dispatcher.
//!

use crate::{
    Actor, ActorAddress, ActorContext, ActorName, CorrelationKey,
    CorrelationKeyGenerator, Dispatcher, Error, InstanceKeyGenerator,
    SingleThreadDispatcher, Worker,
    actor::ActorFactory,
    mailbox::{Letter, Mailbox, Posted},
    message::{AnyBody, Message},
    runner::{ActorRunner, Behavior, Status},
};

use parking_lot::{Mutex, RwLock};
use promise::Failure;
use tracing::{debug, warn};

use std::{
    any::Any,
    cell::Cell,
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Actor system handle. Clones share the same system.
///
/// ```ignore
/// let system = ActorSystem::builder()
///     .dispatcher(ThreadPoolDispatcher::current()?)
///     .build();
/// system.start()?;
/// let parser = system.actor_of("PARSER", |_ctx: &ActorContext| Parser)?;
/// let key = system.tell(Message::create_for(parser, "100".to_owned()))?;
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    core: Arc<SystemCore>,
}

impl ActorSystem {
    pub fn builder() -> SystemBuilder {
        SystemBuilder::default()
    }

    /// System with the single-thread dispatcher and a random-instance key
    /// generator. It must be started before use.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn from_core(core: Arc<SystemCore>) -> Self {
        Self { core }
    }

    /// Activates the dead letter and opens the registry. Starting a running
    /// system does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] if the system was shut down.
    pub fn start(&self) -> Result<(), Error> {
        self.core.start()
    }

    /// Registers an actor under `name` and starts it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`], [`Error::Exists`] if the name is taken (nothing
    /// is registered then), or [`Error::NotRunning`].
    pub fn actor_of<A, F>(&self, name: &str, factory: F) -> Result<ActorAddress, Error>
    where
        A: Actor,
        F: Fn(&ActorContext) -> A + Send + 'static,
    {
        self.core.register(ActorName::of(name)?, Box::new(factory))
    }

    /// Sends a message. An uncorrelated message gets a fresh correlation key,
    /// which is returned. Messages to unknown addresses go to the dead letter.
    pub fn tell<T>(&self, message: Message<T>) -> Result<CorrelationKey, Error>
    where
        T: Any + Send,
    {
        self.core.tell(message.into_any())
    }

    /// Requests the termination of an actor, after the letters already queued.
    pub fn stop(&self, address: &ActorAddress) -> Result<(), Error> {
        self.core.stop(address)
    }

    /// Requests a restart of an actor, after the letters already queued.
    pub fn restart(&self, address: &ActorAddress) -> Result<(), Error> {
        self.core.restart(address)
    }

    /// True if an actor is registered under the address.
    pub fn contains(&self, address: &ActorAddress) -> bool {
        self.core.registry.read().cells.contains_key(address)
    }

    /// Addresses of the registered actors, the dead letter included.
    pub fn addresses(&self) -> Vec<ActorAddress> {
        self.core.registry.read().cells.keys().cloned().collect()
    }

    pub fn is_running(&self) -> bool {
        self.core.registry.read().state == SystemState::Running
    }

    /// Number of letters the dead letter received.
    pub fn dead_letter_count(&self) -> usize {
        self.core.dead_letters.load(Ordering::SeqCst)
    }

    /// Stops every actor, the dead letter last, and rejects further sends.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.core.registry.read();
        f.debug_struct("ActorSystem")
            .field("state", &registry.state)
            .field("actors", &registry.cells.len())
            .finish()
    }
}

/// Configuration of an actor system.
#[derive(Default)]
pub struct SystemBuilder {
    dispatcher: Option<Box<dyn Dispatcher>>,
    key_generator: Option<Box<dyn CorrelationKeyGenerator>>,
}

impl SystemBuilder {
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher) -> Self {
        self.dispatcher = Some(Box::new(dispatcher));
        self
    }

    pub fn correlation_key_generator(
        mut self,
        generator: impl CorrelationKeyGenerator,
    ) -> Self {
        self.key_generator = Some(Box::new(generator));
        self
    }

    pub fn build(self) -> ActorSystem {
        debug!("Creating actor system.");
        let core = SystemCore {
            registry: RwLock::new(Registry {
                state: SystemState::Created,
                cells: HashMap::new(),
            }),
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Box::new(SingleThreadDispatcher)),
            key_generator: self
                .key_generator
                .unwrap_or_else(|| Box::new(InstanceKeyGenerator::default())),
            dead_letters: Arc::new(AtomicUsize::new(0)),
        };
        ActorSystem {
            core: Arc::new(core),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SystemState {
    Created,
    Running,
    Terminated,
}

struct Registry {
    state: SystemState,
    cells: HashMap<ActorAddress, Arc<ActorCell>>,
}

/// Mailbox and runner of one actor.
pub(crate) struct ActorCell {
    address: ActorAddress,
    mailbox: Mutex<Mailbox>,
    behavior: Mutex<Box<dyn Behavior>>,
}

impl ActorCell {
    fn id(&self) -> usize {
        self as *const ActorCell as usize
    }
}

thread_local! {
    /// Cell whose letter is being handled on this thread.
    static ACTIVE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Marks a cell as active on the current thread for the guard's lifetime.
struct Active(Option<usize>);

impl Active {
    fn enter(cell: &ActorCell) -> Self {
        Active(ACTIVE.with(|active| active.replace(Some(cell.id()))))
    }

    fn is(cell: &ActorCell) -> bool {
        ACTIVE.with(|active| active.get() == Some(cell.id()))
    }
}

impl Drop for Active {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.0));
    }
}

/// Shared state of an actor system.
pub(crate) struct SystemCore {
    registry: RwLock<Registry>,
    dispatcher: Box<dyn Dispatcher>,
    key_generator: Box<dyn CorrelationKeyGenerator>,
    dead_letters: Arc<AtomicUsize>,
}

impl SystemCore {
    fn start(self: &Arc<Self>) -> Result<(), Error> {
        let dead_letters = self.dead_letters.clone();
        let cell = self.cell(
            ActorAddress::dead_letter(),
            Box::new(move |_ctx: &ActorContext| DeadLetterActor {
                received: dead_letters.clone(),
            }),
        );
        {
            let mut registry = self.registry.write();
            match registry.state {
                SystemState::Running => {
                    debug!("Actor system is already running.");
                    return Ok(());
                }
                SystemState::Terminated => return Err(Error::NotRunning),
                SystemState::Created => {
                    registry.state = SystemState::Running;
                    registry.cells.insert(cell.address.clone(), cell.clone());
                }
            }
        }
        debug!("Running actor system...");
        self.post(&cell, Letter::Start);
        Ok(())
    }

    fn cell<A: Actor>(
        self: &Arc<Self>,
        address: ActorAddress,
        factory: ActorFactory<A>,
    ) -> Arc<ActorCell> {
        let ctx = ActorContext::new(address.clone(), Arc::downgrade(self));
        Arc::new(ActorCell {
            address,
            mailbox: Mutex::new(Mailbox::new()),
            behavior: Mutex::new(Box::new(ActorRunner::new(factory, ctx))),
        })
    }

    pub(crate) fn register<A: Actor>(
        self: &Arc<Self>,
        name: ActorName,
        factory: ActorFactory<A>,
    ) -> Result<ActorAddress, Error> {
        let address = ActorAddress::of_name(name);
        let cell = self.cell(address.clone(), factory);
        {
            let mut registry = self.registry.write();
            if registry.state != SystemState::Running {
                return Err(Error::NotRunning);
            }
            if registry.cells.contains_key(&address) {
                warn!("Actor '{}' already exists!", &address);
                return Err(Error::Exists(address));
            }
            registry.cells.insert(address.clone(), cell.clone());
        }
        debug!("Actor {} is registered.", address);
        self.post(&cell, Letter::Start);
        Ok(address)
    }

    pub(crate) fn tell(
        self: &Arc<Self>,
        message: Message<AnyBody>,
    ) -> Result<CorrelationKey, Error> {
        if self.registry.read().state != SystemState::Running {
            return Err(Error::NotRunning);
        }
        let message = if message.correlation_key().is_represent_correlated() {
            message
        } else {
            let key = self.key_generator.generate();
            message.correlate_by(key)
        };
        let key = message.correlation_key().clone();
        self.route(message);
        Ok(key)
    }

    fn lookup(&self, address: &ActorAddress) -> Option<Arc<ActorCell>> {
        self.registry.read().cells.get(address).cloned()
    }

    fn route(self: &Arc<Self>, message: Message<AnyBody>) {
        match self.lookup(message.destination()) {
            Some(cell) => self.post(&cell, Letter::Deliver(message)),
            None => {
                debug!(
                    "No actor at {}, message goes to dead letter.",
                    message.destination()
                );
                self.to_dead_letter(message);
            }
        }
    }

    pub(crate) fn to_dead_letter(self: &Arc<Self>, message: Message<AnyBody>) {
        match self.lookup(&ActorAddress::dead_letter()) {
            Some(cell) => self.post(&cell, Letter::Deliver(message)),
            None => warn!(
                "Dead letter is gone, message from {} to {} is dropped.",
                message.sender(),
                message.destination()
            ),
        }
    }

    fn post(self: &Arc<Self>, cell: &Arc<ActorCell>, letter: Letter) {
        let posted = cell.mailbox.lock().post(letter);
        match posted {
            Posted::Schedule => self.schedule(cell.clone()),
            Posted::Queued => {}
            Posted::Closed(Letter::Deliver(message))
                if !cell.address.is_dead_letter() =>
            {
                self.to_dead_letter(message)
            }
            Posted::Closed(letter) => {
                debug!("Actor {} is closed, {:?} is dropped.", cell.address, letter)
            }
        }
    }

    fn schedule(self: &Arc<Self>, cell: Arc<ActorCell>) {
        let core = self.clone();
        self.dispatcher
            .dispatch(Worker::new(move || core.process(cell)));
    }

    /// Handles one letter of the cell.
    fn process(self: &Arc<Self>, cell: Arc<ActorCell>) {
        let letter = cell.mailbox.lock().take();
        if let Some(letter) = letter {
            let status = {
                let mut behavior = cell.behavior.lock();
                let _active = Active::enter(&cell);
                behavior.handle(letter)
            };
            if status == Status::Terminated {
                self.retire(&cell);
                return;
            }
        }
        let pending = cell.mailbox.lock().complete();
        if pending {
            self.schedule(cell);
        }
    }

    /// Unregisters a terminated actor and moves its queued messages to the
    /// dead letter.
    fn retire(self: &Arc<Self>, cell: &Arc<ActorCell>) {
        {
            let mut registry = self.registry.write();
            let registered = registry
                .cells
                .get(&cell.address)
                .is_some_and(|current| Arc::ptr_eq(current, cell));
            if registered {
                registry.cells.remove(&cell.address);
            }
        }
        debug!("Actor {} is terminated.", cell.address);
        let leftovers = cell.mailbox.lock().close();
        for letter in leftovers {
            match letter {
                Letter::Deliver(message) if !cell.address.is_dead_letter() => {
                    self.to_dead_letter(message)
                }
                letter => debug!(
                    "Letter {:?} for terminated actor {} is dropped.",
                    letter, cell.address
                ),
            }
        }
    }

    pub(crate) fn stop(self: &Arc<Self>, address: &ActorAddress) -> Result<(), Error> {
        self.control(address, Letter::Stop)
    }

    pub(crate) fn restart(
        self: &Arc<Self>,
        address: &ActorAddress,
    ) -> Result<(), Error> {
        self.control(address, Letter::Restart)
    }

    fn control(
        self: &Arc<Self>,
        address: &ActorAddress,
        letter: Letter,
    ) -> Result<(), Error> {
        let cell = self
            .lookup(address)
            .ok_or_else(|| Error::NotFound(address.clone()))?;
        debug!("Requesting {:?} of actor {}.", letter, address);
        let posted = cell.mailbox.lock().post(letter);
        match posted {
            Posted::Schedule => self.schedule(cell),
            Posted::Queued => {}
            Posted::Closed(_) => return Err(Error::NotFound(address.clone())),
        }
        Ok(())
    }

    fn shutdown(self: &Arc<Self>) {
        let cells: Vec<Arc<ActorCell>> = {
            let mut registry = self.registry.write();
            if registry.state == SystemState::Terminated {
                debug!("Actor system is already stopped.");
                return;
            }
            registry.state = SystemState::Terminated;
            registry.cells.drain().map(|(_, cell)| cell).collect()
        };
        debug!("Stopping actor system...");
        let (dead_letter, actors): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .partition(|cell| cell.address.is_dead_letter());
        for cell in actors.iter().chain(dead_letter.iter()) {
            self.halt(cell);
        }
        debug!("Actor system stopped.");
    }

    fn halt(&self, cell: &Arc<ActorCell>) {
        let dropped = cell.mailbox.lock().close();
        if !dropped.is_empty() {
            debug!(
                "{} letters for actor {} are dropped at shutdown.",
                dropped.len(),
                cell.address
            );
        }
        if Active::is(cell) {
            // Its runner is borrowed by this very thread: stop after the
            // current letter.
            cell.mailbox.lock().post_control(Letter::Stop);
            return;
        }
        let mut behavior = cell.behavior.lock();
        debug!(
            "Halting actor {} ({:?}).",
            cell.address,
            behavior.lifecycle()
        );
        behavior.terminate();
    }
}

/// Sink of undeliverable messages.
struct DeadLetterActor {
    received: Arc<AtomicUsize>,
}

impl Actor for DeadLetterActor {
    type Body = AnyBody;

    fn receive(
        &mut self,
        _ctx: &ActorContext,
        message: Message<AnyBody>,
    ) -> Result<(), Failure> {
        let count = self.received.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            "Dead letter #{} from {} to {} ({:?}).",
            count,
            message.sender(),
            message.destination(),
            message.correlation_key()
        );
        Ok(())
    }
}
