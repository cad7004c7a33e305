// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Publish/subscribe
//!
//! A coordinator actor keeps the subscribers of each [`Topic`]. Publishing
//! sends one command to the coordinator, which republishes the payload to every
//! address subscribed at that moment, keeping the publisher as sender and the
//! publication's correlation key.
//!
//! Each subscription is a child actor of the coordinator running the
//! subscriber's handler, so handlers of distinct subscriptions may run in
//! parallel while each one sees publications in order.
//!

use crate::{
    Actor, ActorAddress, ActorContext, ActorSystem, CorrelationKey, Error,
    FaultAction, FaultResolver, Message,
};

use promise::Failure;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use std::{
    any::{Any, type_name},
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

/// Payload shared by every subscriber of a publication.
type Payload = Arc<dyn Any + Send + Sync>;

/// Name of a publication channel.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Topic(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Topic::new(name)
    }
}

enum Command {
    Subscribe {
        topic: Topic,
        subscriber: ActorAddress,
    },
    Unsubscribe {
        topic: Topic,
        subscriber: ActorAddress,
    },
    Publish {
        topic: Topic,
        payload: Payload,
    },
}

/// Handle to a publish/subscribe coordinator.
#[derive(Clone, Debug)]
pub struct PubSub {
    system: ActorSystem,
    coordinator: ActorAddress,
}

impl PubSub {
    /// Registers the coordinator under `name`.
    pub fn create(system: &ActorSystem, name: &str) -> Result<Self, Error> {
        let coordinator =
            system.actor_of(name, |_ctx: &ActorContext| Coordinator::default())?;
        Ok(Self {
            system: system.clone(),
            coordinator,
        })
    }

    pub fn coordinator(&self) -> &ActorAddress {
        &self.coordinator
    }

    /// Runs `handler` on every `T` published on `topic` from now on.
    /// Publications of another type on the topic are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] once the coordinator is closed. No subscriber actor
    /// is left behind on failure.
    pub fn subscribe_on<T, F>(&self, topic: &Topic, handler: F) -> Result<Subscription, Error>
    where
        T: Any + Send + Sync,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let handler: Arc<dyn Fn(&T) + Send + Sync> = Arc::new(handler);
        let name = format!(
            "{}.SUBSCRIBER--{}",
            self.coordinator.actor_name(),
            Uuid::new_v4()
        );
        let subscriber = self.system.actor_of(&name, move |_ctx: &ActorContext| {
            Subscriber {
                handler: handler.clone(),
            }
        })?;
        let subscribed = if self.system.contains(&self.coordinator) {
            self.system
                .tell(Message::create_from(
                    subscriber.clone(),
                    self.coordinator.clone(),
                    Command::Subscribe {
                        topic: topic.clone(),
                        subscriber: subscriber.clone(),
                    },
                ))
                .map(|_| ())
        } else {
            Err(Error::NotFound(self.coordinator.clone()))
        };
        if let Err(e) = subscribed {
            if let Err(stop) = self.system.stop(&subscriber) {
                debug!("Subscriber {} not stopped: {}", subscriber, stop);
            }
            return Err(e);
        }
        Ok(Subscription {
            system: self.system.clone(),
            coordinator: self.coordinator.clone(),
            topic: topic.clone(),
            subscriber,
        })
    }

    pub fn publisher(&self, topic: Topic) -> Publisher {
        Publisher {
            system: self.system.clone(),
            coordinator: self.coordinator.clone(),
            sender: ActorAddress::dead_letter(),
            topic,
        }
    }

    /// Stops the coordinator together with every subscription.
    pub fn close(self) -> Result<(), Error> {
        self.system.stop(&self.coordinator)
    }
}

/// Sends publications on one topic.
#[derive(Clone, Debug)]
pub struct Publisher {
    system: ActorSystem,
    coordinator: ActorAddress,
    sender: ActorAddress,
    topic: Topic,
}

impl Publisher {
    /// Publications carry `sender` instead of the dead letter.
    pub fn with_sender(mut self, sender: ActorAddress) -> Self {
        self.sender = sender;
        self
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Publishes `body` and returns the publication's correlation key.
    pub fn publish<T>(&self, body: T) -> Result<CorrelationKey, Error>
    where
        T: Any + Send + Sync,
    {
        self.system.tell(Message::create_from(
            self.sender.clone(),
            self.coordinator.clone(),
            Command::Publish {
                topic: self.topic.clone(),
                payload: Arc::new(body),
            },
        ))
    }
}

/// Live subscription of a handler to a topic.
#[derive(Debug)]
pub struct Subscription {
    system: ActorSystem,
    coordinator: ActorAddress,
    topic: Topic,
    subscriber: ActorAddress,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Address of the actor running the handler.
    pub fn subscriber(&self) -> &ActorAddress {
        &self.subscriber
    }

    /// Removes the subscription. Publications already republished to it are
    /// still handled.
    pub fn unsubscribe(self) -> Result<(), Error> {
        self.system.tell(Message::create_from(
            self.subscriber.clone(),
            self.coordinator,
            Command::Unsubscribe {
                topic: self.topic,
                subscriber: self.subscriber,
            },
        ))?;
        Ok(())
    }
}

#[derive(Default)]
struct Coordinator {
    topics: HashMap<Topic, HashSet<ActorAddress>>,
}

impl Actor for Coordinator {
    type Body = Command;

    fn receive(
        &mut self,
        ctx: &ActorContext,
        message: Message<Command>,
    ) -> Result<(), Failure> {
        let (envelope, command) = message.into_parts();
        match command {
            Command::Subscribe { topic, subscriber } => {
                debug!("Subscribing {} on topic {}.", subscriber, topic);
                self.topics.entry(topic).or_default().insert(subscriber);
            }
            Command::Unsubscribe { topic, subscriber } => {
                let removed = self
                    .topics
                    .get_mut(&topic)
                    .is_some_and(|subscribers| subscribers.remove(&subscriber));
                if removed {
                    debug!("Unsubscribing {} from topic {}.", subscriber, topic);
                    ctx.stop(&subscriber)?;
                }
                if self.topics.get(&topic).is_some_and(HashSet::is_empty) {
                    self.topics.remove(&topic);
                }
            }
            Command::Publish { topic, payload } => {
                let Some(subscribers) = self.topics.get(&topic) else {
                    debug!("No subscriber on topic {}.", topic);
                    return Ok(());
                };
                for subscriber in subscribers {
                    ctx.tell(
                        Message::create_from(
                            envelope.sender().clone(),
                            subscriber.clone(),
                            payload.clone(),
                        )
                        .correlate_by(envelope.correlation_key().clone()),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn after_stop(&mut self, ctx: &ActorContext) -> Result<(), Failure> {
        for subscriber in self.topics.drain().flat_map(|(_, subscribers)| subscribers) {
            if let Err(e) = ctx.stop(&subscriber) {
                debug!("Subscriber {} already gone: {}", subscriber, e);
            }
        }
        Ok(())
    }
}

struct Subscriber<T> {
    handler: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Actor for Subscriber<T>
where
    T: Any + Send + Sync,
{
    type Body = Payload;

    fn receive(
        &mut self,
        ctx: &ActorContext,
        message: Message<Payload>,
    ) -> Result<(), Failure> {
        let payload: &(dyn Any + Send + Sync) = &**message.body();
        match payload.downcast_ref::<T>() {
            Some(publication) => (self.handler)(publication),
            None => debug!(
                "Subscriber {} skips a publication that is not a {}.",
                ctx.self_address(),
                type_name::<T>()
            ),
        }
        Ok(())
    }

    fn fault_resolver(&self) -> Box<dyn FaultResolver> {
        Box::new(
            |ctx: &ActorContext, message: &Message<()>, failure: &Failure| {
                warn!(
                    "Subscriber {} failed on publication {:?}: {}",
                    ctx.self_address(),
                    message.correlation_key(),
                    failure
                );
                FaultAction::Resume
            },
        )
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use parking_lot::Mutex;

    #[derive(Debug, PartialEq)]
    struct Quote(u32);

    fn started() -> (ActorSystem, PubSub) {
        let system = ActorSystem::new();
        system.start().unwrap();
        let pubsub = PubSub::create(&system, "QUOTES").unwrap();
        (system, pubsub)
    }

    #[test]
    fn test_publish_reaches_current_subscribers() {
        let (system, pubsub) = started();
        let topic = Topic::new("prices");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = pubsub
            .subscribe_on(&topic, move |quote: &Quote| sink.lock().push(quote.0))
            .unwrap();
        assert!(
            subscription
                .subscriber()
                .actor_name()
                .is_descendant_of(pubsub.coordinator().actor_name())
        );

        let publisher = pubsub.publisher(topic.clone());
        publisher.publish(Quote(1)).unwrap();
        publisher.publish("not a quote").unwrap();
        pubsub.publisher(Topic::new("other")).publish(Quote(9)).unwrap();
        publisher.publish(Quote(2)).unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);

        let subscriber = subscription.subscriber().clone();
        subscription.unsubscribe().unwrap();
        publisher.publish(Quote(3)).unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(!system.contains(&subscriber));
    }

    #[test]
    fn test_failing_handler_keeps_subscription() {
        let (_system, pubsub) = started();
        let topic = Topic::from("ticks");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        pubsub
            .subscribe_on(&topic, move |tick: &u32| {
                if *tick == 0 {
                    panic!("zero tick");
                }
                sink.lock().push(*tick);
            })
            .unwrap();
        let publisher = pubsub.publisher(topic);
        for tick in [0u32, 1, 2] {
            publisher.publish(tick).unwrap();
        }
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_subscribe_on_closed_pubsub_leaves_nothing() {
        let (system, pubsub) = started();
        let closed = pubsub.clone();
        pubsub.close().unwrap();
        let before = system.addresses().len();

        let subscribed = closed.subscribe_on(&Topic::new("late"), |_: &u8| {});

        assert_eq!(
            subscribed.map(|s| s.subscriber().clone()),
            Err(Error::NotFound(closed.coordinator().clone()))
        );
        assert_eq!(system.addresses().len(), before);
    }

    #[test]
    fn test_close_stops_subscribers() {
        let (system, pubsub) = started();
        let subscription = pubsub
            .subscribe_on(&Topic::new("news"), |_: &String| {})
            .unwrap();
        let subscriber = subscription.subscriber().clone();
        let coordinator = pubsub.coordinator().clone();
        pubsub.close().unwrap();
        assert!(!system.contains(&coordinator));
        assert!(!system.contains(&subscriber));
    }
}
