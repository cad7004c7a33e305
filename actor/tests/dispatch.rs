// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Mailbox serialization and cross-actor parallelism under a concurrent
//! dispatcher.

use actor::{Actor, ActorAddress, ActorContext, ActorSystem, Message, ThreadPoolDispatcher};
use promise::Failure;

use parking_lot::Mutex;
use tokio::runtime::Builder;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

const MESSAGES: u32 = 40;

#[derive(Default)]
struct Probe {
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
    received: Mutex<Vec<u32>>,
}

/// Holds each message for a while and reports overlapping runs.
struct Slow {
    probe: Arc<Probe>,
    concurrent: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Actor for Slow {
    type Body = u32;

    fn receive(
        &mut self,
        _ctx: &ActorContext,
        message: Message<u32>,
    ) -> Result<(), Failure> {
        if self.probe.in_flight.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let running = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        thread::sleep(Duration::from_millis(5));
        self.probe.received.lock().push(*message.body());

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        self.probe.in_flight.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_one_worker_per_actor_actors_in_parallel() {
    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(8)
        .build()
        .unwrap();
    let system = ActorSystem::builder()
        .dispatcher(ThreadPoolDispatcher::new(runtime.handle().clone()))
        .build();
    system.start().unwrap();

    let concurrent = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let probes: Vec<(ActorAddress, Arc<Probe>)> = ["LEFT", "RIGHT", "CENTER"]
        .into_iter()
        .map(|name| {
            let probe = Arc::new(Probe::default());
            let (shared, concurrent, peak) = (probe.clone(), concurrent.clone(), peak.clone());
            let address = system
                .actor_of(name, move |_ctx: &ActorContext| Slow {
                    probe: shared.clone(),
                    concurrent: concurrent.clone(),
                    peak: peak.clone(),
                })
                .unwrap();
            (address, probe)
        })
        .collect();

    thread::scope(|scope| {
        for (address, _) in &probes {
            let system = &system;
            scope.spawn(move || {
                for n in 0..MESSAGES {
                    system
                        .tell(Message::create_for(address.clone(), n))
                        .unwrap();
                }
            });
        }
    });

    for _ in 0..500 {
        let done = probes
            .iter()
            .all(|(_, probe)| probe.received.lock().len() == MESSAGES as usize);
        if done {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    for (address, probe) in &probes {
        assert_eq!(probe.overlaps.load(Ordering::SeqCst), 0, "{}", address);
        assert_eq!(*probe.received.lock(), (0..MESSAGES).collect::<Vec<_>>());
    }
    // Distinct actors do overlap.
    let peak = peak.load(Ordering::SeqCst);
    assert!((2..=probes.len()).contains(&peak), "peak {}", peak);
    system.shutdown();
}
