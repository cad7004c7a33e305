// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! Per-actor FIFO of pending letters. Besides the queue, the mailbox keeps the
//! `scheduled` flag that guarantees at most one worker per actor: the flag is
//! raised by the post that finds it down, and lowered only by the worker that
//! finds the queue empty on completion.
//!

use crate::message::{AnyBody, Message};

use tracing::debug;

use std::{collections::VecDeque, fmt};

/// Entry of a mailbox.
///
/// Lifecycle requests travel through the same queue as messages, so they are
/// observed in send order.
pub(crate) enum Letter {
    /// Build the instance and run `before_start`.
    Start,
    /// Hand a message to the behavior.
    Deliver(Message<AnyBody>),
    /// Replace the instance with a fresh one.
    Restart,
    /// Terminate the actor.
    Stop,
}

impl fmt::Debug for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Letter::Start => f.write_str("Start"),
            Letter::Deliver(message) => write!(
                f,
                "Deliver({} -> {}, {:?})",
                message.sender(),
                message.destination(),
                message.correlation_key()
            ),
            Letter::Restart => f.write_str("Restart"),
            Letter::Stop => f.write_str("Stop"),
        }
    }
}

/// Outcome of posting a letter.
#[derive(Debug)]
pub(crate) enum Posted {
    /// The mailbox was idle: the caller must schedule a worker.
    Schedule,
    /// A worker is already scheduled and will see the letter.
    Queued,
    /// The mailbox no longer accepts letters.
    Closed(Letter),
}

#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    letters: VecDeque<Letter>,
    scheduled: bool,
    closed: bool,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn post(&mut self, letter: Letter) -> Posted {
        if self.closed {
            return Posted::Closed(letter);
        }
        self.letters.push_back(letter);
        if self.scheduled {
            Posted::Queued
        } else {
            self.scheduled = true;
            Posted::Schedule
        }
    }

    /// Puts a control letter in front of the queue, even on a closed mailbox.
    /// Only meant for the worker currently processing this mailbox.
    pub(crate) fn post_control(&mut self, letter: Letter) {
        debug!("Posting control letter {:?}.", letter);
        self.letters.push_front(letter);
    }

    pub(crate) fn take(&mut self) -> Option<Letter> {
        self.letters.pop_front()
    }

    /// Ends a worker turn. Returns true if another worker must be scheduled.
    pub(crate) fn complete(&mut self) -> bool {
        if self.letters.is_empty() {
            self.scheduled = false;
            false
        } else {
            true
        }
    }

    /// Stops accepting letters and returns those still queued.
    pub(crate) fn close(&mut self) -> Vec<Letter> {
        self.closed = true;
        self.letters.drain(..).collect()
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.letters.len()
    }
}
