// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use crate::ActorAddress;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the actor system.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// The text is not a valid actor name.
    #[error("Invalid actor name: {0}.")]
    InvalidName(String),
    /// The text is not a valid `urn:actor:<name>` address.
    #[error("Invalid actor address: {0}.")]
    InvalidAddress(String),
    /// An actor is already registered under the address.
    #[error("Actor {0} exist.")]
    Exists(ActorAddress),
    /// No actor is registered under the address.
    #[error("Actor {0} not found.")]
    NotFound(ActorAddress),
    /// The actor system is not started, or already shut down.
    #[error("The actor system is not running.")]
    NotRunning,
    /// The interaction received a request of another type.
    #[error("Wrong request type, expected {expected}.")]
    WrongRequestType { expected: String },
    /// The interaction received a response of another type.
    #[error("Wrong response type, expected {expected}.")]
    WrongResponseType { expected: String },
    /// Behavior code panicked.
    #[error("Actor behavior panicked: {0}")]
    Panicked(String),
    /// Error that does not compromise the operation of the system.
    #[error("Error: {0}")]
    Functional(String),
}

impl Error {
    pub(crate) fn wrong_request_type<Q>() -> Self {
        Error::WrongRequestType {
            expected: std::any::type_name::<Q>().to_owned(),
        }
    }

    pub(crate) fn wrong_response_type<S>() -> Self {
        Error::WrongResponseType {
            expected: std::any::type_name::<S>().to_owned(),
        }
    }
}
