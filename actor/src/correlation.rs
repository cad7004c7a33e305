// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Correlation keys
//!
//! A correlation key pairs a send with its eventual reply. The actor system
//! issues a fresh key for every uncorrelated `tell` through a
//! [`CorrelationKeyGenerator`].
//!

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Opaque token pairing a request with its reply.
#[derive(
    Clone, Default, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Sentinel carried by messages that are not correlated yet.
    pub const UNCORRELATED: CorrelationKey = CorrelationKey(String::new());

    pub fn wrap(token: impl Into<String>) -> Self {
        CorrelationKey(token.into())
    }

    /// False for the sentinel (and any empty token).
    pub fn is_represent_correlated(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_represent_correlated() {
            write!(f, "CorrelationKey({})", self.0)
        } else {
            f.write_str("CorrelationKey(UNCORRELATED)")
        }
    }
}

/// Source of fresh correlation keys.
pub trait CorrelationKeyGenerator: Send + Sync + 'static {
    fn generate(&self) -> CorrelationKey;
}

impl<F> CorrelationKeyGenerator for F
where
    F: Fn() -> CorrelationKey + Send + Sync + 'static,
{
    fn generate(&self) -> CorrelationKey {
        self()
    }
}

/// Generates `<instance_id>:<uuid>` keys.
#[derive(Clone, Debug)]
pub struct InstanceKeyGenerator {
    instance_id: String,
}

impl InstanceKeyGenerator {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl Default for InstanceKeyGenerator {
    /// Generator with a random instance id.
    fn default() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

impl CorrelationKeyGenerator for InstanceKeyGenerator {
    fn generate(&self) -> CorrelationKey {
        CorrelationKey(format!("{}:{}", self.instance_id, Uuid::new_v4()))
    }
}
