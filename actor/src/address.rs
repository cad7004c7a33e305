// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor addressing
//!
//! The `address` module provides [`ActorName`] and [`ActorAddress`].
//!
//! An actor name is a dot-separated hierarchical token such as `SYSTEM.DEAD_LETTER`
//! or `PARSER.WORKER-1`. Names can be derived from one another to scope children
//! under their creator. An address wraps a name in the canonical text form
//! `urn:actor:<name>`. Addresses are process-local tokens: they identify an actor
//! inside one [`ActorSystem`](crate::ActorSystem) and carry no location.
//!

use crate::Error;

use serde::{Deserialize, Serialize};

use std::{fmt, str::FromStr};

/// Separator between name segments.
const SEPARATOR: char = '.';

/// Prefix of the canonical address form.
const URN_PREFIX: &str = "urn:actor:";

/// Text form of the reserved dead-letter address.
pub const DEAD_LETTER_URN: &str = "urn:actor:SYSTEM.DEAD_LETTER";

/// Validated hierarchical actor name.
///
/// A name is made of one or more segments separated by `.`. Each segment is
/// non-empty and contains only ASCII alphanumerics, `_` or `-`.
///
/// ```ignore
/// use actor::ActorName;
///
/// let base = ActorName::of("BASE")?;
/// let derived = base.derive_with(&ActorName::of("DERIVED")?);
/// assert_eq!(derived.as_str(), "BASE.DERIVED");
/// ```
#[derive(
    Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ActorName(String);

impl ActorName {
    /// Validates and wraps `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] for an empty name, an empty segment, or a
    /// character outside `[A-Za-z0-9_-]` within a segment.
    pub fn of(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.split(SEPARATOR).all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
        if valid {
            Ok(ActorName(name))
        } else {
            Err(Error::InvalidName(name))
        }
    }

    /// Joins `other` under this name: `BASE` derived with `CHILD` is `BASE.CHILD`.
    pub fn derive_with(&self, other: &ActorName) -> ActorName {
        ActorName(format!("{}{}{}", self.0, SEPARATOR, other.0))
    }

    /// Last segment of the name.
    pub fn key(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Name this one was derived from, if any.
    pub fn parent(&self) -> Option<ActorName> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| ActorName(parent.to_owned()))
    }

    /// True if this name was derived, directly or not, from `other`.
    pub fn is_descendant_of(&self, other: &ActorName) -> bool {
        self.0.len() > other.0.len()
            && self.0.starts_with(&other.0)
            && self.0[other.0.len()..].starts_with(SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ActorName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActorName::of(s)
    }
}

impl TryFrom<String> for ActorName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ActorName::of(value)
    }
}

impl From<ActorName> for String {
    fn from(name: ActorName) -> Self {
        name.0
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical address of an actor, rendered as `urn:actor:<name>`.
#[derive(
    Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ActorAddress(ActorName);

impl ActorAddress {
    /// Parses the canonical text form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the text does not start with
    /// `urn:actor:` or the remainder is not a valid name.
    pub fn of_urn(urn: &str) -> Result<Self, Error> {
        urn.strip_prefix(URN_PREFIX)
            .and_then(|name| ActorName::of(name).ok())
            .map(ActorAddress)
            .ok_or_else(|| Error::InvalidAddress(urn.to_owned()))
    }

    pub fn of_name(name: ActorName) -> Self {
        ActorAddress(name)
    }

    /// The reserved dead-letter address.
    pub fn dead_letter() -> Self {
        ActorAddress(ActorName("SYSTEM.DEAD_LETTER".to_owned()))
    }

    pub fn is_dead_letter(&self) -> bool {
        self.0.as_str() == "SYSTEM.DEAD_LETTER"
    }

    pub fn actor_name(&self) -> &ActorName {
        &self.0
    }

    pub fn to_urn(&self) -> String {
        format!("{}{}", URN_PREFIX, self.0)
    }
}

impl From<ActorName> for ActorAddress {
    fn from(name: ActorName) -> Self {
        ActorAddress(name)
    }
}

impl FromStr for ActorAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActorAddress::of_urn(s)
    }
}

impl TryFrom<String> for ActorAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ActorAddress::of_urn(&value)
    }
}

impl From<ActorAddress> for String {
    fn from(address: ActorAddress) -> Self {
        address.to_urn()
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", URN_PREFIX, self.0)
    }
}

impl fmt::Debug for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
