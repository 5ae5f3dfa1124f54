//! Station callsign identity
//!
//! A [`Callsign`] is the unique key for a station within a session. Weak
//! signals decode into garbage often enough that every callsign coming off
//! the air is validated before it can name a station: only `0-9`, `A-Z`
//! and `/` are accepted. Group addresses (`@NET`, `@ALLCALL`, ...) have no
//! geographic location and are rejected outright.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Validated, normalized station callsign
///
/// Equality and hashing are by the normalized string, so a callsign is a
/// stable identity across the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Callsign(String);

impl Callsign {
    /// Parse and normalize a callsign
    ///
    /// Leading/trailing whitespace is trimmed and the result upper-cased
    /// before validation. Returns [`CoreError::GroupAddress`] for `@`
    /// prefixed group names and [`CoreError::InvalidCallsign`] for
    /// anything that does not match `^[0-9A-Z/]+$`.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let cleaned = raw.trim().to_ascii_uppercase();

        if cleaned.starts_with('@') {
            return Err(CoreError::GroupAddress(cleaned));
        }

        if cleaned.is_empty()
            || !cleaned
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase() || c == '/')
        {
            return Err(CoreError::InvalidCallsign(raw.to_string()));
        }

        Ok(Self(cleaned))
    }

    /// Get the callsign as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Callsign {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
