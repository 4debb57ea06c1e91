//! Stable identities for scenarios, layers and features
//!
//! Provides [`Identity`], the caller-generated key that joins a logical
//! feature, layer or scenario across every representation and across the
//! local/remote boundary.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Stable unique key for a record or feature
///
/// Identities are opaque strings. They are never derived from object
/// position, so they survive serialization, reloads and round trips through
/// geometry services that drop everything but attribute values.
///
/// # Examples
/// - `"5f0c7d0e-3c1b-4a8f-9e62-1f6b8d2a7c44"` (generated)
/// - `"plan-a"` (caller supplied)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create identity from a caller-supplied key
    ///
    /// # Errors
    /// Returns error if the key is empty or only whitespace
    pub fn new(key: impl Into<String>) -> Result<Self, ModelError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ModelError::EmptyIdentity);
        }
        Ok(Self(key))
    }

    /// Generate a fresh random identity
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the underlying key
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying key
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}
