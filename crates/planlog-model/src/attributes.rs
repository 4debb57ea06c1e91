//! Open attribute bags
//!
//! Features carry an ordered map of string keys to small scalar values
//! ([`AttrValue`]). A handful of keys are reserved (see [`reserved`]) and are
//! checked by [`Attributes::validate`] when a feature enters the edit log.

use crate::error::ModelError;
use crate::identity::Identity;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Reserved attribute keys
pub mod reserved {
    /// Local identity, duplicated into attributes for join-by-value
    pub const IDENTITY: &str = "PERMANENT_IDENTIFIER";
    /// Remote global id (GUID string)
    pub const GLOBAL_ID: &str = "GLOBALID";
    /// Remote object id (integer)
    pub const OBJECT_ID: &str = "OBJECTID";
    /// Feature type name used for renderers and calculations
    pub const TYPE: &str = "TYPE";
    /// Identity of the feature type
    pub const TYPE_UUID: &str = "TYPEUUID";
    /// Named point style for point mirrors
    pub const POINT_STYLE: &str = "POINT_STYLE";
}

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttrValue {
    /// Missing value
    #[default]
    Null,
    /// Boolean flag
    Bool(bool),
    /// Any numeric value
    Number(f64),
    /// Text value
    Text(String),
}

impl AttrValue {
    /// Text content, if this is a text value
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a number
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Check for null
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttrValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered attribute map
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, AttrValue>);

impl Attributes {
    /// Create empty attribute map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value, returning the previous one
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    /// Text value for a key
    #[inline]
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_text)
    }

    /// Remove a key, preserving order of the rest
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.shift_remove(key)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check for no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in insertion order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Feature type name (`TYPE`)
    #[inline]
    #[must_use]
    pub fn feature_type(&self) -> Option<&str> {
        self.text(reserved::TYPE)
    }

    /// Remote global id (`GLOBALID`)
    #[inline]
    #[must_use]
    pub fn global_id(&self) -> Option<&str> {
        self.text(reserved::GLOBAL_ID)
    }

    /// Named point style (`POINT_STYLE`)
    #[inline]
    #[must_use]
    pub fn point_style(&self) -> Option<&str> {
        self.text(reserved::POINT_STYLE)
    }

    /// Validate reserved keys against the owning feature's identity
    ///
    /// A missing identity key is filled in; a present one must match.
    ///
    /// # Errors
    /// Returns error if a reserved key holds a value of the wrong kind or the
    /// identity attribute names a different feature
    pub fn validate(&mut self, identity: &Identity) -> Result<(), ModelError> {
        match self.get(reserved::IDENTITY) {
            None | Some(AttrValue::Null) => {
                self.insert(reserved::IDENTITY, identity.as_str());
            }
            Some(AttrValue::Text(value)) if value == identity.as_str() => {}
            Some(AttrValue::Text(value)) => {
                return Err(ModelError::IdentityMismatch {
                    identity: identity.to_string(),
                    attribute: value.clone(),
                });
            }
            Some(other) => {
                return Err(ModelError::InvalidAttribute {
                    key: reserved::IDENTITY,
                    expected: "text",
                    actual: other.kind().to_string(),
                });
            }
        }

        if let Some(value) = self.get(reserved::OBJECT_ID) {
            if !matches!(value, AttrValue::Number(_) | AttrValue::Null) {
                return Err(ModelError::InvalidAttribute {
                    key: reserved::OBJECT_ID,
                    expected: "a number",
                    actual: value.kind().to_string(),
                });
            }
        }

        for key in [
            reserved::GLOBAL_ID,
            reserved::TYPE,
            reserved::TYPE_UUID,
            reserved::POINT_STYLE,
        ] {
            if let Some(value) = self.get(key) {
                if !matches!(value, AttrValue::Text(_) | AttrValue::Null) {
                    return Err(ModelError::InvalidAttribute {
                        key,
                        expected: "text",
                        actual: value.kind().to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
