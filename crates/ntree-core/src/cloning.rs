//! Value cloning strategies.
//!
//! A tree copies node values whenever it clones nodes (grafting a copy of a
//! caller's node, cloning the whole tree, taking a snapshot). Which copy is
//! used is tree configuration: plain `Clone`, or a JSON round-trip through
//! the serialization collaborator.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec;

/// How node values are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCloningMode {
    /// Use the value's `Clone` implementation.
    #[default]
    ByCopy,
    /// Encode to JSON and decode again.
    BySerialization,
}

/// Serializable part of a [`ValueCloning`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValueCloningConfig {
    pub mode: ValueCloningMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_descriptor: Option<String>,
}

/// A value cloning strategy: the mode, an optional type descriptor, and the
/// copy function resolved for `V` when the strategy was built.
pub struct ValueCloning<V> {
    config: ValueCloningConfig,
    copier: fn(&V) -> Option<V>,
}

fn copy_by_clone<V: Clone>(value: &V) -> Option<V> {
    Some(codec::deep_copy_via_clone(value))
}

fn copy_by_serialization<V: Serialize + DeserializeOwned>(value: &V) -> Option<V> {
    match codec::deep_copy(value) {
        Ok(copy) => Some(copy),
        Err(err) => {
            tracing::warn!(error = %err, "serialization copy failed, value dropped");
            None
        }
    }
}

impl<V: Clone> ValueCloning<V> {
    /// Copy values with `Clone`.
    #[must_use]
    pub fn by_copy() -> Self {
        Self {
            config: ValueCloningConfig::default(),
            copier: copy_by_clone::<V>,
        }
    }
}

impl<V: Serialize + DeserializeOwned> ValueCloning<V> {
    /// Copy values by a JSON round-trip.
    ///
    /// The type descriptor is carried as configuration and reported in decode
    /// errors; the concrete type is always `V`.
    #[must_use]
    pub fn by_serialization(type_descriptor: Option<&str>) -> Self {
        Self {
            config: ValueCloningConfig {
                mode: ValueCloningMode::BySerialization,
                type_descriptor: type_descriptor.map(str::to_owned),
            },
            copier: copy_by_serialization::<V>,
        }
    }
}

impl<V: Clone + Serialize + DeserializeOwned> ValueCloning<V> {
    /// Rebuild a strategy from its serialized configuration.
    #[must_use]
    pub fn from_config(config: &ValueCloningConfig) -> Self {
        match config.mode {
            ValueCloningMode::ByCopy => Self::by_copy(),
            ValueCloningMode::BySerialization => {
                Self::by_serialization(config.type_descriptor.as_deref())
            }
        }
    }
}

impl<V> ValueCloning<V> {
    #[must_use]
    pub fn mode(&self) -> ValueCloningMode {
        self.config.mode
    }

    #[must_use]
    pub fn type_descriptor(&self) -> Option<&str> {
        self.config.type_descriptor.as_deref()
    }

    #[must_use]
    pub fn config(&self) -> &ValueCloningConfig {
        &self.config
    }

    /// Copy a value. `None` means the copy failed and the clone carries no value.
    pub fn copy_value(&self, value: &V) -> Option<V> {
        (self.copier)(value)
    }

    pub(crate) fn copy_optional(&self, value: Option<&V>) -> Option<V> {
        value.and_then(|v| self.copy_value(v))
    }
}

impl<V> Clone for ValueCloning<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            copier: self.copier,
        }
    }
}

impl<V> PartialEq for ValueCloning<V> {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl<V> fmt::Debug for ValueCloning<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCloning")
            .field("mode", &self.config.mode)
            .field("type_descriptor", &self.config.type_descriptor)
            .finish()
    }
}

impl<V: Clone> Default for ValueCloning<V> {
    fn default() -> Self {
        Self::by_copy()
    }
}
