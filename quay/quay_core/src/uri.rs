//! Strongly-typed URIs for the Quay component runtime.
//!
//! Every addressable entity in the runtime — ports, executor pools,
//! plugins — is identified by a URI. This module provides a thin typed
//! wrapper around the URI string with a phantom type parameter so that
//! identifiers for different entity kinds cannot be mixed up.
//!
//! # Examples
//!
//! ```
//! use quay_core::uri::{PoolUri, PortUri};
//!
//! let pool = PoolUri::new("quay:pool:requests");
//! assert_eq!(pool.as_str(), "quay:pool:requests");
//!
//! // Generated URIs carry a random suffix and never collide in practice
//! let a = PortUri::generated("quay:component");
//! let b = PortUri::generated("quay:component");
//! assert_ne!(a, b);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A type-safe URI.
///
/// This is a generic identifier type specialized for the different entity
/// kinds using the phantom type parameter `T`. Two URIs of different kinds
/// never compare equal because they are different types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Uri<T> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Uri<T> {
    /// Create a URI from the given string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// Create a URI with the given prefix and a random UUID suffix.
    ///
    /// Used wherever the runtime mints an identity on behalf of the
    /// caller, most prominently for reflection ports.
    pub fn generated(prefix: &str) -> Self {
        Self::new(format!("{}:{}", prefix, Uuid::new_v4()))
    }

    /// View the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Check whether the URI is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl<T> fmt::Display for Uri<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> FromStr for Uri<T> {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl<T> From<&str> for Uri<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T> From<String> for Uri<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T> AsRef<str> for Uri<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Marker type for ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortMarker;
/// URI of a port. A component's identity is its reflection port's URI.
pub type PortUri = Uri<PortMarker>;

/// Marker type for executor pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolMarker;
/// URI of an executor pool, unique within its owning component.
pub type PoolUri = Uri<PoolMarker>;

/// Marker type for plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginMarker;
/// URI of a plugin, unique within its owning component.
pub type PluginUri = Uri<PluginMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_new() {
        let uri = PortUri::new("quay:port:inbound");
        assert_eq!(uri.as_str(), "quay:port:inbound");
        assert!(!uri.is_empty());
    }

    #[test]
    fn test_uri_generated_unique() {
        let a = PoolUri::generated("quay:pool");
        let b = PoolUri::generated("quay:pool");
        assert_ne!(a, b, "Generated URIs should be unique");
        assert!(a.as_str().starts_with("quay:pool:"));
    }

    #[test]
    fn test_uri_display() {
        let uri = PluginUri::new("quay:plugin:audit");
        assert_eq!(uri.to_string(), "quay:plugin:audit");
    }

    #[test]
    fn test_uri_from_str() {
        let uri: PortUri = "quay:port:out".parse().unwrap();
        assert_eq!(uri.as_str(), "quay:port:out");
    }

    #[test]
    fn test_type_safety() {
        // Different URI kinds are different types, even with equal text.
        let port = PortUri::new("quay:shared");
        let pool = PoolUri::new("quay:shared");
        assert_eq!(port.as_str(), pool.as_str());
        // This would not compile:
        // assert_eq!(port, pool);
    }

    #[test]
    fn test_uri_serde() {
        let uri = PortUri::new("quay:port:echo");
        let serialized = serde_json::to_string(&uri).unwrap();
        let deserialized: PortUri = serde_json::from_str(&serialized).unwrap();
        assert_eq!(uri, deserialized);
    }
}
