//! Statically-typed service interface identifiers.
//!
//! Components declare the interfaces they offer and require as Rust types,
//! registered explicitly at construction. An [`InterfaceId`] names one such
//! interface: it pairs the `TypeId` of the service type with its type name
//! for display, so declarations are checked by the compiler rather than
//! discovered at runtime.
//!
//! # Examples
//!
//! ```
//! use quay_core::interface::InterfaceId;
//!
//! trait Arithmetic: Send + Sync {
//!     fn add(&self, a: i64, b: i64) -> i64;
//! }
//!
//! let id = InterfaceId::of::<dyn Arithmetic>();
//! assert_eq!(id, InterfaceId::of::<dyn Arithmetic>());
//! assert!(id.name().contains("Arithmetic"));
//! ```

use std::any::TypeId;
use std::fmt;

/// Identifier of a service interface.
///
/// Two `InterfaceId`s are equal exactly when they were derived from the
/// same Rust type. The captured type name is used for display and for the
/// serializable self-description of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceId {
    id: TypeId,
    name: &'static str,
}

impl InterfaceId {
    /// Derive the identifier of the interface type `I`.
    ///
    /// `I` is usually a `dyn Trait` naming the service contract, but any
    /// `'static` type works.
    pub fn of<I: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<I>(),
            name: std::any::type_name::<I>(),
        }
    }

    /// The full type name of the interface.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait ServiceA: Send + Sync {}
    trait ServiceB: Send + Sync {}

    #[test]
    fn test_interface_identity() {
        assert_eq!(InterfaceId::of::<dyn ServiceA>(), InterfaceId::of::<dyn ServiceA>());
        assert_ne!(InterfaceId::of::<dyn ServiceA>(), InterfaceId::of::<dyn ServiceB>());
    }

    #[test]
    fn test_interface_name() {
        let id = InterfaceId::of::<dyn ServiceA>();
        assert!(id.name().contains("ServiceA"));
        assert_eq!(id.to_string(), id.name());
    }
}
