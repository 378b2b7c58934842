//! The error module for this crate.
//!
//! There is a single closed [`Error`] enum able to represent every failure
//! kind a caller can trigger. Nothing in the core swallows an error or
//! retries internally; every fallible operation returns a `Result` and
//! lets the caller decide.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use crate::entity::Entity;

/// The error type for this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A component type was registered twice on the same `World`.
    ComponentAlreadyAdded {
        /// The type name of the offending component.
        type_name: &'static str,
    },
    /// `ComponentService::mapper::<T>()` was called for a type that was
    /// never registered.
    NoSuchComponent {
        /// The type name that has no mapper.
        type_name: &'static str,
    },
    /// `ComponentMapper::remove` was called for an entity that does not
    /// currently have that component.
    NoSuchEntityComponent {
        /// The type name of the missing component.
        type_name: &'static str,
        /// The entity that lacks the component.
        entity: Entity,
    },
    /// A system type was registered twice on the same `World`.
    SystemAlreadyAdded {
        /// The type name of the offending system.
        type_name: &'static str,
    },
    /// `World::system::<T>()` was called for a type that isn't registered.
    NoSuchSystem {
        /// The type name that has no matching system.
        type_name: &'static str,
    },
    /// A family predicate had empty `all_of`, `none_of`, and `any_of` sets.
    FamilyEmpty,
    /// `ComponentMapper::remove_internal` was called for an entity id past
    /// the mapper's current backing array length.
    IndexOutOfBounds {
        /// The out-of-range entity.
        entity: Entity,
    },
    /// `Injector::get::<T>(name)` found no value (or a value of the wrong
    /// type) under `name`.
    InjectableNotFound {
        /// The name that was looked up.
        name: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::ComponentAlreadyAdded { type_name } => {
                write!(f, "component `{type_name}` was already registered")
            }
            Error::NoSuchComponent { type_name } => {
                write!(f, "no mapper registered for component `{type_name}`")
            }
            Error::NoSuchEntityComponent { type_name, entity } => write!(
                f,
                "entity {entity:?} does not have component `{type_name}`"
            ),
            Error::SystemAlreadyAdded { type_name } => {
                write!(f, "system `{type_name}` was already registered")
            }
            Error::NoSuchSystem { type_name } => {
                write!(f, "no system of type `{type_name}` is registered")
            }
            Error::FamilyEmpty => {
                write!(f, "family predicate has empty all_of, none_of, and any_of")
            }
            Error::IndexOutOfBounds { entity } => write!(
                f,
                "entity {entity:?} id exceeds the mapper's backing array length"
            ),
            Error::InjectableNotFound { name } => {
                write!(f, "no injectable named `{name}` of the requested type")
            }
        }
    }
}

impl StdError for Error {}
