//! propsrv Core - Shared types for the property server
//!
//! This crate provides the domain types shared between the protocol
//! crate and the daemon: property sources, values, the member
//! registration tables that replace runtime reflection, and the
//! [`PropertyRegistry`] that resolves qualified names.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod descriptor;
pub mod effects;
pub mod error;
pub mod registry;
pub mod shape;
pub mod source;
pub mod table;
pub mod value;

// Re-exports for convenience
pub use descriptor::{AccessorKind, PropertyDescriptor};
pub use effects::{EffectAttribute, EffectContainer, EffectProfile, EffectTree};
pub use error::{AccessError, ResolutionError};
pub use registry::{PropertyRegistry, PropertyRegistryBuilder};
pub use shape::{MemberInfo, MemberKind, MemberType, SourceObject, TypeShape, TypeShapeBuilder};
pub use source::{PropertySource, PREFIX_SEPARATOR};
pub use table::PropertyTable;
pub use value::{is_change, MemberValue, PropertyValue, ValueType};
