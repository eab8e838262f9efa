//! Resolution and accessor error types following the panic-free policy.

use thiserror::Error;

use crate::shape::MemberKind;

/// Reasons a qualified property name cannot be resolved.
///
/// The `Display` text is sent to clients verbatim after `ERR: `.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The name matched a source prefix whose backing data is not registered
    #[error("Property {name} uses prefix '{prefix}', which has no backing data")]
    UnknownPrefix { name: String, prefix: String },

    /// The member exists but its type is not allow-listed
    #[error("Property {name} (which is a {kind}) is not supported")]
    UnsupportedType {
        name: String,
        kind: MemberKind,
        type_name: String,
    },

    /// The member is a method that needs arguments
    #[error("Property {name} (which is a method) takes {parameters} parameters and is not supported")]
    ParameterizedMethod { name: String, parameters: usize },

    /// No getter, field, or method with this name exists
    #[error("Property {name} is unknown")]
    MemberNotFound { name: String },

    /// Effect-group name is not `<prefix>.<uuid>.<attribute>`
    #[error("Property {name} is not in the expected format {prefix}.<uuid>.<attribute>")]
    MalformedEffectName { name: String, prefix: String },

    /// Effect-group name carries an invalid UUID
    #[error("Property {name} does not contain a valid UUID")]
    InvalidUuid { name: String },

    /// Effect-group attribute is not one of `gain`, `isMuted`
    #[error("Unknown effect attribute '{attribute}' in {name}")]
    UnknownEffectAttribute { name: String, attribute: String },
}

/// Failures while reading the current value of a resolved property.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The backing object is not of the type the accessor was built for
    #[error("Backing object is not a {expected}")]
    TypeMismatch { expected: &'static str },

    /// The accessor panicked
    #[error("Accessor for {member} panicked")]
    Panicked { member: String },
}
