//! Resolved property descriptors.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use uuid::Uuid;

use crate::effects::{EffectAttribute, EffectTree};
use crate::error::AccessError;
use crate::shape::{ReadFn, SourceObject};
use crate::source::PropertySource;
use crate::table::PropertyTable;
use crate::value::{PropertyValue, ValueType};

/// How a descriptor reads its value, fixed at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Getter,
    Field,
    Method,
    Generic,
    EffectAttribute,
}

/// The read strategy behind a descriptor.
#[derive(Clone)]
pub(crate) enum Accessor {
    Getter(ReadFn),
    Field(ReadFn),
    Method(ReadFn),
    /// Looks the qualified name up in a [`PropertyTable`]
    Generic,
    /// Reads an attribute of an effect container in an [`EffectTree`]
    EffectAttribute { id: Uuid, attribute: EffectAttribute },
}

impl Accessor {
    fn kind(&self) -> AccessorKind {
        match self {
            Self::Getter(_) => AccessorKind::Getter,
            Self::Field(_) => AccessorKind::Field,
            Self::Method(_) => AccessorKind::Method,
            Self::Generic => AccessorKind::Generic,
            Self::EffectAttribute { .. } => AccessorKind::EffectAttribute,
        }
    }
}

/// Immutable result of resolving a qualified property name.
///
/// Cheap to clone; the read function is shared.
#[derive(Clone)]
pub struct PropertyDescriptor {
    source: PropertySource,
    qualified_name: Arc<str>,
    value_type: ValueType,
    accessor: Accessor,
}

impl PropertyDescriptor {
    pub(crate) fn new(
        source: PropertySource,
        qualified_name: &str,
        value_type: ValueType,
        accessor: Accessor,
    ) -> Self {
        Self {
            source,
            qualified_name: Arc::from(qualified_name),
            value_type,
            accessor,
        }
    }

    pub fn source(&self) -> PropertySource {
        self.source
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Shared handle to the qualified name.
    pub fn name_handle(&self) -> Arc<str> {
        Arc::clone(&self.qualified_name)
    }

    pub fn accessor_kind(&self) -> AccessorKind {
        self.accessor.kind()
    }

    /// Declared value type. Generic descriptors declare `Object`.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Reads the current value from a fresh backing object.
    ///
    /// An absent backing object yields an absent value. A panicking read
    /// function is reported as [`AccessError::Panicked`].
    pub fn read(&self, raw: Option<&SourceObject>) -> Result<Option<PropertyValue>, AccessError> {
        let Some(raw) = raw else {
            return Ok(None);
        };

        match &self.accessor {
            Accessor::Getter(read) | Accessor::Field(read) | Accessor::Method(read) => {
                catch_unwind(AssertUnwindSafe(|| read(raw))).unwrap_or_else(|_| {
                    Err(AccessError::Panicked {
                        member: self.qualified_name.to_string(),
                    })
                })
            }
            Accessor::Generic => {
                let table = raw
                    .downcast_ref::<PropertyTable>()
                    .ok_or(AccessError::TypeMismatch {
                        expected: "PropertyTable",
                    })?;
                Ok(table.get(&self.qualified_name).cloned())
            }
            Accessor::EffectAttribute { id, attribute } => {
                let tree = raw
                    .downcast_ref::<EffectTree>()
                    .ok_or(AccessError::TypeMismatch {
                        expected: "EffectTree",
                    })?;
                Ok(tree.find(*id).map(|c| attribute.read(c)))
            }
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("source", &self.source)
            .field("qualified_name", &self.qualified_name)
            .field("accessor_kind", &self.accessor_kind())
            .field("value_type", &self.value_type)
            .finish()
    }
}
