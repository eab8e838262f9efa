//! Member registration tables for statically known backing types.
//!
//! A [`TypeShape`] is the explicit stand-in for runtime reflection: the host
//! registers, once at startup, every member of a backing type it wants to
//! expose (getters, fields, zero-argument methods) together with a read
//! function. Members the host cannot expose are registered too, so name
//! resolution can tell "unsupported" apart from "unknown".
//!
//! ```
//! use propsrv_core::{MemberKind, TypeShape};
//!
//! struct Status { rpms: i32, speed_kmh: f64 }
//!
//! let shape = TypeShape::builder::<Status>("StatusData")
//!     .getter("Rpms", |s: &Status| s.rpms)
//!     .field("SpeedKmh", |s: &Status| s.speed_kmh)
//!     .unsupported(MemberKind::Getter, "SessionTimeLeft", "TimeSpan")
//!     .build();
//! assert_eq!(shape.len(), 3);
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AccessError;
use crate::value::{MemberValue, PropertyValue, ValueType};

/// A type-erased backing object handed over by the host on every tick.
pub type SourceObject = dyn Any + Send + Sync;

/// Type-erased read function of one registered member.
pub(crate) type ReadFn =
    Arc<dyn Fn(&SourceObject) -> Result<Option<PropertyValue>, AccessError> + Send + Sync>;

/// How a member is exposed by its backing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Getter,
    Field,
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Getter => "getter",
            Self::Field => "field",
            Self::Method => "method",
        };
        f.write_str(name)
    }
}

/// Declared type of a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberType {
    /// A type from the wire vocabulary
    Value(ValueType),
    /// Any other type, named for diagnostics
    Unsupported(String),
}

impl MemberType {
    /// Returns the allow-listed value type for a member of `kind`, if any.
    ///
    /// Numbers and booleans are allowed everywhere; strings only for getters.
    pub fn allowed_for(&self, kind: MemberKind) -> Option<ValueType> {
        match self {
            Self::Value(ty) if ty.is_primitive() => Some(*ty),
            Self::Value(ValueType::String) if kind == MemberKind::Getter => Some(ValueType::String),
            _ => None,
        }
    }

    /// Name of the type for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Self::Value(ty) => ty.wire_name().to_string(),
            Self::Unsupported(name) => name.clone(),
        }
    }
}

/// One registered member of a backing type.
#[derive(Clone)]
pub struct MemberInfo {
    name: String,
    kind: MemberKind,
    member_type: MemberType,
    parameters: usize,
    read: Option<ReadFn>,
}

impl MemberInfo {
    /// Plain member name, without source prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn member_type(&self) -> &MemberType {
        &self.member_type
    }

    /// Number of parameters (methods only; zero otherwise).
    pub fn parameters(&self) -> usize {
        self.parameters
    }

    /// Returns the allow-listed value type and read function if this member
    /// can back a property.
    pub(crate) fn resolvable(&self) -> Option<(ValueType, ReadFn)> {
        if self.parameters > 0 {
            return None;
        }
        let value_type = self.member_type.allowed_for(self.kind)?;
        let read = self.read.clone()?;
        Some((value_type, read))
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("member_type", &self.member_type)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Registered members of one backing type, split by member kind.
#[derive(Debug, Clone)]
pub struct TypeShape {
    type_name: &'static str,
    getters: BTreeMap<String, MemberInfo>,
    fields: BTreeMap<String, MemberInfo>,
    methods: BTreeMap<String, MemberInfo>,
}

impl TypeShape {
    /// Starts a registration table for backing type `T`.
    pub fn builder<T: Any + Send + Sync>(type_name: &'static str) -> TypeShapeBuilder<T> {
        TypeShapeBuilder {
            shape: TypeShape {
                type_name,
                getters: BTreeMap::new(),
                fields: BTreeMap::new(),
                methods: BTreeMap::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Looks up a member as a getter, then a field, then a method.
    pub fn lookup(&self, name: &str) -> Option<&MemberInfo> {
        self.getters
            .get(name)
            .or_else(|| self.fields.get(name))
            .or_else(|| self.methods.get(name))
    }

    /// Iterates all members: getters, fields, then methods, each by name.
    pub fn members(&self) -> impl Iterator<Item = &MemberInfo> {
        self.getters
            .values()
            .chain(self.fields.values())
            .chain(self.methods.values())
    }

    pub fn len(&self) -> usize {
        self.getters.len() + self.fields.len() + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for [`TypeShape`]; read functions take `&T`.
pub struct TypeShapeBuilder<T> {
    shape: TypeShape,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> TypeShapeBuilder<T> {
    /// Registers a readable property.
    pub fn getter<V, F>(self, name: &str, read: F) -> Self
    where
        V: MemberValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.readable(MemberKind::Getter, name, read)
    }

    /// Registers a public field.
    pub fn field<V, F>(self, name: &str, read: F) -> Self
    where
        V: MemberValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.readable(MemberKind::Field, name, read)
    }

    /// Registers a zero-argument method.
    pub fn method<V, F>(self, name: &str, call: F) -> Self
    where
        V: MemberValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.readable(MemberKind::Method, name, call)
    }

    /// Registers a method that needs arguments. It is known but never resolvable.
    pub fn method_with_parameters(mut self, name: &str, parameters: usize, return_type: MemberType) -> Self {
        let info = MemberInfo {
            name: name.to_string(),
            kind: MemberKind::Method,
            member_type: return_type,
            parameters,
            read: None,
        };
        self.shape.methods.insert(name.to_string(), info);
        self
    }

    /// Registers a member whose type is outside the allow-list.
    pub fn unsupported(mut self, kind: MemberKind, name: &str, type_name: &str) -> Self {
        let info = MemberInfo {
            name: name.to_string(),
            kind,
            member_type: MemberType::Unsupported(type_name.to_string()),
            parameters: 0,
            read: None,
        };
        self.table(kind).insert(name.to_string(), info);
        self
    }

    pub fn build(self) -> TypeShape {
        self.shape
    }

    fn readable<V, F>(mut self, kind: MemberKind, name: &str, read: F) -> Self
    where
        V: MemberValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let expected = self.shape.type_name;
        let read: ReadFn = Arc::new(move |raw: &SourceObject| {
            let typed = raw
                .downcast_ref::<T>()
                .ok_or(AccessError::TypeMismatch { expected })?;
            Ok(read(typed).into_member_value())
        });
        let info = MemberInfo {
            name: name.to_string(),
            kind,
            member_type: MemberType::Value(V::VALUE_TYPE),
            parameters: 0,
            read: Some(read),
        };
        self.table(kind).insert(name.to_string(), info);
        self
    }

    fn table(&mut self, kind: MemberKind) -> &mut BTreeMap<String, MemberInfo> {
        match kind {
            MemberKind::Getter => &mut self.shape.getters,
            MemberKind::Field => &mut self.shape.fields,
            MemberKind::Method => &mut self.shape.methods,
        }
    }
}
