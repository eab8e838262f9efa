//! Property values and the type vocabulary used on the wire.

use std::fmt;

/// Type of a property value as reported to clients.
///
/// `Float` and `Double` share the wire name `double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    String,
    Object,
    Unknown,
}

impl ValueType {
    /// Returns the wire name of this type.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float | Self::Double => "double",
            Self::String => "string",
            Self::Object => "object",
            Self::Unknown => "(unknown)",
        }
    }

    /// Returns true for the numeric and boolean types every accessor kind supports.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::Integer | Self::Long | Self::Float | Self::Double
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A type-erased property value.
///
/// Equality is value equality, except that floating point values compare by
/// bit pattern: a repeated `NaN` is equal to itself, while `0.0` and `-0.0`
/// differ. Values of different variants are never equal.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// Opaque host object, carried as its textual rendering.
    Object(String),
    /// Host value of a type outside the wire vocabulary.
    Other(String),
}

impl PropertyValue {
    /// Returns the wire type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Boolean,
            Self::Int(_) => ValueType::Integer,
            Self::Long(_) => ValueType::Long,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::Str(_) => ValueType::String,
            Self::Object(_) => ValueType::Object,
            Self::Other(_) => ValueType::Unknown,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Other(a), Self::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(s) | Self::Object(s) | Self::Other(s) => f.write_str(s),
        }
    }
}

/// Returns true if moving from `old` to `new` is a value change.
///
/// Absent-to-present and present-to-absent transitions are changes.
pub fn is_change(old: Option<&PropertyValue>, new: Option<&PropertyValue>) -> bool {
    old != new
}

/// Conversion from the Rust types a member may expose into a property value.
///
/// Implemented for the allow-listed types and for `Option` of each, where
/// `None` maps to an absent value.
pub trait MemberValue {
    /// Static type of the member.
    const VALUE_TYPE: ValueType;

    /// Converts into a (possibly absent) property value.
    fn into_member_value(self) -> Option<PropertyValue>;
}

macro_rules! member_value {
    ($ty:ty, $value_type:expr, $variant:ident) => {
        impl MemberValue for $ty {
            const VALUE_TYPE: ValueType = $value_type;

            fn into_member_value(self) -> Option<PropertyValue> {
                Some(PropertyValue::$variant(self))
            }
        }

        impl MemberValue for Option<$ty> {
            const VALUE_TYPE: ValueType = $value_type;

            fn into_member_value(self) -> Option<PropertyValue> {
                self.map(PropertyValue::$variant)
            }
        }
    };
}

member_value!(bool, ValueType::Boolean, Bool);
member_value!(i32, ValueType::Integer, Int);
member_value!(i64, ValueType::Long, Long);
member_value!(f32, ValueType::Float, Float);
member_value!(f64, ValueType::Double, Double);
member_value!(String, ValueType::String, Str);
