//! Lines sent from the server to clients.

use std::fmt;

use propsrv_core::{PropertyValue, ValueType};

/// Terminator of every line on the wire.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Rendering of an absent value.
pub const NULL_VALUE: &str = "(null)";

/// A single outbound line, without terminator.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerLine {
    /// Greeting sent once after accept: `<product> Property Server`
    Banner { product: String },

    /// Value notification: `Property <name> <type> <value>`
    Property {
        name: String,
        value_type: ValueType,
        value: Option<PropertyValue>,
    },

    /// `ERR: <message>`
    Error { message: String },

    /// Free text, used by the help listing
    Text { text: String },
}

impl ServerLine {
    pub fn banner(product: impl Into<String>) -> Self {
        Self::Banner {
            product: product.into(),
        }
    }

    pub fn property(name: impl Into<String>, value_type: ValueType, value: Option<PropertyValue>) -> Self {
        Self::Property {
            name: name.into(),
            value_type,
            value,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Builds the help listing from `(name, type)` pairs, sorted by name.
    pub fn help<I, S>(properties: I) -> Vec<ServerLine>
    where
        I: IntoIterator<Item = (S, ValueType)>,
        S: Into<String>,
    {
        let mut properties: Vec<(String, ValueType)> =
            properties.into_iter().map(|(n, t)| (n.into(), t)).collect();
        properties.sort_by(|a, b| a.0.cmp(&b.0));

        let mut lines = Vec::with_capacity(properties.len() + 7);
        lines.push(Self::text("Available properties:"));
        lines.extend(
            properties
                .into_iter()
                .map(|(name, ty)| Self::text(format!("  {name} {ty}"))),
        );
        lines.push(Self::text("Available commands:"));
        lines.push(Self::text("  subscribe propertyName"));
        lines.push(Self::text("  unsubscribe propertyName"));
        lines.push(Self::text("  trigger-input inputName"));
        lines.push(Self::text("  help"));
        lines.push(Self::text("  disconnect"));
        lines
    }

    /// Renders the line including the CRLF terminator.
    pub fn to_wire(&self) -> String {
        format!("{self}{LINE_TERMINATOR}")
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Banner { product } => write!(f, "{product} Property Server"),
            Self::Property {
                name,
                value_type,
                value,
            } => {
                write!(f, "Property {name} {value_type} ")?;
                match value {
                    Some(v) => write!(f, "{v}"),
                    None => f.write_str(NULL_VALUE),
                }
            }
            Self::Error { message } => write!(f, "ERR: {message}"),
            Self::Text { text } => f.write_str(text),
        }
    }
}

/// A parsed `Property` line, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub name: String,
    pub type_name: String,
    /// `None` when the server sent `(null)`
    pub value: Option<String>,
}

impl Notification {
    /// Parses a `Property <name> <type> <value>` line.
    ///
    /// The value is everything after the type and may contain spaces.
    /// Returns `None` for any other line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let rest = line.strip_prefix("Property ")?;
        let (name, rest) = rest.split_once(' ')?;
        let (type_name, value) = if let Some(r) = rest.strip_prefix("(unknown) ") {
            ("(unknown)", r)
        } else {
            rest.split_once(' ')?
        };

        Some(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            value: (value != NULL_VALUE).then(|| value.to_string()),
        })
    }
}
