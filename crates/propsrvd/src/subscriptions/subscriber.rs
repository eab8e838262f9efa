//! The notification seam between properties and their consumers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use propsrv_core::{PropertyValue, ValueType};
use propsrv_protocol::ServerLine;

/// Identity of a subscriber. Subscriber sets are keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One value change as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUpdate {
    pub name: Arc<str>,
    pub value_type: ValueType,
    /// `None` if no value is available
    pub value: Option<PropertyValue>,
}

impl ValueUpdate {
    /// Renders the update as a `Property` line.
    pub fn to_line(&self) -> ServerLine {
        ServerLine::property(self.name.as_ref(), self.value_type, self.value.clone())
    }
}

/// Receives value changes of the properties it is subscribed to.
///
/// Implementations must be cheap to call concurrently: one notification per
/// property may be in flight at the same time.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// Delivers one update. An error is reported to the caller of the update
    /// and never affects other subscribers.
    async fn notify(&self, update: &ValueUpdate) -> Result<(), NotifyError>;
}

/// Why a notification could not be delivered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Subscriber is closed")]
    Closed,

    #[error("Write failed: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Subscriber panicked")]
    Panicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_renders_property_line() {
        let update = ValueUpdate {
            name: Arc::from("dcp.gd.Rpms"),
            value_type: ValueType::Integer,
            value: Some(PropertyValue::Int(1500)),
        };
        assert_eq!(update.to_line().to_string(), "Property dcp.gd.Rpms integer 1500");
    }

    #[test]
    fn test_subscriber_id_display() {
        assert_eq!(SubscriberId::new(7).to_string(), "7");
        assert_eq!(SubscriberId::new(7).get(), 7);
    }
}
