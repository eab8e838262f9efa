//! Live properties and their subscribers.
//!
//! ```text
//! ┌──────────────────────┐  subscribe/unsubscribe  ┌─────────────────┐
//! │ SubscriptionManager  │◀────────────────────────│  ClientSession  │
//! │  name -> Property    │                         │  (Subscriber)   │
//! └──────────┬───────────┘                         └────────▲────────┘
//!            │ push_update(source, raw)                     │
//!            ▼                                              │ notify
//! ┌──────────────────────┐   value changed                  │
//! │      Property        │──────────────────────────────────┘
//! │ last value + subs    │
//! └──────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Poisoned subscriber locks are recovered, not propagated
//! - A panicking subscriber is reported as a failed notification

mod manager;
mod property;
mod subscriber;

#[cfg(test)]
pub(crate) mod test_support;

pub use manager::{PushSummary, SubscribeError, SubscriptionManager};
pub use property::{Attachment, Property, UpdateOutcome, REPLAY_TIMEOUT};
pub use subscriber::{NotifyError, Subscriber, SubscriberId, ValueUpdate};
