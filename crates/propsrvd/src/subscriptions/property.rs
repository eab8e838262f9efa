//! A live, subscribed property.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use propsrv_core::{is_change, PropertyDescriptor, PropertySource, PropertyValue, SourceObject, ValueType};

use super::subscriber::{NotifyError, Subscriber, SubscriberId, ValueUpdate};

/// Upper bound for sending the current value to a new subscriber.
///
/// Shorter than a client's write timeout, since the property is locked
/// for every other subscriber while the replay is in flight.
pub const REPLAY_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of one [`Property::update_from_object`] call.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    /// Whether the value changed
    pub changed: bool,

    /// Subscribers that received the change
    pub delivered: usize,

    /// Subscribers whose notification failed
    pub failures: Vec<(SubscriberId, NotifyError)>,
}

struct PropertyState {
    last_value: Option<PropertyValue>,
}

/// Tracks the current value of one qualified name and the subscribers
/// interested in it.
///
/// Two locks, never held across each other's await points:
/// - `subscribers` (std mutex) guards the subscriber set and is only held
///   for set operations and to take a snapshot.
/// - `state` (tokio mutex) guards the last value and is held for the whole
///   fan-out of a change, so one change is delivered to everyone before the
///   next one can start. An [`Attachment`] holds it while a new subscriber
///   is added and replayed, so a new subscriber sees its replay first.
pub struct Property {
    descriptor: PropertyDescriptor,
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
    state: tokio::sync::Mutex<PropertyState>,
}

impl Property {
    pub fn new(descriptor: PropertyDescriptor) -> Self {
        Self {
            descriptor,
            subscribers: Mutex::new(HashMap::new()),
            state: tokio::sync::Mutex::new(PropertyState { last_value: None }),
        }
    }

    pub fn descriptor(&self) -> &PropertyDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.qualified_name()
    }

    pub fn source(&self) -> PropertySource {
        self.descriptor.source()
    }

    /// Adds a subscriber. Returns false if it was already present.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let id = subscriber.id();
        if subs.contains_key(&id) {
            return false;
        }
        subs.insert(id, subscriber);
        true
    }

    /// Removes a subscriber. Returns false if it was not present.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.remove(&id).is_some()
    }

    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.len()
    }

    /// Returns the last observed value.
    pub async fn last_value(&self) -> Option<PropertyValue> {
        self.state.lock().await.last_value.clone()
    }

    /// Reported type for a value. Generic properties report the type of the
    /// value itself, `object` while absent.
    pub fn value_type_of(&self, value: Option<&PropertyValue>) -> ValueType {
        if self.descriptor.source() == PropertySource::Generic {
            value.map_or(ValueType::Object, PropertyValue::value_type)
        } else {
            self.descriptor.value_type()
        }
    }

    /// Locks the value for attaching a subscriber.
    pub async fn attach(&self) -> Attachment<'_> {
        Attachment {
            property: self,
            state: self.state.lock().await,
        }
    }

    /// Sends the current value to one subscriber.
    pub async fn replay(&self, subscriber: &dyn Subscriber) -> Result<(), NotifyError> {
        self.attach().await.replay(subscriber).await
    }

    /// Reads a fresh value from `raw` and notifies every subscriber if it
    /// differs from the last one.
    ///
    /// A failing read is logged and treated as no change.
    pub async fn update_from_object(&self, raw: Option<&SourceObject>) -> UpdateOutcome {
        let new_value = match self.descriptor.read(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(property = %self.name(), error = %e, "Failed to read property value");
                return UpdateOutcome::default();
            }
        };

        let mut state = self.state.lock().await;
        if !is_change(state.last_value.as_ref(), new_value.as_ref()) {
            return UpdateOutcome::default();
        }
        state.last_value = new_value.clone();

        let update = self.update_for(new_value);
        let subscribers = self.snapshot_subscribers();

        debug!(
            property = %self.name(),
            value = %update.to_line(),
            subscribers = subscribers.len(),
            "Property value changed"
        );

        let results = join_all(subscribers.iter().map(|sub| {
            let update = &update;
            async move {
                let result = AssertUnwindSafe(sub.notify(update))
                    .catch_unwind()
                    .await
                    .unwrap_or(Err(NotifyError::Panicked));
                (sub.id(), result)
            }
        }))
        .await;
        drop(state);

        let mut outcome = UpdateOutcome {
            changed: true,
            ..UpdateOutcome::default()
        };
        for (id, result) in results {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    debug!(property = %self.name(), subscriber = %id, error = %e, "Notification failed");
                    outcome.failures.push((id, e));
                }
            }
        }
        outcome
    }

    fn update_for(&self, value: Option<PropertyValue>) -> ValueUpdate {
        ValueUpdate {
            name: self.descriptor.name_handle(),
            value_type: self.value_type_of(value.as_ref()),
            value,
        }
    }

    fn snapshot_subscribers(&self) -> Vec<Arc<dyn Subscriber>> {
        let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.values().cloned().collect()
    }
}

/// Exclusive access to a property's value while a subscriber is attached.
///
/// No change is fanned out while it is held, so a subscriber added through
/// it cannot see a tick before its replay.
pub struct Attachment<'a> {
    property: &'a Property,
    state: tokio::sync::MutexGuard<'a, PropertyState>,
}

impl Attachment<'_> {
    /// Adds a subscriber. Returns false if it was already present.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        self.property.add_subscriber(subscriber)
    }

    /// Sends the current value, then releases the property.
    ///
    /// A replay slower than [`REPLAY_TIMEOUT`] fails with
    /// [`NotifyError::WriteTimeout`].
    pub async fn replay(self, subscriber: &dyn Subscriber) -> Result<(), NotifyError> {
        let update = self.property.update_for(self.state.last_value.clone());
        let notify = AssertUnwindSafe(subscriber.notify(&update)).catch_unwind();
        match timeout(REPLAY_TIMEOUT, notify).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(NotifyError::Panicked),
            Err(_) => Err(NotifyError::WriteTimeout),
        }
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
