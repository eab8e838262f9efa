//! The name to property map and its structural operations.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use propsrv_core::{PropertyRegistry, PropertySource, ResolutionError, SourceObject};

use super::property::{Property, UpdateOutcome};
use super::subscriber::{NotifyError, Subscriber, SubscriberId};

/// Errors reported to a subscribing client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubscribeError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The current value could not be sent; the subscription was dropped
    #[error("Failed to send current value: {0}")]
    Replay(NotifyError),
}

/// Totals of one [`SubscriptionManager::push_update`] call.
#[derive(Debug, Default)]
pub struct PushSummary {
    /// Properties of the pushed source that were evaluated
    pub evaluated: usize,

    /// Properties whose value changed
    pub changed: usize,

    /// Notifications delivered across all properties
    pub delivered: usize,

    /// Failed notifications as `(property, subscriber, error)`
    pub failures: Vec<(String, SubscriberId, NotifyError)>,
}

impl PushSummary {
    /// Adds the totals of another summary.
    pub fn merge(&mut self, other: PushSummary) {
        self.evaluated += other.evaluated;
        self.changed += other.changed;
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }

    fn record(&mut self, name: &str, outcome: UpdateOutcome) {
        self.evaluated += 1;
        if outcome.changed {
            self.changed += 1;
        }
        self.delivered += outcome.delivered;
        self.failures.extend(
            outcome
                .failures
                .into_iter()
                .map(|(id, e)| (name.to_string(), id, e)),
        );
    }
}

/// Owns every live [`Property`], keyed by qualified name.
///
/// All structural changes serialize on one lock. Value notification runs
/// outside that lock on a snapshot, so slow subscribers never delay
/// unsubscribe calls. A subscribe waits for a fan-out in progress on the
/// same property.
pub struct SubscriptionManager {
    registry: Arc<PropertyRegistry>,
    properties: Mutex<HashMap<String, Arc<Property>>>,
}

impl SubscriptionManager {
    pub fn new(registry: Arc<PropertyRegistry>) -> Self {
        Self {
            registry,
            properties: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<PropertyRegistry> {
        &self.registry
    }

    /// Subscribes to a qualified name, creating its property on first use.
    ///
    /// The subscriber immediately receives the current value (`None` for a
    /// newly created property), before any change. If that replay fails the
    /// subscription is dropped again and [`SubscribeError::Replay`] returned.
    pub async fn subscribe(
        &self,
        name: &str,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), SubscribeError> {
        loop {
            let property = self.get_or_create(name).await?;

            // Lock order is property state, then the map. Nothing holding the
            // map waits on a property.
            let attachment = property.attach().await;
            let added = {
                let properties = self.properties.lock().await;
                match properties.get(name) {
                    Some(current) if Arc::ptr_eq(current, &property) => {}
                    _ => {
                        debug!(property = %name, "Property dropped while subscribing, retrying");
                        continue;
                    }
                }
                attachment.add_subscriber(Arc::clone(&subscriber))
            };

            debug!(
                property = %name,
                subscriber = %subscriber.id(),
                subscribers = property.subscriber_count(),
                "Subscribed"
            );

            return match attachment.replay(subscriber.as_ref()).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!(
                        property = %name,
                        subscriber = %subscriber.id(),
                        error = %e,
                        "Failed to replay value, dropping subscription"
                    );
                    if added {
                        self.unsubscribe(name, subscriber.id()).await;
                    }
                    Err(SubscribeError::Replay(e))
                }
            };
        }
    }

    async fn get_or_create(&self, name: &str) -> Result<Arc<Property>, SubscribeError> {
        let mut properties = self.properties.lock().await;
        if let Some(existing) = properties.get(name) {
            return Ok(Arc::clone(existing));
        }

        let descriptor = self.registry.resolve(name).map_err(|e| {
            info!(property = %name, error = %e, "Cannot subscribe");
            SubscribeError::from(e)
        })?;
        let created = Arc::new(Property::new(descriptor));
        properties.insert(name.to_string(), Arc::clone(&created));
        debug!(property = %name, "Created property");
        Ok(created)
    }

    /// Removes a subscriber from a name. The property is dropped once its
    /// last subscriber is gone.
    ///
    /// Returns false if the name has no property or the subscriber was not
    /// registered on it.
    pub async fn unsubscribe(&self, name: &str, id: SubscriberId) -> bool {
        let mut properties = self.properties.lock().await;
        let Some(property) = properties.get(name) else {
            info!(property = %name, subscriber = %id, "Unsubscribe from unknown property");
            return false;
        };

        if !property.remove_subscriber(id) {
            debug!(property = %name, subscriber = %id, "Subscriber was not registered");
            return false;
        }

        if property.subscriber_count() == 0 {
            properties.remove(name);
            debug!(property = %name, "Removed property without subscribers");
        }
        true
    }

    /// Shallow copy of the name to property map.
    pub async fn snapshot(&self) -> HashMap<String, Arc<Property>> {
        self.properties.lock().await.clone()
    }

    /// Number of live properties.
    pub async fn len(&self) -> usize {
        self.properties.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.properties.lock().await.is_empty()
    }

    /// Evaluates every live property of `source` against a fresh backing object.
    ///
    /// Properties are updated concurrently; each fans out to its own
    /// subscribers. Must not run concurrently with itself.
    pub async fn push_update(&self, source: PropertySource, raw: Option<&SourceObject>) -> PushSummary {
        let snapshot = self.snapshot().await;
        let matching: Vec<_> = snapshot
            .values()
            .filter(|p| p.source() == source)
            .collect();

        let outcomes = join_all(matching.iter().map(|p| async move {
            (p.name(), p.update_from_object(raw).await)
        }))
        .await;

        let mut summary = PushSummary::default();
        for (name, outcome) in outcomes {
            summary.record(name, outcome);
        }
        summary
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager").finish_non_exhaustive()
    }
}
