//! Shared fixtures for subscription unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use propsrv_core::{PropertyRegistry, PropertySource, TypeShape};

use super::subscriber::{NotifyError, Subscriber, SubscriberId, ValueUpdate};

pub struct Status {
    pub rpms: i32,
    pub speed: f64,
}

impl Status {
    pub fn new(rpms: i32) -> Self {
        Self { rpms, speed: 0.0 }
    }
}

pub fn status_registry() -> PropertyRegistry {
    PropertyRegistry::builder()
        .source(
            PropertySource::StatusData,
            TypeShape::builder::<Status>("StatusData")
                .getter("Rpms", |s: &Status| s.rpms)
                .getter("Speed", |s: &Status| s.speed)
                .build(),
        )
        .build()
}

/// Forwards every update into a channel.
pub struct ChannelSubscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<ValueUpdate>,
}

impl ChannelSubscriber {
    pub fn new(id: u64) -> (Arc<Self>, mpsc::UnboundedReceiver<ValueUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Arc::new(Self {
            id: SubscriberId::new(id),
            tx,
        });
        (sub, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    async fn notify(&self, update: &ValueUpdate) -> Result<(), NotifyError> {
        self.tx.send(update.clone()).map_err(|_| NotifyError::Closed)
    }
}

pub enum Failure {
    Error,
    Panic,
    Sleep(Duration),
}

pub struct FailingSubscriber {
    id: SubscriberId,
    failure: Failure,
}

impl FailingSubscriber {
    pub fn erroring(id: u64) -> Self {
        Self {
            id: SubscriberId::new(id),
            failure: Failure::Error,
        }
    }

    pub fn panicking(id: u64) -> Self {
        Self {
            id: SubscriberId::new(id),
            failure: Failure::Panic,
        }
    }

    pub fn sleeping(id: u64, duration: Duration) -> Self {
        Self {
            id: SubscriberId::new(id),
            failure: Failure::Sleep(duration),
        }
    }
}

#[async_trait]
impl Subscriber for FailingSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    async fn notify(&self, _update: &ValueUpdate) -> Result<(), NotifyError> {
        match self.failure {
            Failure::Error => Err(NotifyError::Io("broken pipe".into())),
            Failure::Panic => panic!("subscriber blew up"),
            Failure::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}
