//! Bridge from the host's periodic tick to the subscription manager.
//!
//! The host calls [`TickBridge::on_tick`] from its real-time loop. The
//! bridge throttles ticks to the configured update interval, refreshes the
//! raw-data pages, and pushes every source's backing object to the
//! subscription manager.
//!
//! Nothing escapes into the host loop: a failing tick is caught, counted and
//! logged, and logging stops after [`MAX_REPORTED_FAILURES`] so a persistent
//! fault cannot flood the log from the host's critical path.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error};

use propsrv_core::{EffectTree, PropertySource, PropertyTable, SourceObject};

use crate::subscriptions::{PushSummary, SubscriptionManager};

use super::model::{GameData, RawData, StatusData};
use super::raw::RawDataManager;

/// Tick failures logged before reporting stops.
pub const MAX_REPORTED_FAILURES: u32 = 50;

/// Backing objects of one host tick. `None` means the source has no data.
#[derive(Debug, Clone, Default)]
pub struct HostFrame {
    pub game: Option<GameData>,
    pub status: Option<StatusData>,
    pub raw: Option<RawData>,
    pub bass_effects: Option<EffectTree>,
    pub motor_effects: Option<EffectTree>,
    pub generic: Option<PropertyTable>,
}

/// What happened to one host tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Too soon after the previous processed tick
    Throttled,
    /// Every source was pushed
    Updated(PushSummary),
    /// The tick failed and was reported
    Failed(TickError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TickError {
    #[error("Tick panicked: {message}")]
    Panicked { message: String },
}

impl TickError {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Panicked { message }
    }
}

/// Drives property updates from host ticks. Single-threaded by contract.
pub struct TickBridge {
    subscriptions: Arc<SubscriptionManager>,
    raw_data: RawDataManager,
    update_interval: Duration,
    last_update: Option<Instant>,
    reported_failures: u32,
    total_failures: u64,
}

impl TickBridge {
    pub fn new(subscriptions: Arc<SubscriptionManager>, update_interval: Duration) -> Self {
        Self {
            subscriptions,
            raw_data: RawDataManager::new(),
            update_interval,
            last_update: None,
            reported_failures: 0,
            total_failures: 0,
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Total failed ticks, including unreported ones.
    pub fn failure_count(&self) -> u64 {
        self.total_failures
    }

    pub fn raw_data(&self) -> &RawDataManager {
        &self.raw_data
    }

    pub async fn on_tick(&mut self, frame: &HostFrame) -> TickOutcome {
        self.on_tick_at(frame, Instant::now()).await
    }

    /// Processes a tick observed at `now`.
    pub async fn on_tick_at(&mut self, frame: &HostFrame, now: Instant) -> TickOutcome {
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) <= self.update_interval {
                return TickOutcome::Throttled;
            }
        }

        let result = AssertUnwindSafe(self.update(frame)).catch_unwind().await;
        self.last_update = Some(now);

        match result {
            Ok(summary) => {
                if !summary.failures.is_empty() {
                    debug!(failed = summary.failures.len(), "Some notifications failed");
                }
                TickOutcome::Updated(summary)
            }
            Err(payload) => {
                let err = TickError::from_panic(payload);
                self.report_failure(&err);
                TickOutcome::Failed(err)
            }
        }
    }

    async fn update(&mut self, frame: &HostFrame) -> PushSummary {
        self.raw_data.update(frame.raw.as_ref());

        let mut summary = PushSummary::default();
        for source in PropertySource::ALL {
            let raw = source_object(frame, &self.raw_data, source);
            summary.merge(self.subscriptions.push_update(source, raw).await);
        }
        summary
    }

    fn report_failure(&mut self, err: &TickError) {
        self.total_failures += 1;
        if self.reported_failures >= MAX_REPORTED_FAILURES {
            return;
        }

        self.reported_failures += 1;
        error!(error = %err, count = self.reported_failures, "Unhandled failure in host tick");
        if self.reported_failures >= MAX_REPORTED_FAILURES {
            error!(limit = MAX_REPORTED_FAILURES, "Reached limit of unhandled tick failures");
            error!("Not reporting any more failures, but the problem most probably persists");
        }
    }
}

fn source_object<'a>(
    frame: &'a HostFrame,
    raw_data: &'a RawDataManager,
    source: PropertySource,
) -> Option<&'a SourceObject> {
    match source {
        PropertySource::GameData => frame.game.as_ref().map(|o| o as &SourceObject),
        PropertySource::StatusData => frame.status.as_ref().map(|o| o as &SourceObject),
        PropertySource::AccGraphics => raw_data.acc_graphics().map(|o| o as &SourceObject),
        PropertySource::AccPhysics => raw_data.acc_physics().map(|o| o as &SourceObject),
        PropertySource::ShakeItBass => frame.bass_effects.as_ref().map(|o| o as &SourceObject),
        PropertySource::ShakeItMotors => frame.motor_effects.as_ref().map(|o| o as &SourceObject),
        PropertySource::Generic => frame.generic.as_ref().map(|o| o as &SourceObject),
    }
}
