//! Synthetic host for running the daemon without a simulator.
//!
//! Produces a lap of fake ACC telemetry at roughly 60 frames per second and
//! feeds it through a [`TickBridge`], which applies the usual throttling.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use propsrv_core::{EffectContainer, EffectProfile, EffectTree, PropertyTable, PropertyValue};

use super::bridge::{HostFrame, TickBridge, TickOutcome};
use super::model::{AccRawData, GameData, RawData, StatusData};

/// Interval between synthetic host frames.
pub const DEMO_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Id of the demo ShakeIt Bass effect group.
pub const DEMO_BASS_EFFECT: Uuid = Uuid::from_u128(0x3f1c_9a2e_41d7_4b55_9e0a_6c7d_2b18_e4a1);

/// Id of the demo ShakeIt Motors effect group.
pub const DEMO_MOTOR_EFFECT: Uuid = Uuid::from_u128(0x8d42_7e03_5a6b_4c19_b2f4_0e91_73ad_c560);

const MAX_RPM: i32 = 8000;
const FRAMES_PER_LAP: u64 = 60 * 90;
const GEARS: [&str; 7] = ["N", "1", "2", "3", "4", "5", "6"];

/// Deterministic telemetry generator.
#[derive(Debug, Default)]
pub struct DemoSimulator {
    frame: u64,
}

impl DemoSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames produced so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn next_frame(&mut self) -> HostFrame {
        let n = self.frame;
        self.frame += 1;

        let lap_progress = (n % FRAMES_PER_LAP) as f64 / FRAMES_PER_LAP as f64;
        let gear_index = 1 + ((n / 180) % 6) as usize;
        let rev_phase = (n % 180) as f64 / 180.0;
        let rpms = 3000 + (rev_phase * f64::from(MAX_RPM - 3500)) as i32;
        let speed_kmh = 40.0 * gear_index as f64 + 30.0 * rev_phase;
        let throttle = if rev_phase < 0.9 { 100.0 } else { 0.0 };
        let lap = 1 + (n / FRAMES_PER_LAP) as i32;
        let in_pit = lap_progress > 0.97;
        let gear = GEARS.get(gear_index).copied().unwrap_or("N");

        let status = StatusData {
            rpms,
            max_rpm: MAX_RPM,
            speed_kmh,
            gear: gear.to_string(),
            throttle,
            brake: 100.0 - throttle,
            clutch: 0.0,
            fuel: 60.0 - lap_progress * 2.5 - f64::from(lap - 1) * 2.5,
            car_model: "Porsche 992 GT3 R".to_string(),
            track_name: "Spa-Francorchamps".to_string(),
            player_name: "Demo Driver".to_string(),
            current_lap: lap,
            total_laps: 20,
            position: 1 + (lap % 5),
            is_in_pit: in_pit,
            pit_limiter_on: in_pit,
            session_odometer: (n as i64) * 20,
            best_lap_millis: (lap > 1).then_some(138_412),
        };

        let mut acc = AccRawData::default();
        acc.physics.packet_id = n as i32;
        acc.physics.rpms = rpms;
        acc.physics.gear = gear_index as i32 + 1;
        acc.physics.speed_kmh = speed_kmh as f32;
        acc.physics.gas = (throttle / 100.0) as f32;
        acc.physics.brake = ((100.0 - throttle) / 100.0) as f32;
        acc.physics.fuel = status.fuel as f32;
        acc.physics.air_temp = 22.5;
        acc.physics.road_temp = 31.0;
        acc.physics.water_temp = 85.0;
        acc.physics.ignition_on = 1;
        acc.physics.pit_limiter_on = i32::from(in_pit);
        acc.graphics.packet_id = n as i32;
        acc.graphics.status = 2;
        acc.graphics.completed_laps = lap - 1;
        acc.graphics.position = status.position;
        acc.graphics.i_current_time = (lap_progress * 138_000.0) as i32;
        acc.graphics.is_in_pit = i32::from(in_pit);
        acc.graphics.tc = 3;
        acc.graphics.abs = 2;
        acc.graphics.engine_map = 1;
        acc.graphics.rain_lights = false;

        let game = GameData {
            game_running: true,
            game_name: RawData::ACC_GAME.to_string(),
            ..GameData::default()
        };

        let mut generic = PropertyTable::new();
        generic.insert(
            "DataCorePlugin.CurrentGame",
            PropertyValue::Str(RawData::ACC_GAME.to_string()),
        );
        generic.insert("DataCorePlugin.GameRunning", PropertyValue::Bool(true));
        generic.insert("DemoPlugin.Frame", PropertyValue::Long(n as i64));

        HostFrame {
            game: Some(game),
            status: Some(status),
            raw: Some(RawData::Acc(Arc::new(acc))),
            bass_effects: Some(effect_tree(DEMO_BASS_EFFECT, "Engine RPM", rev_phase * 100.0, false)),
            motor_effects: Some(effect_tree(DEMO_MOTOR_EFFECT, "Road Texture", 80.0, in_pit)),
            generic: Some(generic),
        }
    }
}

fn effect_tree(id: Uuid, name: &str, gain: f64, muted: bool) -> EffectTree {
    EffectTree {
        profiles: vec![EffectProfile {
            name: "Demo".to_string(),
            containers: vec![EffectContainer::new(Uuid::nil(), "Group")
                .with_child(EffectContainer::new(id, name).with_gain(gain.round()).muted(muted))],
        }],
    }
}

/// Spawns the demo host loop.
///
/// Runs until the cancellation token is triggered.
pub fn spawn_demo_host(
    mut bridge: TickBridge,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut simulator = DemoSimulator::new();
        let mut tick = interval(DEMO_FRAME_INTERVAL);

        info!(
            frame_interval_ms = DEMO_FRAME_INTERVAL.as_millis() as u64,
            update_interval_ms = bridge.update_interval().as_millis() as u64,
            "Demo host started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Demo host shutting down");
                    break;
                }

                _ = tick.tick() => {
                    let frame = simulator.next_frame();
                    if let TickOutcome::Updated(summary) = bridge.on_tick(&frame).await {
                        if summary.changed > 0 {
                            debug!(
                                changed = summary.changed,
                                delivered = summary.delivered,
                                "Demo tick pushed updates"
                            );
                        }
                    }
                }
            }
        }

        debug!(
            frames = simulator.frame_count(),
            failures = bridge.failure_count(),
            "Demo host task completed"
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::shapes::host_registry;
    use propsrv_core::PropertySource;

    #[test]
    fn test_frames_are_deterministic() {
        let a = DemoSimulator::new().next_frame();
        let b = DemoSimulator::new().next_frame();
        assert_eq!(a.status, b.status);
        assert_eq!(a.game, b.game);
    }

    #[test]
    fn test_frames_change_over_time() {
        let mut sim = DemoSimulator::new();
        let first = sim.next_frame().status.unwrap();
        let later = (0..30).map(|_| sim.next_frame()).last().unwrap().status.unwrap();
        assert_ne!(first.rpms, later.rpms);
        assert_eq!(sim.frame_count(), 31);
    }

    #[test]
    fn test_demo_effects_resolve() {
        let registry = host_registry();
        let frame = DemoSimulator::new().next_frame();
        let bass = frame.bass_effects.unwrap();

        let d = registry
            .resolve(&format!("sib.{DEMO_BASS_EFFECT}.gain"))
            .unwrap();
        assert_eq!(d.source(), PropertySource::ShakeItBass);
        assert!(d.read(Some(&bass)).unwrap().is_some());

        let d = registry
            .resolve(&format!("sim.{DEMO_MOTOR_EFFECT}.IsMuted"))
            .unwrap();
        let motors = frame.motor_effects.unwrap();
        assert_eq!(d.read(Some(&motors)), Ok(Some(PropertyValue::Bool(false))));
    }

    #[test]
    fn test_every_discoverable_property_reads_from_demo_frame() {
        let registry = host_registry();
        let frame = DemoSimulator::new().next_frame();
        let RawData::Acc(acc) = frame.raw.clone().unwrap() else {
            panic!("demo produces ACC raw data");
        };

        for d in registry.available_properties() {
            let raw: &propsrv_core::SourceObject = match d.source() {
                PropertySource::GameData => frame.game.as_ref().unwrap(),
                PropertySource::StatusData => frame.status.as_ref().unwrap(),
                PropertySource::AccGraphics => &acc.graphics,
                PropertySource::AccPhysics => &acc.physics,
                other => panic!("unexpected static source {other}"),
            };
            assert!(d.read(Some(raw)).is_ok(), "{} failed", d.qualified_name());
        }
    }
}
