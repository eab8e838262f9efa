//! Telemetry data handed over by the host on every tick.
//!
//! These are the backing objects of the static property sources. Their
//! exposed members are registered in [`super::shapes`].

use std::sync::Arc;

/// Global game state. Backs the `dcp` source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameData {
    pub game_running: bool,
    pub game_paused: bool,
    pub game_in_menu: bool,
    pub game_replay: bool,
    pub spectating: bool,
    pub game_name: String,
}

/// Normalized car and session telemetry. Backs the `dcp.gd` source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusData {
    pub rpms: i32,
    pub max_rpm: i32,
    pub speed_kmh: f64,
    pub gear: String,
    pub throttle: f64,
    pub brake: f64,
    pub clutch: f64,
    pub fuel: f64,
    pub car_model: String,
    pub track_name: String,
    pub player_name: String,
    pub current_lap: i32,
    pub total_laps: i32,
    pub position: i32,
    pub is_in_pit: bool,
    pub pit_limiter_on: bool,
    pub session_odometer: i64,
    pub best_lap_millis: Option<i64>,
}

impl StatusData {
    /// Fraction of the rev range in use, `0.0` when the maximum is unknown.
    pub fn rpm_ratio(&self) -> f64 {
        if self.max_rpm <= 0 {
            return 0.0;
        }
        f64::from(self.rpms) / f64::from(self.max_rpm)
    }
}

/// ACC shared-memory graphics page. Backs the `acc.graphics` source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccGraphics {
    pub packet_id: i32,
    pub status: i32,
    pub session: i32,
    pub completed_laps: i32,
    pub position: i32,
    pub current_time: String,
    pub i_current_time: i32,
    pub i_last_time: i32,
    pub i_best_time: i32,
    pub is_in_pit: i32,
    pub tc: i32,
    pub abs: i32,
    pub engine_map: i32,
    pub rain_lights: bool,
    pub flashing_lights: bool,
    pub lights_stage: i32,
    pub wiper_lv: i32,
    pub fuel_x_lap: f32,
}

/// ACC shared-memory physics page. Backs the `acc.physics` source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccPhysics {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub fuel: f32,
    pub gear: i32,
    pub rpms: i32,
    pub steer_angle: f32,
    pub speed_kmh: f32,
    pub tc: f32,
    pub abs: f32,
    pub air_temp: f32,
    pub road_temp: f32,
    pub water_temp: f32,
    pub pit_limiter_on: i32,
    pub ignition_on: i32,
    pub wheel_slip: [f32; 4],
}

/// The raw ACC block, holding both pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccRawData {
    pub graphics: AccGraphics,
    pub physics: AccPhysics,
}

/// Game-specific raw data block attached to a host tick.
#[derive(Debug, Clone)]
pub enum RawData {
    /// Assetto Corsa Competizione
    Acc(Arc<AccRawData>),
    /// Any game without raw-data support, named by its identifier
    Unsupported { game: String },
}

impl RawData {
    pub const ACC_GAME: &'static str = "AssettoCorsaCompetizione";

    /// Identifier of the game that produced this block.
    pub fn game(&self) -> &str {
        match self {
            Self::Acc(_) => Self::ACC_GAME,
            Self::Unsupported { game } => game,
        }
    }
}
