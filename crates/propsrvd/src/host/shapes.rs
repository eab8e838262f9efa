//! Member registration tables of the host telemetry types.

use propsrv_core::{MemberKind, MemberType, PropertyRegistry, PropertySource, TypeShape, ValueType};

use super::model::{AccGraphics, AccPhysics, GameData, StatusData};

/// Builds the registry over every host telemetry type.
pub fn host_registry() -> PropertyRegistry {
    PropertyRegistry::builder()
        .source(PropertySource::GameData, game_data_shape())
        .source(PropertySource::StatusData, status_data_shape())
        .source(PropertySource::AccGraphics, acc_graphics_shape())
        .source(PropertySource::AccPhysics, acc_physics_shape())
        .build()
}

pub fn game_data_shape() -> TypeShape {
    TypeShape::builder::<GameData>("GameData")
        .getter("GameRunning", |g: &GameData| g.game_running)
        .getter("GamePaused", |g: &GameData| g.game_paused)
        .getter("GameInMenu", |g: &GameData| g.game_in_menu)
        .getter("GameReplay", |g: &GameData| g.game_replay)
        .getter("Spectating", |g: &GameData| g.spectating)
        .getter("GameName", |g: &GameData| g.game_name.clone())
        .unsupported(MemberKind::Getter, "NewData", "StatusDataBase")
        .unsupported(MemberKind::Getter, "OldData", "StatusDataBase")
        .build()
}

pub fn status_data_shape() -> TypeShape {
    TypeShape::builder::<StatusData>("StatusDataBase")
        .getter("Rpms", |s: &StatusData| s.rpms)
        .getter("MaxRpm", |s: &StatusData| s.max_rpm)
        .getter("SpeedKmh", |s: &StatusData| s.speed_kmh)
        .getter("Gear", |s: &StatusData| s.gear.clone())
        .getter("Throttle", |s: &StatusData| s.throttle)
        .getter("Brake", |s: &StatusData| s.brake)
        .getter("Clutch", |s: &StatusData| s.clutch)
        .getter("Fuel", |s: &StatusData| s.fuel)
        .getter("CarModel", |s: &StatusData| s.car_model.clone())
        .getter("TrackName", |s: &StatusData| s.track_name.clone())
        .getter("CurrentLap", |s: &StatusData| s.current_lap)
        .getter("TotalLaps", |s: &StatusData| s.total_laps)
        .getter("Position", |s: &StatusData| s.position)
        .getter("IsInPit", |s: &StatusData| s.is_in_pit)
        .getter("SessionOdo", |s: &StatusData| s.session_odometer)
        .getter("BestLapMillis", |s: &StatusData| s.best_lap_millis)
        .field("PitLimiterOn", |s: &StatusData| s.pit_limiter_on)
        .field("PlayerName", |s: &StatusData| s.player_name.clone())
        .method("GetRpmRatio", |s: &StatusData| s.rpm_ratio())
        .method_with_parameters("GetSectorTime", 1, MemberType::Value(ValueType::Double))
        .unsupported(MemberKind::Getter, "CurrentLapTime", "TimeSpan")
        .unsupported(MemberKind::Getter, "SessionTimeLeft", "TimeSpan")
        .build()
}

pub fn acc_graphics_shape() -> TypeShape {
    TypeShape::builder::<AccGraphics>("ACCGraphics")
        .field("PacketId", |g: &AccGraphics| g.packet_id)
        .field("Status", |g: &AccGraphics| g.status)
        .field("Session", |g: &AccGraphics| g.session)
        .field("CompletedLaps", |g: &AccGraphics| g.completed_laps)
        .field("Position", |g: &AccGraphics| g.position)
        .field("CurrentTime", |g: &AccGraphics| g.current_time.clone())
        .field("iCurrentTime", |g: &AccGraphics| g.i_current_time)
        .field("iLastTime", |g: &AccGraphics| g.i_last_time)
        .field("iBestTime", |g: &AccGraphics| g.i_best_time)
        .field("IsInPit", |g: &AccGraphics| g.is_in_pit)
        .field("TC", |g: &AccGraphics| g.tc)
        .field("ABS", |g: &AccGraphics| g.abs)
        .field("EngineMap", |g: &AccGraphics| g.engine_map)
        .field("RainLights", |g: &AccGraphics| g.rain_lights)
        .field("FlashingLights", |g: &AccGraphics| g.flashing_lights)
        .field("LightsStage", |g: &AccGraphics| g.lights_stage)
        .field("WiperLV", |g: &AccGraphics| g.wiper_lv)
        .field("FuelXLap", |g: &AccGraphics| g.fuel_x_lap)
        .build()
}

pub fn acc_physics_shape() -> TypeShape {
    TypeShape::builder::<AccPhysics>("ACCPhysics")
        .field("PacketId", |p: &AccPhysics| p.packet_id)
        .field("Gas", |p: &AccPhysics| p.gas)
        .field("Brake", |p: &AccPhysics| p.brake)
        .field("Fuel", |p: &AccPhysics| p.fuel)
        .field("Gear", |p: &AccPhysics| p.gear)
        .field("Rpms", |p: &AccPhysics| p.rpms)
        .field("SteerAngle", |p: &AccPhysics| p.steer_angle)
        .field("SpeedKmh", |p: &AccPhysics| p.speed_kmh)
        .field("TC", |p: &AccPhysics| p.tc)
        .field("Abs", |p: &AccPhysics| p.abs)
        .field("AirTemp", |p: &AccPhysics| p.air_temp)
        .field("RoadTemp", |p: &AccPhysics| p.road_temp)
        .field("WaterTemp", |p: &AccPhysics| p.water_temp)
        .field("PitLimiterOn", |p: &AccPhysics| p.pit_limiter_on)
        .field("IgnitionOn", |p: &AccPhysics| p.ignition_on)
        .unsupported(MemberKind::Field, "WheelSlip", "Single[]")
        .build()
}
