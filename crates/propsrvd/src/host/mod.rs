//! The boundary to the simulation host.
//!
//! - `model` - telemetry types the host hands over each tick
//! - `shapes` - their member registration tables
//! - `raw` - detection of the running game's raw data block
//! - `bridge` - throttled, failure-isolated tick processing
//! - `input` - forwarding of input triggers to the host
//! - `demo` - a synthetic host for running without a simulator

pub mod bridge;
pub mod demo;
pub mod input;
pub mod model;
pub mod raw;
pub mod shapes;

pub use bridge::{HostFrame, TickBridge, TickError, TickOutcome, MAX_REPORTED_FAILURES};
pub use demo::{spawn_demo_host, DemoSimulator};
pub use input::{InputTrigger, LogInputTrigger, TriggerError};
pub use model::{AccGraphics, AccPhysics, AccRawData, GameData, RawData, StatusData};
pub use raw::RawDataManager;
pub use shapes::host_registry;
