//! propsrvd - Property server daemon
//!
//! This crate provides the runtime of the property server:
//! - `subscriptions` - live properties, change detection and fan-out
//! - `server` - TCP server and per-client protocol sessions
//! - `host` - tick bridge, raw data, telemetry model and the demo host
//! - `config` - TOML settings with environment overrides
//! - `logging` - tracing subscriber setup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       propsrvd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ PropertyServer  │────▶│    SubscriptionManager      │   │
//! │  │  (TCP, lines)   │     │  (name -> Property map)     │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │ connections                 │ push_update       │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │  ClientSession  │     │        TickBridge           │   │
//! │  │  (per client)   │     │   (host tick, throttled)    │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Host accessors and whole ticks run under `catch_unwind`

pub mod config;
pub mod host;
pub mod logging;
pub mod server;
pub mod subscriptions;
