//! propsrv Protocol - Line protocol of the property server
//!
//! This crate provides command parsing for lines sent by clients and
//! rendering of the lines the server sends back. Every line is ASCII/UTF-8
//! text terminated by CRLF.
//!
//! ```text
//! client: subscribe dcp.gd.Rpms
//! server: Property dcp.gd.Rpms integer (null)
//! server: Property dcp.gd.Rpms integer 1500
//! client: frobnicate
//! server: ERR: Received unknown command
//! ```

pub mod command;
pub mod line;

pub use command::{Command, CommandError};
pub use line::{Notification, ServerLine, LINE_TERMINATOR, NULL_VALUE};
