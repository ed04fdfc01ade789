//! Cadence daemon library
//!
//! Configuration loading and the stdin command language of the
//! `cadence-daemon` binary.

#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{Action, LineCommand};
pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
