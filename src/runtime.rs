//! Runtime glue that wires configs, status reporting, fatal error handling,
//! telemetry, and runner orchestration.

pub mod config;
pub mod fatal;
pub mod reporter;
pub mod runner;
pub mod telemetry;
