pub mod acceptance;
pub mod config;
pub mod error;
pub mod telemetry;
