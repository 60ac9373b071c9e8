//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod http;
pub mod media;
pub mod memory;
pub mod telemetry;
