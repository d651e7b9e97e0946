// src/lib.rs
//! DGPS Station Library
//!
//! Turns a raw NMEA byte stream from a GPS receiver into per-second
//! position error records relative to a reference position, ready for a
//! radio link.

pub mod config;
pub mod dgps;
pub mod error;
pub mod gps;
pub mod monitor;
pub mod radio;

// Re-export main types for convenience
pub use error::{GpsError, Result};
pub use gps::{DecimalPosition, ErrorRecord, Fix, FixStore};
pub use monitor::{IngestMode, Station};
