// src/gps/mod.rs
//! GPS data handling and parsing

pub mod coord;
pub mod data;
pub mod nmea;
pub mod parser;
pub mod store;

pub use data::{DecimalPosition, ErrorRecord, Fix, FixStatus};
pub use nmea::{Sentence, SentenceAssembler, SentenceKind};
pub use store::FixStore;
