// src/dgps/mod.rs
//! Differential error computation and delivery

pub mod engine;
pub mod queue;
pub mod signal;

pub use engine::{EngineEvent, ErrorEngine};
pub use queue::DeliveryQueue;
pub use signal::FixSignal;
