// src/monitor.rs
//! Station task wiring: ingest, error engine and transmit
//!
//! ```text
//! bytes -> SentenceAssembler -> parse_fix -> FixStore::publish
//!                                              |  signal or fix queue
//!                                              v
//!                                   ErrorEngine -> DeliveryQueue -> Transmitter
//! ```

use crate::{
    config::StationConfig,
    dgps::{
        engine::{EngineEvent, ErrorEngine},
        queue::DeliveryQueue,
        signal::FixSignal,
    },
    error::{GpsError, Result},
    gps::{
        data::{ErrorRecord, Fix, FixStatus},
        nmea::{AssemblerStats, Sentence, SentenceAssembler, SentenceKind},
        parser::parse_fix,
        store::FixStore,
    },
    radio::Transmitter,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// How the engine task learns about new fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Coalescing wake-up, engine reads the latest snapshot
    Notify,
    /// Every fix is queued (drop-oldest) and drained by the engine
    Queue,
}

/// Shared handles of one running station. Clones share all state.
#[derive(Clone)]
pub struct Station {
    config: StationConfig,
    store: Arc<FixStore>,
    signal: Arc<FixSignal>,
    fixes: Arc<DeliveryQueue<Fix>>,
    delivery: Arc<DeliveryQueue<ErrorRecord>>,
}

impl Station {
    pub fn new(config: StationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(FixStore::new()),
            signal: Arc::new(FixSignal::new()),
            fixes: Arc::new(DeliveryQueue::new("fix", config.fix_queue_capacity)),
            delivery: Arc::new(DeliveryQueue::new("delivery", config.delivery_queue_capacity)),
            config,
        })
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<FixStore> {
        Arc::clone(&self.store)
    }

    pub fn delivery(&self) -> Arc<DeliveryQueue<ErrorRecord>> {
        Arc::clone(&self.delivery)
    }

    /// Build the engine the configuration asks for
    pub fn build_engine(&self) -> ErrorEngine {
        let config = &self.config;
        if config.survey_only {
            ErrorEngine::survey_only(config.baseline_samples)
        } else if let Some(reference) = config.reference {
            ErrorEngine::with_reference(reference, config.window_samples)
        } else {
            ErrorEngine::surveying(config.baseline_samples, config.window_samples)
        }
    }

    /// Open the receiver's serial port
    pub fn connect_serial(&self, port: &str, baudrate: u32) -> Result<SerialStream> {
        info!("Connecting to GPS on {} at {} baud...", port, baudrate);

        let serial = tokio_serial::new(port, baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| GpsError::Connection(format!("Failed to open serial port {}: {}", port, e)))?;

        info!("Connected to {}", port);
        Ok(serial)
    }

    /// Producer task: assemble sentences from `reader` and publish every
    /// parsed fix. Returns at end of stream.
    pub async fn ingest<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<AssemblerStats> {
        let mut assembler = SentenceAssembler::with_max_len(self.config.max_sentence_len);
        let mut last_status = None;
        let mut buf = [0u8; 256];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                if let Some(sentence) = assembler.push(byte) {
                    if let Some(fix) = self.accept(&sentence, &mut last_status) {
                        self.publish(fix)?;
                    }
                }
            }
        }

        let stats = assembler.stats();
        info!(
            "input closed: {} sentences accepted, {} checksum errors, {} overflows, {} skipped",
            stats.accepted, stats.checksum_errors, stats.overflows, stats.skipped
        );
        Ok(stats)
    }

    /// Parse a position sentence and track fix lock transitions
    fn accept(&self, sentence: &Sentence, last_status: &mut Option<FixStatus>) -> Option<Fix> {
        if sentence.kind != SentenceKind::Position {
            return None;
        }
        let fix = match parse_fix(sentence) {
            Ok(fix) => fix,
            Err(e) => {
                debug!("{} dropped: {}", sentence.tag(), e);
                return None;
            }
        };

        if *last_status != Some(fix.status) {
            match fix.status {
                FixStatus::Active => info!("GPS lock acquired at {}", fix.time),
                FixStatus::Void => warn!("GPS lock lost at {}", fix.time),
            }
            *last_status = Some(fix.status);
        }
        Some(fix)
    }

    fn publish(&self, fix: Fix) -> Result<()> {
        match self.config.ingest_mode {
            IngestMode::Notify => {
                self.store.publish(fix)?;
                self.signal.raise();
            }
            IngestMode::Queue => {
                self.store.publish(fix.clone())?;
                self.fixes.push(fix)?;
            }
        }
        Ok(())
    }

    /// Consumer task: feed fixes to `engine` and queue the resulting error
    /// records. Only returns on a lock failure.
    pub async fn run_engine(&self, mut engine: ErrorEngine) -> Result<()> {
        info!("error engine started in {:?} mode", engine.mode());

        match self.config.ingest_mode {
            IngestMode::Notify => {
                let mut local = Fix::default();
                let mut seen = 0;
                loop {
                    self.signal.wait().await;
                    // a stored permit can outlive the fix that raised it
                    let generation = self.store.snapshot(&mut local)?;
                    if generation == seen {
                        let age = self.store.age_seconds()?.unwrap_or_default();
                        debug!("no new fix since generation {} ({}s old)", seen, age);
                        continue;
                    }
                    seen = generation;
                    self.emit(engine.process(&local))?;
                }
            }
            IngestMode::Queue => loop {
                let fix = self.fixes.receive().await?;
                self.emit(engine.process(&fix))?;
                for fix in self.fixes.drain()? {
                    self.emit(engine.process(&fix))?;
                }
            },
        }
    }

    fn emit(&self, event: Option<EngineEvent>) -> Result<()> {
        match event {
            Some(EngineEvent::Error(record)) => {
                debug!(
                    "error for {}: {:.9} {:.9}",
                    record.timestamp, record.latitude, record.longitude
                );
                self.delivery.push(record)?;
            }
            Some(EngineEvent::ReferenceEstablished(_)) | None => {}
        }
        Ok(())
    }

    /// Transmit task: hand every delivered record to `tx`. A failed
    /// transmission drops that record.
    pub async fn run_transmitter<T: Transmitter>(&self, mut tx: T) -> Result<()> {
        info!("transmitter started");
        loop {
            let record = self.delivery.receive().await?;
            if let Err(e) = tx.transmit(&record) {
                warn!("transmission of {} failed: {}", record.timestamp, e);
            }
        }
    }

    /// Process a recorded stream in one task: every fix goes through the
    /// engine and every record to `tx` before the next byte is read.
    pub async fn replay<R, T>(
        &self,
        mut reader: R,
        mut engine: ErrorEngine,
        tx: &mut T,
    ) -> Result<AssemblerStats>
    where
        R: AsyncRead + Unpin,
        T: Transmitter,
    {
        let mut assembler = SentenceAssembler::with_max_len(self.config.max_sentence_len);
        let mut last_status = None;
        let mut buf = [0u8; 256];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                let Some(sentence) = assembler.push(byte) else {
                    continue;
                };
                let Some(fix) = self.accept(&sentence, &mut last_status) else {
                    continue;
                };
                let event = engine.process(&fix);
                self.store.publish(fix)?;
                self.emit(event)?;
                for record in self.delivery.drain()? {
                    if let Err(e) = tx.transmit(&record) {
                        warn!("transmission of {} failed: {}", record.timestamp, e);
                    }
                }
            }
        }
        Ok(assembler.stats())
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| GpsError::Other(format!("Failed to list serial ports: {}", e)))?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}
