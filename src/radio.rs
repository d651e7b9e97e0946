// src/radio.rs
//! Hand-off of error records to the radio link

use crate::{error::Result, gps::data::ErrorRecord};
use std::io::Write;
use tokio::net::{ToSocketAddrs, UdpSocket};

/// Fixed radio payload size in bytes
pub const PAYLOAD_SIZE: usize = 32;

impl ErrorRecord {
    /// Encode as the 32 byte radio frame: latitude and longitude as
    /// little-endian f64, timestamp as little-endian u32, zero padded.
    pub fn to_payload(&self) -> [u8; PAYLOAD_SIZE] {
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload[0..8].copy_from_slice(&self.latitude.to_le_bytes());
        payload[8..16].copy_from_slice(&self.longitude.to_le_bytes());
        payload[16..20].copy_from_slice(&self.timestamp.to_le_bytes());
        payload
    }
}

/// Something that can put an error record on the air
pub trait Transmitter {
    fn transmit(&mut self, record: &ErrorRecord) -> Result<()>;
}

/// Writes each record as one JSON object per line
pub struct JsonLineTransmitter<W: Write> {
    out: W,
}

impl<W: Write> JsonLineTransmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLineTransmitter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Transmitter for JsonLineTransmitter<W> {
    fn transmit(&mut self, record: &ErrorRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Sends the binary payload as one UDP datagram per record.
///
/// Sending never waits: a datagram the socket cannot take right away is
/// reported as a failed transmission and that record is dropped.
pub struct UdpTransmitter {
    socket: UdpSocket,
}

impl UdpTransmitter {
    pub async fn connect<A: ToSocketAddrs>(target: A) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(target).await?;
        Ok(Self { socket })
    }
}

impl Transmitter for UdpTransmitter {
    fn transmit(&mut self, record: &ErrorRecord) -> Result<()> {
        self.socket.try_send(&record.to_payload())?;
        Ok(())
    }
}
