// src/gps/data.rs
//! GPS data structures shared between the ingest and error tasks

use super::coord::to_decimal_degrees;
use crate::error::{GpsError, Result};
use serde::{Deserialize, Serialize};

/// Receiver fix status as reported in the position sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FixStatus {
    /// `A`: position is valid
    Active,
    /// `V`: receiver has no fix
    #[default]
    Void,
}

impl FixStatus {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(FixStatus::Active),
            'V' => Some(FixStatus::Void),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            FixStatus::Active => 'A',
            FixStatus::Void => 'V',
        }
    }
}

/// One parsed position report. Coordinates are kept in their NMEA text form
/// until a consumer converts them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fix {
    pub time: String,      // hhmmss.sss
    pub status: FixStatus,
    pub latitude: String,  // ddmm.mmmm
    pub ns: Option<char>,
    pub longitude: String, // dddmm.mmmm, one leading zero stripped
    pub ew: Option<char>,
    pub speed: String,     // knots
    pub course: String,    // degrees
}

impl Fix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the fix carries a usable position
    pub fn has_fix(&self) -> bool {
        self.status == FixStatus::Active
    }

    /// Integer time of day (HHMMSS), taken from the time field up to the
    /// fractional-second separator.
    pub fn second_of_day(&self) -> Option<u32> {
        let whole = self.time.split('.').next()?;
        if whole.is_empty() {
            return None;
        }
        whole.parse::<u32>().ok()
    }

    /// Convert the NMEA coordinates to signed decimal degrees
    pub fn position(&self) -> Result<DecimalPosition> {
        let ns = self
            .ns
            .ok_or_else(|| GpsError::Parse("missing N/S indicator".to_string()))?;
        let ew = self
            .ew
            .ok_or_else(|| GpsError::Parse("missing E/W indicator".to_string()))?;

        Ok(DecimalPosition {
            latitude: to_decimal_degrees(&self.latitude, ns)?,
            longitude: to_decimal_degrees(&self.longitude, ew)?,
        })
    }
}

/// A position in signed decimal degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DecimalPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl DecimalPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Component-wise difference `self - reference`
    pub fn offset_from(&self, reference: &DecimalPosition) -> DecimalPosition {
        DecimalPosition {
            latitude: self.latitude - reference.latitude,
            longitude: self.longitude - reference.longitude,
        }
    }

    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Averaged position error for one second, ready for the radio link
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: u32, // HHMMSS
}
