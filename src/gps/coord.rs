// src/gps/coord.rs
//! NMEA angle to decimal degree conversion

use crate::error::{GpsError, Result};

/// Convert an NMEA `DDDMM.MMMM` angle plus hemisphere indicator to signed
/// decimal degrees. South and West are negative.
pub fn to_decimal_degrees(raw: &str, hemisphere: char) -> Result<f64> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| GpsError::Parse(format!("bad NMEA angle {:?}: {}", raw, e)))?;

    if !value.is_finite() || value < 0.0 {
        return Err(GpsError::Parse(format!("NMEA angle out of range: {}", raw)));
    }

    let degrees = (value / 100.0).floor();
    let minutes = value - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    match hemisphere {
        'N' | 'E' => Ok(decimal),
        'S' | 'W' => Ok(-decimal),
        other => Err(GpsError::Parse(format!("unknown hemisphere {:?}", other))),
    }
}
