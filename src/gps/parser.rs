// src/gps/parser.rs
//! Position sentence (RMC) to [`Fix`] parsing

use super::data::{Fix, FixStatus};
use super::nmea::{Sentence, SentenceKind};
use crate::error::{GpsError, Result};

/// header, time, status, lat, N/S, lon, E/W, speed, course
const RMC_FIELDS: usize = 9;

/// Parse a validated position sentence into a [`Fix`]
pub fn parse_fix(sentence: &Sentence) -> Result<Fix> {
    if sentence.kind != SentenceKind::Position {
        return Err(GpsError::Parse(format!(
            "{} is not a position sentence",
            sentence.tag()
        )));
    }
    parse_fix_body(&sentence.body)
}

/// Parse the comma separated body of a position sentence (no `$`, no `*HH`).
///
/// Trailing fields past the course (date, magnetic variation, mode) are
/// ignored. The longitude keeps the receiver's text except that a single
/// leading `0` is removed, so `00507.0873` is stored as `0507.0873`. This is
/// a normalisation of this station's receiver output; the decimal value is
/// unchanged and other NMEA sources need not follow it.
pub fn parse_fix_body(body: &str) -> Result<Fix> {
    let parts: Vec<&str> = body.split(',').collect();

    if parts.len() < RMC_FIELDS {
        return Err(GpsError::Parse(format!(
            "position sentence has {} fields, expected at least {}",
            parts.len(),
            RMC_FIELDS
        )));
    }

    let status = single_char(parts[2])
        .and_then(FixStatus::from_char)
        .ok_or_else(|| GpsError::Parse(format!("bad fix status {:?}", parts[2])))?;

    let longitude = parts[5].strip_prefix('0').unwrap_or(parts[5]);

    Ok(Fix {
        time: parts[1].to_string(),
        status,
        latitude: parts[3].to_string(),
        ns: hemisphere(parts[4], ['N', 'S'])?,
        longitude: longitude.to_string(),
        ew: hemisphere(parts[6], ['E', 'W'])?,
        speed: parts[7].to_string(),
        course: parts[8].to_string(),
    })
}

fn single_char(field: &str) -> Option<char> {
    let mut chars = field.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn hemisphere(field: &str, allowed: [char; 2]) -> Result<Option<char>> {
    if field.is_empty() {
        return Ok(None);
    }
    match single_char(field) {
        Some(c) if allowed.contains(&c) => Ok(Some(c)),
        _ => Err(GpsError::Parse(format!("bad hemisphere {:?}", field))),
    }
}
