// src/config.rs
//! Station configuration stored as JSON under the user's config directory

use crate::{
    dgps::engine::{DEFAULT_BASELINE_SAMPLES, DEFAULT_WINDOW_SAMPLES},
    error::{GpsError, Result},
    gps::{data::DecimalPosition, nmea::DEFAULT_MAX_SENTENCE_LEN},
    monitor::IngestMode,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Surveyed antenna position of the reference station site
pub const KNOWN_REFERENCE: DecimalPosition = DecimalPosition {
    latitude: 52.0846255748,
    longitude: 5.1682501789,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub serial_port: Option<String>,
    pub serial_baudrate: u32,
    pub ingest_mode: IngestMode,
    /// Fixed reference; `None` means acquire one from the receiver first
    pub reference: Option<DecimalPosition>,
    pub survey_only: bool,
    pub baseline_samples: usize,
    pub window_samples: usize,
    pub fix_queue_capacity: usize,
    pub delivery_queue_capacity: usize,
    pub max_sentence_len: usize,
    pub udp_target: Option<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            serial_baudrate: 9600,
            ingest_mode: IngestMode::Queue,
            reference: None,
            survey_only: false,
            baseline_samples: DEFAULT_BASELINE_SAMPLES,
            window_samples: DEFAULT_WINDOW_SAMPLES,
            fix_queue_capacity: 16,
            delivery_queue_capacity: 8,
            max_sentence_len: DEFAULT_MAX_SENTENCE_LEN,
            udp_target: None,
        }
    }
}

impl StationConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists
    pub fn load() -> Result<Self> {
        let path = Self::get_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpsError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| GpsError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("dgps-station").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.baseline_samples == 0 {
            return Err(GpsError::Config("baseline_samples must be at least 1".to_string()));
        }
        if self.window_samples == 0 {
            return Err(GpsError::Config("window_samples must be at least 1".to_string()));
        }
        if self.fix_queue_capacity == 0 || self.delivery_queue_capacity == 0 {
            return Err(GpsError::Config("queue capacities must be at least 1".to_string()));
        }
        if self.max_sentence_len < 12 {
            return Err(GpsError::Config(format!(
                "max_sentence_len {} cannot hold a sentence",
                self.max_sentence_len
            )));
        }
        if let Some(reference) = self.reference {
            if !reference.is_in_range() {
                return Err(GpsError::Config(format!(
                    "reference {:?} is not a valid position",
                    reference
                )));
            }
        }
        Ok(())
    }

    /// Use a fixed reference position
    pub fn update_reference(&mut self, latitude: f64, longitude: f64) {
        self.reference = Some(DecimalPosition::new(latitude, longitude));
        self.survey_only = false;
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.serial_port = Some(port);
        self.serial_baudrate = baudrate;
    }
}

/// Parse a `lat,lon` pair as given on the command line. `known` selects
/// [`KNOWN_REFERENCE`].
pub fn parse_reference(text: &str) -> Result<DecimalPosition> {
    if text.trim().eq_ignore_ascii_case("known") {
        return Ok(KNOWN_REFERENCE);
    }

    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| GpsError::Parse(format!("expected LAT,LON, got {:?}", text)))?;

    let latitude = lat
        .trim()
        .parse::<f64>()
        .map_err(|e| GpsError::Parse(format!("bad latitude {:?}: {}", lat, e)))?;
    let longitude = lon
        .trim()
        .parse::<f64>()
        .map_err(|e| GpsError::Parse(format!("bad longitude {:?}: {}", lon, e)))?;

    let position = DecimalPosition::new(latitude, longitude);
    if !position.is_in_range() {
        return Err(GpsError::Parse(format!("{} is out of range", text)));
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StationConfig::default();
        assert_eq!(config.serial_baudrate, 9600);
        assert_eq!(config.ingest_mode, IngestMode::Queue);
        assert_eq!(config.window_samples, 5);
        assert_eq!(config.baseline_samples, 500);
        assert!(config.reference.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_serial() {
        let mut config = StationConfig::default();
        config.update_serial("/dev/ttyUSB0".to_string(), 115200);
        assert_eq!(config.serial_port, Some("/dev/ttyUSB0".to_string()));
        assert_eq!(config.serial_baudrate, 115200);
    }

    #[test]
    fn test_update_reference() {
        let mut config = StationConfig {
            survey_only: true,
            ..Default::default()
        };
        config.update_reference(52.1, 5.2);
        assert_eq!(config.reference, Some(DecimalPosition::new(52.1, 5.2)));
        assert!(!config.survey_only);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = StationConfig {
            window_samples: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GpsError::Config(_))));

        let config = StationConfig {
            delivery_queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StationConfig {
            max_sentence_len: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_reference() {
        let config = StationConfig {
            reference: Some(DecimalPosition::new(95.0, 5.0)),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"serial_port":"/dev/ttyACM0","ingest_mode":"notify","reference":{"latitude":52.0846255748,"longitude":5.1682501789}}"#;
        let config: StationConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.ingest_mode, IngestMode::Notify);
        let reference = config.reference.unwrap();
        assert!((reference.latitude - KNOWN_REFERENCE.latitude).abs() < 1e-12);
        assert!((reference.longitude - KNOWN_REFERENCE.longitude).abs() < 1e-12);
        assert_eq!(config.serial_baudrate, 9600);
        assert_eq!(config.window_samples, 5);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("dgps-station-test-{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = StationConfig::default();
        config.update_reference(52.5, 5.5);
        config.save_to(&path).unwrap();

        let loaded = StationConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference("52.0846255748, 5.1682501789").unwrap(),
            KNOWN_REFERENCE
        );
        assert!(parse_reference("52.08").is_err());
        assert!(parse_reference("abc,5").is_err());
        assert!(parse_reference("52,200").is_err());
    }

    #[test]
    fn test_parse_known_reference() {
        assert_eq!(parse_reference("known").unwrap(), KNOWN_REFERENCE);
        assert_eq!(parse_reference(" KNOWN ").unwrap(), KNOWN_REFERENCE);
        assert!(parse_reference("unknown").is_err());

        let mut config = StationConfig::default();
        let reference = parse_reference("known").unwrap();
        config.update_reference(reference.latitude, reference.longitude);
        assert_eq!(config.reference, Some(KNOWN_REFERENCE));
        assert!(config.validate().is_ok());
    }
}
