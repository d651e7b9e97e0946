// src/dgps/engine.rs
//! Reference acquisition and per-second differential error averaging
//!
//! The engine is owned by a single task and is never shared, so none of its
//! state is locked.

use crate::gps::data::{DecimalPosition, ErrorRecord, Fix};
use log::{debug, info, trace};

/// Default number of fixes averaged into a reference (15 minutes at 1 Hz)
pub const DEFAULT_BASELINE_SAMPLES: usize = 500;
/// Default number of fixes per one-second error window
pub const DEFAULT_WINDOW_SAMPLES: usize = 5;

/// Running mean using the actual sample count.
/// Returns `None` for an empty slice.
pub fn mean_position(samples: &[DecimalPosition]) -> Option<DecimalPosition> {
    if samples.is_empty() {
        return None;
    }
    let mut mean = DecimalPosition::default();
    for (k, sample) in samples.iter().enumerate() {
        accumulate(&mut mean, sample, k + 1);
    }
    Some(mean)
}

/// Fold `sample` into `mean`, `count` being the count including `sample`.
/// A uniform series keeps its exact value.
fn accumulate(mean: &mut DecimalPosition, sample: &DecimalPosition, count: usize) {
    let k = count as f64;
    mean.latitude += (sample.latitude - mean.latitude) / k;
    mean.longitude += (sample.longitude - mean.longitude) / k;
}

/// Fixed-capacity buffer of positions averaged into a reference point
#[derive(Debug, Clone)]
pub struct BaselineAcquisition {
    samples: Vec<DecimalPosition>,
    capacity: usize,
}

impl BaselineAcquisition {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add one sample. When the buffer fills, returns the mean and empties
    /// the buffer for the next cycle.
    pub fn add(&mut self, position: DecimalPosition) -> Option<DecimalPosition> {
        self.samples.push(position);
        trace!(
            "baseline sample {}/{}: {:.9} {:.9}",
            self.samples.len(),
            self.capacity,
            position.latitude,
            position.longitude
        );

        if self.samples.len() < self.capacity {
            return None;
        }
        let mean = mean_position(&self.samples);
        self.samples.clear();
        mean
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Averaging window bound to one integer second of the receiver clock
#[derive(Debug, Clone)]
pub struct DifferentialWindow {
    key: Option<u32>,
    mean: DecimalPosition,
    count: usize,
    threshold: usize,
}

impl DifferentialWindow {
    pub fn new(threshold: usize) -> Self {
        Self {
            key: None,
            mean: DecimalPosition::default(),
            count: 0,
            threshold: threshold.max(1),
        }
    }

    /// Add a position stamped with `second` (HHMMSS). A different second
    /// discards the partial window and starts a new one; an [`ErrorRecord`]
    /// is returned once `threshold` samples of the same second are in.
    pub fn add(
        &mut self,
        second: u32,
        position: DecimalPosition,
        reference: &DecimalPosition,
    ) -> Option<ErrorRecord> {
        if self.key != Some(second) {
            if self.count > 0 {
                debug!(
                    "second {} left with {}/{} samples, window restarted",
                    self.key.unwrap_or_default(),
                    self.count,
                    self.threshold
                );
            }
            self.key = Some(second);
            self.mean = DecimalPosition::default();
            self.count = 0;
        }

        self.count += 1;
        accumulate(&mut self.mean, &position, self.count);

        if self.count < self.threshold {
            return None;
        }

        let error = self.mean.offset_from(reference);
        self.mean = DecimalPosition::default();
        self.count = 0;

        Some(ErrorRecord {
            latitude: error.latitude,
            longitude: error.longitude,
            timestamp: second,
        })
    }

    /// Second the window is collecting for
    pub fn key(&self) -> Option<u32> {
        self.key
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

/// What a processed fix produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A baseline cycle completed
    ReferenceEstablished(DecimalPosition),
    /// A differential window completed
    Error(ErrorRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Acquiring a reference; switches to differential when done
    Surveying,
    /// Repeating baseline cycles forever
    SurveyOnly,
    Differential,
}

pub struct ErrorEngine {
    mode: EngineMode,
    reference: Option<DecimalPosition>,
    baseline: BaselineAcquisition,
    window: DifferentialWindow,
}

impl ErrorEngine {
    /// Differential mode against a known reference
    pub fn with_reference(reference: DecimalPosition, window_samples: usize) -> Self {
        Self {
            mode: EngineMode::Differential,
            reference: Some(reference),
            baseline: BaselineAcquisition::new(DEFAULT_BASELINE_SAMPLES),
            window: DifferentialWindow::new(window_samples),
        }
    }

    /// Acquire a reference from `baseline_samples` fixes, then go differential
    pub fn surveying(baseline_samples: usize, window_samples: usize) -> Self {
        Self {
            mode: EngineMode::Surveying,
            reference: None,
            baseline: BaselineAcquisition::new(baseline_samples),
            window: DifferentialWindow::new(window_samples),
        }
    }

    /// Only average baselines, never emit error records
    pub fn survey_only(baseline_samples: usize) -> Self {
        Self {
            mode: EngineMode::SurveyOnly,
            reference: None,
            baseline: BaselineAcquisition::new(baseline_samples),
            window: DifferentialWindow::new(DEFAULT_WINDOW_SAMPLES),
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn reference(&self) -> Option<DecimalPosition> {
        self.reference
    }

    pub fn baseline(&self) -> &BaselineAcquisition {
        &self.baseline
    }

    pub fn window(&self) -> &DifferentialWindow {
        &self.window
    }

    /// Process one fix. Fixes without a valid status, time or position are
    /// ignored.
    pub fn process(&mut self, fix: &Fix) -> Option<EngineEvent> {
        if !fix.has_fix() {
            trace!("fix at {} has no position, skipped", fix.time);
            return None;
        }
        let position = match fix.position() {
            Ok(position) => position,
            Err(e) => {
                debug!("fix at {} dropped: {}", fix.time, e);
                return None;
            }
        };

        match self.mode {
            EngineMode::Surveying | EngineMode::SurveyOnly => self.survey(position),
            EngineMode::Differential => {
                let Some(second) = fix.second_of_day() else {
                    debug!("fix time {:?} unusable, skipped", fix.time);
                    return None;
                };
                self.process_position(second, position)
            }
        }
    }

    /// Differential step on an already converted position
    pub fn process_position(
        &mut self,
        second: u32,
        position: DecimalPosition,
    ) -> Option<EngineEvent> {
        let reference = self.reference?;
        self.window
            .add(second, position, &reference)
            .map(EngineEvent::Error)
    }

    fn survey(&mut self, position: DecimalPosition) -> Option<EngineEvent> {
        let mean = self.baseline.add(position)?;
        info!(
            "baseline of {} samples: {:.9} {:.9}",
            self.baseline.capacity(),
            mean.latitude,
            mean.longitude
        );

        if self.mode == EngineMode::Surveying {
            self.reference = Some(mean);
            self.mode = EngineMode::Differential;
            info!("reference position fixed, differential mode started");
        }
        Some(EngineEvent::ReferenceEstablished(mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::data::FixStatus;

    fn fix(time: &str, lat: &str, lon: &str) -> Fix {
        Fix {
            time: time.to_string(),
            status: FixStatus::Active,
            latitude: lat.to_string(),
            ns: Some('N'),
            longitude: lon.to_string(),
            ew: Some('E'),
            speed: "0.00".to_string(),
            course: "0.00".to_string(),
        }
    }

    #[test]
    fn test_five_identical_fixes_give_zero_error() {
        let reference = DecimalPosition::new(52.0, 5.0);
        let mut engine = ErrorEngine::with_reference(reference, 5);
        let times = ["120000.000", "120000.200", "120000.400", "120000.600"];

        for t in times {
            assert_eq!(engine.process(&fix(t, "5200.0000", "0500.0000")), None);
        }
        let event = engine.process(&fix("120000.800", "5200.0000", "0500.0000"));
        assert_eq!(
            event,
            Some(EngineEvent::Error(ErrorRecord {
                latitude: 0.0,
                longitude: 0.0,
                timestamp: 120000,
            }))
        );
        assert_eq!(engine.window().count(), 0);
    }

    #[test]
    fn test_error_is_mean_minus_reference() {
        let reference = DecimalPosition::new(52.0, 5.0);
        let mut window = DifferentialWindow::new(4);
        let samples = [
            DecimalPosition::new(52.1, 5.1),
            DecimalPosition::new(52.3, 5.3),
            DecimalPosition::new(52.1, 5.1),
            DecimalPosition::new(52.3, 5.3),
        ];

        let mut out = None;
        for s in samples {
            out = window.add(42, s, &reference);
        }
        let record = out.expect("window complete");
        assert!((record.latitude - 0.2).abs() < 1e-12);
        assert!((record.longitude - 0.2).abs() < 1e-12);
        assert_eq!(record.timestamp, 42);
    }

    #[test]
    fn test_new_second_restarts_partial_window() {
        let reference = DecimalPosition::new(52.0, 5.0);
        let mut window = DifferentialWindow::new(5);
        let p = DecimalPosition::new(52.5, 5.5);

        for _ in 0..3 {
            assert!(window.add(100, p, &reference).is_none());
        }
        assert_eq!(window.count(), 3);

        // Different second: no emission for 100, fresh window of one
        assert!(window.add(101, p, &reference).is_none());
        assert_eq!(window.key(), Some(101));
        assert_eq!(window.count(), 1);

        for _ in 0..3 {
            assert!(window.add(101, p, &reference).is_none());
        }
        let record = window.add(101, p, &reference).expect("fifth sample of 101");
        assert_eq!(record.timestamp, 101);
    }

    #[test]
    fn test_same_second_after_emission_starts_over() {
        let reference = DecimalPosition::new(0.0, 0.0);
        let mut window = DifferentialWindow::new(2);
        let p = DecimalPosition::new(1.0, 1.0);

        assert!(window.add(7, p, &reference).is_none());
        assert!(window.add(7, p, &reference).is_some());
        assert!(window.add(7, p, &reference).is_none());
        assert!(window.add(7, p, &reference).is_some());
    }

    #[test]
    fn test_baseline_uniform_is_exact() {
        let mut baseline = BaselineAcquisition::new(10);
        let p = DecimalPosition::new(52.1, 5.2);

        for _ in 0..9 {
            assert!(baseline.add(p).is_none());
        }
        assert_eq!(baseline.add(p), Some(DecimalPosition::new(52.1, 5.2)));
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_baseline_mean_and_reset() {
        let mut baseline = BaselineAcquisition::new(2);
        assert!(baseline.add(DecimalPosition::new(52.0, 5.0)).is_none());
        let mean = baseline.add(DecimalPosition::new(53.0, 6.0)).unwrap();
        assert_eq!(mean, DecimalPosition::new(52.5, 5.5));

        assert!(baseline.add(DecimalPosition::new(10.0, 10.0)).is_none());
        assert_eq!(baseline.len(), 1);
    }

    #[test]
    fn test_mean_position() {
        assert_eq!(mean_position(&[]), None);
        let mean = mean_position(&[
            DecimalPosition::new(1.0, -1.0),
            DecimalPosition::new(2.0, -2.0),
            DecimalPosition::new(3.0, -3.0),
        ])
        .unwrap();
        assert!((mean.latitude - 2.0).abs() < 1e-12);
        assert!((mean.longitude + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_survey_then_differential() {
        let mut engine = ErrorEngine::surveying(3, 2);
        assert_eq!(engine.mode(), EngineMode::Surveying);

        assert_eq!(engine.process(&fix("100000.000", "5200.0000", "0500.0000")), None);
        assert_eq!(engine.process(&fix("100001.000", "5200.0000", "0500.0000")), None);
        let event = engine.process(&fix("100002.000", "5200.0000", "0500.0000"));
        assert_eq!(
            event,
            Some(EngineEvent::ReferenceEstablished(DecimalPosition::new(52.0, 5.0)))
        );
        assert_eq!(engine.mode(), EngineMode::Differential);
        assert_eq!(engine.reference(), Some(DecimalPosition::new(52.0, 5.0)));

        assert_eq!(engine.process(&fix("100003.000", "5200.6000", "0500.0000")), None);
        match engine.process(&fix("100003.500", "5200.6000", "0500.0000")) {
            Some(EngineEvent::Error(record)) => {
                assert!((record.latitude - 0.01).abs() < 1e-12);
                assert!(record.longitude.abs() < 1e-12);
                assert_eq!(record.timestamp, 100003);
            }
            other => panic!("expected error record, got {:?}", other),
        }
    }

    #[test]
    fn test_survey_only_keeps_cycling() {
        let mut engine = ErrorEngine::survey_only(2);
        let f = fix("100000.000", "5200.0000", "0500.0000");

        for _ in 0..3 {
            assert!(engine.process(&f).is_none());
            assert!(matches!(
                engine.process(&f),
                Some(EngineEvent::ReferenceEstablished(_))
            ));
        }
        assert_eq!(engine.mode(), EngineMode::SurveyOnly);
        assert_eq!(engine.reference(), None);
    }

    #[test]
    fn test_void_and_broken_fixes_ignored() {
        let reference = DecimalPosition::new(52.0, 5.0);
        let mut engine = ErrorEngine::with_reference(reference, 1);

        let mut void = fix("120000.000", "5200.0000", "0500.0000");
        void.status = FixStatus::Void;
        assert_eq!(engine.process(&void), None);

        let no_time = fix("", "5200.0000", "0500.0000");
        assert_eq!(engine.process(&no_time), None);

        let mut no_hemisphere = fix("120000.000", "5200.0000", "0500.0000");
        no_hemisphere.ns = None;
        assert_eq!(engine.process(&no_hemisphere), None);

        assert_eq!(engine.window().count(), 0);
        assert!(engine
            .process(&fix("120000.000", "5200.0000", "0500.0000"))
            .is_some());
    }
}
