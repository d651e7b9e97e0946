// src/gps/nmea.rs
//! NMEA sentence assembly and checksum validation
//!
//! Bytes arrive one at a time from the receiver. [`SentenceAssembler`]
//! resynchronises on `$`, classifies the sentence from its five character
//! tag, buffers sentences of interest and validates the `*HH` checksum when
//! the carriage return arrives. Everything that fails along the way is
//! dropped and only shows up in [`AssemblerStats`].

use log::{debug, trace};

/// Default bound on a buffered sentence, `$` and checksum included
pub const DEFAULT_MAX_SENTENCE_LEN: usize = 96;

const START: u8 = b'$';
const CHECKSUM_MARK: u8 = b'*';
const TERMINATOR: u8 = b'\r';
const TAG_LEN: usize = 5;

/// Tags that carry the position/status report
const POSITION_TAGS: [&str; 2] = ["GNRMC", "GPRMC"];
/// Tags that are read and validated but not interpreted
const OTHER_TAGS: [&str; 2] = ["GPGSA", "GNGGA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    Position,
    Other,
    Unclassified,
}

/// A terminated, checksum-valid sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub kind: SentenceKind,
    /// Text between `$` and `*`, exclusive
    pub body: String,
}

impl Sentence {
    /// The five character tag, e.g. `GNRMC`
    pub fn tag(&self) -> &str {
        self.body.get(..TAG_LEN).unwrap_or(&self.body)
    }
}

/// Running counters for sentences the assembler threw away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub accepted: u64,
    pub checksum_errors: u64,
    pub overflows: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Header,
    Reading,
    Skipping,
}

pub struct SentenceAssembler {
    state: State,
    kind: SentenceKind,
    buf: Vec<u8>,
    max_len: usize,
    stats: AssemblerStats,
}

impl SentenceAssembler {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_SENTENCE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            state: State::Idle,
            kind: SentenceKind::Unclassified,
            buf: Vec::with_capacity(max_len),
            max_len,
            stats: AssemblerStats::default(),
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Drop any sentence in progress and wait for the next `$`
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.kind = SentenceKind::Unclassified;
        self.buf.clear();
    }

    /// Feed one byte. Returns a sentence when a valid one has just been
    /// terminated.
    pub fn push(&mut self, byte: u8) -> Option<Sentence> {
        if byte == START {
            self.buf.clear();
            self.buf.push(byte);
            self.kind = SentenceKind::Unclassified;
            self.state = State::Header;
            return None;
        }

        match self.state {
            State::Idle => None,
            State::Skipping => {
                if byte == TERMINATOR {
                    self.state = State::Idle;
                }
                None
            }
            State::Header => {
                if byte == TERMINATOR {
                    trace!("sentence terminated inside its tag");
                    self.reset();
                    return None;
                }
                self.buf.push(byte);
                if self.buf.len() == TAG_LEN + 1 {
                    self.kind = classify(&self.buf[1..]);
                    if self.kind == SentenceKind::Unclassified {
                        self.stats.skipped += 1;
                        self.buf.clear();
                        self.state = State::Skipping;
                    } else {
                        self.state = State::Reading;
                    }
                }
                None
            }
            State::Reading => {
                if byte == TERMINATOR {
                    return self.terminate();
                }
                if self.buf.len() >= self.max_len {
                    debug!("sentence exceeded {} bytes, dropped", self.max_len);
                    self.stats.overflows += 1;
                    self.reset();
                    return None;
                }
                self.buf.push(byte);
                None
            }
        }
    }

    fn terminate(&mut self) -> Option<Sentence> {
        let kind = self.kind;
        let raw = std::mem::take(&mut self.buf);
        self.reset();

        let Some(body) = checksum_valid(&raw[1..]) else {
            debug!("checksum mismatch: {}", String::from_utf8_lossy(&raw));
            self.stats.checksum_errors += 1;
            return None;
        };

        match std::str::from_utf8(body) {
            Ok(text) => {
                self.stats.accepted += 1;
                Some(Sentence {
                    kind,
                    body: text.to_string(),
                })
            }
            Err(_) => {
                self.stats.checksum_errors += 1;
                None
            }
        }
    }
}

impl Default for SentenceAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a sentence from the five characters after `$`
pub fn classify(tag: &[u8]) -> SentenceKind {
    let Ok(tag) = std::str::from_utf8(tag) else {
        return SentenceKind::Unclassified;
    };
    if POSITION_TAGS.contains(&tag) {
        SentenceKind::Position
    } else if OTHER_TAGS.contains(&tag) {
        SentenceKind::Other
    } else {
        SentenceKind::Unclassified
    }
}

/// XOR of every byte in `body`
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Validate `body*HH` (the part after `$`). Returns the body without the
/// checksum suffix when the two hex digits match.
pub fn checksum_valid(sentence: &[u8]) -> Option<&[u8]> {
    let star = sentence.iter().position(|&b| b == CHECKSUM_MARK)?;
    let (body, suffix) = sentence.split_at(star);
    let digits = suffix.get(1..3)?;
    let expected = (hex_value(digits[0])? << 4) | hex_value(digits[1])?;

    if checksum(body) == expected {
        Some(body)
    } else {
        None
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}
