//! Landmark stream input.
//!
//! The pose model runs out of process and writes one JSON record per line:
//!
//! ```text
//! {"type":"frame","landmarks":[{"id":12,"x":640,"y":210}, ...]}
//! {"type":"frame","landmarks":[]}
//! {"type":"reset"}
//! ```
//!
//! An empty landmark list means no person was detected in that frame.
//! End of input is the end of the stream.

use crate::{Landmark, LandmarkSet, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Units of incoming landmark coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// Already in pixels
    #[default]
    Pixel,
    /// Fractions of the frame size
    Normalized { width: u32, height: u32 },
}

/// One line of the landmark stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputRecord {
    Frame { landmarks: LandmarkSet },
    /// User asked to start counting from zero
    Reset,
}

impl InputRecord {
    pub fn frame(landmarks: LandmarkSet) -> Self {
        InputRecord::Frame { landmarks }
    }

    fn into_pixels(self, space: CoordinateSpace) -> Self {
        match (self, space) {
            (InputRecord::Frame { landmarks }, CoordinateSpace::Normalized { width, height }) => {
                InputRecord::Frame {
                    landmarks: landmarks
                        .iter()
                        .map(|p| Landmark::from_normalized(p.id, p.x, p.y, width, height))
                        .collect(),
                }
            }
            (record, _) => record,
        }
    }
}

/// Reads `InputRecord`s from a JSON Lines stream
///
/// Malformed lines (bad JSON, unknown record type, invalid UTF-8) are logged
/// and skipped; one bad frame should not end the session. Read errors are
/// returned to the caller.
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
    space: CoordinateSpace,
    line_num: usize,
    skipped: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R, space: CoordinateSpace) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            space,
            line_num: 0,
            skipped: 0,
        }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<InputRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_num += 1;

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<InputRecord>(&self.buf) {
                Ok(record) => return Some(Ok(record.into_pixels(self.space))),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!("Failed to parse record at line {}: {}", self.line_num, e);
                }
            }
        }
    }
}
