//! Audible cue side channel.
//!
//! The counter only reports that the arm passed through the alert band; how
//! that becomes a sound (or a log line, or nothing) is up to the host.

use serde::Serialize;
use std::io::Write;

/// Raised on every frame whose target percentage lies inside the cue band
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CueEvent {
    pub angle: f64,
    pub target_percentage: f64,
}

/// Receiver for cue events
pub trait CueSink {
    fn alert(&mut self, event: &CueEvent);
}

impl<F> CueSink for F
where
    F: FnMut(&CueEvent),
{
    fn alert(&mut self, event: &CueEvent) {
        self(event)
    }
}

/// Drops every cue
#[derive(Debug, Default)]
pub struct NullCue;

impl CueSink for NullCue {
    fn alert(&mut self, _event: &CueEvent) {}
}

/// Reports cues through tracing
#[derive(Debug, Default)]
pub struct LogCue;

impl CueSink for LogCue {
    fn alert(&mut self, event: &CueEvent) {
        tracing::info!(
            "Cue: {:.0}% at {:.1} degrees",
            event.target_percentage,
            event.angle
        );
    }
}

/// Rings the terminal bell on the wrapped writer
pub struct BellCue<W: Write> {
    out: W,
}

impl<W: Write> BellCue<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CueSink for BellCue<W> {
    fn alert(&mut self, _event: &CueEvent) {
        // Fire and forget; a closed terminal must not stop counting
        if let Err(e) = self.out.write_all(b"\x07").and_then(|_| self.out.flush()) {
            tracing::debug!("Failed to ring bell: {}", e);
        }
    }
}
