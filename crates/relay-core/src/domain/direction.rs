//! Volume samples and the direction derived from them.
//!
//! The platform reports the absolute media volume level after every change.
//! Comparing each level with the previous one tells us which button was
//! pressed.  [`LevelTracker`] holds the last sample and performs that
//! comparison; it is pure and has no notion of timers.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// The direction of a detected volume change.
///
/// This is the only thing that crosses from the detector into command
/// mapping; raw levels never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectionEvent {
    /// Volume went up.
    Increase,
    /// Volume went down.
    Decrease,
}

/// One volume-level notification from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSample {
    pub level: u32,
    pub at: Instant,
}

impl VolumeSample {
    /// Stamps `level` with the current monotonic time.
    pub fn now(level: u32) -> Self {
        Self {
            level,
            at: Instant::now(),
        }
    }
}

/// Compares consecutive volume samples.
///
/// The first sample after construction (or after [`LevelTracker::clear`]) is
/// a baseline and never produces a direction.
#[derive(Debug, Default, Clone)]
pub struct LevelTracker {
    last: Option<VolumeSample>,
}

impl LevelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sample` and returns the direction relative to the previous
    /// sample, or `None` for a baseline or an unchanged level.
    pub fn observe(&mut self, sample: VolumeSample) -> Option<DirectionEvent> {
        let previous = self.last.replace(sample);
        let previous = previous?;

        let direction = match sample.level.cmp(&previous.level) {
            std::cmp::Ordering::Greater => Some(DirectionEvent::Increase),
            std::cmp::Ordering::Less => Some(DirectionEvent::Decrease),
            std::cmp::Ordering::Equal => None,
        };
        trace!(
            from = previous.level,
            to = sample.level,
            ?direction,
            "volume sample compared"
        );
        direction
    }

    /// Moves the baseline to `level` without producing a direction.
    ///
    /// Used after the detector itself changed the device volume so the echo
    /// notification compares equal.
    pub fn rebase(&mut self, level: u32) {
        self.last = Some(VolumeSample::now(level));
    }

    /// Forgets the baseline; the next sample becomes the new baseline.
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// The last recorded level, if any.
    pub fn last_level(&self) -> Option<u32> {
        self.last.map(|s| s.level)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
