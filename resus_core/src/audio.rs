//! Prioritised audio cue queue.
//!
//! Cues are enqueued on the rising edge of a banner becoming active and
//! played one at a time, highest priority first, with a minimum gap
//! between the end of one cue and the start of the next. The queue holds
//! no timer of its own; callers pass the current time in milliseconds.

use crate::alerts::Banner;
use crate::types::Drug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default silence between two cues
pub const DEFAULT_MIN_GAP_MS: u64 = 2000;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSound {
    PulseCheck,
    Adrenaline,
    Amiodarone,
    Lidocaine,
}

impl AlertSound {
    pub fn for_drug(drug: Drug) -> Self {
        match drug {
            Drug::Adrenaline => AlertSound::Adrenaline,
            Drug::Amiodarone => AlertSound::Amiodarone,
            Drug::Lidocaine => AlertSound::Lidocaine,
        }
    }

    /// Higher plays first
    pub fn priority(self) -> u8 {
        match self {
            AlertSound::PulseCheck => 3,
            AlertSound::Adrenaline => 2,
            AlertSound::Amiodarone => 1,
            AlertSound::Lidocaine => 0,
        }
    }

    /// Identifier the playback layer maps to a sound asset
    pub fn token(self) -> &'static str {
        match self {
            AlertSound::PulseCheck => "pulse_check",
            AlertSound::Adrenaline => "adrenaline",
            AlertSound::Amiodarone => "amiodarone",
            AlertSound::Lidocaine => "lidocaine",
        }
    }
}

impl fmt::Display for AlertSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioQueue {
    pending: VecDeque<AlertSound>,
    /// Sounds whose banner was active at the last observation
    active: Vec<AlertSound>,
    playing: Option<AlertSound>,
    last_finished_ms: Option<u64>,
    min_gap_ms: u64,
}

impl Default for AudioQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_GAP_MS)
    }
}

impl AudioQueue {
    pub fn new(min_gap_ms: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            active: Vec::new(),
            playing: None,
            last_finished_ms: None,
            min_gap_ms,
        }
    }

    /// Feed the latest banner projection. Returns the sounds enqueued by
    /// this observation.
    pub fn observe(&mut self, banners: &[Banner]) -> Vec<AlertSound> {
        let now_active: Vec<AlertSound> = banners
            .iter()
            .filter(|b| b.is_active())
            .filter_map(Banner::sound)
            .collect();

        // Cues whose banner went away before playing are stale
        self.pending.retain(|s| now_active.contains(s));

        let mut enqueued = Vec::new();
        for sound in &now_active {
            if !self.active.contains(sound) && !self.pending.contains(sound) {
                self.enqueue(*sound);
                enqueued.push(*sound);
            }
        }
        self.active = now_active;
        enqueued
    }

    /// Insert after every queued sound of equal or higher priority
    fn enqueue(&mut self, sound: AlertSound) {
        let at = self
            .pending
            .iter()
            .position(|s| s.priority() < sound.priority())
            .unwrap_or(self.pending.len());
        self.pending.insert(at, sound);
        tracing::debug!("Queued {} cue ({} pending)", sound, self.pending.len());
    }

    /// Start the next cue if nothing is playing and the gap has elapsed
    pub fn next(&mut self, now_ms: u64) -> Option<AlertSound> {
        if self.playing.is_some() {
            return None;
        }
        if let Some(finished) = self.last_finished_ms {
            if now_ms < finished + self.min_gap_ms {
                return None;
            }
        }
        let sound = self.pending.pop_front()?;
        self.playing = Some(sound);
        Some(sound)
    }

    /// Mark the playing cue as finished
    pub fn finished(&mut self, now_ms: u64) -> Option<AlertSound> {
        let sound = self.playing.take()?;
        self.last_finished_ms = Some(now_ms);
        Some(sound)
    }

    pub fn pending(&self) -> impl Iterator<Item = AlertSound> + '_ {
        self.pending.iter().copied()
    }

    pub fn playing(&self) -> Option<AlertSound> {
        self.playing
    }
}
