//! Phase tracking and overall-progress mapping
//!
//! yt-dlp reports two independent 0-100% runs for a video+audio download (one per
//! stream) and says nothing while ffmpeg merges them. [`ProgressTracker`] watches the
//! output for stream and merge markers and folds everything into one overall
//! percentage that never goes backwards and only reaches 100 on completion.

use serde::Serialize;

use crate::download::event::ProgressEvent;
use crate::download::parser::parse_line;

/// Overall percent shown while the merge step runs
pub const MERGE_OVERALL_PERCENT: u8 = 95;

/// Highest overall percent before the session is complete
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Primary stream maps onto 0..75
const PRIMARY_WEIGHT: f64 = 0.75;

/// Secondary stream maps onto 75..90
const SECONDARY_OFFSET: f64 = 75.0;
const SECONDARY_WEIGHT: f64 = 0.15;

/// Stage of one download session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    /// First stream (video, or the only stream of a combined format)
    DownloadingPrimary,
    /// Second stream (audio of a video+audio pair)
    DownloadingSecondary,
    Merging,
    Complete,
    Error,
}

impl Phase {
    /// Status line shown in the UI for this phase
    pub fn message(self) -> &'static str {
        match self {
            Phase::Initializing => "Fetching video info...",
            Phase::DownloadingPrimary => "Downloading video...",
            Phase::DownloadingSecondary => "Downloading audio...",
            Phase::Merging => "Merging video and audio...",
            Phase::Complete => "Download complete!",
            Phase::Error => "Download failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }
}

/// Maps a phase-local percent onto the overall 0-100 scale.
///
/// | phase                 | overall                 |
/// |-----------------------|-------------------------|
/// | downloading_primary   | `round(p * 0.75)`       |
/// | downloading_secondary | `round(75 + p * 0.15)`  |
/// | merging               | 95                      |
/// | complete              | 100                     |
/// | initializing, error   | 0                       |
///
/// Every non-complete phase is capped at 99.
pub fn map_to_overall(phase: Phase, phase_percent: f64) -> u8 {
    let pct = if phase_percent.is_finite() {
        phase_percent.clamp(0.0, 100.0)
    } else {
        0.0
    };

    let mapped = match phase {
        Phase::Initializing | Phase::Error => 0.0,
        Phase::DownloadingPrimary => (pct * PRIMARY_WEIGHT).round(),
        Phase::DownloadingSecondary => (SECONDARY_OFFSET + pct * SECONDARY_WEIGHT).round(),
        Phase::Merging => f64::from(MERGE_OVERALL_PERCENT),
        Phase::Complete => return 100,
    };

    (mapped as u8).min(MAX_RUNNING_PERCENT)
}

fn is_destination_marker(line: &str) -> bool {
    line.starts_with("[download] Destination:")
}

fn is_merge_marker(line: &str) -> bool {
    line.starts_with("[Merger]") || line.starts_with("[ExtractAudio]")
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Per-session phase state machine.
///
/// `Initializing`, `Complete` and `Error` are entered only through the control-flow
/// methods; `observe` drives the transitions in between. Terminal phases absorb all
/// further input.
#[derive(Debug)]
pub struct ProgressTracker {
    phase: Phase,
    stream_count: u32,
    last_overall: u8,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            stream_count: 0,
            last_overall: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of `Destination:` announcements seen so far
    pub fn stream_count(&self) -> u32 {
        self.stream_count
    }

    /// Event shown while the title is being fetched
    pub fn initializing_event(&mut self) -> ProgressEvent {
        self.phase = Phase::Initializing;
        self.event(0.0, None, None, None)
    }

    /// Called right before the download process is spawned.
    pub fn begin_download(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = Phase::DownloadingPrimary;
        }
    }

    /// Feeds one output line (stdout or stderr) through the state machine.
    ///
    /// Returns the event to emit, if the line produced one.
    pub fn observe(&mut self, line: &str) -> Option<ProgressEvent> {
        if self.phase.is_terminal() {
            return None;
        }

        let line = line.trim();

        if is_destination_marker(line) {
            self.stream_count += 1;
            if self.stream_count >= 2 && self.phase == Phase::DownloadingPrimary {
                self.phase = Phase::DownloadingSecondary;
                tracing::debug!(streams = self.stream_count, "Second stream started");
            }
            return None;
        }

        if is_merge_marker(line) {
            self.phase = Phase::Merging;
            tracing::debug!("Merge step started");
            // No granular progress comes out of the merge step, so the UI gets a
            // single fixed update when it begins.
            return Some(self.event(100.0, None, None, None));
        }

        let parsed = parse_line(line)?;
        match self.phase {
            Phase::DownloadingPrimary | Phase::DownloadingSecondary | Phase::Merging => Some(self.event(
                parsed.percent,
                parsed.speed,
                parsed.eta,
                Some(parsed.total_size),
            )),
            // Progress before the download step started is not ours to report
            Phase::Initializing | Phase::Complete | Phase::Error => None,
        }
    }

    /// Final progress event; the only one that carries 100.
    pub fn complete(&mut self) -> ProgressEvent {
        self.phase = Phase::Complete;
        self.event(100.0, None, None, None)
    }

    pub fn fail(&mut self) {
        self.phase = Phase::Error;
    }

    fn event(
        &mut self,
        phase_percent: f64,
        speed: Option<String>,
        eta: Option<String>,
        total_size: Option<String>,
    ) -> ProgressEvent {
        let mapped = map_to_overall(self.phase, phase_percent);
        self.last_overall = self.last_overall.max(mapped);

        ProgressEvent {
            phase: self.phase,
            phase_percent: round_one_decimal(phase_percent.clamp(0.0, 100.0)),
            overall_percent: self.last_overall,
            speed,
            eta,
            total_size,
            message: self.phase.message(),
        }
    }
}
