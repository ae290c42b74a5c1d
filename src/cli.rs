//! CLI - Command Line Interface for sorastream
//!
//! Drives playback sessions against a simulated player and inspects stored
//! progress. All output is JSON-parseable with `--json`.
//!
//! # Examples
//!
//! ```bash
//! # Play 30 ticks of a 24 minute episode
//! sorastream simulate show-s01e01 --duration 1440 --ticks 30
//!
//! # Inspect stored progress
//! sorastream resume show-s01e01 --json
//! sorastream progress show-s01e01 show-s01e02
//! sorastream history
//!
//! # Subtitle appearance
//! sorastream style yellow --size large --shadow high
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::appearance::{FontSize, ShadowRadius, SubtitleColor};
use crate::models::{ContinueWatchingEntry, MediaDuration, PlaybackSnapshot, ResumeRecord};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// No stored record for the stream
    NotFound = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// sorastream - playback session engine
#[derive(Parser, Debug)]
#[command(
    name = "sorastream",
    version,
    about = "Playback session engine: resumable progress, subtitle cues and watch-next prompts",
    after_help = "EXAMPLES:\n\
                  sorastream simulate ep1 --duration 1440 --ticks 30   Run a session\n\
                  sorastream resume ep1 --json                         Stored resume point\n\
                  sorastream history                                   Continue watching"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a playback session against a simulated player
    #[command(visible_alias = "sim")]
    Simulate(SimulateCmd),

    /// Show the stored resume point for a stream
    Resume(ResumeCmd),

    /// Show progress fractions for one or more streams
    #[command(visible_alias = "p")]
    Progress(ProgressCmd),

    /// List continue-watching entries
    #[command(visible_alias = "h")]
    History(HistoryCmd),

    /// Validate and save the subtitle style
    Style(StyleCmd),
}

// =============================================================================
// Simulate Command
// =============================================================================

/// Drive a session tick by tick and print every published snapshot
#[derive(Args, Debug)]
pub struct SimulateCmd {
    /// Stream key (episode/media URL or id)
    #[arg(required = true)]
    pub stream_key: String,

    /// Media duration in seconds, or "live" for an unknown duration
    #[arg(long, short = 'D', value_parser = parse_media_duration)]
    pub duration: MediaDuration,

    /// Number of ticks to run
    #[arg(long, short = 'n', default_value = "10")]
    pub ticks: u32,

    /// Start position in seconds (overrides the stored resume point)
    #[arg(long, short = 's', value_parser = parse_non_negative)]
    pub start: Option<f64>,

    /// Playback rate
    #[arg(long, short = 'r', value_parser = parse_rate)]
    pub rate: Option<f64>,

    /// JSON file with subtitle cues (`[{"start_time", "end_time", "text"}]`)
    #[arg(long)]
    pub cues: Option<PathBuf>,

    /// Seek after the first tick: seconds, timestamp or relative (+/-)
    #[arg(long, value_parser = parse_seek_position, allow_hyphen_values = true)]
    pub seek: Option<SeekPosition>,

    /// Run on the real tick timer instead of virtual time
    #[arg(long)]
    pub realtime: bool,
}

/// Parse "live" or a non-negative number of seconds
pub fn parse_media_duration(s: &str) -> Result<MediaDuration, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("live") {
        return Ok(MediaDuration::Unknown);
    }
    parse_non_negative(s).map(MediaDuration::Known)
}

fn parse_non_negative(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(format!("expected a non-negative number of seconds, got '{}'", s)),
    }
}

fn parse_rate(s: &str) -> Result<f64, String> {
    match s.trim().trim_end_matches('x').parse::<f64>() {
        Ok(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        _ => Err(format!("expected a positive playback rate, got '{}'", s)),
    }
}

/// Parsed seek position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekPosition {
    /// Absolute position in seconds
    Absolute(f64),
    /// Seek forward by seconds
    Forward(f64),
    /// Seek backward by seconds
    Backward(f64),
}

impl SeekPosition {
    /// Resolve against the current position
    pub fn target(&self, current: f64) -> f64 {
        match self {
            SeekPosition::Absolute(secs) => *secs,
            SeekPosition::Forward(secs) => current + secs,
            SeekPosition::Backward(secs) => current - secs,
        }
    }
}

/// Parse seconds, `+N`/`-N`, or a `HH:MM:SS`/`MM:SS` timestamp
pub fn parse_seek_position(s: &str) -> Result<SeekPosition, String> {
    let s = s.trim();
    let number = |v: &str| v.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0);

    let parsed = if let Some(stripped) = s.strip_prefix('+') {
        number(stripped).map(SeekPosition::Forward)
    } else if let Some(stripped) = s.strip_prefix('-') {
        number(stripped).map(SeekPosition::Backward)
    } else {
        number(s)
            .or_else(|| parse_timestamp(s))
            .map(SeekPosition::Absolute)
    };
    parsed.ok_or_else(|| format!("invalid seek position '{}'", s))
}

/// Parse timestamp string (HH:MM:SS or MM:SS) to seconds
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.len() {
        2 => {
            let mins: u64 = parts[0].parse().ok()?;
            let secs: u64 = parts[1].parse().ok()?;
            Some(mins.checked_mul(60)?.checked_add(secs)? as f64)
        }
        3 => {
            let hours: u64 = parts[0].parse().ok()?;
            let mins: u64 = parts[1].parse().ok()?;
            let secs: u64 = parts[2].parse().ok()?;
            let total = hours
                .checked_mul(3600)?
                .checked_add(mins.checked_mul(60)?)?
                .checked_add(secs)?;
            Some(total as f64)
        }
        _ => None,
    }
}

// =============================================================================
// Progress Commands
// =============================================================================

/// Show the stored resume point for a stream
#[derive(Args, Debug)]
pub struct ResumeCmd {
    #[arg(required = true)]
    pub stream_key: String,
}

/// Show progress fractions for episodes
#[derive(Args, Debug)]
pub struct ProgressCmd {
    #[arg(required = true, num_args = 1..)]
    pub stream_keys: Vec<String>,
}

/// List continue-watching entries, newest first
#[derive(Args, Debug)]
pub struct HistoryCmd {
    /// Maximum number of entries
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

// =============================================================================
// Style Command
// =============================================================================

/// Set subtitle appearance
#[derive(Args, Debug)]
pub struct StyleCmd {
    /// Color name (white, yellow, green, blue, red, purple) or #rrggbb
    #[arg(required = true)]
    pub color: SubtitleColor,

    /// Font size preset (small, medium, regular, large, xl) or points
    #[arg(long)]
    pub size: Option<FontSize>,

    /// Shadow preset (none, low, medium, high) or radius
    #[arg(long)]
    pub shadow: Option<ShadowRadius>,

    /// Disable the background box behind captions
    #[arg(long)]
    pub no_background: bool,

    /// Validate and print without saving
    #[arg(long)]
    pub dry_run: bool,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Result of a simulated session
#[derive(Debug, Serialize, Deserialize)]
pub struct SimulationReport {
    pub stream_key: String,
    pub snapshots: Vec<PlaybackSnapshot>,
    pub final_snapshot: PlaybackSnapshot,
    /// Resume record on disk after the session ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeRecord>,
    pub events: Vec<String>,
}

/// Progress of one stream
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub stream_key: String,
    /// `None` when nothing is stored or the duration is unknown
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_seconds: Option<f64>,
}

/// Continue-watching listing
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub entries: Vec<ContinueWatchingEntry>,
}

/// Style saved response
#[derive(Debug, Serialize, Deserialize)]
pub struct StyleResponse {
    pub style: crate::appearance::SubtitleStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data as JSON
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print human text, or `data` as JSON in JSON mode
    pub fn emit<T: Serialize>(&self, data: T, human: impl FnOnce(&T) -> String) -> ExitCode {
        if self.json {
            if let Err(e) = self.print(&data) {
                return self.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
        } else {
            println!("{}", human(&data));
        }
        ExitCode::Success
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
