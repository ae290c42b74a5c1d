//! CLI Command Handlers
//!
//! Each handler takes CLI args, the loaded config and Output, and returns
//! an ExitCode.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::appearance::SubtitleStyle;
use crate::cli::{
    ExitCode, HistoryCmd, HistoryResponse, Output, ProgressCmd, ProgressEntry, ResumeCmd,
    SimulateCmd, SimulationReport, StyleCmd, StyleResponse,
};
use crate::config::Config;
use crate::models::{format_seconds, MediaDuration, PlaybackSnapshot, SubtitleCue};
use crate::persist::{BackgroundPersister, FileStore, KvProgressPersister, ProgressPersister};
use crate::session::{PlaybackEngine, PlaybackSession, SessionEvent, SimulatedClock};

type FilePersister = KvProgressPersister<FileStore>;

fn open_persister(config: &Config) -> anyhow::Result<FilePersister> {
    let dir = config
        .data_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let store = FileStore::open(&dir)
        .with_context(|| format!("Failed to open progress store at {}", dir.display()))?;
    Ok(KvProgressPersister::new(store))
}

fn load_cues(path: &Path) -> anyhow::Result<Vec<SubtitleCue>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cues {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid cues file {}", path.display()))
}

// =============================================================================
// Simulate Command
// =============================================================================

pub async fn simulate_cmd(cmd: SimulateCmd, config: &Config, output: &Output) -> ExitCode {
    let cues = match cmd.cues.as_deref().map(load_cues).transpose() {
        Ok(cues) => cues,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };

    let persister = match open_persister(config).and_then(|p| Ok(BackgroundPersister::spawn(p)?)) {
        Ok(p) => Arc::new(p),
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    let clock = Arc::new(match cmd.duration {
        MediaDuration::Known(secs) => SimulatedClock::new(secs),
        MediaDuration::Unknown => SimulatedClock::live(),
    });
    let engine = Arc::new(PlaybackEngine::new(
        clock.clone(),
        persister.clone(),
        config.engine_settings(),
    ));
    if let Some(cues) = cues {
        if let Err(e) = engine.load_cues(cues) {
            return output.error(format!("Invalid cues: {}", e), ExitCode::InvalidArgs);
        }
    }
    let mut events = engine.events();

    output.info(format!(
        "Simulating {} ({}) for {} ticks",
        cmd.stream_key, cmd.duration, cmd.ticks
    ));

    let snapshots = if cmd.realtime {
        run_realtime(&cmd, &engine, &clock, config.tick_interval(), output).await
    } else {
        run_virtual(&cmd, &engine, &clock, config.tick_interval(), output)
    };
    let snapshots = match snapshots {
        Ok(snapshots) => snapshots,
        Err(e) => return output.error(e.to_string(), ExitCode::Error),
    };

    persister.flush();
    let resume = engine.stored_resume(&cmd.stream_key);
    let report = SimulationReport {
        stream_key: cmd.stream_key.clone(),
        snapshots,
        final_snapshot: engine.snapshot(),
        resume,
        events: drain_events(&mut events),
    };

    output.emit(report, |report| {
        let mut lines = vec![format!("ended: {}", report.final_snapshot)];
        match &report.resume {
            Some(record) => lines.push(format!(
                "saved: {} / {}",
                format_seconds(record.position_seconds),
                format_seconds(record.duration_seconds)
            )),
            None => lines.push("saved: nothing (duration unknown)".to_string()),
        }
        lines.join("\n")
    })
}

/// Tick on virtual time: advance the clock one interval, then tick
fn run_virtual(
    cmd: &SimulateCmd,
    engine: &PlaybackEngine,
    clock: &SimulatedClock,
    interval: Duration,
    output: &Output,
) -> anyhow::Result<Vec<PlaybackSnapshot>> {
    let resume = match cmd.start {
        Some(_) => None,
        None => engine.stored_resume(&cmd.stream_key),
    };
    engine.start(cmd.stream_key.as_str(), resume)?;
    apply_overrides(cmd, engine);

    let base = Instant::now();
    let mut snapshots = Vec::with_capacity(cmd.ticks as usize);
    for i in 1..=cmd.ticks {
        clock.advance(interval.as_secs_f64());
        engine.on_tick_at(base + interval * i);
        let snapshot = engine.snapshot();
        print_tick(output, i, &snapshot);
        snapshots.push(snapshot);

        if i == 1 {
            if let Some(seek) = cmd.seek {
                engine.seek(seek.target(snapshots[0].position_seconds));
            }
        }
    }

    engine.end();
    Ok(snapshots)
}

/// Tick on the real session timer; the clock advances with wall time
async fn run_realtime(
    cmd: &SimulateCmd,
    engine: &Arc<PlaybackEngine>,
    clock: &SimulatedClock,
    interval: Duration,
    output: &Output,
) -> anyhow::Result<Vec<PlaybackSnapshot>> {
    let session = match cmd.start {
        Some(_) => {
            engine.start(cmd.stream_key.as_str(), None)?;
            PlaybackSession::attach(engine.clone(), interval)
        }
        None => PlaybackSession::start(engine.clone(), &cmd.stream_key, interval)?,
    };
    apply_overrides(cmd, engine);

    let mut snapshots = Vec::with_capacity(cmd.ticks as usize);
    for i in 1..=cmd.ticks {
        tokio::time::sleep(interval).await;
        clock.advance(interval.as_secs_f64());
        tokio::task::yield_now().await;
        let snapshot = engine.snapshot();
        print_tick(output, i, &snapshot);
        snapshots.push(snapshot);

        if i == 1 {
            if let Some(seek) = cmd.seek {
                engine.seek(seek.target(snapshots[0].position_seconds));
            }
        }
    }

    session.end();
    Ok(snapshots)
}

fn apply_overrides(cmd: &SimulateCmd, engine: &PlaybackEngine) {
    if let Some(start) = cmd.start {
        engine.seek(start);
        engine.on_clock_updated();
    }
    if let Some(rate) = cmd.rate {
        engine.set_rate(rate);
    }
}

fn print_tick(output: &Output, tick: u32, snapshot: &PlaybackSnapshot) {
    if !output.json {
        println!("tick {:>3}: {}", tick, snapshot);
    }
}

fn drain_events(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<String> {
    let mut labels = Vec::new();
    while let Ok(event) = events.try_recv() {
        labels.push(match event {
            SessionEvent::Started { stream_key } => format!("started {}", stream_key),
            SessionEvent::WatchNextRequested { stream_key } => {
                format!("watch-next {}", stream_key)
            }
            SessionEvent::Ended { stream_key } => format!("ended {}", stream_key),
        });
    }
    labels
}

// =============================================================================
// Progress Commands
// =============================================================================

pub fn resume_cmd(cmd: ResumeCmd, config: &Config, output: &Output) -> ExitCode {
    let persister = match open_persister(config) {
        Ok(p) => p,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    match persister.load(&cmd.stream_key) {
        Ok(Some(record)) => output.emit(record, |record| {
            let progress = record
                .progress_fraction()
                .map(|p| format!(" ({:.0}%)", p * 100.0))
                .unwrap_or_default();
            format!(
                "{}: {} / {}{} @ {}x",
                record.stream_key,
                format_seconds(record.position_seconds),
                format_seconds(record.duration_seconds),
                progress,
                record.rate
            )
        }),
        Ok(None) => output.error(
            format!("No resume point for '{}'", cmd.stream_key),
            ExitCode::NotFound,
        ),
        Err(e) => output.error(format!("Failed to read resume point: {}", e), ExitCode::Error),
    }
}

pub fn progress_cmd(cmd: ProgressCmd, config: &Config, output: &Output) -> ExitCode {
    let persister = match open_persister(config) {
        Ok(p) => p,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    let mut entries = Vec::with_capacity(cmd.stream_keys.len());
    for stream_key in cmd.stream_keys {
        let record = match persister.load(&stream_key) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(stream_key = %stream_key, error = %e, "unreadable resume record");
                None
            }
        };
        entries.push(ProgressEntry {
            progress: record.as_ref().and_then(|r| r.progress_fraction()),
            position_seconds: record.as_ref().map(|r| r.position_seconds),
            stream_key,
        });
    }

    output.emit(entries, |entries| {
        entries
            .iter()
            .map(|entry| match entry.progress {
                Some(p) => format!("{:>4.0}%  {}", p * 100.0, entry.stream_key),
                None => format!("   -   {}", entry.stream_key),
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub fn history_cmd(cmd: HistoryCmd, config: &Config, output: &Output) -> ExitCode {
    let persister = match open_persister(config) {
        Ok(p) => p,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    let mut entries = match persister.history() {
        Ok(entries) => entries,
        Err(e) => return output.error(format!("Failed to read history: {}", e), ExitCode::Error),
    };
    entries.truncate(cmd.limit);

    output.emit(HistoryResponse { entries }, |history| {
        if history.entries.is_empty() {
            return "Nothing to continue".to_string();
        }
        history
            .entries
            .iter()
            .map(|entry| {
                format!(
                    "{:>4.0}%  {}  {} / {}  {}",
                    entry.progress * 100.0,
                    entry.stream_key,
                    format_seconds(entry.position_seconds),
                    format_seconds(entry.duration_seconds),
                    entry.updated_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

// =============================================================================
// Style Command
// =============================================================================

pub fn style_cmd(
    cmd: StyleCmd,
    config: &Config,
    config_path: Option<PathBuf>,
    output: &Output,
) -> ExitCode {
    let current = config.subtitle_style;
    let style = SubtitleStyle {
        color: cmd.color,
        font_size: cmd.size.unwrap_or(current.font_size),
        shadow: cmd.shadow.unwrap_or(current.shadow),
        background: !cmd.no_background,
    };

    let saved_to = if cmd.dry_run {
        None
    } else {
        let Some(path) = config_path.or_else(Config::path) else {
            return output.error("Could not determine config path", ExitCode::Error);
        };
        let updated = Config {
            subtitle_style: style,
            ..config.clone()
        };
        if let Err(e) = updated.save_to(&path) {
            return output.error(format!("Failed to save config: {:#}", e), ExitCode::Error);
        }
        Some(path)
    };

    output.emit(StyleResponse { style, saved_to }, |response| {
        match &response.saved_to {
            Some(path) => format!("Subtitle style: {} (saved to {})", response.style, path.display()),
            None => format!("Subtitle style: {}", response.style),
        }
    })
}
