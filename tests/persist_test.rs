//! Persistence Tests
//!
//! Progress survives a restart through the file store, bad records are
//! skipped, and the continue-watching registry keeps one entry per stream.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use sorastream::models::{ContinueWatchingEntry, ResumeRecord};
use sorastream::persist::progress::resume_key;
use sorastream::persist::{
    BackgroundPersister, FileStore, KeyValueStore, KvProgressPersister, ProgressPersister,
    StoreError,
};
use sorastream::session::{EngineSettings, PlaybackEngine, SimulatedClock};

fn file_persister(dir: &std::path::Path) -> KvProgressPersister<FileStore> {
    KvProgressPersister::new(FileStore::open(dir).unwrap())
}

fn entry(stream_key: &str, progress: f64, minutes_ago: i64) -> ContinueWatchingEntry {
    ContinueWatchingEntry {
        stream_key: stream_key.to_string(),
        progress,
        position_seconds: progress * 100.0,
        duration_seconds: 100.0,
        updated_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
    }
}

// =============================================================================
// Restart Tests
// =============================================================================

/// Test a session's progress resumes after reopening the store
#[test]
fn test_progress_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let stream_key = "https://cdn.example/show/s01e03.m3u8";

    {
        let persister = Arc::new(BackgroundPersister::spawn(file_persister(dir.path())).unwrap());
        let clock = Arc::new(SimulatedClock::new(1440.0));
        let engine = PlaybackEngine::new(clock.clone(), persister.clone(), EngineSettings::default());

        engine.start(stream_key, None).unwrap();
        clock.advance(300.0);
        engine.on_tick();
        engine.end();
        persister.flush();
    }

    let persister = Arc::new(file_persister(dir.path()));
    let clock = Arc::new(SimulatedClock::new(1440.0));
    let engine = PlaybackEngine::new(clock.clone(), persister.clone(), EngineSettings::default());

    let resume = engine.stored_resume(stream_key);
    assert_eq!(resume.as_ref().map(|r| r.position_seconds), Some(300.0));
    engine.start(stream_key, resume).unwrap();
    assert_eq!(clock.seek_log(), vec![300.0]);

    let history = persister.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stream_key, stream_key);
}

/// Test streams keyed by long signed URLs still resume
#[test]
fn test_long_stream_url_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let stream_key = format!(
        "https://cdn.example/hls/s02e07/master.m3u8?expires=1767225600&signature={}",
        "0f3a".repeat(80)
    );
    assert!(stream_key.len() > 300);

    {
        let persister = Arc::new(file_persister(dir.path()));
        let clock = Arc::new(SimulatedClock::new(1440.0));
        let engine = PlaybackEngine::new(clock.clone(), persister.clone(), EngineSettings::default());
        engine.start(&stream_key, None).unwrap();
        clock.advance(75.0);
        engine.on_tick();
        engine.end();
    }

    let record = file_persister(dir.path()).load(&stream_key).unwrap().unwrap();
    assert_eq!(record.position_seconds, 75.0);
    assert_eq!(record.stream_key, stream_key);
}

/// Test dropping the background persister drains pending writes
#[test]
fn test_background_drop_drains_queue() {
    let dir = tempfile::tempdir().unwrap();
    let record = ResumeRecord {
        stream_key: "ep9".to_string(),
        position_seconds: 12.0,
        duration_seconds: 60.0,
        rate: 1.0,
    };

    {
        let persister = BackgroundPersister::spawn(file_persister(dir.path())).unwrap();
        persister.save("ep9", &record).unwrap();
    }

    assert_eq!(file_persister(dir.path()).load("ep9").unwrap(), Some(record));
}

// =============================================================================
// Corrupt Record Tests
// =============================================================================

/// Test an unreadable record reports Corrupt and start proceeds from zero
#[test]
fn test_corrupt_record_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let persister = Arc::new(file_persister(dir.path()));
    persister
        .store()
        .put(&resume_key("ep1"), b"not json")
        .unwrap();

    assert!(matches!(
        persister.load("ep1"),
        Err(StoreError::Corrupt { .. })
    ));

    let clock = Arc::new(SimulatedClock::new(100.0));
    let engine = PlaybackEngine::new(clock.clone(), persister.clone(), EngineSettings::default());
    let resume = engine.stored_resume("ep1");
    assert!(resume.is_none());
    engine.start("ep1", resume).unwrap();
    assert!(clock.seek_log().is_empty());

    // Next tick overwrites the bad record
    engine.on_tick();
    assert!(persister.load("ep1").unwrap().is_some());
}

/// Test records with a null duration decode but cannot drive a resume
#[test]
fn test_record_without_duration() {
    let dir = tempfile::tempdir().unwrap();
    let persister = file_persister(dir.path());
    persister
        .store()
        .put(
            &resume_key("ep1"),
            br#"{"stream_key":"ep1","position_seconds":5.0,"duration_seconds":0.0,"rate":1.0}"#,
        )
        .unwrap();

    let record = persister.load("ep1").unwrap().unwrap();
    assert!(!record.is_resumable());
    assert_eq!(record.progress_fraction(), None);
}

// =============================================================================
// Continue Watching Tests
// =============================================================================

/// Test history upserts by stream key and lists newest first
#[test]
fn test_history_upsert_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let persister = file_persister(dir.path());

    persister.record_history(&entry("ep1", 0.2, 30)).unwrap();
    persister.record_history(&entry("ep2", 0.5, 10)).unwrap();
    persister.record_history(&entry("ep1", 0.9, 1)).unwrap();

    let history = persister.history().unwrap();
    let keys: Vec<&str> = history.iter().map(|e| e.stream_key.as_str()).collect();
    assert_eq!(keys, vec!["ep1", "ep2"]);
    assert_eq!(history[0].progress, 0.9);
}

/// Test episode progress fractions from stored records
#[test]
fn test_episode_progress_fractions() {
    let dir = tempfile::tempdir().unwrap();
    let persister = file_persister(dir.path());

    for (key, position, duration) in [("e1", 1440.0, 1440.0), ("e2", 360.0, 1440.0), ("e3", 9999.0, 1440.0)] {
        persister
            .save(
                key,
                &ResumeRecord {
                    stream_key: key.to_string(),
                    position_seconds: position,
                    duration_seconds: duration,
                    rate: 1.0,
                },
            )
            .unwrap();
    }

    let fraction = |key: &str| persister.load(key).unwrap().and_then(|r| r.progress_fraction());
    assert_eq!(fraction("e1"), Some(1.0));
    assert_eq!(fraction("e2"), Some(0.25));
    assert_eq!(fraction("e3"), Some(1.0));
    assert_eq!(fraction("e4"), None);
}
