//! Structured event stream for `NaviCue`.
//!
//! Typed events written while a cue runs. Events are serialized as
//! newline-delimited JSON (JSONL) with a monotonically increasing sequence
//! number, so a host UI can replay a session in order.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted while a cue runs.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The cue started in its initial stage.
    CueStarted {
        /// When the cue started.
        timestamp: DateTime<Utc>,
        /// Cue id.
        cue_id: String,
        /// Initial stage.
        stage: String,
        /// Actions accepted in the initial stage.
        actions: Vec<String>,
    },

    /// A stage change was committed.
    StageEntered {
        /// When the change was committed.
        timestamp: DateTime<Utc>,
        /// Cue id.
        cue_id: String,
        /// Stage that was left.
        from: String,
        /// Stage that was entered.
        to: String,
        /// `timer`, `gate`, or `direct`.
        cause: String,
        /// Actions accepted in the new stage.
        actions: Vec<String>,
    },

    /// A user action was not accepted in the current stage.
    GateRejected {
        /// When the action arrived.
        timestamp: DateTime<Utc>,
        /// Cue id.
        cue_id: String,
        /// Action name as received.
        action: String,
        /// Stage the cue was in.
        stage: String,
    },

    /// The cue reached its terminal stage.
    CueCompleted {
        /// When the cue completed.
        timestamp: DateTime<Utc>,
        /// Cue id.
        cue_id: String,
        /// Time since `CueStarted`, in milliseconds.
        duration_ms: u64,
    },

    /// The cue was disposed before completing.
    CueDisposed {
        /// When the cue was disposed.
        timestamp: DateTime<Utc>,
        /// Cue id.
        cue_id: String,
        /// Stage the cue was left in.
        stage: String,
        /// Why the cue was disposed.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; a broken event sink must not
/// stop the cue.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn stage_entered() -> Event {
        Event::StageEntered {
            timestamp: DateTime::parse_from_rfc3339("2026-03-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            cue_id: "boundary-breath".to_owned(),
            from: "arriving".to_owned(),
            to: "active".to_owned(),
            cause: "timer".to_owned(),
            actions: vec!["tap".to_owned()],
        }
    }

    #[test]
    fn emitter_writes_flat_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(stage_entered());

        let parsed: serde_json::Value = serde_json::from_str(tw.contents().trim()).unwrap();
        assert_eq!(parsed["sequence"], 0);
        assert_eq!(parsed["type"], "StageEntered");
        assert_eq!(parsed["to"], "active");
        assert_eq!(parsed["actions"][0], "tap");
        assert_eq!(parsed["timestamp"], "2026-03-04T10:15:30Z");
        assert!(parsed.get("event").is_none());
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(stage_entered());
        emitter.emit(Event::CueCompleted {
            timestamp: Utc::now(),
            cue_id: "boundary-breath".to_owned(),
            duration_ms: 3500,
        });
        emitter.emit(Event::CueDisposed {
            timestamp: Utc::now(),
            cue_id: "boundary-breath".to_owned(),
            stage: "afterglow".to_owned(),
            reason: "input closed".to_owned(),
        });
        assert_eq!(emitter.event_count(), 3);

        let types: Vec<(u64, String)> = tw
            .contents()
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                (v["sequence"].as_u64().unwrap(), v["type"].as_str().unwrap().to_owned())
            })
            .collect();
        assert_eq!(
            types,
            [
                (0, "StageEntered".to_owned()),
                (1, "CueCompleted".to_owned()),
                (2, "CueDisposed".to_owned())
            ]
        );
    }

    #[test]
    fn gate_rejected_fields() {
        let json = serde_json::to_value(Event::GateRejected {
            timestamp: Utc::now(),
            cue_id: "c".to_owned(),
            action: "tap".to_owned(),
            stage: "arriving".to_owned(),
        })
        .unwrap();
        assert_eq!(json["type"], "GateRejected");
        assert_eq!(json["action"], "tap");
        assert_eq!(json["stage"], "arriving");
    }
}
