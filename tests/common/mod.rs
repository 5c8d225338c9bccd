#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use voter_verify::common::config::StorageConfig;
use voter_verify::{FingerprintSession, MirrorStore, Result, SensorLink, SessionSettings};

pub const READY: &str = r#"{"status":"ready","message":"Fingerprint sensor ready"}"#;

pub type SentLog = Arc<Mutex<Vec<String>>>;

/// In-memory sensor that replays canned response lines and records commands.
pub struct ScriptedLink {
    responses: VecDeque<String>,
    sent: SentLog,
}

impl ScriptedLink {
    pub fn new(lines: &[&str]) -> (Self, SentLog) {
        let sent = SentLog::default();
        let link = Self {
            responses: lines.iter().map(|l| l.to_string()).collect(),
            sent: Arc::clone(&sent),
        };
        (link, sent)
    }
}

impl SensorLink for ScriptedLink {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        match self.responses.pop_front() {
            Some(line) => Ok(Some(line)),
            None => {
                // Behave like a serial read timing out
                thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }
}

/// Sensor whose lines become readable only once their offset from creation has passed.
pub struct TimedLink {
    started: Instant,
    lines: VecDeque<(Duration, String)>,
    sent: SentLog,
}

impl TimedLink {
    pub fn new(lines: &[(u64, &str)]) -> (Self, SentLog) {
        let sent = SentLog::default();
        let link = Self {
            started: Instant::now(),
            lines: lines.iter()
                .map(|(ms, line)| (Duration::from_millis(*ms), line.to_string()))
                .collect(),
            sent: Arc::clone(&sent),
        };
        (link, sent)
    }
}

impl SensorLink for TimedLink {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let due = self.lines.front().map_or(false, |(at, _)| self.started.elapsed() >= *at);
        if due {
            return Ok(self.lines.pop_front().map(|(_, line)| line));
        }
        thread::sleep(Duration::from_millis(5));
        Ok(None)
    }
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        command_deadline: Duration::from_millis(300),
        lock_timeout: Duration::from_secs(2),
    }
}

pub fn temp_store() -> (TempDir, MirrorStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = MirrorStore::new_in_dir(dir.path(), &StorageConfig::default()).unwrap();
    (dir, store)
}

pub struct Harness {
    pub dir: TempDir,
    pub store: MirrorStore,
    pub session: FingerprintSession,
    pub sent: SentLog,
}

impl Harness {
    /// Connects a session whose sensor first says ready, then replays `lines`.
    pub fn new(lines: &[&str]) -> Self {
        Self::with_settings(lines, test_settings())
    }

    pub fn with_settings(lines: &[&str], settings: SessionSettings) -> Self {
        let (dir, store) = temp_store();
        let mut script = vec![READY];
        script.extend_from_slice(lines);
        let (link, sent) = ScriptedLink::new(&script);

        let session = FingerprintSession::from_link(Box::new(link), store.clone(), settings).unwrap();
        Self { dir, store, session, sent }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}
