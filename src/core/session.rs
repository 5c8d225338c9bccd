use crate::common::{Config, VoterError, Result};
use crate::device::{
    clamp_confidence, SensorCommand, SensorLink, SensorResponse, SensorStatus, SerialLink,
};
use crate::storage::{EnrollmentRecord, MirrorStore, VerificationRecord, VoterId};
use parking_lot::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Upper bound on a whole command/response exchange.
    pub command_deadline: Duration,
    /// How long a caller waits for another exchange to finish.
    pub lock_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command_deadline: Duration::from_secs(config.session.command_deadline_seconds),
            lock_timeout: Duration::from_secs(config.session.lock_timeout_seconds),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoterMatch {
    pub voter_id: VoterId,
    /// Resolved from the mirror store, never taken from the sensor.
    pub voter_name: Option<String>,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Matched(VoterMatch),
    NotFound,
    /// Nothing enrolled locally, so the sensor was not asked.
    NoEnrollments,
}

impl VerifyOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, VerifyOutcome::Matched(_))
    }
}

struct SessionState {
    link: Box<dyn SensorLink>,
    store: MirrorStore,
    /// Set after a timeout: the abandoned command's reply may still be in flight.
    needs_resync: bool,
}

impl SessionState {
    fn send(&mut self, command: SensorCommand, expires_at: Instant, deadline: Duration) -> Result<()> {
        if self.needs_resync {
            self.resync(expires_at, deadline)?;
        }

        tracing::info!("Sending command: {}", command);
        self.link.send_line(&command.to_string())
    }

    /// Discards buffered lines until the link goes quiet.
    fn resync(&mut self, expires_at: Instant, deadline: Duration) -> Result<()> {
        while let Some(line) = self.link.read_line()? {
            tracing::warn!("Discarding stale sensor line: {}", line);
            if Instant::now() >= expires_at {
                return Err(VoterError::Timeout(deadline));
            }
        }

        self.needs_resync = false;
        Ok(())
    }

    /// Reads lines until a terminal status arrives or `expires_at` passes.
    /// Malformed and progress lines are logged and skipped.
    fn await_terminal(&mut self, expires_at: Instant, deadline: Duration) -> Result<SensorResponse> {
        loop {
            if Instant::now() >= expires_at {
                tracing::error!("Sensor gave no terminal response within {:?}", deadline);
                self.needs_resync = true;
                return Err(VoterError::Timeout(deadline));
            }

            let Some(line) = self.link.read_line()? else {
                continue;
            };
            if line.is_empty() {
                continue;
            }
            tracing::debug!("Sensor line: {}", line);

            let response = match SensorResponse::parse(&line) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Ignoring sensor line: {}", e);
                    continue;
                }
            };

            tracing::info!("[{}] {}", response.status, response.message);
            if response.status.is_terminal() {
                return Ok(response);
            }
        }
    }

    fn execute(&mut self, command: SensorCommand, deadline: Duration) -> Result<SensorResponse> {
        let expires_at = Instant::now() + deadline;
        self.send(command, expires_at, deadline)?;
        self.await_terminal(expires_at, deadline)
    }

    fn record_verification(&self, record: VerificationRecord) {
        if let Err(e) = self.store.append_verification(record) {
            tracing::error!("Failed to log verification to {}: {}",
                            self.store.verification_path().display(), e);
        }
    }
}

/// Owns the serial link to one fingerprint sensor and the local mirror of its database.
///
/// Every operation holds the session lock for its whole exchange, so commands
/// from concurrent callers never interleave on the wire.
pub struct FingerprintSession {
    state: Mutex<SessionState>,
    settings: SessionSettings,
}

impl FingerprintSession {
    /// Opens the configured serial port, waits for the board to reset and checks for `ready`.
    pub fn connect(config: &Config, store: MirrorStore) -> Result<Self> {
        let link = SerialLink::open(&config.sensor)?;
        tracing::info!("Waiting {:?} for sensor on {} to settle",
                       config.sensor.settle_delay(), link.port_name());
        thread::sleep(config.sensor.settle_delay());

        Self::from_link(Box::new(link), store, SessionSettings::from_config(config))
    }

    /// Performs the ready handshake over an already opened link.
    pub fn from_link(
        mut link: Box<dyn SensorLink>,
        store: MirrorStore,
        settings: SessionSettings,
    ) -> Result<Self> {
        let line = link.read_line()?
            .ok_or_else(|| VoterError::NotReady("no response from sensor".into()))?;

        let response = SensorResponse::parse(&line)
            .map_err(|e| VoterError::NotReady(e.to_string()))?;

        if response.status != SensorStatus::Ready {
            tracing::error!("Failed to detect fingerprint sensor: [{}] {}", response.status, response.message);
            return Err(VoterError::NotReady(format!(
                "expected ready status, got {}", response.status
            )));
        }

        tracing::info!("Connected to fingerprint sensor");
        Ok(Self {
            state: Mutex::new(SessionState { link, store, needs_resync: false }),
            settings,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state
            .try_lock_for(self.settings.lock_timeout)
            .ok_or(VoterError::Busy)
    }

    pub fn register(&self, voter_id: VoterId, voter_name: &str) -> Result<EnrollmentRecord> {
        let voter_name = voter_name.trim();
        if voter_name.is_empty() {
            return Err(VoterError::InvalidVoterName("name must not be empty".into()));
        }

        tracing::info!("Registering new fingerprint with ID: {} for voter: {}", voter_id, voter_name);
        let mut state = self.lock()?;

        // Checked before any device I/O so a duplicate never consumes a sensor slot
        if state.store.contains(voter_id)? {
            tracing::warn!("Voter ID {} already exists. Registration cancelled.", voter_id);
            return Err(VoterError::DuplicateVoter(voter_id.to_string()));
        }

        let response = state.execute(SensorCommand::Register(voter_id), self.settings.command_deadline)?;
        if response.status != SensorStatus::Success {
            return Err(device_error(&response, "Unknown error during registration"));
        }

        if response.raw_encoding.is_none() {
            tracing::warn!("Sensor confirmed ID {} without a raw encoding", voter_id);
        }

        let record = EnrollmentRecord::new(voter_id, voter_name, response.raw_encoding());
        match state.store.upsert_enrollment(record.clone()) {
            Ok(true) => tracing::warn!("Replaced existing local record for voter ID {}", voter_id),
            Ok(false) => {}
            Err(e) => {
                return Err(VoterError::Diverged(format!(
                    "sensor enrolled ID {} but the local record could not be saved: {}", voter_id, e
                )));
            }
        }

        tracing::info!("Stored fingerprint data for ID {} in {}",
                       voter_id, state.store.registration_path().display());
        Ok(record)
    }

    pub fn verify(&self) -> Result<VerifyOutcome> {
        tracing::info!("Verifying fingerprint...");
        let mut state = self.lock()?;

        let enrollments = state.store.load_enrollments()?;
        if enrollments.is_empty() {
            tracing::warn!("No fingerprints registered to verify against.");
            return Ok(VerifyOutcome::NoEnrollments);
        }

        let deadline = self.settings.command_deadline;
        let expires_at = Instant::now() + deadline;
        state.send(SensorCommand::Verify, expires_at, deadline)?;

        loop {
            let response = state.await_terminal(expires_at, deadline)?;

            match response.status {
                SensorStatus::Success => {
                    let Some(voter_id) = response.id.and_then(|id| VoterId::new(id).ok()) else {
                        tracing::warn!("Ignoring match without a valid voter ID: {:?}", response.id);
                        continue;
                    };
                    let confidence = clamp_confidence(response.confidence.unwrap_or(0.0));

                    let voter_name = enrollments.iter()
                        .find(|record| record.matches(voter_id))
                        .map(|record| record.voter_name.clone());
                    if voter_name.is_none() {
                        tracing::warn!("Sensor matched ID {} which has no local record", voter_id);
                    }

                    tracing::info!("Match found! ID: {}, Confidence: {}%", voter_id, confidence);
                    state.record_verification(VerificationRecord::matched(
                        voter_id,
                        voter_name.clone(),
                        confidence,
                        response.raw_encoding(),
                    ));

                    return Ok(VerifyOutcome::Matched(VoterMatch {
                        voter_id,
                        voter_name,
                        confidence,
                    }));
                }
                SensorStatus::NotFound => {
                    tracing::info!("No match found.");
                    state.record_verification(VerificationRecord::not_found(response.raw_encoding()));
                    return Ok(VerifyOutcome::NotFound);
                }
                _ => return Err(device_error(&response, "Unknown error during verification")),
            }
        }
    }

    /// Deletes from the sensor first and only then from the mirror store.
    pub fn delete_one(&self, voter_id: VoterId) -> Result<()> {
        tracing::info!("Deleting fingerprint for voter ID: {}", voter_id);
        let mut state = self.lock()?;

        let response = state.execute(SensorCommand::Delete(voter_id), self.settings.command_deadline)?;
        if response.status != SensorStatus::Success {
            return Err(device_error(&response, "Unknown error during deletion"));
        }

        match state.store.remove_enrollment(voter_id) {
            Ok(true) => {
                tracing::info!("Removed voter ID {} from registration file", voter_id);
                Ok(())
            }
            Ok(false) => {
                tracing::warn!("Voter ID {} was deleted from the sensor but had no local record", voter_id);
                Ok(())
            }
            Err(e) => Err(VoterError::Diverged(format!(
                "deleted voter ID {} from sensor but failed to remove from local storage: {}",
                voter_id, e
            ))),
        }
    }

    /// Erases the sensor database, then clears local files once the sensor confirms.
    pub fn erase_all(&self) -> Result<()> {
        tracing::info!("Erasing all fingerprint data...");
        let mut state = self.lock()?;

        let response = state.execute(SensorCommand::DeleteAll, self.settings.command_deadline)?;
        if response.status != SensorStatus::Success {
            tracing::error!("Failed to erase fingerprint data");
            return Err(device_error(&response, "Unknown error during erase"));
        }

        state.store.clear().map_err(|e| VoterError::Diverged(format!(
            "sensor erased but local records could not be removed: {}", e
        )))?;

        tracing::info!("Successfully erased all fingerprint data");
        Ok(())
    }

    /// Full reset: asks the sensor to erase everything and always leaves the
    /// local files removed. Reports `Diverged` when the sensor did not confirm.
    pub fn restart(&self) -> Result<()> {
        tracing::info!("Restarting fingerprint system - erasing all data...");
        let mut state = self.lock()?;

        let device = state.execute(SensorCommand::DeleteAll, self.settings.command_deadline);
        state.store.clear()?;

        match device {
            Ok(response) if response.status == SensorStatus::Success => {
                tracing::info!("Successfully erased all fingerprint data");
                Ok(())
            }
            Ok(response) => Err(VoterError::Diverged(format!(
                "local records cleared but sensor did not confirm erase: {}",
                device_error(&response, "unknown error")
            ))),
            Err(e) => Err(VoterError::Diverged(format!(
                "local records cleared but sensor erase failed: {}", e
            ))),
        }
    }

    pub fn enrollments(&self) -> Result<Vec<EnrollmentRecord>> {
        self.lock()?.store.load_enrollments()
    }

    pub fn disconnect(self) {
        drop(self.state);
        tracing::info!("Disconnected from fingerprint sensor");
    }
}

fn device_error(response: &SensorResponse, fallback: &str) -> VoterError {
    if response.message.is_empty() {
        VoterError::Device(fallback.to_string())
    } else {
        VoterError::Device(response.message.clone())
    }
}
