use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{SourceError, SourceErrorKind};

/// Coarse per-client health signal derived from the most recent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Never probed since this client was constructed.
    Unknown,
    Healthy,
    /// Provider responds but signals quota exhaustion.
    Degraded,
    Unhealthy,
}

impl HealthState {
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// Outcome record of a client's most recent operation. Never persisted;
/// every process start begins at `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub state: HealthState,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_checked: Option<OffsetDateTime>,
}

impl HealthRecord {
    pub const fn unknown() -> Self {
        Self {
            state: HealthState::Unknown,
            last_error: None,
            last_checked: None,
        }
    }

    pub const fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Shared mutable health slot owned by one provider client.
///
/// Cloning the cell shares the underlying record; the adapter updates it as
/// the last side effect of every operation, callers only read snapshots.
#[derive(Debug, Clone, Default)]
pub struct HealthCell {
    inner: Arc<Mutex<HealthRecord>>,
}

impl HealthCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HealthRecord {
        self.inner
            .lock()
            .expect("health record lock is not poisoned")
            .clone()
    }

    pub fn record_success(&self) {
        let mut record = self
            .inner
            .lock()
            .expect("health record lock is not poisoned");
        record.state = HealthState::Healthy;
        record.last_error = None;
        record.last_checked = Some(OffsetDateTime::now_utc());
    }

    /// Applies the taxonomy's health semantics: authentication and upstream
    /// failures mark the client down, quota exhaustion only degrades it, and
    /// caller mistakes (unknown symbol, invalid range) leave health alone.
    pub fn record_error(&self, error: &SourceError) {
        let state = match error.kind() {
            SourceErrorKind::Authentication | SourceErrorKind::Upstream => HealthState::Unhealthy,
            SourceErrorKind::RateLimited => HealthState::Degraded,
            SourceErrorKind::UnknownSymbol
            | SourceErrorKind::InvalidRange
            | SourceErrorKind::InvalidConfig
            | SourceErrorKind::SwitchFailed => return,
        };

        let mut record = self
            .inner
            .lock()
            .expect("health record lock is not poisoned");
        record.state = state;
        record.last_error = Some(error.to_string());
        record.last_checked = Some(OffsetDateTime::now_utc());
    }

    /// Routes an operation outcome through the record and passes it along
    /// untouched, so adapters can tack tracking onto a `Result` tail.
    pub fn observe<T>(&self, result: Result<T, SourceError>) -> Result<T, SourceError> {
        match &result {
            Ok(_) => self.record_success(),
            Err(error) => self.record_error(error),
        }
        result
    }
}
