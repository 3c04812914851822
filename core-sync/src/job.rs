//! # Sync Run State Machine
//!
//! Tracks one sync run through its phases and rejects illegal transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Scanning(1/N) → … → Scanning(N/N) → Diffing → Persisting → Done
//!  │          │                                   │          └──→ PartialFailure
//!  │          ├──→ Failed (every folder failed)   └──→ Failed     └──→ Failed
//!  │          └──→ Cancelled (folder boundary)
//!  ├──→ Cancelled (before the first folder)
//!  └──→ Persisting (no folders selected, nothing to retry)
//! ```

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// # Errors
    ///
    /// Returns [`SyncError::Provider`] if `s` is not a UUID.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SyncError::Provider(format!("invalid job id {s}: {e}")))
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    /// Scanning folder `folder` (1-based) of `total`.
    Scanning { folder: usize, total: usize },
    Diffing,
    Persisting,
    Done,
    PartialFailure,
    Failed,
    Cancelled,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Done | SyncPhase::PartialFailure | SyncPhase::Failed | SyncPhase::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Scanning { .. } => "scanning",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Persisting => "persisting",
            SyncPhase::Done => "done",
            SyncPhase::PartialFailure => "partial_failure",
            SyncPhase::Failed => "failed",
            SyncPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Scanning { folder, total } => write!(f, "scanning({folder}/{total})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ============================================================================
// Run
// ============================================================================

/// Bookkeeping for one in-flight run.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: SyncJobId,
    pub profile_id: String,
    pub retry_failed_only: bool,
    /// Epoch milliseconds.
    pub started_at: i64,
    phase: SyncPhase,
}

impl SyncRun {
    pub fn new(profile_id: impl Into<String>, retry_failed_only: bool, started_at: i64) -> Self {
        Self {
            id: SyncJobId::new(),
            profile_id: profile_id.into(),
            retry_failed_only,
            started_at,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] if the move is not allowed
    /// from the current phase.
    pub fn transition(&mut self, to: SyncPhase) -> Result<()> {
        self.validate_transition(to)?;
        self.phase = to;
        Ok(())
    }

    fn validate_transition(&self, to: SyncPhase) -> Result<()> {
        let valid = match (self.phase, to) {
            (SyncPhase::Idle, SyncPhase::Scanning { folder: 1, total }) => total > 0,
            (SyncPhase::Idle, SyncPhase::Persisting) => true,
            (SyncPhase::Idle, SyncPhase::Failed) => true,
            (SyncPhase::Idle, SyncPhase::Cancelled) => true,

            (
                SyncPhase::Scanning { folder, total },
                SyncPhase::Scanning {
                    folder: next,
                    total: next_total,
                },
            ) => next == folder + 1 && next <= total && next_total == total,
            (SyncPhase::Scanning { folder, total }, SyncPhase::Diffing) => folder == total,
            (SyncPhase::Scanning { .. }, SyncPhase::Failed) => true,
            (SyncPhase::Scanning { .. }, SyncPhase::Cancelled) => true,

            (SyncPhase::Diffing, SyncPhase::Persisting) => true,
            (SyncPhase::Diffing, SyncPhase::Failed) => true,

            (SyncPhase::Persisting, SyncPhase::Done) => true,
            (SyncPhase::Persisting, SyncPhase::PartialFailure) => true,
            (SyncPhase::Persisting, SyncPhase::Failed) => true,

            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
                reason: format!("Cannot transition from {} to {}", self.phase, to),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every planned folder scanned.
    Completed,
    /// At least one folder scanned and at least one failed.
    PartialFailure,
}

/// Result of one run, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub job_id: SyncJobId,
    pub profile_id: String,
    pub upserted: usize,
    /// Scanned files that already matched the cache.
    pub unchanged: usize,
    pub deleted_by_selection: usize,
    pub deleted_by_absence: usize,
    /// Folders that failed in this run, queued for a later retry.
    pub failed_folders: Vec<String>,
    pub status: SyncStatus,
    pub duration_ms: u64,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Completed
    }

    pub fn total_deleted(&self) -> usize {
        self.deleted_by_selection + self.deleted_by_absence
    }
}
