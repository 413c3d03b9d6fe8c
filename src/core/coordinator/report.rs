use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::CoordinatorState;
use crate::core::checks::ArtifactDigest;
use crate::core::error::{ErrorKind, PublisherError};
use crate::core::manifest::Platform;
use crate::core::platforms::RemoteRelease;

/// Exit code for a run where every required platform succeeded.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for a run where at least one required platform failed.
pub const EXIT_PLATFORM_FAILED: u8 = 1;
/// Exit code for manifest, settings or validation errors.
pub const EXIT_INVALID: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Success {
        #[serde(flatten)]
        remote: RemoteRelease,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl PublishOutcome {
    pub fn failed(err: &PublisherError) -> Self {
        PublishOutcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one platform attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub platform: Platform,
    pub optional: bool,
    #[serde(flatten)]
    pub outcome: PublishOutcome,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl PublishResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            PublishOutcome::Failed { kind, .. } => Some(*kind),
            PublishOutcome::Success { .. } => None,
        }
    }
}

/// Consolidated report of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub version: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: CoordinatorState,
    results: Vec<PublishResult>,
    pub digests: Vec<ArtifactDigest>,
}

impl PublishReport {
    pub fn new(version: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            version: version.into(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            state: CoordinatorState::Pending,
            results: Vec::new(),
            digests: Vec::new(),
        }
    }

    /// Results can only be appended.
    pub fn push(&mut self, result: PublishResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[PublishResult] {
        &self.results
    }

    pub fn result_for(&self, platform: Platform) -> Option<&PublishResult> {
        self.results.iter().find(|r| r.platform == platform)
    }

    pub(crate) fn finish(&mut self) {
        self.state = CoordinatorState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Every targeted platform succeeded.
    pub fn is_full_success(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(PublishResult::is_success)
    }

    /// Failures on optional platforms do not affect the exit code.
    pub fn exit_code(&self) -> u8 {
        let required_failed = self
            .results
            .iter()
            .any(|r| !r.optional && !r.is_success());
        if required_failed {
            EXIT_PLATFORM_FAILED
        } else {
            EXIT_SUCCESS
        }
    }
}
