//! Per-test context handed to every assertion.
//!
//! The host runner owns the test lifecycle. Assertions only read the title,
//! retry counter and run configuration, and append attachments and errors.

use crate::naming::{add_suffix_to_file_path, SnapshotIdentity};
use crate::result::ShotmatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Whether baselines may be written during this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSnapshots {
    /// Never write baselines
    None,
    /// Write every baseline, replacing existing ones
    All,
    /// Write baselines that do not exist yet
    #[default]
    Missing,
}

impl UpdateSnapshots {
    /// Whether this mode may write a baseline
    #[must_use]
    pub const fn writes(self) -> bool {
        matches!(self, Self::All | Self::Missing)
    }

    /// Mode name as used on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for UpdateSnapshots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateSnapshots {
    type Err = ShotmatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            "missing" => Ok(Self::Missing),
            other => Err(ShotmatchError::config(format!(
                "unknown update-snapshots mode '{other}', expected none, all or missing"
            ))),
        }
    }
}

/// Run-wide configuration seen by a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Configured update mode
    pub update_snapshots: UpdateSnapshots,
    /// How many times a failing test is retried
    pub retries: u32,
}

/// Final status of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    /// Test passed
    #[default]
    Passed,
    /// Test failed
    Failed,
    /// Test ran out of time
    TimedOut,
    /// Test was skipped
    Skipped,
    /// Test was interrupted
    Interrupted,
}

/// File attached to the test report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Display name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// File location
    pub path: PathBuf,
}

impl Attachment {
    /// PNG attachment named after the snapshot with a role suffix
    #[must_use]
    pub fn image(snapshot_name: &str, suffix: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: add_suffix_to_file_path(snapshot_name, suffix, "-"),
            content_type: String::from("image/png"),
            path: path.into(),
        }
    }

    /// Attachment for the captured image
    #[must_use]
    pub fn actual(snapshot_name: &str, path: impl Into<PathBuf>) -> Self {
        Self::image(snapshot_name, "actual", path)
    }

    /// Attachment for the expected image
    #[must_use]
    pub fn expected(snapshot_name: &str, path: impl Into<PathBuf>) -> Self {
        Self::image(snapshot_name, "expected", path)
    }

    /// Attachment for the diff image
    #[must_use]
    pub fn diff(snapshot_name: &str, path: impl Into<PathBuf>) -> Self {
        Self::image(snapshot_name, "diff", path)
    }
}

/// Error recorded on the test without stopping it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestError {
    /// Human-readable message
    pub message: String,
    /// Structured metadata, tagged with a `type` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Mutable per-test context
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    /// Title path, file entry first
    pub title_path: Vec<String>,
    /// Zero-based retry counter
    pub retry: u32,
    /// Run configuration
    pub config: RunConfig,
    /// Directory for run artifacts
    pub output_dir: PathBuf,
    /// Directory for baselines
    pub snapshot_dir: PathBuf,
    /// Report attachments, append-only
    pub attachments: Vec<Attachment>,
    /// Soft errors, append-only
    pub errors: Vec<TestError>,
    /// Current status
    pub status: TestStatus,
}

impl TestInfo {
    /// Context for a test with the given title path
    #[must_use]
    pub fn new<S: Into<String>>(title_path: impl IntoIterator<Item = S>) -> Self {
        Self {
            title_path: title_path.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the update mode
    #[must_use]
    pub const fn with_update_snapshots(mut self, mode: UpdateSnapshots) -> Self {
        self.config.update_snapshots = mode;
        self
    }

    /// Set the configured retries
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Set the retry counter
    #[must_use]
    pub const fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the baseline directory
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Set the status
    #[must_use]
    pub const fn with_status(mut self, status: TestStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether this attempt will be retried on failure
    #[must_use]
    pub const fn will_be_retried(&self) -> bool {
        self.retry < self.config.retries
    }

    /// Update mode for this attempt.
    ///
    /// `missing` is suppressed to `none` while retries remain, so a flaky
    /// first attempt cannot write a baseline.
    #[must_use]
    pub const fn effective_update_mode(&self) -> UpdateSnapshots {
        match self.config.update_snapshots {
            UpdateSnapshots::Missing if self.will_be_retried() => UpdateSnapshots::None,
            mode => mode,
        }
    }

    /// Identity of a snapshot taken in this test
    #[must_use]
    pub fn snapshot_identity(&self, snapshot_name: &str) -> SnapshotIdentity {
        SnapshotIdentity::new(
            self.title_path.clone(),
            snapshot_name,
            &self.output_dir,
            &self.snapshot_dir,
        )
    }

    /// Append an attachment
    pub fn attach(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Attachment by name
    #[must_use]
    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.name == name)
    }

    /// Whether an attachment points at `path`
    #[must_use]
    pub fn has_attachment_at(&self, path: &Path) -> bool {
        self.attachments.iter().any(|a| a.path == path)
    }
}
