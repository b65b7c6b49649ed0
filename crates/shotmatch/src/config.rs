//! Suite configuration.
//!
//! ```yaml
//! update_snapshots: missing
//! retries: 2
//! snapshot_dir: tests/__screenshots__
//! output_dir: test-results
//! to_match_screenshot:
//!   tolerance: 3
//!   stop_on_first_image_diff: true
//! ```
//!
//! `SHOTMATCH_UPDATE_SNAPSHOTS` overrides the update mode.

use crate::context::{RunConfig, TestInfo, UpdateSnapshots};
use crate::matcher::ScreenshotMatcher;
use crate::options::ScreenshotOptions;
use crate::result::{ShotmatchError, ShotmatchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the update mode
pub const UPDATE_SNAPSHOTS_ENV: &str = "SHOTMATCH_UPDATE_SNAPSHOTS";

/// Suite-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Update mode
    pub update_snapshots: UpdateSnapshots,
    /// Retries per failing test
    pub retries: u32,
    /// Directory for baselines
    pub snapshot_dir: PathBuf,
    /// Directory for run artifacts
    pub output_dir: PathBuf,
    /// Suite-level screenshot options
    pub to_match_screenshot: ScreenshotOptions,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            update_snapshots: UpdateSnapshots::default(),
            retries: 0,
            snapshot_dir: PathBuf::from("__screenshots__"),
            output_dir: PathBuf::from("test-results"),
            to_match_screenshot: ScreenshotOptions::default(),
        }
    }
}

impl SuiteConfig {
    /// Parse from YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or a ratio is out of range
    pub fn from_yaml_str(yaml: &str) -> ShotmatchResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> ShotmatchResult<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `SHOTMATCH_UPDATE_SNAPSHOTS`, if set
    ///
    /// # Errors
    ///
    /// Returns error if the variable holds an unknown mode
    pub fn with_env_overrides(self) -> ShotmatchResult<Self> {
        self.with_update_override(std::env::var(UPDATE_SNAPSHOTS_ENV).ok().as_deref())
    }

    /// Apply an update-mode override given as text
    ///
    /// # Errors
    ///
    /// Returns error if `value` is not a known mode
    pub fn with_update_override(mut self, value: Option<&str>) -> ShotmatchResult<Self> {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.update_snapshots = value.parse()?;
        }
        Ok(self)
    }

    fn validate(&self) -> ShotmatchResult<()> {
        let options = &self.to_match_screenshot;
        if let Some(ratio) = options.max_diff_pixel_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ShotmatchError::config(format!(
                    "max_diff_pixel_ratio must be within 0..=1, got {ratio}"
                )));
            }
        }
        for (name, value) in [
            ("tolerance", options.tolerance),
            ("antialiasing_tolerance", options.antialiasing_tolerance),
        ] {
            if value.is_some_and(|v| v < 0.0) {
                return Err(ShotmatchError::config(format!("{name} must not be negative")));
            }
        }
        Ok(())
    }

    /// Run configuration for tests of this suite
    #[must_use]
    pub const fn run_config(&self) -> RunConfig {
        RunConfig {
            update_snapshots: self.update_snapshots,
            retries: self.retries,
        }
    }

    /// Context for one test attempt
    #[must_use]
    pub fn test_info<S: Into<String>>(&self, title_path: impl IntoIterator<Item = S>, retry: u32) -> TestInfo {
        TestInfo::new(title_path)
            .with_update_snapshots(self.update_snapshots)
            .with_retries(self.retries)
            .with_retry(retry)
            .with_snapshot_dir(&self.snapshot_dir)
            .with_output_dir(&self.output_dir)
    }

    /// Matcher carrying the suite-level options
    #[must_use]
    pub fn matcher(&self) -> ScreenshotMatcher {
        ScreenshotMatcher::new().with_suite_options(self.to_match_screenshot.clone())
    }
}
