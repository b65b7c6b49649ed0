//! Weak errors: failures that let the test keep running.
//!
//! One [`WeakErrors`] accumulator is created per test and passed by `&mut`
//! into every assertion. Recording an error appends it to the test's error
//! list right away; [`WeakErrors::finalize`] then fails the test at teardown
//! if anything was recorded.
//!
//! ```ignore
//! let mut info = TestInfo::new(["home.spec", "renders"]);
//! let mut weak = WeakErrors::new();
//! weak.add_error(&mut info, WeakError::new("header is misaligned"));
//! weak.add_error(&mut info, WeakError::new("footer is missing"));
//! weak.finalize(&mut info);
//! assert_eq!(info.status, TestStatus::Failed);
//! ```

use crate::compare::Region;
use crate::context::{TestError, TestInfo, TestStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name given to errors that carry no more specific one
pub const DEFAULT_ERROR_NAME: &str = "Error";

const COMBINED_SEPARATOR: &str = "\n       ";

/// Kind of screenshot failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeakErrorKind {
    /// No baseline existed and one was written
    NoRefImage,
    /// The screenshot did not match (or matched, for a negated assertion)
    ImageDiff,
}

/// Screenshot failure recorded instead of failing the assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotError {
    /// Failure kind, serialized as the `type` tag
    #[serde(rename = "type")]
    pub kind: WeakErrorKind,
    /// Full failure message
    #[serde(skip)]
    pub message: String,
    /// Snapshot the assertion was about
    pub snapshot_name: String,
    /// Differing areas, for mismatches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_clusters: Option<Vec<Region>>,
    /// Set when a negated assertion found matching images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_negated: Option<bool>,
}

impl ScreenshotError {
    /// Create a screenshot failure
    #[must_use]
    pub fn new(kind: WeakErrorKind, message: impl Into<String>, snapshot_name: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            snapshot_name: snapshot_name.into(),
            diff_clusters: None,
            is_negated: None,
        }
    }

    /// Attach diff clusters
    #[must_use]
    pub fn with_diff_clusters(mut self, clusters: Vec<Region>) -> Self {
        self.diff_clusters = Some(clusters);
        self
    }

    /// Mark as coming from a negated assertion
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.is_negated = Some(true);
        self
    }
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq)]
pub struct WeakError {
    /// Error name, prefixed to the message in the test report
    pub name: String,
    /// Error message
    pub message: String,
    /// Structured metadata with a `type` tag
    pub meta: Option<Value>,
}

impl WeakError {
    /// Plain error without metadata
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_ERROR_NAME.to_string(),
            message: message.into(),
            meta: None,
        }
    }

    /// Error carrying metadata tagged with `type_tag`
    #[must_use]
    pub fn structured(message: impl Into<String>, type_tag: &str, mut meta: Map<String, Value>) -> Self {
        let _ = meta.insert("type".to_string(), Value::String(type_tag.to_string()));
        Self {
            meta: Some(Value::Object(meta)),
            ..Self::new(message)
        }
    }

    /// Record any error by its display text
    #[must_use]
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        Self::new(error.to_string())
    }

    /// Override the name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The `type` tag of the metadata, if any
    #[must_use]
    pub fn type_tag(&self) -> Option<&str> {
        self.meta.as_ref()?.get("type")?.as_str()
    }

    fn to_test_error(&self) -> TestError {
        TestError {
            message: format!("{}: {}", self.name, self.message),
            meta: self.meta.clone(),
        }
    }
}

impl From<ScreenshotError> for WeakError {
    fn from(error: ScreenshotError) -> Self {
        Self {
            name: DEFAULT_ERROR_NAME.to_string(),
            meta: serde_json::to_value(&error).ok(),
            message: error.message,
        }
    }
}

/// All recorded messages as one error, for hosts that throw at teardown
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WeakErrorsError {
    /// Messages joined with an indented line break
    pub message: String,
    /// Number of recorded errors
    pub count: usize,
}

/// Per-test weak-error accumulator
#[derive(Debug, Default)]
pub struct WeakErrors {
    errors: Vec<WeakError>,
}

impl WeakErrors {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure on the test without interrupting it
    pub fn add_error(&mut self, info: &mut TestInfo, error: impl Into<WeakError>) {
        let error = error.into();
        tracing::error!(
            name = %error.name,
            kind = error.type_tag().unwrap_or_default(),
            "{}",
            error.message
        );

        info.errors.push(error.to_test_error());
        self.errors.push(error);
    }

    /// Whether anything has been recorded
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors, in order
    #[must_use]
    pub fn errors(&self) -> &[WeakError] {
        &self.errors
    }

    /// Number of recorded errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn a passed or skipped test into a failed one if errors were recorded.
    ///
    /// Any other status is left alone, so a timeout or interruption is not
    /// masked.
    pub fn finalize(&self, info: &mut TestInfo) {
        if !self.has_errors() {
            return;
        }

        if matches!(info.status, TestStatus::Passed | TestStatus::Skipped) {
            tracing::debug!(errors = self.errors.len(), "failing test with weak errors");
            info.status = TestStatus::Failed;
        }
    }

    /// All messages combined into one error
    #[must_use]
    pub fn combined_error(&self) -> Option<WeakErrorsError> {
        if self.errors.is_empty() {
            return None;
        }

        Some(WeakErrorsError {
            message: self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(COMBINED_SEPARATOR),
            count: self.errors.len(),
        })
    }
}
