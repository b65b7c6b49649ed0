//! The eight outcomes of a screenshot assertion.
//!
//! Each handler performs the writes and attachments of one outcome and builds
//! its [`MatcherResult`]. `pass` states whether the screenshot is considered
//! to match; whether the assertion succeeded also depends on its polarity
//! (see [`MatcherResult::succeeded`]).

use crate::compare::Region;
use crate::context::{Attachment, TestInfo, UpdateSnapshots};
use crate::naming::SnapshotPaths;
use crate::result::{ShotmatchError, ShotmatchResult};
use crate::store::{write_all, FileStore};
use crate::weak_errors::{ScreenshotError, WeakErrorKind, WeakErrors};
use console::style;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type MessageFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Outcome of a matcher call
#[derive(Clone)]
pub struct MatcherResult {
    /// Whether the screenshot is considered to match
    pub pass: bool,
    message: MessageFn,
}

impl MatcherResult {
    /// Result whose message is built only when read
    #[must_use]
    pub fn new(pass: bool, message: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            pass,
            message: Arc::new(message),
        }
    }

    /// Result with a fixed message
    #[must_use]
    pub fn with_message(pass: bool, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(pass, move || message.clone())
    }

    /// Result with an empty message
    #[must_use]
    pub fn silent(pass: bool) -> Self {
        Self::new(pass, String::new)
    }

    /// Build the message
    #[must_use]
    pub fn message(&self) -> String {
        (self.message)()
    }

    /// Whether the assertion succeeded for the given polarity
    #[must_use]
    pub const fn succeeded(&self, negated: bool) -> bool {
        self.pass != negated
    }

    /// Turn a failed assertion into an error
    ///
    /// # Errors
    ///
    /// Returns [`ShotmatchError::AssertionFailed`] with the message if the
    /// assertion did not succeed
    pub fn into_result(self, negated: bool) -> ShotmatchResult<()> {
        if self.succeeded(negated) {
            Ok(())
        } else {
            Err(ShotmatchError::AssertionFailed {
                message: self.message(),
            })
        }
    }
}

impl fmt::Debug for MatcherResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherResult")
            .field("pass", &self.pass)
            .field("message", &self.message())
            .finish()
    }
}

/// What a handler may touch
pub struct HandlerContext<'a> {
    /// Where images are written
    pub store: &'a dyn FileStore,
    /// The running test
    pub info: &'a mut TestInfo,
    /// The test's weak-error accumulator
    pub weak_errors: &'a mut WeakErrors,
}

impl fmt::Debug for HandlerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("info", &self.info)
            .field("weak_errors", &self.weak_errors)
            .finish_non_exhaustive()
    }
}

fn missing_message(snapshot_path: &Path, writes: bool) -> String {
    format!(
        "A snapshot doesn't exist at {}{}",
        snapshot_path.display(),
        if writes { ", writing actual." } else { "." }
    )
}

fn matching_negated_message() -> String {
    [
        style("Screenshot comparison failed:").red().to_string(),
        String::new(),
        "  Expected result should be different from the actual one.".to_string(),
    ]
    .join("\n")
}

/// Negated assertion without a baseline.
///
/// Reports `pass = true`, so the negated assertion fails and the message is
/// shown. Negated matchers never write baselines.
#[must_use]
pub fn handle_missing_negated(mode: UpdateSnapshots, snapshot_path: &Path) -> MatcherResult {
    let path = snapshot_path.display().to_string();
    MatcherResult::new(true, move || {
        if mode.writes() {
            format!(
                "A snapshot doesn't exist at {path}, matchers using \".not\" won't write them automatically."
            )
        } else {
            format!("A snapshot doesn't exist at {path}.")
        }
    })
}

/// Negated assertion whose images match
#[must_use]
pub fn handle_matching_negated(
    cx: &mut HandlerContext<'_>,
    snapshot_name: &str,
    stop_on_first_image_diff: bool,
) -> MatcherResult {
    if stop_on_first_image_diff {
        return MatcherResult::new(true, matching_negated_message);
    }

    let error = ScreenshotError::new(
        WeakErrorKind::ImageDiff,
        matching_negated_message(),
        snapshot_name,
    )
    .negated();
    cx.weak_errors.add_error(cx.info, error);

    MatcherResult::silent(false)
}

/// Negated assertion whose images differ
#[must_use]
pub fn handle_different_negated() -> MatcherResult {
    MatcherResult::silent(false)
}

/// Positive assertion without a baseline in a mode that cannot write one
#[must_use]
pub fn handle_not_exists(snapshot_name: &str, snapshot_path: &Path) -> MatcherResult {
    let name = snapshot_name.to_string();
    let path = snapshot_path.display().to_string();
    MatcherResult::new(false, move || {
        format!("A snapshot \"{name}\" doesn't exist at {path}.")
    })
}

/// Positive assertion without a baseline.
///
/// In a write-enabled mode the capture becomes the baseline.
///
/// # Errors
///
/// Returns error if a write fails
pub async fn handle_missing(
    cx: &mut HandlerContext<'_>,
    mode: UpdateSnapshots,
    snapshot_name: &str,
    paths: &SnapshotPaths,
    actual: &[u8],
) -> ShotmatchResult<MatcherResult> {
    let message = missing_message(&paths.snapshot, mode.writes());

    if !mode.writes() {
        return Ok(MatcherResult::with_message(false, message));
    }

    write_all(
        cx.store,
        &[(paths.snapshot.as_path(), actual), (paths.actual.as_path(), actual)],
    )
    .await?;
    cx.info.attach(Attachment::actual(snapshot_name, &paths.actual));

    match mode {
        UpdateSnapshots::Missing => {
            cx.weak_errors.add_error(
                cx.info,
                ScreenshotError::new(WeakErrorKind::NoRefImage, message, snapshot_name),
            );
            Ok(MatcherResult::silent(true))
        }
        UpdateSnapshots::All | UpdateSnapshots::None => {
            tracing::info!("{message}");
            Ok(MatcherResult::with_message(true, message))
        }
    }
}

/// Images differ and every baseline is being regenerated
///
/// # Errors
///
/// Returns error if a write fails
pub async fn handle_updating(
    store: &dyn FileStore,
    paths: &SnapshotPaths,
    actual: &[u8],
) -> ShotmatchResult<MatcherResult> {
    write_all(
        store,
        &[(paths.snapshot.as_path(), actual), (paths.actual.as_path(), actual)],
    )
    .await?;

    tracing::info!("{} is re-generated, writing actual.", paths.snapshot.display());

    let path = paths.snapshot.display().to_string();
    Ok(MatcherResult::new(true, move || {
        format!("{path} running with --update-snapshots, writing actual.")
    }))
}

/// Images of a failed comparison; any of them may be missing
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffArtifacts<'a> {
    /// Baseline bytes
    pub expected: Option<&'a [u8]>,
    /// Captured bytes
    pub actual: Option<&'a [u8]>,
    /// Encoded diff image
    pub diff: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Default)]
struct DiffReport {
    expected: Option<PathBuf>,
    actual: Option<PathBuf>,
    diff: Option<PathBuf>,
}

impl DiffReport {
    fn render(&self) -> String {
        let mut lines = vec![style("Screenshot comparison failed").red().to_string(), String::new()];
        let labelled = [
            ("Expected", &self.expected),
            ("Received", &self.actual),
            ("    Diff", &self.diff),
        ];
        for (label, path) in labelled {
            if let Some(path) = path {
                lines.push(format!("{label}: {}", style(path.display()).yellow()));
            }
        }
        lines.join("\n")
    }
}

/// Positive assertion whose images differ
///
/// # Errors
///
/// Returns error if a write fails
pub async fn handle_different(
    cx: &mut HandlerContext<'_>,
    snapshot_name: &str,
    paths: &SnapshotPaths,
    artifacts: DiffArtifacts<'_>,
    diff_clusters: Vec<Region>,
    stop_on_first_image_diff: bool,
) -> ShotmatchResult<MatcherResult> {
    let mut writes: Vec<(&Path, &[u8])> = Vec::with_capacity(3);
    let mut report = DiffReport::default();

    if let Some(expected) = artifacts.expected {
        writes.push((paths.expected.as_path(), expected));
        report.expected = Some(paths.expected.clone());
        cx.info.attach(Attachment::expected(snapshot_name, &paths.expected));
    }
    if let Some(actual) = artifacts.actual {
        writes.push((paths.actual.as_path(), actual));
        report.actual = Some(paths.actual.clone());
        cx.info.attach(Attachment::actual(snapshot_name, &paths.actual));
    }
    if let Some(diff) = artifacts.diff {
        writes.push((paths.diff.as_path(), diff));
        report.diff = Some(paths.diff.clone());
        cx.info.attach(Attachment::diff(snapshot_name, &paths.diff));
    }

    write_all(cx.store, &writes).await?;

    if stop_on_first_image_diff {
        return Ok(MatcherResult::new(false, move || report.render()));
    }

    cx.weak_errors.add_error(
        cx.info,
        ScreenshotError::new(WeakErrorKind::ImageDiff, report.render(), snapshot_name)
            .with_diff_clusters(diff_clusters),
    );
    Ok(MatcherResult::silent(true))
}

/// Positive assertion whose images match
///
/// # Errors
///
/// Returns error if saving the expected image fails
pub async fn handle_matching(
    cx: &mut HandlerContext<'_>,
    snapshot_name: &str,
    paths: &SnapshotPaths,
    expected: &[u8],
    save_image_on_screenshot_match: bool,
) -> ShotmatchResult<MatcherResult> {
    if save_image_on_screenshot_match {
        cx.store.write_file(&paths.expected, expected).await?;
        cx.info.attach(Attachment::expected(snapshot_name, &paths.expected));
    }

    Ok(MatcherResult::silent(true))
}
