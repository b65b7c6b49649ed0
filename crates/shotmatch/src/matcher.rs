//! The screenshot assertion.
//!
//! One call walks `start → checked-existence → captured → compared →
//! dispatched`. Which steps run depends on the polarity, whether a baseline
//! exists and the effective update mode ([`Route`]); the final outcome is a
//! [`Decision`] dispatched to exactly one handler.
//!
//! ```ignore
//! let matcher = ScreenshotMatcher::new();
//! let page = FixedCapture::new(png);
//! let result = matcher
//!     .expect(&page)
//!     .to_match_screenshot(&mut info, &mut weak, "home.png", &ScreenshotOptions::new())
//!     .await?;
//! result.into_result(false)?;
//! ```

use crate::capture::ScreenshotTarget;
use crate::compare::{ImageComparator, ImageSource, PixelComparator, Region};
use crate::context::{TestInfo, UpdateSnapshots};
use crate::handlers::{
    handle_different, handle_different_negated, handle_matching, handle_matching_negated,
    handle_missing, handle_missing_negated, handle_not_exists, handle_updating, DiffArtifacts,
    HandlerContext, MatcherResult,
};
use crate::options::{resolve, OptionDefaults, ScreenshotOptions};
use crate::result::{ShotmatchError, ShotmatchResult};
use crate::store::{FileStore, FsStore};
use crate::weak_errors::WeakErrors;
use std::sync::Arc;

/// Work needed once the baseline's existence is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Negated, no baseline: nothing to capture
    MissingNegated,
    /// Negated, baseline present: capture and compare against the baseline file
    CompareNegated,
    /// Positive, no baseline, baselines cannot be written
    NotExists,
    /// Positive, no baseline, baselines can be written: capture only
    CaptureMissing,
    /// Positive, baseline present: capture, read and compare
    CompareWithBaseline,
}

impl Route {
    /// Route for a polarity, baseline state and update mode
    #[must_use]
    pub const fn select(negated: bool, has_baseline: bool, mode: UpdateSnapshots) -> Self {
        match (negated, has_baseline, mode) {
            (true, false, _) => Self::MissingNegated,
            (true, true, _) => Self::CompareNegated,
            (false, false, UpdateSnapshots::None) => Self::NotExists,
            (false, false, UpdateSnapshots::All | UpdateSnapshots::Missing) => Self::CaptureMissing,
            (false, true, _) => Self::CompareWithBaseline,
        }
    }
}

/// Final outcome with the data its handler needs
#[derive(Debug)]
pub enum Decision {
    /// See [`handle_missing_negated`]
    MissingNegated,
    /// See [`handle_matching_negated`]
    MatchingNegated,
    /// See [`handle_different_negated`]
    DifferentNegated,
    /// See [`handle_not_exists`]
    NotExists,
    /// See [`handle_missing`]
    Missing {
        /// Captured image
        actual: Vec<u8>,
    },
    /// See [`handle_updating`]
    Updating {
        /// Captured image
        actual: Vec<u8>,
    },
    /// See [`handle_different`]
    Different {
        /// Captured image
        actual: Vec<u8>,
        /// Baseline image
        expected: Vec<u8>,
        /// Encoded diff, if the comparator produced one
        diff: Option<Vec<u8>>,
        /// Differing areas
        clusters: Vec<Region>,
    },
    /// See [`handle_matching`]
    Matching {
        /// Baseline image
        expected: Vec<u8>,
    },
}

impl Decision {
    /// Handler name, for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MissingNegated => "missing-negated",
            Self::MatchingNegated => "matching-negated",
            Self::DifferentNegated => "different-negated",
            Self::NotExists => "not-exists",
            Self::Missing { .. } => "missing",
            Self::Updating { .. } => "updating",
            Self::Different { .. } => "different",
            Self::Matching { .. } => "matching",
        }
    }
}

/// Screenshot assertion factory holding the collaborators and suite options
#[derive(Clone)]
pub struct ScreenshotMatcher {
    comparator: Arc<dyn ImageComparator>,
    store: Arc<dyn FileStore>,
    suite_options: ScreenshotOptions,
    defaults: OptionDefaults,
}

impl Default for ScreenshotMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScreenshotMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotMatcher")
            .field("suite_options", &self.suite_options)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl ScreenshotMatcher {
    /// Matcher using the pixel comparator and the local file system
    #[must_use]
    pub fn new() -> Self {
        Self {
            comparator: Arc::new(PixelComparator::new()),
            store: Arc::new(FsStore::new()),
            suite_options: ScreenshotOptions::default(),
            defaults: OptionDefaults::default(),
        }
    }

    /// Use a different comparator
    #[must_use]
    pub fn with_comparator(mut self, comparator: impl ImageComparator + 'static) -> Self {
        self.comparator = Arc::new(comparator);
        self
    }

    /// Use a different file store
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.store = store;
        self
    }

    /// Set the suite-level options
    #[must_use]
    pub fn with_suite_options(mut self, options: ScreenshotOptions) -> Self {
        self.suite_options = options;
        self
    }

    /// Replace the system defaults
    #[must_use]
    pub fn with_defaults(mut self, defaults: OptionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Suite-level options
    #[must_use]
    pub const fn suite_options(&self) -> &ScreenshotOptions {
        &self.suite_options
    }

    /// Start an assertion on a target
    #[must_use]
    pub fn expect<'a>(&'a self, target: &'a dyn ScreenshotTarget) -> Expectation<'a> {
        Expectation {
            matcher: self,
            target,
            negated: false,
        }
    }
}

/// A pending assertion on one target
pub struct Expectation<'a> {
    matcher: &'a ScreenshotMatcher,
    target: &'a dyn ScreenshotTarget,
    negated: bool,
}

impl std::fmt::Debug for Expectation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expectation")
            .field("negated", &self.negated)
            .finish_non_exhaustive()
    }
}

impl<'a> Expectation<'a> {
    /// Negate the assertion
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Whether the assertion is negated
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negated
    }

    /// Compare the target against its stored baseline.
    ///
    /// Check the outcome with [`MatcherResult::succeeded`] or
    /// [`MatcherResult::into_result`] using [`Self::is_negated`].
    ///
    /// # Errors
    ///
    /// Propagates capture, comparison, read and write failures. A blank
    /// snapshot name is not an error: it yields a failing outcome with the
    /// usage message, whatever the polarity.
    pub async fn to_match_screenshot(
        &self,
        info: &mut TestInfo,
        weak_errors: &mut WeakErrors,
        snapshot_name: &str,
        overrides: &ScreenshotOptions,
    ) -> ShotmatchResult<MatcherResult> {
        if snapshot_name.trim().is_empty() {
            let message = ShotmatchError::SnapshotNameRequired.to_string();
            return Ok(MatcherResult::with_message(self.negated, message));
        }

        let matcher = self.matcher;
        let mode = info.effective_update_mode();
        let paths = info.snapshot_identity(snapshot_name).paths();
        let prepared = resolve(overrides, &matcher.suite_options, &matcher.defaults);
        let compare = &prepared.compare;

        let has_baseline = matcher.store.exists(&paths.snapshot).await;
        let route = Route::select(self.negated, has_baseline, mode);
        tracing::debug!(
            snapshot = snapshot_name,
            state = "checked-existence",
            has_baseline,
            mode = %mode,
            ?route
        );

        let decision = match route {
            Route::MissingNegated => Decision::MissingNegated,
            Route::NotExists => Decision::NotExists,
            Route::CaptureMissing => Decision::Missing {
                actual: self.capture(snapshot_name, &prepared.capture).await?,
            },
            Route::CompareNegated => {
                let actual = self.capture(snapshot_name, &prepared.capture).await?;
                let result = matcher
                    .comparator
                    .compare(
                        ImageSource::Bytes(&actual),
                        ImageSource::Stored {
                            store: matcher.store.as_ref(),
                            path: &paths.snapshot,
                        },
                        compare,
                    )
                    .await?;
                tracing::debug!(snapshot = snapshot_name, state = "compared", equal = result.equal);

                if result.is_same(compare.max_diff_pixels, compare.max_diff_pixel_ratio) {
                    Decision::MatchingNegated
                } else {
                    Decision::DifferentNegated
                }
            }
            Route::CompareWithBaseline => {
                let actual = self.capture(snapshot_name, &prepared.capture).await?;
                let expected = matcher.store.read_file(&paths.snapshot).await?;
                let result = matcher
                    .comparator
                    .compare(
                        ImageSource::Bytes(&actual),
                        ImageSource::Bytes(&expected),
                        compare,
                    )
                    .await?;
                tracing::debug!(
                    snapshot = snapshot_name,
                    state = "compared",
                    equal = result.equal,
                    different_pixels = result.different_pixels,
                    total_pixels = result.total_pixels
                );

                if result.is_same(compare.max_diff_pixels, compare.max_diff_pixel_ratio) {
                    Decision::Matching { expected }
                } else if mode == UpdateSnapshots::All {
                    Decision::Updating { actual }
                } else {
                    let diff = result
                        .diff_image
                        .as_ref()
                        .map(|image| image.to_png())
                        .transpose()?;
                    Decision::Different {
                        actual,
                        expected,
                        diff,
                        clusters: result.diff_clusters,
                    }
                }
            }
        };

        tracing::debug!(
            snapshot = snapshot_name,
            state = "dispatched",
            handler = decision.name()
        );

        let mut cx = HandlerContext {
            store: matcher.store.as_ref(),
            info,
            weak_errors,
        };

        match decision {
            Decision::MissingNegated => Ok(handle_missing_negated(mode, &paths.snapshot)),
            Decision::MatchingNegated => Ok(handle_matching_negated(
                &mut cx,
                snapshot_name,
                compare.stop_on_first_image_diff,
            )),
            Decision::DifferentNegated => Ok(handle_different_negated()),
            Decision::NotExists => Ok(handle_not_exists(snapshot_name, &paths.snapshot)),
            Decision::Missing { actual } => {
                handle_missing(&mut cx, mode, snapshot_name, &paths, &actual).await
            }
            Decision::Updating { actual } => handle_updating(cx.store, &paths, &actual).await,
            Decision::Different {
                actual,
                expected,
                diff,
                clusters,
            } => {
                let artifacts = DiffArtifacts {
                    expected: Some(expected.as_slice()),
                    actual: Some(actual.as_slice()),
                    diff: diff.as_deref(),
                };
                handle_different(
                    &mut cx,
                    snapshot_name,
                    &paths,
                    artifacts,
                    clusters,
                    compare.stop_on_first_image_diff,
                )
                .await
            }
            Decision::Matching { expected } => {
                handle_matching(
                    &mut cx,
                    snapshot_name,
                    &paths,
                    &expected,
                    compare.save_image_on_screenshot_match,
                )
                .await
            }
        }
    }

    async fn capture(
        &self,
        snapshot_name: &str,
        options: &crate::options::CaptureOptions,
    ) -> ShotmatchResult<Vec<u8>> {
        let actual = self.target.screenshot(options).await?;
        tracing::debug!(snapshot = snapshot_name, state = "captured", bytes = actual.len());
        Ok(actual)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture::FixedCapture;
    use crate::compare::{ComparisonResult, DiffImage};
    use crate::context::TestStatus;
    use crate::options::CompareOptions;
    use crate::store::{MemoryStore, StoreOp};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct StaticDiff(Vec<u8>);

    impl DiffImage for StaticDiff {
        fn to_png(&self) -> ShotmatchResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    /// Comparator that returns a preset verdict and records its options
    #[derive(Debug, Default)]
    struct ScriptedComparator {
        different_pixels: u64,
        total_pixels: u64,
        with_diff: bool,
        seen: Mutex<Vec<CompareOptions>>,
    }

    impl ScriptedComparator {
        fn equal() -> Self {
            Self {
                total_pixels: 100,
                ..Self::default()
            }
        }

        fn differing(different_pixels: u64) -> Self {
            Self {
                different_pixels,
                total_pixels: 100,
                with_diff: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ImageComparator for ScriptedComparator {
        async fn compare(
            &self,
            _actual: ImageSource<'_>,
            _expected: ImageSource<'_>,
            options: &CompareOptions,
        ) -> ShotmatchResult<ComparisonResult> {
            self.seen.lock().unwrap().push(options.clone());
            if self.different_pixels == 0 {
                return Ok(ComparisonResult::identical(self.total_pixels));
            }
            let result = ComparisonResult::different(self.different_pixels, self.total_pixels)
                .with_clusters(vec![Region::new(0, 0, 1, 1)]);
            Ok(if self.with_diff {
                result.with_diff_image(StaticDiff(b"diff".to_vec()))
            } else {
                result
            })
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        info: TestInfo,
        weak: WeakErrors,
    }

    impl Harness {
        fn new(mode: UpdateSnapshots) -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                info: TestInfo::new(["file.spec", "suite", "case"])
                    .with_update_snapshots(mode)
                    .with_output_dir("out")
                    .with_snapshot_dir("snaps"),
                weak: WeakErrors::new(),
            }
        }

        fn with_baseline(mut self, bytes: &[u8]) -> Self {
            self.store = Arc::new(MemoryStore::new().with_file(Self::baseline(), bytes.to_vec()));
            self
        }

        fn baseline() -> PathBuf {
            PathBuf::from("snaps/suite-case-shot.png")
        }

        fn matcher(&self, comparator: ScriptedComparator) -> ScreenshotMatcher {
            ScreenshotMatcher::new()
                .with_comparator(comparator)
                .with_store(self.store.clone())
        }
    }

    mod routing {
        use super::*;

        #[test]
        fn test_negated_routes() {
            for mode in [UpdateSnapshots::None, UpdateSnapshots::All, UpdateSnapshots::Missing] {
                assert_eq!(Route::select(true, false, mode), Route::MissingNegated);
                assert_eq!(Route::select(true, true, mode), Route::CompareNegated);
                assert_eq!(Route::select(false, true, mode), Route::CompareWithBaseline);
            }
        }

        #[test]
        fn test_positive_missing_routes() {
            assert_eq!(
                Route::select(false, false, UpdateSnapshots::None),
                Route::NotExists
            );
            assert_eq!(
                Route::select(false, false, UpdateSnapshots::All),
                Route::CaptureMissing
            );
            assert_eq!(
                Route::select(false, false, UpdateSnapshots::Missing),
                Route::CaptureMissing
            );
        }

        #[test]
        fn test_decision_names() {
            assert_eq!(Decision::NotExists.name(), "not-exists");
            assert_eq!(Decision::Updating { actual: vec![] }.name(), "updating");
        }
    }

    mod usage {
        use super::*;

        #[tokio::test]
        async fn test_blank_name_fails_without_io() {
            let mut h = Harness::new(UpdateSnapshots::All);
            let target = FixedCapture::new(b"img".to_vec());
            let matcher = h.matcher(ScriptedComparator::equal());

            for name in ["", "   "] {
                for negated in [false, true] {
                    let mut expectation = matcher.expect(&target);
                    if negated {
                        expectation = expectation.not();
                    }
                    let result = expectation
                        .to_match_screenshot(&mut h.info, &mut h.weak, name, &ScreenshotOptions::new())
                        .await
                        .unwrap();
                    assert!(!result.succeeded(negated));
                    assert_eq!(result.message(), "A snapshot name is required");
                    assert!(matches!(
                        result.into_result(negated),
                        Err(ShotmatchError::AssertionFailed { .. })
                    ));
                }
            }

            assert!(!target.was_captured());
            assert!(h.store.history().is_empty());
            assert!(!h.weak.has_errors());
        }

        #[test]
        fn test_not_toggles() {
            let matcher = ScreenshotMatcher::new();
            let target = FixedCapture::new(Vec::new());
            assert!(!matcher.expect(&target).is_negated());
            assert!(matcher.expect(&target).not().is_negated());
            assert!(!matcher.expect(&target).not().not().is_negated());
        }
    }

    mod positive {
        use super::*;

        #[tokio::test]
        async fn test_not_exists_does_not_capture() {
            let mut h = Harness::new(UpdateSnapshots::None);
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::equal())
                .expect(&target)
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap();

            assert!(!result.pass);
            assert!(!target.was_captured());
            assert_eq!(
                h.store.history(),
                vec![StoreOp::Exists(Harness::baseline())]
            );
        }

        #[tokio::test]
        async fn test_missing_on_retry_is_not_exists() {
            let mut h = Harness::new(UpdateSnapshots::Missing);
            h.info = h.info.clone().with_retries(1).with_retry(0);
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::equal())
                .expect(&target)
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap();

            assert!(!result.pass);
            assert!(result.message().contains("\"shot\""));
            assert!(h.store.written().is_empty());
        }

        #[tokio::test]
        async fn test_matching() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::equal())
                .expect(&target)
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap();

            assert!(result.succeeded(false));
            assert_eq!(result.message(), "");
            assert!(h.store.written().is_empty());
            assert!(!h.weak.has_errors());
        }

        #[tokio::test]
        async fn test_within_max_diff_pixels_matches() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::differing(3))
                .expect(&target)
                .to_match_screenshot(
                    &mut h.info,
                    &mut h.weak,
                    "shot",
                    &ScreenshotOptions::new().with_max_diff_pixels(4),
                )
                .await
                .unwrap();

            assert!(result.pass);
            assert!(h.store.written().is_empty());
        }

        #[tokio::test]
        async fn test_different_without_stop_is_weak() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::differing(10))
                .expect(&target)
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap();

            assert!(result.pass);
            assert_eq!(h.weak.len(), 1);
            assert_eq!(h.info.attachments.len(), 3);
            assert_eq!(h.store.file("out/suite-case-shot-diff.png").unwrap(), b"diff");
            assert_eq!(h.store.file("out/suite-case-shot-expected.png").unwrap(), b"base");

            h.weak.finalize(&mut h.info);
            assert_eq!(h.info.status, TestStatus::Failed);
        }

        #[tokio::test]
        async fn test_different_without_diff_image() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let comparator = ScriptedComparator {
                with_diff: false,
                ..ScriptedComparator::differing(10)
            };
            let result = h
                .matcher(comparator)
                .expect(&target)
                .to_match_screenshot(
                    &mut h.info,
                    &mut h.weak,
                    "shot",
                    &ScreenshotOptions::new().with_stop_on_first_image_diff(true),
                )
                .await
                .unwrap();

            assert!(!result.pass);
            assert_eq!(h.info.attachments.len(), 2);
            assert!(h.store.file("out/suite-case-shot-diff.png").is_none());
        }

        #[tokio::test]
        async fn test_suite_options_reach_comparator() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let comparator = Arc::new(ScriptedComparator::equal());

            #[derive(Debug)]
            struct Shared(Arc<ScriptedComparator>);

            #[async_trait]
            impl ImageComparator for Shared {
                async fn compare(
                    &self,
                    actual: ImageSource<'_>,
                    expected: ImageSource<'_>,
                    options: &CompareOptions,
                ) -> ShotmatchResult<ComparisonResult> {
                    self.0.compare(actual, expected, options).await
                }
            }

            let matcher = ScreenshotMatcher::new()
                .with_comparator(Shared(comparator.clone()))
                .with_store(h.store.clone())
                .with_suite_options(ScreenshotOptions::new().with_tolerance(7.0).with_full_page(true));

            let _ = matcher
                .expect(&target)
                .to_match_screenshot(
                    &mut h.info,
                    &mut h.weak,
                    "shot",
                    &ScreenshotOptions::new().with_tolerance(1.5),
                )
                .await
                .unwrap();

            assert_eq!(comparator.seen.lock().unwrap()[0].tolerance, 1.5);
            assert!(target.calls()[0].full_page);
        }

        #[tokio::test]
        async fn test_capture_failure_propagates() {
            let mut h = Harness::new(UpdateSnapshots::All);
            let target = FixedCapture::failing("element detached");
            let err = h
                .matcher(ScriptedComparator::equal())
                .expect(&target)
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap_err();

            assert!(matches!(err, ShotmatchError::Capture { .. }));
            assert!(h.store.written().is_empty());
        }
    }

    mod negated {
        use super::*;

        #[tokio::test]
        async fn test_missing_negated_never_writes() {
            let mut h = Harness::new(UpdateSnapshots::All);
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::equal())
                .expect(&target)
                .not()
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap();

            assert!(result.pass);
            assert!(!result.succeeded(true));
            assert!(result.message().contains("won't write them automatically"));
            assert!(!target.was_captured());
            assert!(h.store.written().is_empty());
        }

        #[tokio::test]
        async fn test_different_negated_succeeds() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::differing(50))
                .expect(&target)
                .not()
                .to_match_screenshot(&mut h.info, &mut h.weak, "shot", &ScreenshotOptions::new())
                .await
                .unwrap();

            assert!(result.succeeded(true));
            assert!(!h.weak.has_errors());
        }

        #[tokio::test]
        async fn test_matching_negated_with_stop_fails() {
            let mut h = Harness::new(UpdateSnapshots::None).with_baseline(b"base");
            let target = FixedCapture::new(b"img".to_vec());
            let result = h
                .matcher(ScriptedComparator::equal())
                .expect(&target)
                .not()
                .to_match_screenshot(
                    &mut h.info,
                    &mut h.weak,
                    "shot",
                    &ScreenshotOptions::new().with_stop_on_first_image_diff(true),
                )
                .await
                .unwrap();

            assert!(!result.succeeded(true));
            assert!(result.into_result(true).is_err());
        }
    }
}
