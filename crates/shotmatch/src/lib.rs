//! Shotmatch: screenshot assertions with weak errors
//!
//! A visual-regression assertion for end-to-end browser tests. The assertion
//! captures a page or element, compares it with a stored baseline and, based
//! on the run's update mode and the assertion's polarity, settles on one of
//! eight outcomes. Mismatches can be recorded as weak errors that let the test
//! keep going and fail it at teardown.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SHOTMATCH Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Screenshot │    │ Screenshot │    │ Outcome    │            │
//! │   │ Target     │───►│ Matcher    │───►│ Handlers   │            │
//! │   │ (capture)  │    │ (decision) │    │ (8 cases)  │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           │                 │                   │
//! │              ┌────────────┴───┐      ┌──────┴───────┐           │
//! │              │ Comparator +   │      │ File Store + │           │
//! │              │ Option Resolver│      │ Weak Errors  │           │
//! │              └────────────────┘      └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shotmatch::prelude::*;
//!
//! let matcher = ScreenshotMatcher::new();
//! let mut info = TestInfo::new(["home.spec", "home", "renders"]);
//! let mut weak = WeakErrors::new();
//!
//! let result = matcher
//!     .expect(&page)
//!     .to_match_screenshot(&mut info, &mut weak, "home.png", &ScreenshotOptions::new())
//!     .await?;
//! result.into_result(false)?;
//!
//! weak.finalize(&mut info);
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod capture;
#[allow(
    clippy::cast_precision_loss,
    clippy::suboptimal_flops,
    clippy::many_single_char_names
)]
mod compare;
pub mod config;
mod context;
pub mod handlers;
pub mod logging;
mod matcher;
pub mod naming;
mod options;
mod result;
mod store;
mod weak_errors;

pub use capture::{FixedCapture, ScreenshotTarget};
pub use compare::{
    are_same, delta_e, ComparisonResult, DiffImage, ImageComparator, ImageSource,
    PixelComparator, Region, RgbaDiffImage,
};
pub use config::{SuiteConfig, UPDATE_SNAPSHOTS_ENV};
pub use context::{
    Attachment, RunConfig, TestError, TestInfo, TestStatus, UpdateSnapshots,
};
pub use handlers::{DiffArtifacts, HandlerContext, MatcherResult};
pub use logging::init_logging;
pub use matcher::{Decision, Expectation, Route, ScreenshotMatcher};
pub use naming::{
    add_suffix_to_file_path, image_file_name, sanitize_for_file_path, ImageRole,
    SnapshotIdentity, SnapshotPaths, DEFAULT_EXTENSION,
};
pub use options::{
    resolve, Animations, CaptureOptions, Caret, CompareOptions, OptionDefaults, PreparedOptions,
    Scale, ScreenshotOptions, OPTION_NAMES,
};
pub use result::{ShotmatchError, ShotmatchResult};
pub use store::{write_all, FileStore, FsStore, MemoryStore, StoreOp};
pub use weak_errors::{
    ScreenshotError, WeakError, WeakErrorKind, WeakErrors, WeakErrorsError, DEFAULT_ERROR_NAME,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::capture::*;
    pub use super::compare::{ComparisonResult, ImageComparator, PixelComparator, Region};
    pub use super::config::SuiteConfig;
    pub use super::context::*;
    pub use super::handlers::MatcherResult;
    pub use super::matcher::{Expectation, ScreenshotMatcher};
    pub use super::options::{Animations, Caret, Scale, ScreenshotOptions};
    pub use super::result::*;
    pub use super::store::{FileStore, FsStore, MemoryStore};
    pub use super::weak_errors::{ScreenshotError, WeakError, WeakErrorKind, WeakErrors};
}
