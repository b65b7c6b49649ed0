//! Deterministic file names for baseline and run-artifact images.
//!
//! Every image produced for one assertion is named from the same identity
//! (test title path + snapshot name), so re-runs overwrite earlier output
//! instead of piling up near-duplicates.
//!
//! Only ASCII letters, digits and `-` survive sanitization. Every run of any
//! other character collapses into a single `-`. The extension of the snapshot
//! name (or [`DEFAULT_EXTENSION`]) is re-appended after sanitizing so it is
//! never mangled.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Extension used when the snapshot name has none
pub const DEFAULT_EXTENSION: &str = ".png";

const DELIMITER: &str = "-";

fn unsafe_runs() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9-]+").expect("static pattern is valid"))
}

/// Replace every run of unsafe characters with a single dash
#[must_use]
pub fn sanitize_for_file_path(value: &str) -> String {
    unsafe_runs().replace_all(value, DELIMITER).into_owned()
}

/// Split a snapshot name into its stem and extension (dot included).
///
/// An extension is a trailing `.` followed by ASCII alphanumerics, and the
/// dot must not start the name. `"snap.shot, name"` has no extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                (&name[..idx], Some(&name[idx..]))
            } else {
                (name, None)
            }
        }
        _ => (name, None),
    }
}

/// Build a sanitized image file name.
///
/// Non-empty parts among `full_title`, the extension-less `snapshot_name` and
/// `suffix` are joined with `-`, sanitized, and the original extension (or
/// `.png`) is appended.
#[must_use]
pub fn image_file_name(snapshot_name: &str, full_title: Option<&str>, suffix: Option<&str>) -> String {
    let (stem, ext) = split_extension(snapshot_name);
    let joined = [full_title.unwrap_or_default(), stem, suffix.unwrap_or_default()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(DELIMITER);

    format!(
        "{}{}",
        sanitize_for_file_path(&joined),
        ext.unwrap_or(DEFAULT_EXTENSION)
    )
}

/// Insert `delimiter + suffix` between a path's stem and its extension.
///
/// `file/path.ext` with suffix `suffix` and delimiter `+` becomes
/// `file/path+suffix.ext`.
#[must_use]
pub fn add_suffix_to_file_path(file_path: &str, suffix: &str, delimiter: &str) -> String {
    let path = Path::new(file_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("{stem}{delimiter}{suffix}{ext}");

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(name).to_string_lossy().into_owned()
        }
        _ => name,
    }
}

/// Artifact kind, selecting the suffix and the root directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    /// Stored reference image, under the snapshot directory
    Baseline,
    /// Freshly captured image, under the output directory
    Actual,
    /// Copy of the baseline, under the output directory
    Expected,
    /// Visual diff, under the output directory
    Diff,
}

impl ImageRole {
    /// File-name suffix for this role
    #[must_use]
    pub const fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Baseline => None,
            Self::Actual => Some("actual"),
            Self::Expected => Some("expected"),
            Self::Diff => Some("diff"),
        }
    }
}

/// Everything that determines where one assertion's images live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotIdentity {
    /// Test title path, file entry first
    pub title_path: Vec<String>,
    /// Snapshot name passed to the assertion
    pub snapshot_name: String,
    /// Directory for run artifacts
    pub output_dir: PathBuf,
    /// Directory for baselines
    pub snapshot_dir: PathBuf,
}

impl SnapshotIdentity {
    /// Create an identity
    #[must_use]
    pub fn new(
        title_path: Vec<String>,
        snapshot_name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            title_path,
            snapshot_name: snapshot_name.into(),
            output_dir: output_dir.into(),
            snapshot_dir: snapshot_dir.into(),
        }
    }

    /// Title path without the leading file entry, joined with spaces
    #[must_use]
    pub fn full_title(&self) -> String {
        self.title_path
            .iter()
            .skip(1)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Path of the image for the given role
    #[must_use]
    pub fn path_for(&self, role: ImageRole) -> PathBuf {
        let full_title = self.full_title();
        let file_name = image_file_name(&self.snapshot_name, Some(&full_title), role.suffix());
        match role {
            ImageRole::Baseline => self.snapshot_dir.join(file_name),
            ImageRole::Actual | ImageRole::Expected | ImageRole::Diff => {
                self.output_dir.join(file_name)
            }
        }
    }

    /// All four paths at once
    #[must_use]
    pub fn paths(&self) -> SnapshotPaths {
        SnapshotPaths {
            snapshot: self.path_for(ImageRole::Baseline),
            actual: self.path_for(ImageRole::Actual),
            expected: self.path_for(ImageRole::Expected),
            diff: self.path_for(ImageRole::Diff),
        }
    }
}

/// Resolved image paths for one assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    /// Baseline path
    pub snapshot: PathBuf,
    /// Actual image path
    pub actual: PathBuf,
    /// Expected image path
    pub expected: PathBuf,
    /// Diff image path
    pub diff: PathBuf,
}
