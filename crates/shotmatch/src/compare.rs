//! Perceptual comparison seam and the match verdict.
//!
//! The comparator itself is a collaborator behind [`ImageComparator`]. What
//! this crate owns is the verdict applied to its output ([`are_same`]).
//! [`PixelComparator`] is the built-in comparator: CIE76 colour distance per
//! pixel, an antialiasing heuristic on high-contrast edges, clustered diff
//! regions and a lazily encoded PNG diff image.

use crate::options::CompareOptions;
use crate::result::{ShotmatchError, ShotmatchResult};
use crate::store::FileStore;
use async_trait::async_trait;
use image::{GenericImageView, ImageEncoder, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Region {
    /// Create a new region
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Single-pixel region
    #[must_use]
    pub const fn pixel(x: u32, y: u32) -> Self {
        Self::new(x, y, 1, 1)
    }

    /// Check if a point is within this region
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }

    /// Whether `(px, py)` lies within `gap` pixels of this region
    #[must_use]
    pub const fn is_near(&self, px: u32, py: u32, gap: u32) -> bool {
        px + gap >= self.x
            && px < self.x + self.width + gap
            && py + gap >= self.y
            && py < self.y + self.height + gap
    }

    /// Smallest region covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Self::new(left, top, right - left, bottom - top)
    }

    /// Whether two regions overlap or touch within `gap` pixels
    #[must_use]
    pub const fn touches(&self, other: &Self, gap: u32) -> bool {
        self.x < other.x + other.width + gap
            && other.x < self.x + self.width + gap
            && self.y < other.y + other.height + gap
            && other.y < self.y + self.height + gap
    }
}

/// Where the comparator should take an image from
#[derive(Clone, Copy)]
pub enum ImageSource<'a> {
    /// Encoded image bytes already in memory
    Bytes(&'a [u8]),
    /// Encoded image kept in a file store, read by the comparator
    Stored {
        /// Store holding the image
        store: &'a dyn FileStore,
        /// Path of the image inside the store
        path: &'a Path,
    },
}

impl ImageSource<'_> {
    /// Load the encoded bytes
    ///
    /// # Errors
    ///
    /// Returns a read error if the stored file cannot be read
    pub async fn load(&self) -> ShotmatchResult<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.to_vec()),
            Self::Stored { store, path } => store.read_file(path).await,
        }
    }
}

impl Debug for ImageSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stored { path, .. } => f.debug_struct("Stored").field("path", path).finish(),
        }
    }
}

/// A visual diff that is encoded only when someone asks for it
pub trait DiffImage: Debug + Send + Sync {
    /// Encode the diff as PNG
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    fn to_png(&self) -> ShotmatchResult<Vec<u8>>;
}

/// Output of one perceptual comparison
#[derive(Debug)]
pub struct ComparisonResult {
    /// Comparator considers the images equal
    pub equal: bool,
    /// Pixels that differ beyond tolerance
    pub different_pixels: u64,
    /// Pixels compared
    pub total_pixels: u64,
    /// Bounding boxes of differing areas
    pub diff_clusters: Vec<Region>,
    /// Visual diff, if one could be produced
    pub diff_image: Option<Box<dyn DiffImage>>,
}

impl ComparisonResult {
    /// Result for two equal images
    #[must_use]
    pub const fn identical(total_pixels: u64) -> Self {
        Self {
            equal: true,
            different_pixels: 0,
            total_pixels,
            diff_clusters: Vec::new(),
            diff_image: None,
        }
    }

    /// Result with differing pixels and no diff image
    #[must_use]
    pub const fn different(different_pixels: u64, total_pixels: u64) -> Self {
        Self {
            equal: false,
            different_pixels,
            total_pixels,
            diff_clusters: Vec::new(),
            diff_image: None,
        }
    }

    /// Attach diff regions
    #[must_use]
    pub fn with_clusters(mut self, clusters: Vec<Region>) -> Self {
        self.diff_clusters = clusters;
        self
    }

    /// Attach a diff image
    #[must_use]
    pub fn with_diff_image(mut self, diff: impl DiffImage + 'static) -> Self {
        self.diff_image = Some(Box::new(diff));
        self
    }

    /// Match verdict under the given thresholds
    #[must_use]
    pub fn is_same(&self, max_diff_pixels: u64, max_diff_pixel_ratio: f64) -> bool {
        are_same(self, max_diff_pixels, max_diff_pixel_ratio)
    }
}

/// Match verdict.
///
/// Images are the same if the comparator says so, if fewer than
/// `max_diff_pixels` pixels differ, or if the differing ratio is below
/// `max_diff_pixel_ratio`. With zero total pixels the ratio clause is false.
#[must_use]
pub fn are_same(result: &ComparisonResult, max_diff_pixels: u64, max_diff_pixel_ratio: f64) -> bool {
    let within_ratio = result.total_pixels > 0
        && (result.different_pixels as f64 / result.total_pixels as f64) < max_diff_pixel_ratio;

    result.equal || result.different_pixels < max_diff_pixels || within_ratio
}

/// Perceptual image comparison collaborator
#[async_trait]
pub trait ImageComparator: Send + Sync {
    /// Compare two encoded images
    async fn compare(
        &self,
        actual: ImageSource<'_>,
        expected: ImageSource<'_>,
        options: &CompareOptions,
    ) -> ShotmatchResult<ComparisonResult>;
}

/// Diff image held as RGBA pixels until encoded
#[derive(Debug, Clone)]
pub struct RgbaDiffImage {
    image: RgbaImage,
}

impl RgbaDiffImage {
    /// Wrap an RGBA buffer
    #[must_use]
    pub const fn new(image: RgbaImage) -> Self {
        Self { image }
    }
}

impl DiffImage for RgbaDiffImage {
    fn to_png(&self) -> ShotmatchResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(
                self.image.as_raw(),
                self.image.width(),
                self.image.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| ShotmatchError::ImageProcessing {
                message: format!("Failed to encode diff image: {e}"),
            })?;
        Ok(buffer)
    }
}

const DIFF_HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);
const CLUSTER_GAP: u32 = 10;

/// Built-in comparator on top of the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelComparator;

impl PixelComparator {
    /// Create a pixel comparator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compare two encoded images synchronously
    ///
    /// # Errors
    ///
    /// Returns error if either image cannot be decoded
    pub fn compare_bytes(
        &self,
        actual: &[u8],
        expected: &[u8],
        options: &CompareOptions,
    ) -> ShotmatchResult<ComparisonResult> {
        let actual_img = image::load_from_memory(actual).map_err(|e| ShotmatchError::Comparison {
            message: format!("Failed to decode actual image: {e}"),
        })?;
        let expected_img =
            image::load_from_memory(expected).map_err(|e| ShotmatchError::Comparison {
                message: format!("Failed to decode expected image: {e}"),
            })?;

        let (width, height) = actual_img.dimensions();
        let (exp_width, exp_height) = expected_img.dimensions();

        if (width, height) != (exp_width, exp_height) {
            let w = width.max(exp_width);
            let h = height.max(exp_height);
            let total = u64::from(w) * u64::from(h);
            return Ok(ComparisonResult::different(total, total)
                .with_clusters(vec![Region::new(0, 0, w, h)]));
        }

        let actual_rgba = actual_img.to_rgba8();
        let expected_rgba = expected_img.to_rgba8();
        let total_pixels = u64::from(width) * u64::from(height);
        let mut different_pixels = 0u64;
        let mut clusters: Vec<Region> = Vec::new();
        let mut diff_img = RgbaImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let a = *actual_rgba.get_pixel(x, y);
                let e = *expected_rgba.get_pixel(x, y);
                let distance = delta_e(a, e);

                let differs = distance > options.tolerance
                    && !(options.ignore_antialiasing
                        && (is_antialiased(&actual_rgba, x, y, options.antialiasing_tolerance)
                            || is_antialiased(
                                &expected_rgba,
                                x,
                                y,
                                options.antialiasing_tolerance,
                            )));

                if differs {
                    different_pixels += 1;
                    add_to_clusters(&mut clusters, x, y);
                    diff_img.put_pixel(x, y, DIFF_HIGHLIGHT);
                } else {
                    let Rgba([r, g, b, _]) = a;
                    diff_img.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
                }
            }
        }

        if different_pixels == 0 {
            return Ok(ComparisonResult::identical(total_pixels));
        }

        let result = ComparisonResult::different(different_pixels, total_pixels)
            .with_clusters(merge_clusters(clusters));
        Ok(if options.create_diff_image {
            result.with_diff_image(RgbaDiffImage::new(diff_img))
        } else {
            result
        })
    }
}

#[async_trait]
impl ImageComparator for PixelComparator {
    async fn compare(
        &self,
        actual: ImageSource<'_>,
        expected: ImageSource<'_>,
        options: &CompareOptions,
    ) -> ShotmatchResult<ComparisonResult> {
        let actual = actual.load().await?;
        let expected = expected.load().await?;
        let options = options.clone();
        let comparator = *self;

        tokio::task::spawn_blocking(move || comparator.compare_bytes(&actual, &expected, &options))
            .await
            .map_err(|e| ShotmatchError::comparison(format!("comparison task failed: {e}")))?
    }
}

fn add_to_clusters(clusters: &mut Vec<Region>, x: u32, y: u32) {
    match clusters.iter_mut().find(|c| c.is_near(x, y, CLUSTER_GAP)) {
        Some(cluster) => *cluster = cluster.union(&Region::pixel(x, y)),
        None => clusters.push(Region::pixel(x, y)),
    }
}

fn merge_clusters(mut clusters: Vec<Region>) -> Vec<Region> {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                if clusters[i].touches(&clusters[j], CLUSTER_GAP) {
                    let other = clusters.remove(j);
                    clusters[i] = clusters[i].union(&other);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
    clusters
}

/// CIE L*a*b* of an sRGB pixel (D65 white point)
fn to_lab(pixel: Rgba<u8>) -> [f64; 3] {
    let linear = |c: u8| {
        let c = f64::from(c) / 255.0;
        if c <= 0.040_45 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let Rgba([r, g, b, _]) = pixel;
    let (r, g, b) = (linear(r), linear(g), linear(b));

    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.950_47;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.088_83;

    let f = |t: f64| {
        if t > 216.0 / 24389.0 {
            t.cbrt()
        } else {
            (24389.0 / 27.0 * t + 16.0) / 116.0
        }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIE76 colour distance
#[must_use]
pub fn delta_e(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    let [l1, a1, b1] = to_lab(a);
    let [l2, a2, b2] = to_lab(b);
    ((l1 - l2).powi(2) + (a1 - a2).powi(2) + (b1 - b2).powi(2)).sqrt()
}

/// A pixel sits on a high-contrast edge if it has both a clearly darker and a
/// clearly brighter neighbour.
fn is_antialiased(img: &RgbaImage, x: u32, y: u32, tolerance: f64) -> bool {
    let center = to_lab(*img.get_pixel(x, y))[0];
    let (mut darker, mut brighter) = (false, false);

    for ny in y.saturating_sub(1)..=(y + 1).min(img.height() - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(img.width() - 1) {
            if (nx, ny) == (x, y) {
                continue;
            }
            let lightness = to_lab(*img.get_pixel(nx, ny))[0];
            if lightness < center - tolerance {
                darker = true;
            } else if lightness > center + tolerance {
                brighter = true;
            }
        }
    }

    darker && brighter
}
