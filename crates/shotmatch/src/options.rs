//! Three-tier option resolution.
//!
//! Every option is resolved independently: the call-site value wins, then the
//! suite-level value, then the system default. The resolved options are split
//! into what the capture collaborator needs and what the comparator needs.
//!
//! Mask regions are taken from the call site only. A mask is tied to what one
//! particular test shows, so suite-level and default masks are discarded.

use crate::compare::Region;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How CSS animations are handled while capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animations {
    /// Finish or cancel animations before capturing
    #[default]
    Disabled,
    /// Leave animations running
    Allow,
}

/// Text caret visibility while capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Caret {
    /// Hide the caret
    #[default]
    Hide,
    /// Keep the caret as rendered
    Initial,
}

/// Pixel scale of the capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// One pixel per CSS pixel
    #[default]
    Css,
    /// One pixel per device pixel
    Device,
}

/// Options as given at one tier; `None` defers to the next tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotOptions {
    /// Per-pixel colour tolerance
    pub tolerance: Option<f64>,
    /// Tolerance used when checking antialiased pixels
    pub antialiasing_tolerance: Option<f64>,
    /// Number of differing pixels below which images still match
    pub max_diff_pixels: Option<u64>,
    /// Ratio of differing pixels below which images still match
    pub max_diff_pixel_ratio: Option<f64>,
    /// Fail immediately on a mismatch instead of recording a weak error
    pub stop_on_first_image_diff: Option<bool>,
    /// Also save the expected image when screenshots match
    pub save_image_on_screenshot_match: Option<bool>,
    /// Animation handling
    pub animations: Option<Animations>,
    /// Caret visibility
    pub caret: Option<Caret>,
    /// Regions painted over before capturing (call site only)
    pub mask: Option<Vec<Region>>,
    /// Colour of masked regions
    pub mask_color: Option<String>,
    /// Capture scale
    pub scale: Option<Scale>,
    /// Capture timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Capture the full scrollable page
    pub full_page: Option<bool>,
}

impl ScreenshotOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the colour tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Set the antialiasing tolerance
    #[must_use]
    pub const fn with_antialiasing_tolerance(mut self, tolerance: f64) -> Self {
        self.antialiasing_tolerance = Some(tolerance);
        self
    }

    /// Set the maximum number of differing pixels
    #[must_use]
    pub const fn with_max_diff_pixels(mut self, pixels: u64) -> Self {
        self.max_diff_pixels = Some(pixels);
        self
    }

    /// Set the maximum ratio of differing pixels
    #[must_use]
    pub const fn with_max_diff_pixel_ratio(mut self, ratio: f64) -> Self {
        self.max_diff_pixel_ratio = Some(ratio);
        self
    }

    /// Fail on the first mismatch instead of recording a weak error
    #[must_use]
    pub const fn with_stop_on_first_image_diff(mut self, stop: bool) -> Self {
        self.stop_on_first_image_diff = Some(stop);
        self
    }

    /// Save the expected image even when screenshots match
    #[must_use]
    pub const fn with_save_image_on_screenshot_match(mut self, save: bool) -> Self {
        self.save_image_on_screenshot_match = Some(save);
        self
    }

    /// Set animation handling
    #[must_use]
    pub const fn with_animations(mut self, animations: Animations) -> Self {
        self.animations = Some(animations);
        self
    }

    /// Set caret visibility
    #[must_use]
    pub const fn with_caret(mut self, caret: Caret) -> Self {
        self.caret = Some(caret);
        self
    }

    /// Add a mask region
    #[must_use]
    pub fn with_mask(mut self, region: Region) -> Self {
        self.mask.get_or_insert_with(Vec::new).push(region);
        self
    }

    /// Set the mask colour
    #[must_use]
    pub fn with_mask_color(mut self, color: impl Into<String>) -> Self {
        self.mask_color = Some(color.into());
        self
    }

    /// Set the capture scale
    #[must_use]
    pub const fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set the capture timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Capture the full page
    #[must_use]
    pub const fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page = Some(full_page);
        self
    }
}

/// System defaults; every option has one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDefaults {
    /// Per-pixel colour tolerance
    pub tolerance: f64,
    /// Antialiasing tolerance
    pub antialiasing_tolerance: f64,
    /// Maximum differing pixels
    pub max_diff_pixels: u64,
    /// Maximum differing pixel ratio
    pub max_diff_pixel_ratio: f64,
    /// Fail on first mismatch
    pub stop_on_first_image_diff: bool,
    /// Save expected image on match
    pub save_image_on_screenshot_match: bool,
    /// Animation handling
    pub animations: Animations,
    /// Caret visibility
    pub caret: Caret,
    /// Mask colour
    pub mask_color: String,
    /// Capture scale
    pub scale: Scale,
    /// Capture timeout in milliseconds
    pub timeout_ms: u64,
    /// Full-page capture
    pub full_page: bool,
}

impl Default for OptionDefaults {
    fn default() -> Self {
        Self {
            tolerance: 2.3,
            antialiasing_tolerance: 4.0,
            max_diff_pixels: 0,
            max_diff_pixel_ratio: 0.0,
            stop_on_first_image_diff: false,
            save_image_on_screenshot_match: false,
            animations: Animations::Disabled,
            caret: Caret::Hide,
            mask_color: String::from("#000000"),
            scale: Scale::Css,
            timeout_ms: 30_000,
            full_page: false,
        }
    }
}

/// Options handed to the capture collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// Animation handling
    pub animations: Animations,
    /// Caret visibility
    pub caret: Caret,
    /// Masked regions
    pub mask: Vec<Region>,
    /// Mask colour
    pub mask_color: String,
    /// Capture scale
    pub scale: Scale,
    /// Capture timeout
    pub timeout: Duration,
    /// Full-page capture
    pub full_page: bool,
}

/// Options handed to the comparator and the verdict
#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    /// Per-pixel colour tolerance
    pub tolerance: f64,
    /// Antialiasing tolerance
    pub antialiasing_tolerance: f64,
    /// Skip antialiased pixels
    pub ignore_antialiasing: bool,
    /// Always `false`; the caret is handled at capture time
    pub ignore_caret: bool,
    /// Always `true`
    pub create_diff_image: bool,
    /// Maximum differing pixels
    pub max_diff_pixels: u64,
    /// Maximum differing pixel ratio
    pub max_diff_pixel_ratio: f64,
    /// Fail on first mismatch
    pub stop_on_first_image_diff: bool,
    /// Save expected image on match
    pub save_image_on_screenshot_match: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        resolve(
            &ScreenshotOptions::default(),
            &ScreenshotOptions::default(),
            &OptionDefaults::default(),
        )
        .compare
    }
}

/// Fully resolved options for one assertion
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOptions {
    /// Capture options
    pub capture: CaptureOptions,
    /// Compare options
    pub compare: CompareOptions,
}

fn pick<T: Clone>(user: Option<&T>, suite: Option<&T>, default: &T) -> T {
    user.or(suite).unwrap_or(default).clone()
}

macro_rules! option_descriptors {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Options merged across the three tiers, in resolution order
        pub const OPTION_NAMES: &[&str] = &[$(stringify!($field)),*];

        struct Merged {
            $($field: $ty,)*
        }

        fn merge(user: &ScreenshotOptions, suite: &ScreenshotOptions, defaults: &OptionDefaults) -> Merged {
            Merged {
                $($field: pick(user.$field.as_ref(), suite.$field.as_ref(), &defaults.$field),)*
            }
        }
    };
}

option_descriptors! {
    tolerance: f64,
    antialiasing_tolerance: f64,
    max_diff_pixels: u64,
    max_diff_pixel_ratio: f64,
    stop_on_first_image_diff: bool,
    save_image_on_screenshot_match: bool,
    animations: Animations,
    caret: Caret,
    mask_color: String,
    scale: Scale,
    timeout_ms: u64,
    full_page: bool,
}

/// Resolve call-site, suite and default options into prepared options
#[must_use]
pub fn resolve(
    user: &ScreenshotOptions,
    suite: &ScreenshotOptions,
    defaults: &OptionDefaults,
) -> PreparedOptions {
    let merged = merge(user, suite, defaults);

    PreparedOptions {
        capture: CaptureOptions {
            animations: merged.animations,
            caret: merged.caret,
            mask: user.mask.clone().unwrap_or_default(),
            mask_color: merged.mask_color,
            scale: merged.scale,
            timeout: Duration::from_millis(merged.timeout_ms),
            full_page: merged.full_page,
        },
        compare: CompareOptions {
            tolerance: merged.tolerance,
            antialiasing_tolerance: merged.antialiasing_tolerance,
            ignore_antialiasing: merged.antialiasing_tolerance > 0.0,
            ignore_caret: false,
            create_diff_image: true,
            max_diff_pixels: merged.max_diff_pixels,
            max_diff_pixel_ratio: merged.max_diff_pixel_ratio,
            stop_on_first_image_diff: merged.stop_on_first_image_diff,
            save_image_on_screenshot_match: merged.save_image_on_screenshot_match,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn none() -> ScreenshotOptions {
        ScreenshotOptions::default()
    }

    mod precedence {
        use super::*;

        #[test]
        fn test_defaults_when_nothing_given() {
            let prepared = resolve(&none(), &none(), &OptionDefaults::default());
            assert_eq!(prepared.compare.tolerance, 2.3);
            assert_eq!(prepared.compare.antialiasing_tolerance, 4.0);
            assert_eq!(prepared.compare.max_diff_pixels, 0);
            assert_eq!(prepared.compare.max_diff_pixel_ratio, 0.0);
            assert!(!prepared.compare.stop_on_first_image_diff);
            assert_eq!(prepared.capture.animations, Animations::Disabled);
            assert_eq!(prepared.capture.caret, Caret::Hide);
            assert_eq!(prepared.capture.mask_color, "#000000");
            assert_eq!(prepared.capture.scale, Scale::Css);
            assert_eq!(prepared.capture.timeout, Duration::from_secs(30));
            assert!(!prepared.capture.full_page);
        }

        #[test]
        fn test_suite_beats_default() {
            let suite = none().with_tolerance(5.0).with_full_page(true);
            let prepared = resolve(&none(), &suite, &OptionDefaults::default());
            assert_eq!(prepared.compare.tolerance, 5.0);
            assert!(prepared.capture.full_page);
        }

        #[test]
        fn test_user_beats_suite() {
            let suite = none().with_tolerance(5.0).with_caret(Caret::Initial);
            let user = none().with_tolerance(1.0);
            let prepared = resolve(&user, &suite, &OptionDefaults::default());
            assert_eq!(prepared.compare.tolerance, 1.0);
            assert_eq!(prepared.capture.caret, Caret::Initial);
        }

        #[test]
        fn test_each_option_resolved_independently() {
            let suite = none().with_max_diff_pixels(10);
            let user = none().with_max_diff_pixel_ratio(0.5);
            let prepared = resolve(&user, &suite, &OptionDefaults::default());
            assert_eq!(prepared.compare.max_diff_pixels, 10);
            assert_eq!(prepared.compare.max_diff_pixel_ratio, 0.5);
        }

        #[test]
        fn test_custom_defaults() {
            let defaults = OptionDefaults {
                stop_on_first_image_diff: true,
                timeout_ms: 5,
                ..OptionDefaults::default()
            };
            let prepared = resolve(&none(), &none(), &defaults);
            assert!(prepared.compare.stop_on_first_image_diff);
            assert_eq!(prepared.capture.timeout, Duration::from_millis(5));
        }
    }

    mod masks {
        use super::*;

        #[test]
        fn test_mask_from_user() {
            let user = none().with_mask(Region::new(0, 0, 10, 10));
            let prepared = resolve(&user, &none(), &OptionDefaults::default());
            assert_eq!(prepared.capture.mask, vec![Region::new(0, 0, 10, 10)]);
        }

        #[test]
        fn test_suite_mask_discarded() {
            let suite = none().with_mask(Region::new(1, 1, 2, 2));
            let prepared = resolve(&none(), &suite, &OptionDefaults::default());
            assert!(prepared.capture.mask.is_empty());
        }

        #[test]
        fn test_user_mask_not_merged_with_suite() {
            let suite = none().with_mask(Region::new(1, 1, 2, 2));
            let user = none().with_mask(Region::new(5, 5, 1, 1));
            let prepared = resolve(&user, &suite, &OptionDefaults::default());
            assert_eq!(prepared.capture.mask, vec![Region::new(5, 5, 1, 1)]);
        }
    }

    mod forced_flags {
        use super::*;

        #[test]
        fn test_diff_image_and_caret_forced() {
            let prepared = resolve(&none(), &none(), &OptionDefaults::default());
            assert!(prepared.compare.create_diff_image);
            assert!(!prepared.compare.ignore_caret);
        }

        #[test]
        fn test_ignore_antialiasing_follows_tolerance() {
            let on = resolve(&none(), &none(), &OptionDefaults::default());
            assert!(on.compare.ignore_antialiasing);

            let off = resolve(
                &none().with_antialiasing_tolerance(0.0),
                &none(),
                &OptionDefaults::default(),
            );
            assert!(!off.compare.ignore_antialiasing);
        }

        #[test]
        fn test_compare_options_default_matches_resolution() {
            let compare = CompareOptions::default();
            assert_eq!(compare.tolerance, 2.3);
            assert!(compare.create_diff_image);
        }
    }

    mod descriptors {
        use super::*;

        #[test]
        fn test_option_names_exclude_mask() {
            assert!(!OPTION_NAMES.contains(&"mask"));
            assert_eq!(OPTION_NAMES.len(), 12);
            assert_eq!(OPTION_NAMES[0], "tolerance");
        }
    }

    mod serde_support {
        use super::*;

        #[test]
        fn test_partial_yaml() {
            let opts: ScreenshotOptions =
                serde_yaml_ng::from_str("tolerance: 3.5\nanimations: allow\n").unwrap();
            assert_eq!(opts.tolerance, Some(3.5));
            assert_eq!(opts.animations, Some(Animations::Allow));
            assert_eq!(opts.caret, None);
        }
    }
}
