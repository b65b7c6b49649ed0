//! Screenshot Matching Demo
//!
//! Walks one test through the life of a baseline:
//! - first run writes the baseline and records a weak error
//! - a matching run passes quietly
//! - a changed page produces expected/actual/diff artifacts
//! - a negated assertion checks that the page did change
//!
//! Run with: cargo run --example screenshot_demo -p shotmatch

use image::{ImageEncoder, Rgba, RgbaImage};
use shotmatch::prelude::*;

#[tokio::main]
async fn main() -> ShotmatchResult<()> {
    let _ = shotmatch::init_logging();
    println!("=== Screenshot Matching Demo ===\n");

    let dir = tempfile::tempdir()?;
    let config = SuiteConfig {
        snapshot_dir: dir.path().join("__screenshots__"),
        output_dir: dir.path().join("test-results"),
        ..SuiteConfig::default()
    };
    let matcher = config.matcher();
    let opts = ScreenshotOptions::new();

    let original = FixedCapture::new(create_page(Rgba([40, 90, 200, 255])));
    let changed = FixedCapture::new(create_page(Rgba([200, 40, 40, 255])));

    // Demo 1: First run, no baseline yet
    println!("1. First Run (update mode: {})", config.update_snapshots);
    println!("   -----------------------------");
    let mut info = config.test_info(["home.spec", "home", "header"], 0);
    let mut weak = WeakErrors::new();
    let result = matcher
        .expect(&original)
        .to_match_screenshot(&mut info, &mut weak, "header.png", &opts)
        .await?;
    println!("   pass: {}", result.pass);
    println!("   weak errors: {}", weak.len());
    for error in &info.errors {
        println!("     {}", error.message);
    }
    weak.finalize(&mut info);
    println!("   final status: {:?}\n", info.status);

    // Demo 2: Same page again
    println!("2. Matching Run");
    println!("   ------------");
    let mut info = config.test_info(["home.spec", "home", "header"], 0);
    let mut weak = WeakErrors::new();
    let result = matcher
        .expect(&original)
        .to_match_screenshot(&mut info, &mut weak, "header.png", &opts)
        .await?;
    println!("   pass: {}", result.pass);
    weak.finalize(&mut info);
    println!("   final status: {:?}\n", info.status);

    // Demo 3: The page changed
    println!("3. Changed Page (stop on first diff)");
    println!("   ---------------------------------");
    let mut info = config.test_info(["home.spec", "home", "header"], 0);
    let mut weak = WeakErrors::new();
    let result = matcher
        .expect(&changed)
        .to_match_screenshot(
            &mut info,
            &mut weak,
            "header.png",
            &ScreenshotOptions::new().with_stop_on_first_image_diff(true),
        )
        .await?;
    println!("   pass: {}", result.pass);
    println!("{}", indent(&result.message()));
    for attachment in &info.attachments {
        println!("   attached {} -> {}", attachment.name, attachment.path.display());
    }
    println!();

    // Demo 4: Negated assertion
    println!("4. Negated Assertion");
    println!("   -----------------");
    let mut info = config.test_info(["home.spec", "home", "header"], 0);
    let mut weak = WeakErrors::new();
    let expectation = matcher.expect(&changed).not();
    let result = expectation
        .to_match_screenshot(&mut info, &mut weak, "header.png", &opts)
        .await?;
    println!(
        "   changed page differs from baseline: {}",
        result.succeeded(expectation.is_negated())
    );

    println!("\n=== Demo Complete ===");
    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("   {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A 120x80 page with a coloured header bar
fn create_page(header: Rgba<u8>) -> Vec<u8> {
    let (width, height) = (120, 80);
    let mut img = RgbaImage::new(width, height);
    for (_, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = if y < 20 {
            header
        } else {
            Rgba([250, 250, 250, 255])
        };
    }

    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .expect("PNG encoding failed");
    buffer
}
