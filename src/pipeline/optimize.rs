//! Image optimisation: keep the screenshot under the inference payload budget.
//!
//! The optimiser never fails the pipeline. A buffer already under budget
//! passes through byte-identical; an oversized one is re-encoded at a
//! quality proportional to how far over budget it is, downscaled into a
//! bounding box (never upscaled), and — if still far over — squeezed once
//! more at a smaller box and fixed low quality. When even that is not
//! enough, the best attempt is forwarded with `oversized: true` and a
//! warning; the inference API may then reject the payload itself, which
//! surfaces as an ordinary vision-stage error.

use crate::config::AnalysisConfig;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::{debug, warn};

/// Floor for the proportional quality computation.
const MIN_QUALITY: u8 = 50;
/// Fixed quality of the aggressive second pass.
const AGGRESSIVE_QUALITY: u8 = 45;
/// Second pass triggers when the first result is still this far over budget.
const AGGRESSIVE_FACTOR: f64 = 1.5;

/// Result of an optimisation pass.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    /// JPEG quality of the final encoding (or the capture quality for the
    /// no-op fast path).
    pub quality: u8,
    /// Whether any downscale happened.
    pub resized: bool,
    /// True when the result still exceeds the byte budget.
    pub oversized: bool,
}

impl OptimizedImage {
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Bring `bytes` under `config.max_image_bytes`, best effort.
pub fn optimize(bytes: Vec<u8>, config: &AnalysisConfig) -> OptimizedImage {
    let budget = config.max_image_bytes;

    if bytes.len() <= budget {
        return OptimizedImage {
            bytes,
            quality: config.screenshot_quality,
            resized: false,
            oversized: false,
        };
    }

    let original_len = bytes.len();
    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            warn!("oversized screenshot could not be decoded ({e}); forwarding as-is");
            return OptimizedImage {
                bytes,
                quality: config.screenshot_quality,
                resized: false,
                oversized: true,
            };
        }
    };

    let quality = proportional_quality(config.optimizer_base_quality, budget, original_len);
    let (box_w, box_h) = config.max_image_dimensions;
    let (scaled, resized) = fit_within(decoded, box_w, box_h);

    let mut best = match encode_jpeg(&scaled, quality) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("re-encode failed ({e}); forwarding original buffer");
            return OptimizedImage {
                bytes,
                quality: config.screenshot_quality,
                resized: false,
                oversized: true,
            };
        }
    };
    let mut final_quality = quality;
    let mut final_resized = resized;

    if best.len() as f64 > budget as f64 * AGGRESSIVE_FACTOR {
        let (small, _) = fit_within(scaled, box_w / 2, box_h / 2);
        if let Ok(second) = encode_jpeg(&small, AGGRESSIVE_QUALITY) {
            if second.len() < best.len() {
                best = second;
                final_quality = AGGRESSIVE_QUALITY;
                final_resized = true;
            }
        }
    }

    let oversized = best.len() > budget;
    if oversized {
        warn!(
            "screenshot still {} bytes after optimisation (budget {budget}); forwarding best effort",
            best.len()
        );
    } else {
        debug!(
            "optimised screenshot {original_len} -> {} bytes (quality {final_quality})",
            best.len()
        );
    }

    OptimizedImage {
        bytes: best,
        quality: final_quality,
        resized: final_resized,
        oversized,
    }
}

/// Quality proportional to how far over budget the buffer is, floored.
fn proportional_quality(base: u8, budget: usize, current: usize) -> u8 {
    let scaled = (base as u64 * budget as u64) / current.max(1) as u64;
    (scaled as u8).clamp(MIN_QUALITY, base.max(MIN_QUALITY))
}

/// Downscale to fit a bounding box, preserving aspect ratio. Never upscales.
fn fit_within(img: DynamicImage, box_w: u32, box_h: u32) -> (DynamicImage, bool) {
    if img.width() <= box_w && img.height() <= box_h {
        (img, false)
    } else {
        (img.resize(box_w.max(1), box_h.max(1), FilterType::Triangle), true)
    }
}

/// JPEG-encode at the given quality. JPEG has no alpha channel, so the
/// image is flattened to RGB first.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder.encode_image(&rgb)?;
    drop(cursor);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        // Per-pixel noise defeats PNG filtering enough to give the buffer
        // a realistic size.
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 7 % 256) as u8,
                (y * 13 % 256) as u8,
                ((x + y) * 31 % 256) as u8,
            ])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn under_budget_buffer_passes_through_byte_identical() {
        let config = AnalysisConfig::default();
        let bytes = png_bytes(64, 64);
        let original = bytes.clone();

        let result = optimize(bytes, &config);

        assert_eq!(result.bytes, original);
        assert!(!result.resized);
        assert!(!result.oversized);
    }

    #[test]
    fn over_budget_buffer_is_reduced_and_never_panics() {
        let config = AnalysisConfig::builder()
            .max_image_bytes(2048)
            .build()
            .unwrap();
        let bytes = png_bytes(800, 600);
        assert!(bytes.len() > 2048, "fixture must exceed the budget");

        let result = optimize(bytes, &config);

        assert!(result.byte_size() < 800 * 600 * 3);
        assert!(result.quality >= AGGRESSIVE_QUALITY);
    }

    #[test]
    fn undecodable_oversized_buffer_is_forwarded_with_warning_flag() {
        let config = AnalysisConfig::builder()
            .max_image_bytes(1024)
            .build()
            .unwrap();
        let garbage = vec![0xAB; 4096];

        let result = optimize(garbage.clone(), &config);

        assert_eq!(result.bytes, garbage);
        assert!(result.oversized);
    }

    #[test]
    fn quality_scales_with_overshoot() {
        // 2x over budget at base 80 -> 40, floored to 50.
        assert_eq!(proportional_quality(80, 1000, 2000), 50);
        // 25% over budget -> 64.
        assert_eq!(proportional_quality(80, 1000, 1250), 64);
        // Base never exceeded.
        assert!(proportional_quality(80, 1000, 1001) <= 80);
    }

    #[test]
    fn fit_within_never_upscales() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let (fitted, resized) = fit_within(img, 1280, 1024);
        assert!(!resized);
        assert_eq!((fitted.width(), fitted.height()), (100, 50));
    }

    #[test]
    fn fit_within_downscales_into_box() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(2560, 1440));
        let (fitted, resized) = fit_within(img, 1280, 1024);
        assert!(resized);
        assert!(fitted.width() <= 1280 && fitted.height() <= 1024);
    }
}
