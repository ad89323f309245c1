// Quality Metrics
//
// Pure pixel statistics behind the quality score. Each sub-score is in
// [0, 100]; higher is better.
//
// - blur: variance of the 4-neighbour Laplacian over luma
// - resolution: linear ramp on the shorter image side
// - exposure: HSV value histogram (under / over / mid-tone fractions)
// - glare: fraction of near-white luma pixels (reported, never scored)

use image::RgbImage;

#[inline]
fn luma(px: &image::Rgb<u8>) -> f32 {
    let [r, g, b] = px.0;
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

/// Variance of the Laplacian response over interior pixels
///
/// Images narrower or shorter than 3 pixels have no interior and return 0.
pub fn laplacian_variance(image: &RgbImage) -> f64 {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let grey: Vec<f32> = image.pixels().map(luma).collect();
    let at = |x: u32, y: u32| grey[(y * w + x) as usize] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0.0;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = 4.0 * at(x, y) - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1);
            sum += lap;
            sum_sq += lap * lap;
            count += 1.0;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

/// Map Laplacian variance onto [0, 100]
///
/// Sharp card photos sit well above 300; anything under 50 is visibly soft.
pub fn blur_score(variance: f64) -> f32 {
    let score = if variance > 300.0 {
        100.0
    } else if variance > 150.0 {
        85.0 + (variance - 150.0) * 15.0 / 150.0
    } else if variance > 50.0 {
        50.0 + (variance - 50.0) * 35.0 / 100.0
    } else {
        variance
    };
    score.clamp(0.0, 100.0) as f32
}

/// 0 at or below `min_dim`, 100 at or above `comfortable_dim`
pub fn resolution_score(width: u32, height: u32, min_dim: u32, comfortable_dim: u32) -> f32 {
    let short = width.min(height);
    if short <= min_dim {
        return 0.0;
    }
    if short >= comfortable_dim {
        return 100.0;
    }
    let span = (comfortable_dim - min_dim) as f32;
    ((short - min_dim) as f32 / span * 100.0).clamp(0.0, 100.0)
}

/// Fractions of (under, over, mid) exposed pixels by HSV value
pub fn exposure_fractions(image: &RgbImage, dark_level: u8, bright_level: u8) -> (f32, f32, f32) {
    let total = (image.width() as u64 * image.height() as u64) as f32;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let (mut under, mut over) = (0u64, 0u64);
    for px in image.pixels() {
        let value = px.0.into_iter().max().unwrap_or(0);
        if value < dark_level {
            under += 1;
        } else if value >= bright_level {
            over += 1;
        }
    }

    let under = under as f32 / total;
    let over = over as f32 / total;
    (under, over, (1.0 - under - over).max(0.0))
}

/// Score exposure from histogram fractions
pub fn exposure_score(under: f32, over: f32, mid: f32) -> f32 {
    let score = if under > 0.6 {
        (70.0 - under * 80.0).max(30.0)
    } else if over > 0.4 {
        (80.0 - over * 100.0).max(30.0)
    } else {
        70.0 + (mid * 35.0).min(30.0)
    };
    score.clamp(0.0, 100.0)
}

/// Fraction of pixels whose luma exceeds `threshold`
pub fn glare_fraction(image: &RgbImage, threshold: u8) -> f32 {
    let total = (image.width() as u64 * image.height() as u64) as f32;
    if total == 0.0 {
        return 0.0;
    }
    let hot = image
        .pixels()
        .filter(|px| luma(px) > f32::from(threshold))
        .count();
    hot as f32 / total
}
