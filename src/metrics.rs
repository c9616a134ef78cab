//─────────────────────────────────────────────────────────────────────────────
// canvas metrics (coverage sampling, quality score)
//─────────────────────────────────────────────────────────────────────────────

use rayon::prelude::*;
use serde::Serialize;
use tiny_skia as sk;

use crate::settings::{CoverageSettings, QualityWeights};

/// snapshot of the derived canvas values, refreshed by `Canvas::compute_metrics`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CanvasMetrics {
    /// 0..100
    pub coverage_percent: f32,
    pub color_diversity: u32,
    pub stroke_count: u32,
    /// 0..1
    pub quality_score: f32,
}

impl CanvasMetrics {
    pub fn new(coverage_percent: f32, color_diversity: u32, stroke_count: u32, weights: &QualityWeights) -> Self {
        Self {
            coverage_percent,
            color_diversity,
            stroke_count,
            quality_score: quality_score(coverage_percent, color_diversity, stroke_count, weights),
        }
    }
}

/// percent of sampled pixels that carry paint.
/// `layer` must hold strokes only (transparent where unpainted), so every pixel at or
/// above the alpha threshold is both non-background and non-transparent.
pub fn coverage_percent(layer: &sk::Pixmap, cfg: &CoverageSettings) -> f32 {
    profiling::scope!("coverage_percent");
    let step = cfg.sample_step.max(1) as usize;
    let threshold = cfg.alpha_threshold.max(1);
    let width = layer.width() as usize;
    let row_bytes = width * 4;
    if row_bytes == 0 {
        return 0.0;
    }

    let (painted, sampled) = layer
        .data()
        .par_chunks_exact(row_bytes)
        .enumerate()
        .filter(|(y, _)| y % step == 0)
        .map(|(_, row)| {
            let mut painted = 0usize;
            let mut sampled = 0usize;
            for px in row.chunks_exact(4).step_by(step) {
                sampled += 1;
                if px[3] >= threshold {
                    painted += 1;
                }
            }
            (painted, sampled)
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    if sampled == 0 {
        return 0.0;
    }
    painted as f32 / sampled as f32 * 100.0
}

/// quality = min(1, coverage/baseline) * coverage_weight
///         + min(colors, cap)/cap * diversity_weight
///         + min(strokes, cap)/cap * stroke_weight, clamped to [0, 1]
pub fn quality_score(coverage_percent: f32, color_diversity: u32, stroke_count: u32, w: &QualityWeights) -> f32 {
    let baseline = w.coverage_baseline_percent.max(f32::EPSILON);
    let coverage_term = (coverage_percent / baseline).min(1.0) * w.coverage_weight;
    let diversity_term = capped_ratio(color_diversity, w.diversity_cap) * w.diversity_weight;
    let stroke_term = capped_ratio(stroke_count, w.stroke_cap) * w.stroke_weight;
    (coverage_term + diversity_term + stroke_term).clamp(0.0, 1.0)
}

/// fixed multiplier applied to the score of a caught or interrupted session
#[inline]
pub fn apply_caught_penalty(score: f32, w: &QualityWeights) -> f32 {
    (score * w.caught_penalty).clamp(0.0, 1.0)
}

#[inline]
fn capped_ratio(value: u32, cap: u32) -> f32 {
    if cap == 0 {
        return 0.0;
    }
    value.min(cap) as f32 / cap as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_painted(width: u32, height: u32) -> sk::Pixmap {
        let mut pix = sk::Pixmap::new(width, height).unwrap();
        let rect = sk::Rect::from_xywh(0.0, 0.0, width as f32 / 2.0, height as f32).unwrap();
        let mut paint = sk::Paint::default();
        paint.set_color_rgba8(10, 20, 30, 255);
        pix.fill_rect(rect, &paint, sk::Transform::identity(), None);
        pix
    }

    #[test]
    fn test_coverage_empty_and_half() {
        let cfg = CoverageSettings { sample_step: 1, alpha_threshold: 8 };
        let empty = sk::Pixmap::new(32, 32).unwrap();
        assert_eq!(coverage_percent(&empty, &cfg), 0.0);

        let half = half_painted(32, 32);
        assert!((coverage_percent(&half, &cfg) - 50.0).abs() < 0.01);

        // strided sampling keeps the same answer on a uniform split
        let strided = CoverageSettings { sample_step: 2, alpha_threshold: 8 };
        assert!((coverage_percent(&half, &strided) - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_coverage_ignores_faint_pixels() {
        let mut pix = sk::Pixmap::new(10, 10).unwrap();
        let mut paint = sk::Paint::default();
        paint.set_color_rgba8(255, 0, 0, 4);
        pix.fill_rect(sk::Rect::from_xywh(0.0, 0.0, 10.0, 10.0).unwrap(), &paint, sk::Transform::identity(), None);
        let cfg = CoverageSettings { sample_step: 1, alpha_threshold: 8 };
        assert_eq!(coverage_percent(&pix, &cfg), 0.0);
    }

    #[test]
    fn test_quality_formula() {
        let w = QualityWeights::default();
        assert_eq!(quality_score(0.0, 0, 0, &w), 0.0);

        // coverage at baseline gives the full coverage weight
        let q = quality_score(w.coverage_baseline_percent, 0, 0, &w);
        assert!((q - w.coverage_weight).abs() < 1e-6);

        // bonuses saturate at their caps
        let capped = quality_score(100.0, w.diversity_cap * 3, w.stroke_cap * 3, &w);
        let at_cap = quality_score(100.0, w.diversity_cap, w.stroke_cap, &w);
        assert_eq!(capped, at_cap);
        assert!((at_cap - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_quality_is_monotonic_in_each_input() {
        let w = QualityWeights::default();
        assert!(quality_score(20.0, 2, 5, &w) > quality_score(10.0, 2, 5, &w));
        assert!(quality_score(20.0, 3, 5, &w) > quality_score(20.0, 2, 5, &w));
        assert!(quality_score(20.0, 2, 6, &w) > quality_score(20.0, 2, 5, &w));
    }

    #[test]
    fn test_caught_penalty() {
        let w = QualityWeights::default();
        assert!((apply_caught_penalty(0.8, &w) - 0.4).abs() < 1e-6);
    }
}
