use rand::Rng;
use std::collections::HashSet;
use tiny_skia as sk;

use crate::error::PaintResult;
use crate::metrics::{coverage_percent, CanvasMetrics};
use crate::render::{new_pixmap, StrokeRenderer};
use crate::session::SessionState;
use crate::settings::{CanvasPack, CoverageSettings, QualityWeights};
use crate::stroke::{Point, Stroke, StrokeId, StrokeStyle};

/// committed strokes, the open stroke and a linear redo stack.
/// mutated only through begin/extend/end/undo/redo.
pub struct Canvas {
    width: u32,
    height: u32,
    committed: Vec<Stroke>,
    current: Option<Stroke>,
    redo: Vec<Stroke>,
    next_id: StrokeId,
    renderer: StrokeRenderer,
    coverage: CoverageSettings,
    weights: QualityWeights,
    // offscreen stroke layer, reused for every metrics pass
    layer: sk::Pixmap,
    last_metrics: CanvasMetrics,
}

impl Canvas {
    pub fn new(width: u32, height: u32, pack: CanvasPack) -> PaintResult<Self> {
        Ok(Self {
            width,
            height,
            committed: Vec::new(),
            current: None,
            redo: Vec::new(),
            next_id: 1,
            renderer: StrokeRenderer::new(pack.brush),
            coverage: pack.coverage,
            weights: pack.quality,
            layer: new_pixmap(width, height)?,
            last_metrics: CanvasMetrics::default(),
        })
    }

    /// open a new stroke. refused (None) unless the session state allows painting.
    /// an unfinished previous stroke is committed first.
    pub fn begin_stroke(&mut self, state: &SessionState, point: Point, style: StrokeStyle) -> Option<StrokeId> {
        if !state.allows_painting() {
            log::trace!("begin_stroke ignored in state {:?}", state);
            return None;
        }
        if self.current.is_some() {
            self.end_stroke();
        }
        self.clear_redo();

        let id = self.next_id;
        self.next_id += 1;
        self.current = Some(Stroke::new(id, point, style));
        Some(id)
    }

    /// append a point to the open stroke; silently ignored when painting is not allowed
    /// or no stroke is open. returns whether the point was taken.
    pub fn extend_stroke(&mut self, state: &SessionState, point: Point) -> bool {
        if !state.allows_painting() {
            return false;
        }
        match self.current.as_mut() {
            Some(stroke) => {
                stroke.push(point);
                true
            }
            None => false,
        }
    }

    /// seal the open stroke into the committed list
    pub fn end_stroke(&mut self) -> Option<StrokeId> {
        let stroke = self.current.take()?;
        if stroke.points.is_empty() {
            return None;
        }
        let id = stroke.id;
        self.committed.push(stroke);
        self.clear_redo();
        Some(id)
    }

    pub fn undo(&mut self) -> Option<StrokeId> {
        let stroke = self.committed.pop()?;
        let id = stroke.id;
        self.redo.push(stroke);
        Some(id)
    }

    pub fn redo(&mut self) -> Option<StrokeId> {
        let stroke = self.redo.pop()?;
        let id = stroke.id;
        self.committed.push(stroke);
        Some(id)
    }

    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn committed(&self) -> &[Stroke] {
        &self.committed
    }

    pub fn current(&self) -> Option<&Stroke> {
        self.current.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.committed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn stroke_count(&self) -> u32 {
        self.committed.len() as u32
    }

    /// distinct colours across committed strokes
    pub fn color_diversity(&self) -> u32 {
        self.committed
            .iter()
            .map(|s| s.color)
            .collect::<HashSet<_>>()
            .len() as u32
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn last_metrics(&self) -> CanvasMetrics {
        self.last_metrics
    }

    pub fn coverage_percent(&self) -> f32 {
        self.last_metrics.coverage_percent
    }

    pub fn quality_score(&self) -> f32 {
        self.last_metrics.quality_score
    }

    /// stroke layer as of the last render
    pub fn layer(&self) -> &sk::Pixmap {
        &self.layer
    }

    /// re-render committed strokes onto the offscreen layer (transparent background)
    pub fn render_layer<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &sk::Pixmap {
        profiling::scope!("Canvas::render_layer");
        self.layer.fill(sk::Color::TRANSPARENT);
        self.renderer.render_all(&mut self.layer, &self.committed, rng);
        &self.layer
    }

    /// re-render, sample coverage and recompute the quality score
    pub fn compute_metrics<R: Rng + ?Sized>(&mut self, rng: &mut R) -> CanvasMetrics {
        profiling::scope!("Canvas::compute_metrics");
        let cfg = self.coverage;
        let coverage = coverage_percent(self.render_layer(rng), &cfg);
        self.last_metrics = CanvasMetrics::new(coverage, self.color_diversity(), self.stroke_count(), &self.weights);
        log::debug!(
            "canvas metrics: coverage {:.2}% colors {} strokes {} quality {:.3}",
            self.last_metrics.coverage_percent,
            self.last_metrics.color_diversity,
            self.last_metrics.stroke_count,
            self.last_metrics.quality_score
        );
        self.last_metrics
    }
}
