use serde::{Deserialize, Serialize};

/// pressure reported by devices without a pressure sensor (mouse button down)
pub const DEFAULT_PRESSURE: f32 = 0.5;
pub const MIN_PRESSURE: f32 = 0.3;
pub const MAX_PRESSURE: f32 = 1.0;

/// one sampled pointer position. timestamp is session time in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub pressure: Option<f32>,
    pub timestamp: f64,
}

impl Point {
    pub fn new(x: f32, y: f32, timestamp: f64) -> Self {
        Self { x, y, pressure: None, timestamp }
    }

    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = Some(pressure);
        self
    }

    /// normalized pressure in [0.3, 1.0]
    #[inline]
    pub fn pressure_or_default(&self) -> f32 {
        self.pressure
            .map(|p| p.clamp(MIN_PRESSURE, MAX_PRESSURE))
            .unwrap_or(DEFAULT_PRESSURE)
    }

    #[inline]
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// rasterisation algorithm used for a stroke
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushKind {
    /// translucent particle cloud (random)
    Spray,
    /// solid polyline with sharp joins (deterministic)
    Marker,
    /// smoothed polyline plus faint texture dabs (partly random)
    Brush,
    /// dots with occasional downward drips (random)
    Drip,
}

/// style chosen by the player when a gesture starts.
/// size and opacity are validated by the caller; nothing here clamps them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: [u8; 3],
    /// brush diameter in pixels
    pub size: f32,
    /// 0..1
    pub opacity: f32,
    pub brush: BrushKind,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: [0, 0, 0],
            size: 12.0,
            opacity: 1.0,
            brush: BrushKind::Spray,
        }
    }
}

pub type StrokeId = u64;

/// one continuous paint gesture. points are append-only while the stroke is open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: [u8; 3],
    pub size: f32,
    pub opacity: f32,
    pub brush: BrushKind,
    pub created_at: f64,
}

impl Stroke {
    pub fn new(id: StrokeId, first: Point, style: StrokeStyle) -> Self {
        Self {
            id,
            points: vec![first],
            color: style.color,
            size: style.size,
            opacity: style.opacity,
            brush: style.brush,
            created_at: first.timestamp,
        }
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.color,
            size: self.size,
            opacity: self.opacity,
            brush: self.brush,
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// strokes with fewer than 2 points never paint anything
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.points.len() >= 2
    }

    /// total polyline length in pixels
    pub fn length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }

    /// axis-aligned bounds padded by half the brush size, (x_min, y_min, x_max, y_max).
    /// None for an empty stroke.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.points.first()?;
        let mut min_x = first.x;
        let mut min_y = first.y;
        let mut max_x = first.x;
        let mut max_y = first.y;
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let pad = self.size * 0.5;
        Some((min_x - pad, min_y - pad, max_x + pad, max_y + pad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_defaults_and_clamps() {
        let p = Point::new(1.0, 2.0, 0.0);
        assert_eq!(p.pressure_or_default(), DEFAULT_PRESSURE);
        assert_eq!(p.with_pressure(0.1).pressure_or_default(), MIN_PRESSURE);
        assert_eq!(p.with_pressure(2.0).pressure_or_default(), MAX_PRESSURE);
        assert_eq!(p.with_pressure(0.7).pressure_or_default(), 0.7);
    }

    #[test]
    fn test_stroke_visibility_and_length() {
        let mut s = Stroke::new(1, Point::new(0.0, 0.0, 0.5), StrokeStyle::default());
        assert!(!s.is_visible());
        assert_eq!(s.created_at, 0.5);
        s.push(Point::new(3.0, 4.0, 0.6));
        assert!(s.is_visible());
        assert!((s.length() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_include_brush_radius() {
        let style = StrokeStyle { size: 10.0, ..StrokeStyle::default() };
        let mut s = Stroke::new(1, Point::new(10.0, 20.0, 0.0), style);
        s.push(Point::new(30.0, 5.0, 0.1));
        assert_eq!(s.bounds(), Some((5.0, 0.0, 35.0, 25.0)));
    }
}
