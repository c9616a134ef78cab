use rand::Rng;
use tiny_skia as sk;

use crate::error::{PaintError, PaintResult};
use crate::settings::BrushSettings;
use crate::stroke::{BrushKind, Stroke};

/// allocate a transparent pixmap
pub fn new_pixmap(width: u32, height: u32) -> PaintResult<sk::Pixmap> {
    sk::Pixmap::new(width, height).ok_or(PaintError::Pixmap { width, height })
}

/// rasterises strokes with the brush algorithms. randomised brushes draw from the
/// rng passed in, so callers decide between seeded repeatability and fresh output.
#[derive(Clone, Copy, Debug)]
pub struct StrokeRenderer {
    pub brush: BrushSettings,
}

impl StrokeRenderer {
    pub fn new(brush: BrushSettings) -> Self {
        Self { brush }
    }

    /// draw one stroke. strokes with 0 or 1 points draw nothing.
    pub fn render<R: Rng + ?Sized>(&self, pix: &mut sk::Pixmap, stroke: &Stroke, rng: &mut R) {
        profiling::scope!("StrokeRenderer::render");
        if !stroke.is_visible() {
            return;
        }
        match stroke.brush {
            BrushKind::Spray => self.draw_spray(pix, stroke, rng),
            BrushKind::Marker => draw_marker(pix, stroke),
            BrushKind::Brush => self.draw_brush(pix, stroke, rng),
            BrushKind::Drip => self.draw_drip(pix, stroke, rng),
        }
    }

    /// draw strokes in order, oldest first
    pub fn render_all<'a, R, I>(&self, pix: &mut sk::Pixmap, strokes: I, rng: &mut R)
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'a Stroke>,
    {
        profiling::scope!("StrokeRenderer::render_all");
        for stroke in strokes {
            self.render(pix, stroke, rng);
        }
    }

    /// render strokes onto a fresh transparent layer (no background)
    pub fn render_layer<'a, R, I>(&self, width: u32, height: u32, strokes: I, rng: &mut R) -> PaintResult<sk::Pixmap>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'a Stroke>,
    {
        let mut pix = new_pixmap(width, height)?;
        self.render_all(&mut pix, strokes, rng);
        Ok(pix)
    }

    // interpolated dabs along each segment, each a gaussian cloud of fading particles
    fn draw_spray<R: Rng + ?Sized>(&self, pix: &mut sk::Pixmap, stroke: &Stroke, rng: &mut R) {
        profiling::scope!("draw_spray");
        let b = &self.brush;
        // density widens the cloud as well as thickening it
        let spread = (stroke.size * 0.5 * b.spray_density.max(0.0)).max(0.5);
        let spacing = (stroke.size * b.spray_spacing).max(1.0);
        let particle_r = (stroke.size * b.particle_radius).max(0.5);

        for pair in stroke.points.windows(2) {
            let (a, z) = (&pair[0], &pair[1]);
            let steps = (a.distance_to(z) / spacing).ceil().max(1.0) as u32;
            for s in 0..steps {
                let t = s as f32 / steps as f32;
                let x = a.x + (z.x - a.x) * t;
                let y = a.y + (z.y - a.y) * t;
                let pressure = a.pressure_or_default() + (z.pressure_or_default() - a.pressure_or_default()) * t;
                self.spray_dab(pix, stroke, x, y, pressure, spread, particle_r, rng);
            }
        }
        if let Some(last) = stroke.points.last() {
            self.spray_dab(pix, stroke, last.x, last.y, last.pressure_or_default(), spread, particle_r, rng);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spray_dab<R: Rng + ?Sized>(
        &self,
        pix: &mut sk::Pixmap,
        stroke: &Stroke,
        x: f32,
        y: f32,
        pressure: f32,
        spread: f32,
        particle_r: f32,
        rng: &mut R,
    ) {
        let b = &self.brush;
        let count = (b.spray_particles as f32 * b.spray_density * pressure).round().max(1.0) as u32;
        let [r, g, bl] = stroke.color;
        let mut paint = sk::Paint::default();
        paint.anti_alias = true;

        for _ in 0..count {
            let (dx, dy) = center_biased_offset(rng, spread);
            let dist = (dx * dx + dy * dy).sqrt();
            let falloff = (1.0 - dist / spread).clamp(0.0, 1.0);
            let alpha = stroke.opacity * b.spray_flow * falloff;
            if alpha <= 0.0 {
                continue;
            }
            paint.set_color_rgba8(r, g, bl, alpha_u8(alpha));
            fill_circle(pix, x + dx, y + dy, particle_r, &paint);
        }
    }

    // quadratic-smoothed polyline, then faint random dabs on every other point
    fn draw_brush<R: Rng + ?Sized>(&self, pix: &mut sk::Pixmap, stroke: &Stroke, rng: &mut R) {
        profiling::scope!("draw_brush");
        let pts = &stroke.points;
        let mut pb = sk::PathBuilder::new();
        pb.move_to(pts[0].x, pts[0].y);
        if pts.len() == 2 {
            pb.line_to(pts[1].x, pts[1].y);
        } else {
            for i in 1..pts.len() - 1 {
                let mid_x = (pts[i].x + pts[i + 1].x) * 0.5;
                let mid_y = (pts[i].y + pts[i + 1].y) * 0.5;
                pb.quad_to(pts[i].x, pts[i].y, mid_x, mid_y);
            }
            let last = pts[pts.len() - 1];
            pb.line_to(last.x, last.y);
        }

        let [r, g, b] = stroke.color;
        let mut paint = sk::Paint::default();
        paint.anti_alias = true;
        paint.set_color_rgba8(r, g, b, alpha_u8(stroke.opacity));

        if let Some(path) = pb.finish() {
            let line = sk::Stroke {
                width: stroke.size,
                line_cap: sk::LineCap::Round,
                line_join: sk::LineJoin::Round,
                ..sk::Stroke::default()
            };
            pix.stroke_path(&path, &paint, &line, sk::Transform::identity(), None);
        }

        let weight = self.brush.brush_texture_weight;
        for p in pts.iter().step_by(2) {
            let radius = stroke.size * 0.5 * (0.6 + 0.4 * rng.random::<f32>());
            let jx = (rng.random::<f32>() - 0.5) * stroke.size * 0.5;
            let jy = (rng.random::<f32>() - 0.5) * stroke.size * 0.5;
            let alpha = stroke.opacity * weight * (0.5 + 0.5 * rng.random::<f32>());
            paint.set_color_rgba8(r, g, b, alpha_u8(alpha));
            fill_circle(pix, p.x + jx, p.y + jy, radius, &paint);
        }
    }

    // solid dot per point; some points leak a downward triangle
    fn draw_drip<R: Rng + ?Sized>(&self, pix: &mut sk::Pixmap, stroke: &Stroke, rng: &mut R) {
        profiling::scope!("draw_drip");
        let b = &self.brush;
        let [r, g, bl] = stroke.color;
        let mut paint = sk::Paint::default();
        paint.anti_alias = true;
        paint.set_color_rgba8(r, g, bl, alpha_u8(stroke.opacity));

        let radius = (stroke.size * 0.5).max(0.5);
        for p in &stroke.points {
            fill_circle(pix, p.x, p.y, radius, &paint);

            if rng.random::<f32>() < b.drip_chance {
                let extra = (b.drip_max_length - 1.0).max(0.0);
                let length = stroke.size * (1.0 + rng.random::<f32>() * extra);
                let half = radius * 0.6;
                let mut pb = sk::PathBuilder::new();
                pb.move_to(p.x - half, p.y);
                pb.line_to(p.x + half, p.y);
                pb.line_to(p.x, p.y + length);
                pb.close();
                if let Some(path) = pb.finish() {
                    pix.fill_path(&path, &paint, sk::FillRule::Winding, sk::Transform::identity(), None);
                }
            }
        }
    }
}

// single polyline, sharp joins, no randomness
fn draw_marker(pix: &mut sk::Pixmap, stroke: &Stroke) {
    profiling::scope!("draw_marker");
    let pts = &stroke.points;
    let mut pb = sk::PathBuilder::new();
    pb.move_to(pts[0].x, pts[0].y);
    for p in &pts[1..] {
        pb.line_to(p.x, p.y);
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let [r, g, b] = stroke.color;
    let mut paint = sk::Paint::default();
    paint.anti_alias = true;
    paint.set_color_rgba8(r, g, b, alpha_u8(stroke.opacity));

    let line = sk::Stroke {
        width: stroke.size,
        line_cap: sk::LineCap::Butt,
        line_join: sk::LineJoin::Miter,
        ..sk::Stroke::default()
    };
    pix.stroke_path(&path, &paint, &line, sk::Transform::identity(), None);
}

fn fill_circle(pix: &mut sk::Pixmap, cx: f32, cy: f32, radius: f32, paint: &sk::Paint) {
    if let Some(path) = sk::PathBuilder::from_circle(cx, cy, radius) {
        pix.fill_path(&path, paint, sk::FillRule::Winding, sk::Transform::identity(), None);
    }
}

#[inline]
fn alpha_u8(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// standard normal pair via Box-Muller
pub fn box_muller<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
    // u1 in (0, 1] so ln() stays finite
    let u1 = 1.0 - rng.random::<f32>();
    let u2 = rng.random::<f32>();
    let mag = (-2.0 * u1.ln()).sqrt();
    let theta = std::f32::consts::TAU * u2;
    (mag * theta.cos(), mag * theta.sin())
}

/// offset inside a disc of radius `spread`, gaussian-weighted toward the center.
/// samples outside the disc are redrawn a few times, then pulled back onto the rim.
pub fn center_biased_offset<R: Rng + ?Sized>(rng: &mut R, spread: f32) -> (f32, f32) {
    let sigma = spread * 0.5;
    let mut last = (0.0, 0.0);
    for _ in 0..4 {
        let (nx, ny) = box_muller(rng);
        let (dx, dy) = (nx * sigma, ny * sigma);
        if dx * dx + dy * dy <= spread * spread {
            return (dx, dy);
        }
        last = (dx, dy);
    }
    let len = (last.0 * last.0 + last.1 * last.1).sqrt().max(f32::EPSILON);
    (last.0 / len * spread, last.1 / len * spread)
}

/// premultiply straight RGBA bytes (tiny-skia stores premultiplied)
#[inline(always)]
pub fn premultiply(p: &[u8]) -> Vec<u8> {
    profiling::scope!("premultiply");

    let mut out = vec![0u8; p.len()];
    for (src, dst) in p.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        let a = src[3] as u16;
        // (x * a + 127) / 255 is a fast rounded divide-by-255
        dst[0] = ((src[0] as u16 * a + 127) / 255) as u8;
        dst[1] = ((src[1] as u16 * a + 127) / 255) as u8;
        dst[2] = ((src[2] as u16 * a + 127) / 255) as u8;
        dst[3] = a as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{Point, StrokeStyle};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn stroke(kind: BrushKind, pts: &[(f32, f32)]) -> Stroke {
        let style = StrokeStyle {
            color: [200, 30, 30],
            size: 10.0,
            opacity: 1.0,
            brush: kind,
        };
        let mut s = Stroke::new(1, Point::new(pts[0].0, pts[0].1, 0.0), style);
        for &(x, y) in &pts[1..] {
            s.push(Point::new(x, y, 0.0));
        }
        s
    }

    fn painted(pix: &sk::Pixmap) -> usize {
        pix.pixels().iter().filter(|p| p.alpha() > 0).count()
    }

    #[test]
    fn test_short_strokes_draw_nothing() {
        let renderer = StrokeRenderer::new(BrushSettings::default());
        let mut rng = Pcg32::seed_from_u64(1);
        for kind in [BrushKind::Spray, BrushKind::Marker, BrushKind::Brush, BrushKind::Drip] {
            let mut pix = new_pixmap(64, 64).unwrap();
            let mut s = stroke(kind, &[(32.0, 32.0)]);
            renderer.render(&mut pix, &s, &mut rng);
            assert_eq!(painted(&pix), 0, "{kind:?} drew a 1-point stroke");

            s.points.clear();
            renderer.render(&mut pix, &s, &mut rng);
            assert_eq!(painted(&pix), 0, "{kind:?} drew an empty stroke");
        }
    }

    #[test]
    fn test_marker_is_deterministic() {
        let renderer = StrokeRenderer::new(BrushSettings::default());
        let s = stroke(BrushKind::Marker, &[(5.0, 5.0), (50.0, 20.0), (10.0, 55.0)]);
        let a = renderer.render_layer(64, 64, [&s], &mut Pcg32::seed_from_u64(1)).unwrap();
        let b = renderer.render_layer(64, 64, [&s], &mut Pcg32::seed_from_u64(99)).unwrap();
        assert_eq!(a.data(), b.data());
        assert!(painted(&a) > 0);
    }

    #[test]
    fn test_spray_is_statistically_stable() {
        let renderer = StrokeRenderer::new(BrushSettings::default());
        let s = stroke(BrushKind::Spray, &[(10.0, 32.0), (110.0, 32.0)]);
        let counts: Vec<usize> = (0..6)
            .map(|seed| {
                let pix = renderer.render_layer(128, 64, [&s], &mut Pcg32::seed_from_u64(seed)).unwrap();
                painted(&pix)
            })
            .collect();

        // different seeds differ in detail but land in the same band
        let min = *counts.iter().min().unwrap() as f32;
        let max = *counts.iter().max().unwrap() as f32;
        assert!(min > 0.0);
        assert!(max / min < 1.3, "spray coverage too unstable: {counts:?}");

        let a = renderer.render_layer(128, 64, [&s], &mut Pcg32::seed_from_u64(1)).unwrap();
        let b = renderer.render_layer(128, 64, [&s], &mut Pcg32::seed_from_u64(2)).unwrap();
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn test_spray_is_translucent() {
        let renderer = StrokeRenderer::new(BrushSettings::default());
        let s = stroke(BrushKind::Spray, &[(10.0, 32.0), (40.0, 32.0)]);
        let pix = renderer.render_layer(64, 64, [&s], &mut Pcg32::seed_from_u64(3)).unwrap();
        let partial = pix.pixels().iter().filter(|p| p.alpha() > 0 && p.alpha() < 255).count();
        assert!(partial > 0);
    }

    #[test]
    fn test_spray_stays_near_the_path() {
        let renderer = StrokeRenderer::new(BrushSettings::default());
        let s = stroke(BrushKind::Spray, &[(20.0, 32.0), (100.0, 32.0)]);
        let pix = renderer.render_layer(128, 64, [&s], &mut Pcg32::seed_from_u64(5)).unwrap();
        // spread is size/2 plus particle radius; nothing lands far off the line
        for y in 0..64u32 {
            for x in 0..128u32 {
                if (y as i32 - 32).abs() > 10 {
                    assert_eq!(pix.pixel(x, y).unwrap().alpha(), 0);
                }
            }
        }
    }

    #[test]
    fn test_spray_density_widens_band() {
        // furthest painted row from the stroke line at y = 64, over a few seeds
        let reach = |density: f32| {
            let renderer = StrokeRenderer::new(BrushSettings { spray_density: density, ..BrushSettings::default() });
            let mut s = stroke(BrushKind::Spray, &[(20.0, 64.0), (100.0, 64.0)]);
            s.size = 20.0;
            (0..5u64)
                .map(|seed| {
                    let pix = renderer.render_layer(128, 128, [&s], &mut Pcg32::seed_from_u64(seed)).unwrap();
                    let mut far = 0i32;
                    for y in 0..128u32 {
                        for x in 0..128u32 {
                            if pix.pixel(x, y).unwrap().alpha() > 0 {
                                far = far.max((y as i32 - 64).abs());
                            }
                        }
                    }
                    far
                })
                .max()
                .unwrap()
        };
        let thin = reach(0.5);
        let wide = reach(3.0);
        assert!(wide > thin + 3, "density 0.5 reach {thin}, density 3.0 reach {wide}");
    }

    #[test]
    fn test_brush_and_drip_paint() {
        let renderer = StrokeRenderer::new(BrushSettings::default());
        let mut rng = Pcg32::seed_from_u64(11);
        for kind in [BrushKind::Brush, BrushKind::Drip] {
            let s = stroke(kind, &[(10.0, 10.0), (30.0, 20.0), (50.0, 10.0), (60.0, 40.0)]);
            let pix = renderer.render_layer(64, 64, [&s], &mut rng).unwrap();
            assert!(painted(&pix) > 50, "{kind:?} painted too little");
        }
    }

    #[test]
    fn test_drip_chance_extends_downward() {
        let mut brush = BrushSettings::default();
        brush.drip_chance = 1.0;
        let always = StrokeRenderer::new(brush);
        brush.drip_chance = 0.0;
        let never = StrokeRenderer::new(brush);

        let s = stroke(BrushKind::Drip, &[(16.0, 10.0), (48.0, 10.0)]);
        let with = always.render_layer(64, 64, [&s], &mut Pcg32::seed_from_u64(4)).unwrap();
        let without = never.render_layer(64, 64, [&s], &mut Pcg32::seed_from_u64(4)).unwrap();

        let below = |pix: &sk::Pixmap| (17..64u32).map(|y| pix.pixel(16, y).unwrap().alpha() as u32).sum::<u32>();
        assert!(below(&with) > 0);
        assert_eq!(below(&without), 0);
    }

    #[test]
    fn test_center_biased_offset_within_spread() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut inner = 0;
        for _ in 0..2000 {
            let (dx, dy) = center_biased_offset(&mut rng, 10.0);
            let d = (dx * dx + dy * dy).sqrt();
            assert!(d <= 10.0 + 1e-3);
            if d < 5.0 {
                inner += 1;
            }
        }
        // inner half-radius disc is a quarter of the area; uniform sampling would put ~500 there
        assert!(inner > 700, "offsets not center-biased: {inner}");
    }

    #[test]
    fn test_premultiply() {
        let px = premultiply(&[255, 128, 0, 128]);
        assert_eq!(px, vec![128, 64, 0, 128]);
    }
}
