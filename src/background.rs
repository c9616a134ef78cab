use tiny_skia as sk;

use crate::error::{PaintError, PaintResult};
use crate::render::{new_pixmap, premultiply};

/// the wall being painted. opaque to the engine apart from being drawable.
#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundSurface {
    /// straight RGBA
    Solid([u8; 4]),
    /// PNG or JPEG bytes (street imagery capture)
    Encoded(Vec<u8>),
    /// straight (unpremultiplied) RGBA8 rows
    Rgba { width: u32, height: u32, pixels: Vec<u8> },
}

impl Default for BackgroundSurface {
    fn default() -> Self {
        // concrete grey
        BackgroundSurface::Solid([168, 166, 160, 255])
    }
}

impl BackgroundSurface {
    /// Rasterise onto a canvas-sized pixmap, scaling images to fit.
    pub fn to_pixmap(&self, width: u32, height: u32) -> PaintResult<sk::Pixmap> {
        profiling::scope!("BackgroundSurface::to_pixmap");
        let mut out = new_pixmap(width, height)?;
        match self {
            BackgroundSurface::Solid([r, g, b, a]) => {
                out.fill(sk::Color::from_rgba8(*r, *g, *b, *a));
            }
            BackgroundSurface::Encoded(bytes) => {
                let rgba = image::load_from_memory(bytes)?.to_rgba8();
                let (w, h) = rgba.dimensions();
                let src = pixmap_from_straight(w, h, rgba.as_raw())?;
                draw_scaled(&mut out, &src);
            }
            BackgroundSurface::Rgba { width: w, height: h, pixels } => {
                let expected = *w as usize * *h as usize * 4;
                if pixels.len() != expected || expected == 0 {
                    return Err(PaintError::BackgroundSize {
                        width: *w,
                        height: *h,
                        expected,
                        got: pixels.len(),
                    });
                }
                let src = pixmap_from_straight(*w, *h, pixels)?;
                draw_scaled(&mut out, &src);
            }
        }
        Ok(out)
    }
}

fn pixmap_from_straight(width: u32, height: u32, straight: &[u8]) -> PaintResult<sk::Pixmap> {
    let size = sk::IntSize::from_wh(width, height).ok_or(PaintError::Pixmap { width, height })?;
    sk::Pixmap::from_vec(premultiply(straight), size).ok_or(PaintError::Pixmap { width, height })
}

/// stretch `src` over the whole of `dst`
fn draw_scaled(dst: &mut sk::Pixmap, src: &sk::Pixmap) {
    let sx = dst.width() as f32 / src.width() as f32;
    let sy = dst.height() as f32 / src.height() as f32;
    let paint = sk::PixmapPaint {
        quality: sk::FilterQuality::Bilinear,
        ..Default::default()
    };
    dst.draw_pixmap(0, 0, src.as_ref(), &paint, sk::Transform::from_scale(sx, sy), None);
}

/// stroke layer over background, encoded as PNG
pub fn composite_png(background: &sk::Pixmap, layer: &sk::Pixmap) -> PaintResult<Vec<u8>> {
    profiling::scope!("composite_png");
    let mut out = background.clone();
    out.draw_pixmap(0, 0, layer.as_ref(), &sk::PixmapPaint::default(), sk::Transform::identity(), None);
    out.encode_png().map_err(|e| PaintError::Encode(e.to_string()))
}
