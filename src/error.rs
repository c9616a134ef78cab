use thiserror::Error;

/// failures from the plumbing around a session (settings files, images, pixmaps).
/// gameplay misuse never produces one of these; it is a silent no-op instead.
#[derive(Debug, Error)]
pub enum PaintError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("background decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("background buffer is {got} bytes, expected {expected} for {width}x{height}")]
    BackgroundSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("cannot allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },

    #[error("png encoding failed: {0}")]
    Encode(String),
}

pub type PaintResult<T> = Result<T, PaintError>;
