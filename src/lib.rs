// Painting session engine
// Each module covers one subsystem; `session` wires them to a single clock

pub mod background;
pub mod canvas;
pub mod clock;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pursuit;
pub mod render;
pub mod risk;
pub mod session;
pub mod settings;
pub mod stealth;
pub mod stroke;

pub use background::BackgroundSurface;
pub use canvas::Canvas;
pub use error::{PaintError, PaintResult};
pub use logging::{init_logging, LoggingConfig};
pub use metrics::CanvasMetrics;
pub use pursuit::{PursuitState, TapOutcome, Target, TargetId};
pub use risk::{RiskEvent, RiskEventKind};
pub use session::{
    ArrestReport, EndReason, PaintSession, SessionEvent, SessionInit, SessionResult, SessionSnapshot, SessionState,
    SuspendReason,
};
pub use settings::{Difficulty, GameSettings};
pub use stroke::{BrushKind, Point, Stroke, StrokeId, StrokeStyle};
