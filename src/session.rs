//─────────────────────────────────────────────────────────────────────────────
// painting session: owns the canvas, stealth, risk and pursuit subsystems and
// drives them from one session clock
//─────────────────────────────────────────────────────────────────────────────

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;
use std::time::Duration;
use tiny_skia as sk;

use crate::background::{composite_png, BackgroundSurface};
use crate::canvas::Canvas;
use crate::clock::{Fired, SessionClock, TimerId, TimerKind};
use crate::error::PaintResult;
use crate::metrics::{apply_caught_penalty, CanvasMetrics};
use crate::pursuit::{ArrestOutcome, PursuitMachine, PursuitState, TapOutcome, Target, TargetId};
use crate::risk::{EventScheduler, RiskEvent, RiskEventId, RiskEventSet};
use crate::settings::{CanvasPack, Difficulty, DifficultyPreset, GameSettings};
use crate::stealth::{current_local_hour, LookAround, StealthSimulator};
use crate::stroke::{Point, StrokeId, StrokeStyle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SuspendReason {
    PursuitActive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// player finished the piece
    Finished,
    /// arrest threshold reached
    Lockout,
    /// player walked away mid-session
    Abandoned,
}

/// the one flag every subsystem consults
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Painting,
    Suspended(SuspendReason),
    Ended(EndReason),
}

impl SessionState {
    pub const PURSUIT: SessionState = SessionState::Suspended(SuspendReason::PursuitActive);

    #[inline]
    pub fn allows_painting(&self) -> bool {
        matches!(self, SessionState::Painting)
    }

    #[inline]
    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended(_))
    }
}

/// handed over by the spot-selection collaborator
#[derive(Clone, Debug)]
pub struct SessionInit {
    /// 0..1, multiplies stealth drain
    pub location_risk_factor: f32,
    pub difficulty: Difficulty,
    pub background: BackgroundSurface,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// local hour for the time-of-day factor
    pub local_hour: u32,
    /// arrests already on the player's record
    pub prior_arrests: u32,
    /// None draws a seed from the OS
    pub seed: Option<u64>,
}

impl SessionInit {
    pub fn new(location_risk_factor: f32, difficulty: Difficulty) -> Self {
        Self {
            location_risk_factor,
            difficulty,
            background: BackgroundSurface::default(),
            canvas_width: 800,
            canvas_height: 600,
            local_hour: current_local_hour(),
            prior_arrests: 0,
            seed: None,
        }
    }

    pub fn with_background(mut self, background: BackgroundSurface) -> Self {
        self.background = background;
        self
    }

    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    pub fn with_hour(mut self, hour: u32) -> Self {
        self.local_hour = hour;
        self
    }

    pub fn with_prior_arrests(mut self, arrests: u32) -> Self {
        self.prior_arrests = arrests;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// for the player-state collaborator (money and jail)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ArrestReport {
    pub fine_amount: u32,
    pub arrest_count: u32,
    pub hard_lockout: bool,
    /// jail time to record; only set on a hard lockout
    pub lockout_hours: Option<u32>,
}

/// for the persistence/reward collaborator
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionResult {
    /// 0..1, caught penalty already applied
    pub quality_score: f32,
    /// background + strokes as PNG
    #[serde(skip)]
    pub rendered_png: Vec<u8>,
    pub was_caught: bool,
    pub reason: EndReason,
    pub metrics: CanvasMetrics,
}

/// outbox read by the host after each call (see `drain_events`)
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Depleted,
    RiskEventSpawned(RiskEvent),
    RiskEventExpired(RiskEvent),
    /// scared off by a look-around
    RiskEventCancelled(RiskEvent),
    PursuitStarted { required_taps: u32, time_limit_secs: f32, targets: Vec<Target> },
    PursuitEscaped { stealth: f32 },
    Arrested(ArrestReport),
    Completed(SessionResult),
}

/// read-only view for UI polling
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub stealth: f32,
    pub look_arounds_left: u32,
    pub look_around_cooldown_secs: f32,
    pub risk_multiplier: f32,
    pub active_events: Vec<RiskEvent>,
    /// session time the soonest active event runs out
    pub next_event_expiry_secs: Option<f64>,
    pub pursuit_state: PursuitState,
    pub pursuit_remaining_secs: Option<f32>,
    pub targets: Vec<Target>,
    pub arrest_count: u32,
    pub elapsed_secs: f64,
}

/// One painting attempt at one spot.
///
/// Single-threaded and time-driven: the host calls `advance` from its frame loop and
/// forwards input; all timers live on the session's own clock and are torn down
/// when the session ends or is dropped.
pub struct PaintSession {
    state: SessionState,
    settings: GameSettings,
    preset: DifficultyPreset,
    rng: Pcg32,
    clock: SessionClock,
    decay_timer: TimerId,
    spawn_timer: TimerId,
    pursuit_timer: Option<TimerId>,
    cooldown_timer: Option<TimerId>,
    canvas: Canvas,
    stealth: StealthSimulator,
    risk: RiskEventSet,
    scheduler: EventScheduler,
    pursuit: PursuitMachine,
    background: sk::Pixmap,
    events: Vec<SessionEvent>,
}

impl PaintSession {
    pub fn new(init: SessionInit, settings: GameSettings) -> PaintResult<Self> {
        settings.validate()?;

        let location = if init.location_risk_factor.is_finite() {
            init.location_risk_factor
        } else {
            1.0
        };
        let location_risk_factor = location.clamp(0.0, 1.0);
        if location_risk_factor != init.location_risk_factor {
            log::warn!(
                "location risk factor {} outside [0, 1]; using {}",
                init.location_risk_factor,
                location_risk_factor
            );
        }

        let canvas = Canvas::new(init.canvas_width, init.canvas_height, CanvasPack::from(&settings))?;
        let background = match init.background.to_pixmap(init.canvas_width, init.canvas_height) {
            Ok(pix) => pix,
            Err(e) => {
                log::warn!("background unusable ({}); falling back to a plain wall", e);
                BackgroundSurface::default().to_pixmap(init.canvas_width, init.canvas_height)?
            }
        };

        let rng = match init.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_os_rng(),
        };

        let preset = *settings.preset(init.difficulty);
        let stealth = StealthSimulator::new(&preset, &settings.stealth, init.local_hour, location_risk_factor);
        let scheduler = EventScheduler::new(&settings.risk);
        let pursuit = PursuitMachine::new(
            settings.pursuit,
            init.canvas_width as f32,
            init.canvas_height as f32,
            init.prior_arrests,
        );

        let mut clock = SessionClock::new();
        let decay_timer = clock.every(TimerKind::StealthDecay, Duration::from_millis(settings.stealth.tick_ms));
        let spawn_timer = clock.every(TimerKind::EventSpawn, secs(preset.spawn_interval_secs));
        clock.start();

        log::info!(
            "session started: {:?}, location risk {:.2}, hour {} (time-of-day x{:.2}), {} look-arounds",
            init.difficulty,
            location_risk_factor,
            init.local_hour % 24,
            stealth.time_of_day_factor(),
            preset.look_arounds
        );

        Ok(Self {
            state: SessionState::Painting,
            settings,
            preset,
            rng,
            clock,
            decay_timer,
            spawn_timer,
            pursuit_timer: None,
            cooldown_timer: None,
            canvas,
            stealth,
            risk: RiskEventSet::new(),
            scheduler,
            pursuit,
            background,
            events: Vec::new(),
        })
    }

    pub fn with_defaults(init: SessionInit) -> PaintResult<Self> {
        Self::new(init, GameSettings::default())
    }

    //─────────────────────────────────────────────────────────────────────
    // time
    //─────────────────────────────────────────────────────────────────────

    /// Move session time forward, handling every due timer one at a time.
    pub fn advance(&mut self, dt: Duration) {
        profiling::scope!("PaintSession::advance");
        if self.state.is_ended() {
            return;
        }
        let target = self.clock.now() + dt;
        while let Some(fired) = self.clock.poll_due(target) {
            self.dispatch(fired);
            if self.state.is_ended() {
                return;
            }
        }
        self.clock.settle(target);
    }

    pub fn advance_secs(&mut self, secs_f32: f32) {
        self.advance(secs(secs_f32));
    }

    fn dispatch(&mut self, fired: Fired) {
        match fired.kind {
            TimerKind::StealthDecay => self.on_decay_tick(),
            TimerKind::EventSpawn => self.on_spawn_roll(),
            TimerKind::EventExpiry(id) => self.on_event_expiry(id),
            TimerKind::PursuitDeadline => self.on_pursuit_deadline(),
            TimerKind::LookAroundCooldown => {
                self.cooldown_timer = None;
                self.stealth.end_cooldown();
                log::trace!("look-around cooldown over");
            }
        }
    }

    fn on_decay_tick(&mut self) {
        if !self.state.allows_painting() {
            return;
        }
        let dt = self.settings.stealth.tick_ms as f32 / 1000.0;
        if self.stealth.tick(dt, self.risk.combined_multiplier()) {
            self.on_depleted();
        }
    }

    /// stealth hit zero: suspend painting and the periodic timers in the same step,
    /// then open the pursuit challenge
    fn on_depleted(&mut self) {
        self.state = SessionState::PURSUIT;
        self.clock.pause(self.decay_timer);
        self.clock.pause(self.spawn_timer);
        self.events.push(SessionEvent::Depleted);

        let (taps, limit) = (self.preset.required_taps, self.preset.time_limit_secs);
        self.pursuit.start(&mut self.rng, taps, limit);
        self.pursuit_timer = Some(self.clock.once(TimerKind::PursuitDeadline, secs(limit)));

        log::info!("stealth depleted at {:.1}s; pursuit: {} taps in {:.1}s", self.elapsed_secs(), taps, limit);
        self.events.push(SessionEvent::PursuitStarted {
            required_taps: self.pursuit.required_taps(),
            time_limit_secs: limit,
            targets: self.pursuit.targets().to_vec(),
        });
    }

    fn on_spawn_roll(&mut self) {
        let now = self.elapsed_secs();
        let Some(event) = self.scheduler.roll(&mut self.rng, now) else {
            return;
        };
        self.clock.once(TimerKind::EventExpiry(event.id), secs(event.duration_secs));
        self.risk.insert(event);
        log::debug!(
            "risk event #{} {:?} x{:.2} for {:.1}s (combined x{:.2})",
            event.id,
            event.kind,
            event.risk_multiplier,
            event.duration_secs,
            self.risk.combined_multiplier()
        );
        self.events.push(SessionEvent::RiskEventSpawned(event));
    }

    fn on_event_expiry(&mut self, id: RiskEventId) {
        if let Some(event) = self.risk.remove(id) {
            log::debug!("risk event #{} {:?} expired", event.id, event.kind);
            self.events.push(SessionEvent::RiskEventExpired(event));
        }
    }

    fn on_pursuit_deadline(&mut self) {
        self.pursuit_timer = None;
        if let Some(outcome) = self.pursuit.expire() {
            self.on_arrest(outcome);
        }
    }

    fn on_arrest(&mut self, outcome: ArrestOutcome) {
        let report = ArrestReport {
            fine_amount: outcome.fine_amount,
            arrest_count: outcome.arrest_count,
            hard_lockout: outcome.hard_lockout,
            lockout_hours: outcome.hard_lockout.then_some(self.settings.pursuit.lockout_hours),
        };
        log::info!(
            "caught: arrest #{} (fine {}, lockout {})",
            report.arrest_count,
            report.fine_amount,
            report.hard_lockout
        );
        self.events.push(SessionEvent::Arrested(report));

        if outcome.hard_lockout {
            self.end(EndReason::Lockout);
        } else {
            self.stealth.restore_to(self.settings.pursuit.partial_restore);
            self.resume_painting();
        }
    }

    /// only after the escape/arrest event is queued; the pursuit goes back to idle
    fn resume_painting(&mut self) {
        self.pursuit.reset();
        self.state = SessionState::Painting;
        self.clock.resume(self.decay_timer);
        self.clock.resume(self.spawn_timer);
    }

    //─────────────────────────────────────────────────────────────────────
    // player input
    //─────────────────────────────────────────────────────────────────────

    pub fn begin_stroke(&mut self, point: Point, style: StrokeStyle) -> Option<StrokeId> {
        self.canvas.begin_stroke(&self.state, point, style)
    }

    pub fn extend_stroke(&mut self, point: Point) -> bool {
        self.canvas.extend_stroke(&self.state, point)
    }

    pub fn end_stroke(&mut self) -> Option<StrokeId> {
        if self.state.is_ended() {
            return None;
        }
        self.canvas.end_stroke()
    }

    pub fn undo(&mut self) -> Option<StrokeId> {
        if self.state.is_ended() {
            return None;
        }
        self.canvas.undo()
    }

    pub fn redo(&mut self) -> Option<StrokeId> {
        if self.state.is_ended() {
            return None;
        }
        self.canvas.redo()
    }

    /// Restore stealth; only while painting. May also scare off one negative event.
    pub fn look_around(&mut self) -> Option<LookAround> {
        if !self.state.allows_painting() {
            return None;
        }
        let outcome = self.stealth.look_around(&mut self.rng)?;
        let cooldown = secs(self.settings.stealth.look_around_cooldown_secs);
        self.cooldown_timer = Some(self.clock.once(TimerKind::LookAroundCooldown, cooldown));

        if outcome.cancel_negative {
            if let Some(event) = self.risk.remove_random_negative(&mut self.rng) {
                self.clock.cancel_kind(TimerKind::EventExpiry(event.id));
                log::debug!("look-around scared off #{} {:?}", event.id, event.kind);
                self.events.push(SessionEvent::RiskEventCancelled(event));
            }
        }
        log::debug!("look-around: stealth {:.1}, {} left", outcome.stealth, outcome.remaining);
        Some(outcome)
    }

    pub fn tap_target(&mut self, id: TargetId) -> TapOutcome {
        if self.state != SessionState::PURSUIT {
            return TapOutcome::Ignored;
        }
        let outcome = self.pursuit.tap_target(id);
        if outcome == TapOutcome::Escaped {
            if let Some(timer) = self.pursuit_timer.take() {
                self.clock.cancel(timer);
            }
            self.stealth.restore_to(self.settings.pursuit.partial_restore);
            log::info!("escaped pursuit; stealth {:.1}", self.stealth.value());
            self.events.push(SessionEvent::PursuitEscaped {
                stealth: self.stealth.value(),
            });
            self.resume_painting();
        }
        outcome
    }

    /// End cleanly and hand the piece over. None if already ended.
    pub fn finish(&mut self) -> Option<SessionResult> {
        if self.state.is_ended() {
            return None;
        }
        Some(self.end(EndReason::Finished))
    }

    /// End as interrupted; the caught penalty applies. None if already ended.
    pub fn abandon(&mut self) -> Option<SessionResult> {
        if self.state.is_ended() {
            return None;
        }
        Some(self.end(EndReason::Abandoned))
    }

    fn end(&mut self, reason: EndReason) -> SessionResult {
        profiling::scope!("PaintSession::end");
        let cancelled = self.clock.cancel_all();
        self.clock.stop();
        self.pursuit_timer = None;
        self.cooldown_timer = None;
        self.canvas.end_stroke();
        self.state = SessionState::Ended(reason);

        let metrics = self.canvas.compute_metrics(&mut self.rng);
        let penalized = reason != EndReason::Finished;
        let quality_score = if penalized {
            apply_caught_penalty(metrics.quality_score, &self.settings.quality)
        } else {
            metrics.quality_score
        };
        let rendered_png = match composite_png(&self.background, self.canvas.layer()) {
            Ok(png) => png,
            Err(e) => {
                log::warn!("could not encode the finished piece: {}", e);
                Vec::new()
            }
        };

        let result = SessionResult {
            quality_score,
            rendered_png,
            was_caught: reason == EndReason::Lockout,
            reason,
            metrics,
        };
        log::info!(
            "session ended ({:?}) after {:.1}s: quality {:.3}, coverage {:.1}%, {} timers cancelled",
            reason,
            self.elapsed_secs(),
            quality_score,
            metrics.coverage_percent,
            cancelled
        );
        self.events.push(SessionEvent::Completed(result.clone()));
        result
    }

    //─────────────────────────────────────────────────────────────────────
    // queries
    //─────────────────────────────────────────────────────────────────────

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// live metrics preview
    pub fn compute_metrics(&mut self) -> CanvasMetrics {
        self.canvas.compute_metrics(&mut self.rng)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            stealth: self.stealth.value(),
            look_arounds_left: self.stealth.look_arounds_left(),
            look_around_cooldown_secs: self.remaining_secs(self.cooldown_timer).unwrap_or(0.0),
            risk_multiplier: self.risk.combined_multiplier(),
            active_events: self.risk.active().to_vec(),
            next_event_expiry_secs: self.risk.active().iter().map(RiskEvent::expires_at).reduce(f64::min),
            pursuit_state: self.pursuit.state(),
            pursuit_remaining_secs: self.remaining_secs(self.pursuit_timer),
            targets: self.pursuit.targets().to_vec(),
            arrest_count: self.pursuit.arrest_count(),
            elapsed_secs: self.elapsed_secs(),
        }
    }

    fn remaining_secs(&self, timer: Option<TimerId>) -> Option<f32> {
        timer.and_then(|t| self.clock.remaining(t)).map(|d| d.as_secs_f32())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stealth(&self) -> f32 {
        self.stealth.value()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn pursuit(&self) -> &PursuitMachine {
        &self.pursuit
    }

    pub fn active_events(&self) -> &[RiskEvent] {
        self.risk.active()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.clock.now().as_secs_f64()
    }

    pub fn pending_timers(&self) -> usize {
        self.clock.pending()
    }
}

impl Drop for PaintSession {
    fn drop(&mut self) {
        let n = self.clock.cancel_all();
        if n > 0 {
            log::debug!("session dropped with {} live timers; cancelled", n);
        }
    }
}

/// non-negative seconds to a Duration (negative or NaN becomes zero)
fn secs(s: f32) -> Duration {
    Duration::try_from_secs_f32(s.max(0.0)).unwrap_or(Duration::ZERO)
}
