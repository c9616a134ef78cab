use rand::Rng;
use serde::Serialize;

use crate::settings::PursuitSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PursuitState {
    Idle,
    Active,
    Success,
    Failure,
}

pub type TargetId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Target {
    pub id: TargetId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub tapped: bool,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    /// wrong target, or no challenge running
    Ignored,
    /// counted; the next target is now active
    Advanced { success_count: u32 },
    /// last target tapped before the deadline
    Escaped,
}

/// result of a failed challenge. `fine_amount` is 0 on a hard lockout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ArrestOutcome {
    pub arrest_count: u32,
    pub fine_amount: u32,
    pub hard_lockout: bool,
}

/// Tap-the-target reflex challenge. The deadline timer lives on the session
/// clock; this machine only tracks targets, taps and the arrest record.
#[derive(Clone, Debug)]
pub struct PursuitMachine {
    state: PursuitState,
    settings: PursuitSettings,
    viewport: (f32, f32),
    required_taps: u32,
    time_limit_secs: f32,
    targets: Vec<Target>,
    success_count: u32,
    arrest_count: u32,
}

// placement attempts per target before giving up on spacing
const MAX_PLACEMENT_TRIES: usize = 200;

impl PursuitMachine {
    pub fn new(settings: PursuitSettings, viewport_width: f32, viewport_height: f32, arrest_count: u32) -> Self {
        Self {
            state: PursuitState::Idle,
            settings,
            viewport: (viewport_width, viewport_height),
            required_taps: 0,
            time_limit_secs: 0.0,
            targets: Vec::new(),
            success_count: 0,
            arrest_count,
        }
    }

    pub fn state(&self) -> PursuitState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PursuitState::Active
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn active_target(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.active)
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    pub fn required_taps(&self) -> u32 {
        self.required_taps
    }

    pub fn time_limit_secs(&self) -> f32 {
        self.time_limit_secs
    }

    /// persists across challenges within a session (and is seeded from the player record)
    pub fn arrest_count(&self) -> u32 {
        self.arrest_count
    }

    /// Enter `Active` with fresh targets. Refused while a challenge is already running.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R, required_taps: u32, time_limit_secs: f32) -> bool {
        if self.state == PursuitState::Active {
            return false;
        }
        self.required_taps = required_taps.max(1);
        self.time_limit_secs = time_limit_secs;
        self.success_count = 0;
        self.targets = self.place_targets(rng, self.required_taps as usize);
        if let Some(first) = self.targets.first_mut() {
            first.active = true;
        }
        self.state = PursuitState::Active;
        log::debug!(
            "pursuit started: {} targets in {:.1}s (arrests so far {})",
            self.required_taps,
            time_limit_secs,
            self.arrest_count
        );
        true
    }

    /// Count a tap on the active target; anything else is ignored.
    pub fn tap_target(&mut self, id: TargetId) -> TapOutcome {
        if self.state != PursuitState::Active {
            return TapOutcome::Ignored;
        }
        let Some(idx) = self.targets.iter().position(|t| t.id == id && t.active) else {
            return TapOutcome::Ignored;
        };

        let target = &mut self.targets[idx];
        target.tapped = true;
        target.active = false;
        self.success_count += 1;

        if let Some(next) = self.targets.iter_mut().find(|t| !t.tapped) {
            next.active = true;
        }

        if self.success_count >= self.required_taps {
            self.state = PursuitState::Success;
            TapOutcome::Escaped
        } else {
            TapOutcome::Advanced {
                success_count: self.success_count,
            }
        }
    }

    /// Deadline reached. Only meaningful while `Active`; returns the arrest outcome.
    pub fn expire(&mut self) -> Option<ArrestOutcome> {
        if self.state != PursuitState::Active {
            return None;
        }
        self.state = PursuitState::Failure;
        for t in &mut self.targets {
            t.active = false;
        }
        self.arrest_count += 1;

        let hard_lockout = self.arrest_count >= self.settings.lockout_threshold;
        let fine_amount = if hard_lockout {
            0
        } else {
            self.settings.base_fine.saturating_mul(self.arrest_count)
        };
        Some(ArrestOutcome {
            arrest_count: self.arrest_count,
            fine_amount,
            hard_lockout,
        })
    }

    /// Back to `Idle` once the outcome has been reported. Targets are dropped;
    /// the arrest record stays.
    pub fn reset(&mut self) {
        self.state = PursuitState::Idle;
        self.targets.clear();
        self.success_count = 0;
        self.required_taps = 0;
        self.time_limit_secs = 0.0;
    }

    /// Rejection-sample non-overlapping centers inside the viewport, away from the edges.
    /// A viewport too small for the spacing falls back to the best attempt.
    fn place_targets<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<Target> {
        profiling::scope!("PursuitMachine::place_targets");
        let r = self.settings.target_radius.max(1.0);
        let inset = r + self.settings.edge_margin.max(0.0);
        let (w, h) = self.viewport;
        let min_dist = 2.0 * r + self.settings.min_spacing.max(0.0);

        let mut out: Vec<Target> = Vec::with_capacity(count);
        for i in 0..count {
            let mut best = (sample_axis(rng, w, inset), sample_axis(rng, h, inset));
            let mut best_gap = f32::MIN;
            for _ in 0..MAX_PLACEMENT_TRIES {
                let (x, y) = (sample_axis(rng, w, inset), sample_axis(rng, h, inset));
                let gap = out
                    .iter()
                    .map(|t| ((t.x - x).powi(2) + (t.y - y).powi(2)).sqrt())
                    .fold(f32::MAX, f32::min);
                if gap >= min_dist {
                    best = (x, y);
                    break;
                }
                if gap > best_gap {
                    best_gap = gap;
                    best = (x, y);
                }
            }
            out.push(Target {
                id: i as TargetId + 1,
                x: best.0,
                y: best.1,
                radius: r,
                tapped: false,
                active: false,
            });
        }
        out
    }
}

/// uniform in [inset, len - inset], or the midpoint when that span is empty
fn sample_axis<R: Rng + ?Sized>(rng: &mut R, len: f32, inset: f32) -> f32 {
    let (lo, hi) = (inset, len - inset);
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        len * 0.5
    }
}
