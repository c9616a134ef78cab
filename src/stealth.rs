use chrono::Timelike;
use rand::Rng;

use crate::settings::{DifficultyPreset, StealthSettings};

/// local wall-clock hour (0-23) for the time-of-day factor
pub fn current_local_hour() -> u32 {
    chrono::Local::now().hour()
}

/// what a successful look-around did
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookAround {
    pub stealth: f32,
    pub remaining: u32,
    /// roll won: the caller should scare off one active negative event
    pub cancel_negative: bool,
}

/// Continuously decaying stealth scalar.
///
/// Drain per second is `base * risk multiplier * time-of-day factor * location factor`.
/// The value is clamped to `[0, max]`; hitting 0 reports depletion once, and the
/// latch only re-arms after stealth has been raised above 0 again.
#[derive(Clone, Debug)]
pub struct StealthSimulator {
    value: f32,
    max: f32,
    base_drain_per_sec: f32,
    time_of_day_factor: f32,
    location_risk_factor: f32,
    look_arounds_left: u32,
    look_around_restore: f32,
    cancel_negative_chance: f32,
    cooling_down: bool,
    depleted: bool,
}

impl StealthSimulator {
    pub fn new(preset: &DifficultyPreset, settings: &StealthSettings, hour: u32, location_risk_factor: f32) -> Self {
        Self {
            value: settings.max,
            max: settings.max,
            base_drain_per_sec: preset.base_drain_per_sec,
            time_of_day_factor: settings.time_of_day.factor(hour),
            location_risk_factor,
            look_arounds_left: preset.look_arounds,
            look_around_restore: settings.look_around_restore,
            cancel_negative_chance: settings.cancel_negative_chance.clamp(0.0, 1.0),
            cooling_down: false,
            depleted: false,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn look_arounds_left(&self) -> u32 {
        self.look_arounds_left
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooling_down
    }

    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    pub fn time_of_day_factor(&self) -> f32 {
        self.time_of_day_factor
    }

    /// stealth points per second at the given risk multiplier
    #[inline]
    pub fn drain_rate(&self, risk_multiplier: f32) -> f32 {
        self.base_drain_per_sec * risk_multiplier * self.time_of_day_factor * self.location_risk_factor
    }

    /// Apply `dt_secs` of decay. Returns true on the tick that reaches 0 and on no
    /// other tick until stealth has been restored.
    pub fn tick(&mut self, dt_secs: f32, risk_multiplier: f32) -> bool {
        let drain = self.drain_rate(risk_multiplier) * dt_secs;
        self.set_value(self.value - drain);
        if self.value <= 0.0 && !self.depleted {
            self.depleted = true;
            return true;
        }
        false
    }

    /// Restore stealth if a look-around is available and not cooling down.
    /// Refusal changes nothing. The caller owns the cooldown timer and calls
    /// `end_cooldown` when it fires.
    pub fn look_around<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<LookAround> {
        if self.look_arounds_left == 0 || self.cooling_down {
            return None;
        }
        self.look_arounds_left -= 1;
        self.cooling_down = true;
        self.set_value(self.value + self.look_around_restore);
        let cancel_negative = rng.random_bool(self.cancel_negative_chance as f64);
        Some(LookAround {
            stealth: self.value,
            remaining: self.look_arounds_left,
            cancel_negative,
        })
    }

    pub fn end_cooldown(&mut self) {
        self.cooling_down = false;
    }

    /// set stealth to an absolute value (pursuit escape, paid fine)
    pub fn restore_to(&mut self, value: f32) {
        self.set_value(value);
    }

    fn set_value(&mut self, value: f32) {
        self.value = value.clamp(0.0, self.max);
        if self.value > 0.0 {
            self.depleted = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Difficulty, GameSettings};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    // evening hour -> factor 1.0 with default settings
    const EVENING: u32 = 19;

    fn sim(difficulty: Difficulty, location: f32) -> StealthSimulator {
        let settings = GameSettings::default();
        StealthSimulator::new(settings.preset(difficulty), &settings.stealth, EVENING, location)
    }

    #[test]
    fn test_drain_is_product_of_factors() {
        let s = sim(Difficulty::Medium, 0.5);
        // medium base 1.0/s, evening 1.0, location 0.5, risk 2.0
        assert!((s.drain_rate(2.0) - 1.0).abs() < 1e-6);

        let day = StealthSimulator::new(
            GameSettings::default().preset(Difficulty::Medium),
            &StealthSettings::default(),
            12,
            1.0,
        );
        assert!((day.drain_rate(1.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_value_stays_clamped() {
        let mut s = sim(Difficulty::Extreme, 1.0);
        for _ in 0..10_000 {
            s.tick(0.1, 5.0);
            assert!((0.0..=100.0).contains(&s.value()));
        }
        assert_eq!(s.value(), 0.0);

        // negative multiplier (misconfigured) cannot push past max
        s.restore_to(99.0);
        s.tick(1.0, -100.0);
        assert_eq!(s.value(), 100.0);
    }

    #[test]
    fn test_depletion_fires_once_per_interval() {
        let mut s = sim(Difficulty::Extreme, 1.0);
        let fired = (0..5000).filter(|_| s.tick(0.1, 4.0)).count();
        assert_eq!(fired, 1);
        assert!(s.is_depleted());

        // raised above zero: the latch re-arms
        s.restore_to(50.0);
        assert!(!s.is_depleted());
        let fired = (0..5000).filter(|_| s.tick(0.1, 4.0)).count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_look_around_restores_and_counts_down() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut s = sim(Difficulty::Hard, 1.0);
        s.restore_to(30.0);
        let out = s.look_around(&mut rng).unwrap();
        assert_eq!(out.stealth, 80.0);
        assert_eq!(out.remaining, 2);

        // cooldown blocks the next one
        assert!(s.look_around(&mut rng).is_none());
        assert_eq!(s.look_arounds_left(), 2);

        s.end_cooldown();
        let out = s.look_around(&mut rng).unwrap();
        assert_eq!(out.stealth, 100.0);
    }

    #[test]
    fn test_look_around_exhausted_is_a_no_op() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut s = sim(Difficulty::Extreme, 1.0);
        for _ in 0..2 {
            assert!(s.look_around(&mut rng).is_some());
            s.end_cooldown();
        }
        s.restore_to(10.0);
        for _ in 0..10 {
            assert!(s.look_around(&mut rng).is_none());
            assert_eq!(s.value(), 10.0);
            assert_eq!(s.look_arounds_left(), 0);
            assert!(!s.is_cooling_down());
        }
    }

    #[test]
    fn test_cancel_negative_roll_rate() {
        let mut rng = Pcg32::seed_from_u64(8);
        let preset = DifficultyPreset { look_arounds: 10_000, ..*GameSettings::default().preset(Difficulty::Easy) };
        let mut s = StealthSimulator::new(&preset, &StealthSettings::default(), EVENING, 1.0);
        let mut hits = 0;
        for _ in 0..2000 {
            if s.look_around(&mut rng).unwrap().cancel_negative {
                hits += 1;
            }
            s.end_cooldown();
        }
        // 30% of 2000 = 600
        assert!((500..700).contains(&hits), "hits {}", hits);
    }
}
