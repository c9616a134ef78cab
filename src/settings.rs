/// game-balance settings for stealthpaint
/// every tunable rate lives here so hosts can ship them as data (settings json)
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PaintError, PaintResult};
use crate::risk::RiskEventKind;

/// difficulty tier picked by the spot-selection collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Extreme,
}

impl Difficulty {
    /// tiers ordered from most to least forgiving
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Extreme,
    ];
}

/// per-tier rates. harder tiers drain faster, spawn more often and leave less slack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyPreset {
    /// stealth points drained per second before any multipliers
    pub base_drain_per_sec: f32,
    /// look-arounds available at session start
    pub look_arounds: u32,
    /// seconds between risk-event spawn rolls
    pub spawn_interval_secs: f32,
    /// targets the player must tap to escape a pursuit
    pub required_taps: u32,
    /// seconds allowed for a pursuit challenge
    pub time_limit_secs: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyTable {
    pub easy: DifficultyPreset,
    pub medium: DifficultyPreset,
    pub hard: DifficultyPreset,
    pub extreme: DifficultyPreset,
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self {
            easy: DifficultyPreset {
                base_drain_per_sec: 0.5,
                look_arounds: 5,
                spawn_interval_secs: 15.0,
                required_taps: 5,
                time_limit_secs: 12.0,
            },
            medium: DifficultyPreset {
                base_drain_per_sec: 1.0,
                look_arounds: 4,
                spawn_interval_secs: 12.0,
                required_taps: 6,
                time_limit_secs: 10.0,
            },
            hard: DifficultyPreset {
                base_drain_per_sec: 1.6,
                look_arounds: 3,
                spawn_interval_secs: 9.0,
                required_taps: 8,
                time_limit_secs: 8.0,
            },
            extreme: DifficultyPreset {
                base_drain_per_sec: 2.5,
                look_arounds: 2,
                spawn_interval_secs: 6.0,
                required_taps: 10,
                time_limit_secs: 6.0,
            },
        }
    }
}

impl DifficultyTable {
    pub fn preset(&self, difficulty: Difficulty) -> &DifficultyPreset {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
            Difficulty::Extreme => &self.extreme,
        }
    }

    /// presets in tier order (easy first)
    pub fn ordered(&self) -> [&DifficultyPreset; 4] {
        Difficulty::ALL.map(|d| self.preset(d))
    }

    /// harder tiers must never be kinder than easier ones
    fn check_monotonic(&self) -> Result<(), String> {
        let tiers = self.ordered();
        for (i, pair) in tiers.windows(2).enumerate() {
            let (easier, harder) = (pair[0], pair[1]);
            let name = format!("{:?}->{:?}", Difficulty::ALL[i], Difficulty::ALL[i + 1]);
            if harder.base_drain_per_sec < easier.base_drain_per_sec {
                return Err(format!("base_drain_per_sec decreases at {name}"));
            }
            if harder.required_taps < easier.required_taps {
                return Err(format!("required_taps decreases at {name}"));
            }
            if harder.time_limit_secs > easier.time_limit_secs {
                return Err(format!("time_limit_secs increases at {name}"));
            }
            if harder.look_arounds > easier.look_arounds {
                return Err(format!("look_arounds increases at {name}"));
            }
            if harder.spawn_interval_secs > easier.spawn_interval_secs {
                return Err(format!("spawn_interval_secs increases at {name}"));
            }
        }
        for p in tiers {
            if p.spawn_interval_secs <= 0.0 || p.time_limit_secs <= 0.0 {
                return Err("intervals and time limits must be positive".to_string());
            }
            if p.required_taps == 0 {
                return Err("required_taps must be at least 1".to_string());
            }
        }
        Ok(())
    }
}

/// hour-of-day visibility model. hours are local, 0-23.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayFactors {
    pub day_start_hour: u32,
    pub evening_start_hour: u32,
    pub night_start_hour: u32,
    pub day: f32,
    pub evening: f32,
    pub night: f32,
}

impl Default for TimeOfDayFactors {
    fn default() -> Self {
        Self {
            day_start_hour: 6,
            evening_start_hour: 18,
            night_start_hour: 22,
            day: 1.5,
            evening: 1.0,
            night: 0.6,
        }
    }
}

impl TimeOfDayFactors {
    /// drain factor for a local hour (wraps past 23)
    pub fn factor(&self, hour: u32) -> f32 {
        let h = hour % 24;
        if h >= self.day_start_hour && h < self.evening_start_hour {
            self.day
        } else if h >= self.evening_start_hour && h < self.night_start_hour {
            self.evening
        } else {
            self.night
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StealthSettings {
    pub max: f32,
    /// decay tick period in milliseconds
    pub tick_ms: u64,
    pub look_around_restore: f32,
    pub look_around_cooldown_secs: f32,
    /// chance that a look-around also scares off one negative event
    pub cancel_negative_chance: f32,
    pub time_of_day: TimeOfDayFactors,
}

impl Default for StealthSettings {
    fn default() -> Self {
        Self {
            max: 100.0,
            tick_ms: 100,
            look_around_restore: 50.0,
            look_around_cooldown_secs: 10.0,
            cancel_negative_chance: 0.3,
            time_of_day: TimeOfDayFactors::default(),
        }
    }
}

/// one row of the risk-event pool
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskEventProfile {
    pub kind: RiskEventKind,
    pub multiplier: f32,
    pub duration_secs: f32,
    /// relative spawn weight (equal weights = uniform pick)
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskSettings {
    /// bernoulli chance per spawn interval
    pub spawn_chance: f32,
    pub pool: Vec<RiskEventProfile>,
}

impl Default for RiskSettings {
    fn default() -> Self {
        let row = |kind, multiplier, duration_secs| RiskEventProfile {
            kind,
            multiplier,
            duration_secs,
            weight: 1.0,
        };
        Self {
            spawn_chance: 0.4,
            pool: vec![
                row(RiskEventKind::Pedestrian, 1.5, 8.0),
                row(RiskEventKind::Vehicle, 1.3, 5.0),
                row(RiskEventKind::Patrol, 2.5, 10.0),
                row(RiskEventKind::GoodCover, 0.5, 12.0),
                row(RiskEventKind::Nightfall, 0.7, 20.0),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PursuitSettings {
    /// stealth value after escaping or paying a fine
    pub partial_restore: f32,
    /// arrests at which the session ends in a lockout
    pub lockout_threshold: u32,
    /// fine per arrest; the fine is base_fine * arrest_count
    pub base_fine: u32,
    /// lockout ("jail") duration reported to the player-state collaborator
    pub lockout_hours: u32,
    pub target_radius: f32,
    /// targets keep at least this far from the screen edge (beyond their radius)
    pub edge_margin: f32,
    /// extra gap between target rims
    pub min_spacing: f32,
}

impl Default for PursuitSettings {
    fn default() -> Self {
        Self {
            partial_restore: 50.0,
            lockout_threshold: 3,
            base_fine: 100,
            lockout_hours: 24,
            target_radius: 28.0,
            edge_margin: 24.0,
            min_spacing: 8.0,
        }
    }
}

/// quality = min(1, coverage/baseline) * coverage_weight + diversity bonus + stroke bonus
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// coverage percent counted as "full" coverage
    pub coverage_baseline_percent: f32,
    pub coverage_weight: f32,
    pub diversity_weight: f32,
    pub diversity_cap: u32,
    pub stroke_weight: f32,
    pub stroke_cap: u32,
    /// multiplier applied to the score of caught or interrupted sessions
    pub caught_penalty: f32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            coverage_baseline_percent: 40.0,
            coverage_weight: 0.7,
            diversity_weight: 0.15,
            diversity_cap: 5,
            stroke_weight: 0.15,
            stroke_cap: 20,
            caught_penalty: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushSettings {
    /// spray particles per dab at full pressure and density 1.0
    pub spray_particles: u32,
    /// user-controlled spray density; scales both the cloud radius and the particle count
    pub spray_density: f32,
    /// per-particle opacity multiplier
    pub spray_flow: f32,
    /// dab spacing along a segment, as a fraction of brush size
    pub spray_spacing: f32,
    /// particle radius as a fraction of brush size
    pub particle_radius: f32,
    /// opacity weight of the brush texture dabs
    pub brush_texture_weight: f32,
    pub drip_chance: f32,
    /// longest drip, in multiples of brush size
    pub drip_max_length: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            spray_particles: 24,
            spray_density: 1.0,
            spray_flow: 0.6,
            spray_spacing: 0.25,
            particle_radius: 0.08,
            brush_texture_weight: 0.25,
            drip_chance: 0.1,
            drip_max_length: 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverageSettings {
    /// sample every Nth pixel in both axes
    pub sample_step: u32,
    /// minimum alpha (0-255) for a pixel to count as painted
    pub alpha_threshold: u8,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            sample_step: 2,
            alpha_threshold: 8,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub difficulties: DifficultyTable,
    pub stealth: StealthSettings,
    pub risk: RiskSettings,
    pub pursuit: PursuitSettings,
    pub quality: QualityWeights,
    pub brush: BrushSettings,
    pub coverage: CoverageSettings,
}

/// compact pack of the settings the canvas needs (brushes, sampling, scoring)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasPack {
    pub brush: BrushSettings,
    pub coverage: CoverageSettings,
    pub quality: QualityWeights,
}

impl From<&GameSettings> for CanvasPack {
    fn from(settings: &GameSettings) -> Self {
        Self {
            brush: settings.brush,
            coverage: settings.coverage,
            quality: settings.quality,
        }
    }
}

impl GameSettings {
    /// save settings to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> PaintResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// load and validate settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> PaintResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// load settings, or return defaults if the file is missing or unusable
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("failed to load {}: {}. using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn preset(&self, difficulty: Difficulty) -> &DifficultyPreset {
        self.difficulties.preset(difficulty)
    }

    /// reject tables that would break balance invariants
    pub fn validate(&self) -> PaintResult<()> {
        self.check_finite()?;
        self.difficulties
            .check_monotonic()
            .map_err(PaintError::InvalidSettings)?;

        let probabilities = [
            ("stealth.cancel_negative_chance", self.stealth.cancel_negative_chance),
            ("risk.spawn_chance", self.risk.spawn_chance),
            ("brush.drip_chance", self.brush.drip_chance),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(PaintError::InvalidSettings(format!("{name} = {p} is not a probability")));
            }
        }

        if self.stealth.tick_ms == 0 || self.stealth.max <= 0.0 {
            return Err(PaintError::InvalidSettings("stealth tick and max must be positive".into()));
        }
        if self.risk.pool.is_empty() || self.risk.pool.iter().map(|p| p.weight.max(0.0)).sum::<f32>() <= 0.0 {
            return Err(PaintError::InvalidSettings("risk pool needs a positive total weight".into()));
        }
        if self.risk.pool.iter().any(|p| p.multiplier <= 0.0 || p.duration_secs <= 0.0) {
            return Err(PaintError::InvalidSettings("risk multipliers and durations must be positive".into()));
        }
        if self.pursuit.lockout_threshold == 0 {
            return Err(PaintError::InvalidSettings("pursuit.lockout_threshold must be at least 1".into()));
        }
        if self.quality.coverage_baseline_percent <= 0.0 {
            return Err(PaintError::InvalidSettings("quality.coverage_baseline_percent must be positive".into()));
        }
        if self.coverage.sample_step == 0 {
            return Err(PaintError::InvalidSettings("coverage.sample_step must be at least 1".into()));
        }
        Ok(())
    }

    /// every rate, factor and weight must be a finite, non-negative number;
    /// NaN would otherwise slip past the range checks below and the stealth clamp
    fn check_finite(&self) -> PaintResult<()> {
        let mut values: Vec<(String, f32)> = Vec::new();
        for (d, p) in Difficulty::ALL.iter().zip(self.difficulties.ordered()) {
            values.push((format!("{d:?}.base_drain_per_sec"), p.base_drain_per_sec));
            values.push((format!("{d:?}.spawn_interval_secs"), p.spawn_interval_secs));
            values.push((format!("{d:?}.time_limit_secs"), p.time_limit_secs));
        }

        let s = &self.stealth;
        let tod = &s.time_of_day;
        values.extend([
            ("stealth.max".into(), s.max),
            ("stealth.look_around_restore".into(), s.look_around_restore),
            ("stealth.look_around_cooldown_secs".into(), s.look_around_cooldown_secs),
            ("stealth.cancel_negative_chance".into(), s.cancel_negative_chance),
            ("time_of_day.day".into(), tod.day),
            ("time_of_day.evening".into(), tod.evening),
            ("time_of_day.night".into(), tod.night),
            ("risk.spawn_chance".into(), self.risk.spawn_chance),
        ]);
        for (i, row) in self.risk.pool.iter().enumerate() {
            values.push((format!("risk.pool[{i}].multiplier"), row.multiplier));
            values.push((format!("risk.pool[{i}].duration_secs"), row.duration_secs));
            values.push((format!("risk.pool[{i}].weight"), row.weight));
        }

        let p = &self.pursuit;
        let q = &self.quality;
        let b = &self.brush;
        values.extend([
            ("pursuit.partial_restore".into(), p.partial_restore),
            ("pursuit.target_radius".into(), p.target_radius),
            ("pursuit.edge_margin".into(), p.edge_margin),
            ("pursuit.min_spacing".into(), p.min_spacing),
            ("quality.coverage_baseline_percent".into(), q.coverage_baseline_percent),
            ("quality.coverage_weight".into(), q.coverage_weight),
            ("quality.diversity_weight".into(), q.diversity_weight),
            ("quality.stroke_weight".into(), q.stroke_weight),
            ("quality.caught_penalty".into(), q.caught_penalty),
            ("brush.spray_density".into(), b.spray_density),
            ("brush.spray_flow".into(), b.spray_flow),
            ("brush.spray_spacing".into(), b.spray_spacing),
            ("brush.particle_radius".into(), b.particle_radius),
            ("brush.brush_texture_weight".into(), b.brush_texture_weight),
            ("brush.drip_chance".into(), b.drip_chance),
            ("brush.drip_max_length".into(), b.drip_max_length),
        ]);

        match values.into_iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            Some((name, v)) => Err(PaintError::InvalidSettings(format!(
                "{name} = {v} must be finite and non-negative"
            ))),
            None => Ok(()),
        }
    }
}
