use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::settings::{RiskEventProfile, RiskSettings};

pub type RiskEventId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskEventKind {
    Pedestrian,
    Vehicle,
    Patrol,
    GoodCover,
    Nightfall,
}

/// a transient drain modifier. expires `duration_secs` after `spawned_at` (session seconds).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RiskEvent {
    pub id: RiskEventId,
    pub kind: RiskEventKind,
    pub risk_multiplier: f32,
    pub duration_secs: f32,
    pub spawned_at: f64,
}

impl RiskEvent {
    /// negative events make drain worse
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.risk_multiplier > 1.0
    }

    pub fn expires_at(&self) -> f64 {
        self.spawned_at + self.duration_secs as f64
    }
}

/// currently active events, in spawn order
#[derive(Clone, Debug, Default)]
pub struct RiskEventSet {
    events: Vec<RiskEvent>,
}

impl RiskEventSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: RiskEvent) {
        self.events.push(event);
    }

    pub fn remove(&mut self, id: RiskEventId) -> Option<RiskEvent> {
        let idx = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(idx))
    }

    /// drop one uniformly chosen negative event, if any is active
    pub fn remove_random_negative<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<RiskEvent> {
        let negatives: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_negative())
            .map(|(i, _)| i)
            .collect();
        if negatives.is_empty() {
            return None;
        }
        let pick = negatives[rng.random_range(0..negatives.len())];
        Some(self.events.remove(pick))
    }

    /// product of every active multiplier (1.0 when empty)
    pub fn combined_multiplier(&self) -> f32 {
        self.events.iter().map(|e| e.risk_multiplier).product()
    }

    pub fn active(&self) -> &[RiskEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Rolls for new events once per spawn interval.
/// Which kinds exist, how strong they are and how often each is picked all come
/// from `RiskSettings`.
#[derive(Clone, Debug)]
pub struct EventScheduler {
    spawn_chance: f32,
    pool: Vec<RiskEventProfile>,
    total_weight: f32,
    next_id: RiskEventId,
}

impl EventScheduler {
    pub fn new(settings: &RiskSettings) -> Self {
        let pool: Vec<RiskEventProfile> = settings
            .pool
            .iter()
            .copied()
            .filter(|p| p.weight > 0.0)
            .collect();
        let total_weight = pool.iter().map(|p| p.weight).sum();
        Self {
            spawn_chance: settings.spawn_chance.clamp(0.0, 1.0),
            pool,
            total_weight,
            next_id: 0,
        }
    }

    /// one spawn period: bernoulli(spawn_chance), then a weighted pick from the pool
    pub fn roll<R: Rng + ?Sized>(&mut self, rng: &mut R, now_secs: f64) -> Option<RiskEvent> {
        if !rng.random_bool(self.spawn_chance as f64) {
            return None;
        }
        let profile = *self.pick(rng)?;
        self.next_id += 1;
        Some(RiskEvent {
            id: self.next_id,
            kind: profile.kind,
            risk_multiplier: profile.multiplier,
            duration_secs: profile.duration_secs,
            spawned_at: now_secs,
        })
    }

    /// weighted choice; equal weights make it uniform
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&RiskEventProfile> {
        if self.pool.is_empty() || self.total_weight <= 0.0 {
            return None;
        }
        let mut r = rng.random::<f32>() * self.total_weight;
        for profile in &self.pool {
            if r < profile.weight {
                return Some(profile);
            }
            r -= profile.weight;
        }
        // float slop at the top end
        self.pool.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn event(id: RiskEventId, mult: f32) -> RiskEvent {
        RiskEvent {
            id,
            kind: RiskEventKind::Pedestrian,
            risk_multiplier: mult,
            duration_secs: 5.0,
            spawned_at: 0.0,
        }
    }

    #[test]
    fn test_multipliers_compose_multiplicatively() {
        let mut set = RiskEventSet::new();
        assert_eq!(set.combined_multiplier(), 1.0);
        set.insert(event(1, 1.5));
        set.insert(event(2, 2.0));
        assert!((set.combined_multiplier() - 3.0).abs() < 1e-6);

        // good cover offsets them
        set.insert(event(3, 0.5));
        assert!((set.combined_multiplier() - 1.5).abs() < 1e-6);

        set.remove(2);
        assert!((set.combined_multiplier() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_remove_random_negative_skips_positive_events() {
        let mut rng = Pcg32::seed_from_u64(9);
        let mut set = RiskEventSet::new();
        set.insert(event(1, 0.5));
        set.insert(event(2, 0.7));
        assert!(set.remove_random_negative(&mut rng).is_none());

        set.insert(event(3, 2.5));
        let removed = set.remove_random_negative(&mut rng).unwrap();
        assert_eq!(removed.id, 3);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_scheduler_spawn_rate_tracks_chance() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut sched = EventScheduler::new(&RiskSettings::default());
        let spawned = (0..2000).filter(|_| sched.roll(&mut rng, 0.0).is_some()).count();
        // 40% of 2000 = 800
        assert!((700..900).contains(&spawned), "spawned {}", spawned);
    }

    #[test]
    fn test_scheduler_ids_are_unique() {
        let mut rng = Pcg32::seed_from_u64(3);
        let settings = RiskSettings { spawn_chance: 1.0, ..RiskSettings::default() };
        let mut sched = EventScheduler::new(&settings);
        let a = sched.roll(&mut rng, 1.0).unwrap();
        let b = sched.roll(&mut rng, 2.0).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b.spawned_at, 2.0);
    }

    #[test]
    fn test_weighted_pick_follows_weights() {
        let mut rng = Pcg32::seed_from_u64(5);
        let row = |kind, weight| RiskEventProfile { kind, multiplier: 1.5, duration_secs: 1.0, weight };
        let settings = RiskSettings {
            spawn_chance: 1.0,
            pool: vec![
                row(RiskEventKind::Patrol, 3.0),
                row(RiskEventKind::Vehicle, 1.0),
                row(RiskEventKind::Nightfall, 0.0),
            ],
        };
        let sched = EventScheduler::new(&settings);
        let mut patrols = 0;
        for _ in 0..4000 {
            let kind = sched.pick(&mut rng).unwrap().kind;
            assert_ne!(kind, RiskEventKind::Nightfall);
            if kind == RiskEventKind::Patrol {
                patrols += 1;
            }
        }
        // expected 3000
        assert!((2800..3200).contains(&patrols), "patrols {}", patrols);
    }

    #[test]
    fn test_empty_pool_never_spawns() {
        let mut rng = Pcg32::seed_from_u64(2);
        let settings = RiskSettings { spawn_chance: 1.0, pool: Vec::new() };
        let mut sched = EventScheduler::new(&settings);
        assert!(sched.roll(&mut rng, 0.0).is_none());
    }
}
