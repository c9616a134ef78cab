//─────────────────────────────────────────────────────────────────────────────
// session clock: virtual time plus named, cancellable subscriptions
//─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::time::Duration;

use crate::risk::RiskEventId;

pub type TimerId = u64;

/// what a subscription drives when it fires
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    StealthDecay,
    EventSpawn,
    EventExpiry(RiskEventId),
    PursuitDeadline,
    LookAroundCooldown,
}

/// one firing handed back to the owner of the clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    pub id: TimerId,
    pub kind: TimerKind,
    /// clock time the firing was due at
    pub at: Duration,
}

#[derive(Clone, Copy, Debug)]
struct Subscription {
    kind: TimerKind,
    due: Duration,
    /// Some for repeating subscriptions
    period: Option<Duration>,
    /// time left when paused; None while running
    paused: Option<Duration>,
}

/// Single owner of every session timer.
///
/// Time only moves when the owner advances it, so a session (and its tests) sees
/// exactly the same firings for the same sequence of `advance` calls. Firings are
/// handed out one at a time in (due time, id) order, which lets the owner react to
/// each one (pausing or cancelling other timers) before the next is considered.
#[derive(Debug, Default)]
pub struct SessionClock {
    now: Duration,
    running: bool,
    next_id: TimerId,
    subs: BTreeMap<TimerId, Subscription>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// freeze time; subscriptions survive
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// repeating subscription, first firing one period from now
    pub fn every(&mut self, kind: TimerKind, period: Duration) -> TimerId {
        // a zero period would fire forever inside one advance
        let period = period.max(Duration::from_millis(1));
        self.insert(kind, self.now + period, Some(period))
    }

    /// one-shot subscription
    pub fn once(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.insert(kind, self.now + delay, None)
    }

    fn insert(&mut self, kind: TimerKind, due: Duration, period: Option<Duration>) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        self.subs.insert(id, Subscription { kind, due, period, paused: None });
        log::trace!("clock: subscribe {:?} as #{} due {:?}", kind, id, due);
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.subs.remove(&id).is_some()
    }

    /// cancel every subscription of one kind; returns how many went
    pub fn cancel_kind(&mut self, kind: TimerKind) -> usize {
        let before = self.subs.len();
        self.subs.retain(|_, s| s.kind != kind);
        before - self.subs.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.subs.len();
        self.subs.clear();
        n
    }

    /// hold a subscription; its remaining time is kept until `resume`
    pub fn pause(&mut self, id: TimerId) -> bool {
        let now = self.now;
        match self.subs.get_mut(&id) {
            Some(sub) if sub.paused.is_none() => {
                sub.paused = Some(sub.due.saturating_sub(now));
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self, id: TimerId) -> bool {
        let now = self.now;
        match self.subs.get_mut(&id) {
            Some(sub) => match sub.paused.take() {
                Some(left) => {
                    sub.due = now + left;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.subs.contains_key(&id)
    }

    pub fn is_paused(&self, id: TimerId) -> bool {
        self.subs.get(&id).is_some_and(|s| s.paused.is_some())
    }

    /// time until the next firing of `id`
    pub fn remaining(&self, id: TimerId) -> Option<Duration> {
        let sub = self.subs.get(&id)?;
        Some(sub.paused.unwrap_or_else(|| sub.due.saturating_sub(self.now)))
    }

    pub fn pending(&self) -> usize {
        self.subs.len()
    }

    /// Pop the earliest unpaused subscription due at or before `target` and move
    /// the clock to its due time. Repeating subscriptions are rescheduled, one-shots
    /// are removed. Returns None once nothing more is due (or the clock is stopped).
    pub fn poll_due(&mut self, target: Duration) -> Option<Fired> {
        if !self.running {
            return None;
        }
        let (id, due) = self
            .subs
            .iter()
            .filter(|(_, s)| s.paused.is_none() && s.due <= target)
            .map(|(id, s)| (*id, s.due))
            .min_by_key(|&(id, due)| (due, id))?;

        self.now = self.now.max(due);
        let sub = self.subs.get_mut(&id)?;
        let kind = sub.kind;
        match sub.period {
            Some(period) => sub.due += period,
            None => {
                self.subs.remove(&id);
            }
        }
        Some(Fired { id, kind, at: due })
    }

    /// finish an advance: move to `target` once nothing more is due
    pub fn settle(&mut self, target: Duration) {
        if self.running {
            self.now = self.now.max(target);
        }
    }

    /// Advance by `dt` and collect every firing in order.
    /// Owners that need to react between firings use `poll_due` / `settle` instead.
    pub fn tick(&mut self, dt: Duration) -> Vec<Fired> {
        let target = self.now + dt;
        let mut fired = Vec::new();
        while let Some(f) = self.poll_due(target) {
            fired.push(f);
        }
        self.settle(target);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn running() -> SessionClock {
        let mut c = SessionClock::new();
        c.start();
        c
    }

    #[test]
    fn test_every_fires_each_period() {
        let mut c = running();
        c.every(TimerKind::StealthDecay, ms(100));
        let fired = c.tick(ms(1000));
        assert_eq!(fired.len(), 10);
        assert_eq!(fired[0].at, ms(100));
        assert_eq!(fired[9].at, ms(1000));
        assert_eq!(c.now(), ms(1000));
    }

    #[test]
    fn test_stopped_clock_does_not_move() {
        let mut c = SessionClock::new();
        c.every(TimerKind::StealthDecay, ms(100));
        assert!(c.tick(ms(500)).is_empty());
        assert_eq!(c.now(), Duration::ZERO);

        c.start();
        assert_eq!(c.tick(ms(500)).len(), 5);
        c.stop();
        assert!(c.tick(ms(500)).is_empty());
        assert_eq!(c.now(), ms(500));
    }

    #[test]
    fn test_once_fires_once_and_is_removed() {
        let mut c = running();
        let id = c.once(TimerKind::PursuitDeadline, ms(250));
        assert_eq!(c.remaining(id), Some(ms(250)));
        assert!(c.tick(ms(200)).is_empty());
        assert_eq!(c.remaining(id), Some(ms(50)));

        let fired = c.tick(ms(100));
        assert_eq!(fired, vec![Fired { id, kind: TimerKind::PursuitDeadline, at: ms(250) }]);
        assert!(!c.is_scheduled(id));
        assert!(c.tick(ms(1000)).is_empty());
    }

    #[test]
    fn test_firings_are_time_ordered() {
        let mut c = running();
        c.every(TimerKind::StealthDecay, ms(300));
        c.once(TimerKind::EventExpiry(7), ms(450));
        let kinds: Vec<_> = c.tick(ms(900)).into_iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimerKind::StealthDecay,
                TimerKind::EventExpiry(7),
                TimerKind::StealthDecay,
                TimerKind::StealthDecay,
            ]
        );
    }

    #[test]
    fn test_cancel_prevents_stale_firing() {
        let mut c = running();
        let deadline = c.once(TimerKind::PursuitDeadline, ms(500));
        c.tick(ms(200));
        assert!(c.cancel(deadline));
        assert!(!c.cancel(deadline));
        assert!(c.tick(ms(1000)).is_empty());
    }

    #[test]
    fn test_pause_keeps_remaining_time() {
        let mut c = running();
        let spawn = c.every(TimerKind::EventSpawn, ms(1000));
        c.tick(ms(600));
        assert!(c.pause(spawn));
        assert!(!c.pause(spawn));
        assert!(c.is_paused(spawn));

        assert!(c.tick(ms(5000)).is_empty());
        assert_eq!(c.remaining(spawn), Some(ms(400)));

        assert!(c.resume(spawn));
        let fired = c.tick(ms(400));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].at, ms(6000));
    }

    #[test]
    fn test_poll_due_lets_owner_react_between_firings() {
        let mut c = running();
        let decay = c.every(TimerKind::StealthDecay, ms(100));
        let target = ms(1000);

        let mut seen = 0;
        while let Some(f) = c.poll_due(target) {
            seen += 1;
            if f.at == ms(300) {
                c.pause(decay);
            }
        }
        c.settle(target);
        assert_eq!(seen, 3);
        assert_eq!(c.now(), target);
    }

    #[test]
    fn test_cancel_kind_and_all() {
        let mut c = running();
        c.once(TimerKind::EventExpiry(1), ms(10));
        c.once(TimerKind::EventExpiry(1), ms(20));
        c.once(TimerKind::EventExpiry(2), ms(30));
        c.every(TimerKind::StealthDecay, ms(100));
        assert_eq!(c.cancel_kind(TimerKind::EventExpiry(1)), 2);
        assert_eq!(c.pending(), 2);
        assert_eq!(c.cancel_all(), 2);
        assert!(c.tick(ms(1000)).is_empty());
    }
}
