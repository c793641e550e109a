//! Identical-frame streak breaker
//!
//! Cameras re-decode the same code many times per second. This filter sits in
//! front of classification (animated sessions only) and drops rapid repeats of
//! the last accepted frame, opening a short cooldown once a streak builds up.

use crate::config::ScanConfig;
use crate::metrics::SessionMetrics;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::Instant;

/// Fingerprints remembered for the duplicate window; oldest go first
pub const SEEN_FRAMES_CAPACITY: usize = 512;

/// Outcome of a streak check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakVerdict {
    /// Frame passes
    Accept,
    /// Identical frame inside the short window
    DropRepeat,
    /// Identical frame while a cooldown is open (or the one that opened it)
    DropSameStreak,
    /// Frame seen earlier in the session, inside the duplicate window
    DropDuplicateWindow,
}

impl StreakVerdict {
    /// Check if the frame passes
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

fn fingerprint(raw: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    raw.hash(&mut hasher);
    hasher.finish()
}

/// Streak breaker state
#[derive(Debug)]
pub struct StreakBreaker {
    window: Duration,
    limit: u32,
    cooldown: Duration,
    duplicate_window: Option<Duration>,
    last_raw: Option<String>,
    last_accepted_at: Option<Instant>,
    streak: u32,
    cooldown_until: Option<Instant>,
    seen: HashSet<u64>,
    seen_order: VecDeque<u64>,
}

impl StreakBreaker {
    /// Create a breaker from the session config
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            window: config.streak_window(),
            limit: config.streak_limit,
            cooldown: config.streak_cooldown(),
            duplicate_window: config.duplicate_window(),
            last_raw: None,
            last_accepted_at: None,
            streak: 0,
            cooldown_until: None,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// Current streak length
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Check if a cooldown is open at `now`
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Inspect a frame and update streak state
    pub fn check(&mut self, raw: &str, now: Instant, metrics: &mut SessionMetrics) -> StreakVerdict {
        let is_last = self.last_raw.as_deref() == Some(raw);
        let since_last = self
            .last_accepted_at
            .map(|at| now.saturating_duration_since(at));

        if is_last && self.in_cooldown(now) {
            metrics.repeats_total += 1;
            metrics.dropped_same_streak += 1;
            return StreakVerdict::DropSameStreak;
        }

        let print = fingerprint(raw);
        if let (Some(window), Some(since)) = (self.duplicate_window, since_last) {
            if since < window && self.seen.contains(&print) {
                metrics.repeats_total += 1;
                metrics.dropped_duplicate_window += 1;
                return StreakVerdict::DropDuplicateWindow;
            }
        }

        if is_last {
            if since_last.is_some_and(|since| since < self.window) {
                metrics.repeats_total += 1;
                self.streak += 1;
                metrics.max_same_streak = metrics.max_same_streak.max(self.streak);
                if self.streak >= self.limit {
                    self.cooldown_until = Some(now + self.cooldown);
                    metrics.dropped_same_streak += 1;
                    tracing::trace!(streak = self.streak, "same-frame cooldown opened");
                    return StreakVerdict::DropSameStreak;
                }
                return StreakVerdict::DropRepeat;
            }
            // Same frame again, but slowly enough to be a deliberate re-show
            self.last_accepted_at = Some(now);
            self.streak += 1;
            metrics.max_same_streak = metrics.max_same_streak.max(self.streak);
        } else {
            self.last_raw = Some(raw.to_string());
            self.last_accepted_at = Some(now);
            self.streak = 1;
        }

        if self.remember(print) {
            metrics.unique_parts += 1;
        }
        StreakVerdict::Accept
    }

    /// Fingerprints currently remembered
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if the fingerprint was not remembered yet
    fn remember(&mut self, print: u64) -> bool {
        if !self.seen.insert(print) {
            return false;
        }
        self.seen_order.push_back(print);
        if self.seen_order.len() > SEEN_FRAMES_CAPACITY {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Forget all state
    pub fn reset(&mut self) {
        self.last_raw = None;
        self.last_accepted_at = None;
        self.streak = 0;
        self.cooldown_until = None;
        self.seen.clear();
        self.seen_order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_distinct_frames_accepted() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        assert!(breaker.check("a", t0, &mut metrics).is_accept());
        assert!(breaker.check("b", t0 + ms(1), &mut metrics).is_accept());
        assert!(breaker.check("a", t0 + ms(2), &mut metrics).is_accept());
        assert_eq!(breaker.streak(), 1);
        assert_eq!(metrics.unique_parts, 2);
    }

    #[test]
    fn test_streak_opens_cooldown() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();

        assert_eq!(breaker.check("x", t0, &mut metrics), StreakVerdict::Accept);
        assert_eq!(breaker.check("x", t0 + ms(40), &mut metrics), StreakVerdict::DropRepeat);
        assert_eq!(
            breaker.check("x", t0 + ms(80), &mut metrics),
            StreakVerdict::DropSameStreak
        );
        assert!(breaker.in_cooldown(t0 + ms(100)));
        assert_eq!(
            breaker.check("x", t0 + ms(120), &mut metrics),
            StreakVerdict::DropSameStreak
        );
        assert_eq!(metrics.max_same_streak, 3);
        assert_eq!(metrics.dropped_same_streak, 2);
        assert_eq!(metrics.repeats_total, 3);
    }

    #[test]
    fn test_cooldown_drops_even_outside_short_window() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        breaker.check("x", t0, &mut metrics);
        breaker.check("x", t0 + ms(10), &mut metrics);
        breaker.check("x", t0 + ms(20), &mut metrics); // cooldown until 420

        // 300ms after the last acceptance: outside the window, inside cooldown
        assert_eq!(
            breaker.check("x", t0 + ms(300), &mut metrics),
            StreakVerdict::DropSameStreak
        );
        // Cooldown over
        assert_eq!(breaker.check("x", t0 + ms(421), &mut metrics), StreakVerdict::Accept);
    }

    #[test]
    fn test_cooldown_only_targets_streaking_frame() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        breaker.check("x", t0, &mut metrics);
        breaker.check("x", t0 + ms(10), &mut metrics);
        breaker.check("x", t0 + ms(20), &mut metrics);
        assert!(breaker.check("y", t0 + ms(30), &mut metrics).is_accept());
    }

    #[test]
    fn test_slow_repeat_accepted() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        assert!(breaker.check("x", t0, &mut metrics).is_accept());
        assert!(breaker.check("x", t0 + ms(250), &mut metrics).is_accept());
        assert_eq!(breaker.streak(), 2);
    }

    #[test]
    fn test_duplicate_window() {
        let config = ScanConfig {
            duplicate_window_ms: Some(1_000),
            ..ScanConfig::animated()
        };
        let mut breaker = StreakBreaker::new(&config);
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        assert!(breaker.check("a", t0, &mut metrics).is_accept());
        assert!(breaker.check("b", t0 + ms(300), &mut metrics).is_accept());
        assert_eq!(
            breaker.check("a", t0 + ms(600), &mut metrics),
            StreakVerdict::DropDuplicateWindow
        );
        assert!(breaker.check("a", t0 + ms(1_400), &mut metrics).is_accept());
        assert_eq!(metrics.dropped_duplicate_window, 1);
    }

    #[test]
    fn test_seen_frames_bounded() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        let frames = SEEN_FRAMES_CAPACITY + 100;
        for i in 0..frames {
            let now = t0 + ms(i as u64);
            assert!(breaker.check(&format!("frame-{}", i), now, &mut metrics).is_accept());
            assert!(breaker.seen_len() <= SEEN_FRAMES_CAPACITY);
        }
        assert_eq!(metrics.unique_parts, frames);
    }

    #[test]
    fn test_reset() {
        let mut breaker = StreakBreaker::new(&ScanConfig::animated());
        let mut metrics = SessionMetrics::default();
        let t0 = Instant::now();
        breaker.check("x", t0, &mut metrics);
        breaker.check("x", t0 + ms(10), &mut metrics);
        breaker.check("x", t0 + ms(20), &mut metrics);
        breaker.reset();
        assert!(!breaker.in_cooldown(t0 + ms(30)));
        assert!(breaker.check("x", t0 + ms(30), &mut metrics).is_accept());
    }
}
