use crate::config::{Config, ProgressionConfig};
use crate::util::{clamp_level, mean, sane_secs};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Graded result of one practice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// The learner picked "I don't know".
    Unknown,
}

impl Outcome {
    pub fn from_flags(correct: bool, explicit_unknown: bool) -> Self {
        match (explicit_unknown, correct) {
            (true, _) => Outcome::Unknown,
            (false, true) => Outcome::Correct,
            (false, false) => Outcome::Incorrect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Speed {
    Fast,
    Normal,
    Slow,
}

impl Speed {
    /// Unusable timings (clock skew, NaN) count as normal speed.
    pub fn classify(time_taken_secs: f64, cfg: &ProgressionConfig) -> Self {
        match sane_secs(time_taken_secs) {
            Some(secs) if secs < cfg.fast_secs => Speed::Fast,
            Some(secs) if secs > cfg.slow_secs => Speed::Slow,
            _ => Speed::Normal,
        }
    }

    pub fn score(self) -> f64 {
        match self {
            Speed::Fast => 1.0,
            Speed::Normal => 0.5,
            Speed::Slow => 0.0,
        }
    }

    pub fn factor(self, cfg: &ProgressionConfig) -> f64 {
        match self {
            Speed::Fast => cfg.fast_factor,
            Speed::Normal => cfg.normal_factor,
            Speed::Slow => cfg.slow_factor,
        }
    }
}

/// What a single [`ProgressionState::apply_outcome`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeReport {
    pub outcome: Outcome,
    /// Change actually applied to the level, after clamping.
    pub delta: f64,
    pub level: f64,
    pub speed: Option<Speed>,
    pub turbo: bool,
    pub show_explanation: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionState {
    level: f64,
    streak: u32,
    consecutive_misses: u32,
    answer_history: VecDeque<u8>,
    speed_history: VecDeque<f64>,
}

fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, cap: usize) {
    buf.push_back(value);
    while buf.len() > cap {
        buf.pop_front();
    }
}

impl ProgressionState {
    pub fn new(level: f64, config: &Config) -> Self {
        Self::with_streak(level, 0, config)
    }

    /// Resume from a stored level/streak pair.
    pub fn with_streak(level: f64, streak: u32, config: &Config) -> Self {
        Self {
            level: clamp_level(level, config.min_level, config.max_level),
            streak,
            consecutive_misses: 0,
            answer_history: VecDeque::new(),
            speed_history: VecDeque::new(),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn answer_history(&self) -> impl Iterator<Item = u8> + '_ {
        self.answer_history.iter().copied()
    }

    pub fn speed_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.speed_history.iter().copied()
    }

    pub fn is_turbo(&self, config: &Config) -> bool {
        self.streak >= config.progression.turbo_streak
    }

    /// Share of correct answers in the recency window.
    pub fn accuracy(&self) -> Option<f64> {
        let window: Vec<f64> = self.answer_history.iter().map(|&a| a as f64).collect();
        mean(&window)
    }

    pub fn mean_speed(&self) -> Option<f64> {
        let scores: Vec<f64> = self.speed_history.iter().copied().collect();
        mean(&scores)
    }

    pub fn apply_outcome(&mut self, outcome: Outcome, time_taken_secs: f64, config: &Config) -> OutcomeReport {
        let cfg = &config.progression;
        let before = self.level;
        let mut speed = None;
        let mut turbo = false;

        let raw_delta = match outcome {
            Outcome::Unknown => -cfg.unknown_penalty,
            Outcome::Correct => {
                self.streak = self.streak.saturating_add(1);
                self.consecutive_misses = 0;

                let class = Speed::classify(time_taken_secs, cfg);
                push_bounded(&mut self.speed_history, class.score(), cfg.speed_window);
                push_bounded(&mut self.answer_history, 1, cfg.accuracy_window);
                speed = Some(class);

                turbo = self.streak >= cfg.turbo_streak;
                let base = if turbo { cfg.turbo_delta } else { cfg.base_delta };
                base * class.factor(cfg)
            }
            Outcome::Incorrect => {
                // a miss straight after a miss breaks out of the band harder
                let penalty = if self.consecutive_misses > 0 {
                    cfg.repeat_miss_penalty
                } else {
                    cfg.first_miss_penalty
                };
                self.streak = 0;
                self.consecutive_misses = self.consecutive_misses.saturating_add(1);
                push_bounded(&mut self.answer_history, 0, cfg.accuracy_window);
                -penalty
            }
        };

        self.level = clamp_level(before + raw_delta, config.min_level, config.max_level);
        let delta = self.level - before;
        tracing::debug!(%outcome, raw_delta, delta, level = self.level, streak = self.streak, "level update");

        OutcomeReport {
            outcome,
            delta,
            level: self.level,
            speed,
            turbo,
            show_explanation: outcome != Outcome::Correct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn turbo_kicks_in_on_third_fast_correct() {
        let config = Config::default();
        let mut state = ProgressionState::with_streak(5.0, 2, &config);
        let report = state.apply_outcome(Outcome::Correct, 3.0, &config);
        assert_eq!(state.streak(), 3);
        assert!(report.turbo);
        assert_eq!(report.speed, Some(Speed::Fast));
        assert!(approx(state.level(), 5.4), "level was {}", state.level());
        assert!(!report.show_explanation);
    }

    #[test]
    fn first_miss_then_repeat_miss() {
        let config = Config::default();
        let mut state = ProgressionState::new(9.8, &config);

        let first = state.apply_outcome(Outcome::Incorrect, 4.0, &config);
        assert!(approx(state.level(), 9.5));
        assert!(approx(first.delta, -0.3));
        assert!(first.show_explanation);

        state.apply_outcome(Outcome::Incorrect, 4.0, &config);
        assert!(approx(state.level(), 8.7));
        assert_eq!(state.streak(), 0);
        assert_eq!(state.consecutive_misses(), 2);
    }

    #[test]
    fn miss_after_streak_resets_it() {
        let config = Config::default();
        let mut state = ProgressionState::with_streak(10.0, 4, &config);
        state.apply_outcome(Outcome::Incorrect, 2.0, &config);
        assert_eq!(state.streak(), 0);
        assert!(approx(state.level(), 9.7));
    }

    #[test]
    fn speed_scales_the_delta() {
        let config = Config::default();

        let mut fast = ProgressionState::new(10.0, &config);
        fast.apply_outcome(Outcome::Correct, 2.0, &config);
        assert!(approx(fast.level(), 10.2));

        let mut normal = ProgressionState::new(10.0, &config);
        let report = normal.apply_outcome(Outcome::Correct, 12.0, &config);
        assert_eq!(report.speed, Some(Speed::Normal));
        assert!(approx(normal.level(), 10.1));

        let mut slow = ProgressionState::new(10.0, &config);
        let report = slow.apply_outcome(Outcome::Correct, 45.0, &config);
        assert_eq!(report.speed, Some(Speed::Slow));
        assert!(approx(slow.level(), 10.1));
        assert_eq!(slow.speed_history().collect::<Vec<_>>(), vec![0.0]);
    }

    #[test]
    fn skewed_clock_counts_as_normal_speed() {
        let cfg = ProgressionConfig::default();
        assert_eq!(Speed::classify(-3.0, &cfg), Speed::Normal);
        assert_eq!(Speed::classify(f64::NAN, &cfg), Speed::Normal);
        assert_eq!(Speed::classify(f64::INFINITY, &cfg), Speed::Normal);
        assert_eq!(Speed::classify(7.9, &cfg), Speed::Fast);
        assert_eq!(Speed::classify(8.0, &cfg), Speed::Normal);
        assert_eq!(Speed::classify(20.0, &cfg), Speed::Normal);
        assert_eq!(Speed::classify(20.1, &cfg), Speed::Slow);
    }

    #[test]
    fn unknown_drops_level_without_touching_streak_or_accuracy() {
        let config = Config::default();
        let mut state = ProgressionState::with_streak(6.0, 2, &config);
        let report = state.apply_outcome(Outcome::Unknown, 1.0, &config);
        assert!(approx(state.level(), 5.7));
        assert_eq!(state.streak(), 2);
        assert_eq!(state.accuracy(), None);
        assert_eq!(state.mean_speed(), None);
        assert!(report.show_explanation);
        assert_eq!(report.speed, None);
    }

    #[test]
    fn unknown_does_not_reset_miss_run() {
        let config = Config::default();
        let mut state = ProgressionState::new(10.0, &config);
        state.apply_outcome(Outcome::Incorrect, 1.0, &config);
        state.apply_outcome(Outcome::Unknown, 1.0, &config);
        let report = state.apply_outcome(Outcome::Incorrect, 1.0, &config);
        assert!(approx(report.delta, -0.8));
    }

    #[test]
    fn accuracy_window_keeps_last_five() {
        let config = Config::default();
        let mut state = ProgressionState::new(10.0, &config);
        for _ in 0..5 {
            state.apply_outcome(Outcome::Incorrect, 1.0, &config);
        }
        for _ in 0..4 {
            state.apply_outcome(Outcome::Correct, 1.0, &config);
        }
        assert_eq!(state.answer_history().collect::<Vec<_>>(), vec![0, 1, 1, 1, 1]);
        assert_eq!(state.accuracy(), Some(0.8));
    }

    #[test]
    fn clamped_delta_is_reported() {
        let config = Config::default();
        let mut state = ProgressionState::new(1.1, &config);
        let report = state.apply_outcome(Outcome::Incorrect, 1.0, &config);
        assert_eq!(state.level(), 1.0);
        assert!(approx(report.delta, -0.1));

        let mut state = ProgressionState::with_streak(33.9, 5, &config);
        state.apply_outcome(Outcome::Correct, 1.0, &config);
        assert_eq!(state.level(), 34.0);
    }

    #[test]
    fn construction_clamps_level() {
        let config = Config::default();
        assert_eq!(ProgressionState::new(-4.0, &config).level(), 1.0);
        assert_eq!(ProgressionState::new(99.0, &config).level(), 34.0);
        assert_eq!(ProgressionState::new(f64::NAN, &config).level(), 1.0);
    }

    #[test]
    fn momentum_beats_base_delta() {
        let config = Config::default();
        let mut no_turbo = Config::default();
        no_turbo.progression.turbo_streak = u32::MAX;

        let mut with = ProgressionState::new(10.0, &config);
        let mut without = ProgressionState::new(10.0, &no_turbo);
        for _ in 0..3 {
            with.apply_outcome(Outcome::Correct, 2.0, &config);
            without.apply_outcome(Outcome::Correct, 2.0, &no_turbo);
        }
        assert!(with.level() - 10.0 > without.level() - 10.0);
        assert!(approx(with.level(), 10.8));
        assert!(approx(without.level(), 10.6));
    }

    #[test]
    fn double_miss_drops_further_than_interleaved_misses() {
        let config = Config::default();

        let mut double = ProgressionState::new(15.0, &config);
        double.apply_outcome(Outcome::Incorrect, 5.0, &config);
        double.apply_outcome(Outcome::Incorrect, 5.0, &config);

        let mut interleaved = ProgressionState::new(15.0, &config);
        interleaved.apply_outcome(Outcome::Incorrect, 5.0, &config);
        let bump = interleaved.apply_outcome(Outcome::Correct, 5.0, &config).delta;
        interleaved.apply_outcome(Outcome::Incorrect, 5.0, &config);

        let double_drop = 15.0 - double.level();
        let interleaved_drop = 15.0 - interleaved.level() + bump;
        assert!(double_drop > interleaved_drop);
    }

    #[test]
    fn level_stays_in_bounds_for_random_sequences() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(42);
        let outcomes = [Outcome::Correct, Outcome::Incorrect, Outcome::Unknown];

        for _ in 0..200 {
            let start = rng.gen_range(config.min_level..=config.max_level);
            let mut state = ProgressionState::new(start, &config);
            for _ in 0..100 {
                let outcome = outcomes[rng.gen_range(0..outcomes.len())];
                let secs = rng.gen_range(-5.0..40.0);
                state.apply_outcome(outcome, secs, &config);
                assert!(state.level() >= config.min_level && state.level() <= config.max_level);
            }
        }
    }

    #[test]
    fn from_flags_prefers_unknown() {
        assert_eq!(Outcome::from_flags(true, true), Outcome::Unknown);
        assert_eq!(Outcome::from_flags(true, false), Outcome::Correct);
        assert_eq!(Outcome::from_flags(false, false), Outcome::Incorrect);
    }
}
