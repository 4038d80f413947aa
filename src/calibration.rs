//! Binary-search calibration over the difficulty axis.
//!
//! Each answered calibration question narrows the `[low, high]` bracket around the
//! learner's ability boundary. Calibration ends once the bracket has converged, the
//! learner has passed or failed their way to either end of the scale, or the question
//! budget is spent; the committed level then seeds progression.

use crate::config::{CalibrationConfig, Config};
use crate::util::{mean, sane_secs, snap_to_half};
use serde::{Deserialize, Serialize};

/// Self-reported answer to a calibration question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CalibrationAction {
    /// "I know this."
    Pass,
    /// "I don't know this", also synthesized when the deadline expires.
    Fail,
    /// "Not sure."
    Doubt,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub level: f64,
    pub action: CalibrationAction,
    pub time_taken_secs: f64,
}

impl CalibrationRecord {
    fn is_well_formed(&self) -> bool {
        self.level.is_finite() && sane_secs(self.time_taken_secs).is_some()
    }

    /// A pass that arrived within the doubt threshold.
    fn is_confident_pass(&self, cfg: &CalibrationConfig) -> bool {
        self.action == CalibrationAction::Pass && !is_too_slow(self.time_taken_secs, cfg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    InProgress { next_level: f64 },
    Terminated { level: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationState {
    low: f64,
    high: f64,
    current_level: f64,
    history: Vec<CalibrationRecord>,
    committed: Option<f64>,
}

fn is_too_slow(secs: f64, cfg: &CalibrationConfig) -> bool {
    sane_secs(secs).unwrap_or(0.0) > cfg.doubt_after_secs
}

/// The bracket update a response implies: a slow pass counts as a doubt.
pub fn effective_action(action: CalibrationAction, secs: f64, cfg: &CalibrationConfig) -> CalibrationAction {
    match action {
        CalibrationAction::Pass if is_too_slow(secs, cfg) => CalibrationAction::Doubt,
        other => other,
    }
}

impl CalibrationState {
    pub fn new(config: &Config) -> Self {
        let low = config.min_level;
        let high = config.max_level;
        Self {
            low,
            high,
            current_level: snap_to_half((low + high) / 2.0).clamp(low, high),
            history: Vec::new(),
            committed: None,
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Level of the question currently being asked.
    pub fn current_level(&self) -> f64 {
        self.current_level
    }

    pub fn history(&self) -> &[CalibrationRecord] {
        &self.history
    }

    pub fn is_terminated(&self) -> bool {
        self.committed.is_some()
    }

    pub fn outcome(&self) -> CalibrationOutcome {
        match self.committed {
            Some(level) => CalibrationOutcome::Terminated { level },
            None => CalibrationOutcome::InProgress {
                next_level: self.current_level,
            },
        }
    }

    /// Record one answer at the current level and advance the search.
    ///
    /// Once terminated the state is frozen: further responses are ignored and the
    /// committed level is reported again.
    pub fn record_response(
        &mut self,
        action: CalibrationAction,
        time_taken_secs: f64,
        config: &Config,
    ) -> CalibrationOutcome {
        if self.is_terminated() {
            return self.outcome();
        }

        let cfg = &config.calibration;
        let level = self.current_level;
        self.history.push(CalibrationRecord {
            level,
            action,
            time_taken_secs,
        });

        match effective_action(action, time_taken_secs, cfg) {
            CalibrationAction::Pass => self.low = self.low.max(level),
            CalibrationAction::Fail | CalibrationAction::Doubt => self.high = self.high.min(level),
        }
        tracing::debug!(
            level,
            %action,
            time_taken_secs,
            low = self.low,
            high = self.high,
            "calibration response"
        );

        if self.should_end_calibration(config) {
            let final_level = self.final_level(config);
            self.committed = Some(final_level);
            tracing::info!(
                level = final_level,
                responses = self.history.len(),
                low = self.low,
                high = self.high,
                "calibration finished"
            );
        } else {
            self.current_level = snap_to_half((self.low + self.high) / 2.0).clamp(self.low, self.high);
        }

        self.outcome()
    }

    /// Deadline expiry: an automatic "don't know" timed at the full deadline.
    pub fn record_timeout(&mut self, config: &Config) -> CalibrationOutcome {
        self.record_response(CalibrationAction::Fail, config.calibration.deadline_secs, config)
    }

    pub fn should_end_calibration(&self, config: &Config) -> bool {
        let cfg = &config.calibration;

        if self.history.len() >= cfg.max_responses {
            return true;
        }
        if !(self.low.is_finite() && self.high.is_finite()) {
            return false;
        }

        let usable = self.history.iter().filter(|r| r.is_well_formed()).count();
        if usable < cfg.min_responses {
            return false;
        }

        if self.low >= config.max_level - 1.0 || self.high <= config.min_level {
            return true;
        }

        if self.high - self.low < cfg.convergence_threshold {
            return match cfg.consistency_window {
                Some(window) => self.recent_responses_agree(window, cfg),
                None => true,
            };
        }

        false
    }

    /// Recent answers straddle the boundary: a mix of passes and misses centred in the bracket.
    fn recent_responses_agree(&self, window: usize, cfg: &CalibrationConfig) -> bool {
        let recent: Vec<&CalibrationRecord> = self
            .history
            .iter()
            .filter(|r| r.is_well_formed())
            .rev()
            .take(window)
            .collect();
        if recent.is_empty() {
            return false;
        }

        let passes = recent.iter().filter(|r| r.is_confident_pass(cfg)).count();
        let fails = recent
            .iter()
            .filter(|r| r.action == CalibrationAction::Fail)
            .count();
        let doubts = recent.len() - passes - fails;

        if passes == window || fails == window {
            return false;
        }
        if doubts as f64 > window as f64 / 2.0 {
            return false;
        }
        if passes == 0 || fails + doubts == 0 {
            return false;
        }

        let levels: Vec<f64> = recent.iter().map(|r| r.level).collect();
        mean(&levels).is_some_and(|avg| avg >= self.low && avg <= self.high)
    }

    fn final_level(&self, config: &Config) -> f64 {
        if self.low >= config.max_level - 1.0 {
            config.max_level
        } else if self.high <= config.min_level {
            config.min_level
        } else {
            (self.low - config.calibration.start_offset).max(config.min_level)
        }
    }
}
