use crate::app_dirs::AppDirs;
use crate::display::DisplayMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine and app settings, injected into a [`crate::session::Session`] at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub min_level: f64,
    pub max_level: f64,
    pub calibration: CalibrationConfig,
    pub progression: ProgressionConfig,
    pub review: ReviewConfig,
    pub display_mode: DisplayMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_level: 1.0,
            max_level: 34.0,
            calibration: CalibrationConfig::default(),
            progression: ProgressionConfig::default(),
            review: ReviewConfig::default(),
            display_mode: DisplayMode::default(),
        }
    }
}

/// Binary-search calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub min_responses: usize,
    pub max_responses: usize,
    /// Bracket width below which the search counts as converged.
    pub convergence_threshold: f64,
    /// A pass slower than this is downgraded to a doubt.
    pub doubt_after_secs: f64,
    /// Wall-clock limit per calibration question before an automatic fail.
    pub deadline_secs: f64,
    /// How far below the calibrated boundary practice starts.
    pub start_offset: f64,
    /// Extra recent-response agreement check applied to converged brackets.
    pub consistency_window: Option<usize>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_responses: 4,
            max_responses: 6,
            convergence_threshold: 1.5,
            doubt_after_secs: 20.0,
            deadline_secs: 15.0,
            start_offset: 1.0,
            consistency_window: None,
        }
    }
}

/// Drill/learning level-update parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressionConfig {
    pub fast_secs: f64,
    pub slow_secs: f64,
    pub base_delta: f64,
    pub turbo_delta: f64,
    pub turbo_streak: u32,
    pub fast_factor: f64,
    pub normal_factor: f64,
    pub slow_factor: f64,
    pub unknown_penalty: f64,
    pub first_miss_penalty: f64,
    pub repeat_miss_penalty: f64,
    pub accuracy_window: usize,
    pub speed_window: usize,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            fast_secs: 8.0,
            slow_secs: 20.0,
            base_delta: 0.2,
            turbo_delta: 0.4,
            turbo_streak: 3,
            fast_factor: 1.0,
            normal_factor: 0.5,
            slow_factor: 0.5,
            unknown_penalty: 0.3,
            first_miss_penalty: 0.3,
            repeat_miss_penalty: 0.8,
            accuracy_window: 5,
            speed_window: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStrategy {
    #[default]
    Banded,
    Falloff,
}

/// A level range that review draws favour over its uniform share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StickyBand {
    pub low: f64,
    pub high: f64,
    /// Share of eligible review draws that land inside the band.
    pub weight: f64,
}

/// Spaced-review level sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    pub strategy: ReviewStrategy,
    pub review_probability: f64,
    pub floor_level: f64,
    pub sticky_band: Option<StickyBand>,
    /// Disables all randomness: every draw returns the current level.
    pub deterministic: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            strategy: ReviewStrategy::Banded,
            review_probability: 0.10,
            floor_level: 5.0,
            sticky_band: Some(StickyBand {
                low: 15.0,
                high: 17.0,
                weight: 0.5,
            }),
            deterministic: false,
        }
    }
}

fn non_negative(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        fallback
    }
}

fn probability(p: f64, fallback: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

impl Config {
    /// Repair out-of-range values instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        let defaults = Config::default();

        if !self.min_level.is_finite() {
            self.min_level = defaults.min_level;
        }
        if !self.max_level.is_finite() {
            self.max_level = defaults.max_level;
        }
        if self.min_level > self.max_level {
            std::mem::swap(&mut self.min_level, &mut self.max_level);
        }

        let cal = &mut self.calibration;
        let cal_defaults = &defaults.calibration;
        cal.max_responses = cal.max_responses.max(1);
        cal.min_responses = cal.min_responses.min(cal.max_responses);
        cal.convergence_threshold =
            non_negative(cal.convergence_threshold, cal_defaults.convergence_threshold);
        cal.doubt_after_secs = non_negative(cal.doubt_after_secs, cal_defaults.doubt_after_secs);
        cal.deadline_secs = non_negative(cal.deadline_secs, cal_defaults.deadline_secs);
        cal.start_offset = non_negative(cal.start_offset, cal_defaults.start_offset);
        if cal.consistency_window == Some(0) {
            cal.consistency_window = None;
        }

        let prog = &mut self.progression;
        let prog_defaults = &defaults.progression;
        prog.fast_secs = non_negative(prog.fast_secs, prog_defaults.fast_secs);
        prog.slow_secs = non_negative(prog.slow_secs, prog_defaults.slow_secs);
        if prog.fast_secs > prog.slow_secs {
            std::mem::swap(&mut prog.fast_secs, &mut prog.slow_secs);
        }
        prog.base_delta = non_negative(prog.base_delta, prog_defaults.base_delta);
        prog.turbo_delta = non_negative(prog.turbo_delta, prog_defaults.turbo_delta);
        prog.fast_factor = non_negative(prog.fast_factor, prog_defaults.fast_factor);
        prog.normal_factor = non_negative(prog.normal_factor, prog_defaults.normal_factor);
        prog.slow_factor = non_negative(prog.slow_factor, prog_defaults.slow_factor);
        prog.unknown_penalty = non_negative(prog.unknown_penalty, prog_defaults.unknown_penalty);
        prog.first_miss_penalty =
            non_negative(prog.first_miss_penalty, prog_defaults.first_miss_penalty);
        prog.repeat_miss_penalty =
            non_negative(prog.repeat_miss_penalty, prog_defaults.repeat_miss_penalty);
        prog.accuracy_window = prog.accuracy_window.max(1);
        prog.speed_window = prog.speed_window.max(1);

        let review = &mut self.review;
        review.review_probability = probability(
            review.review_probability,
            defaults.review.review_probability,
        );
        review.floor_level = if review.floor_level.is_finite() {
            review.floor_level.clamp(self.min_level, self.max_level)
        } else {
            self.min_level
        };
        if let Some(band) = review.sticky_band.as_mut() {
            if band.low > band.high {
                std::mem::swap(&mut band.low, &mut band.high);
            }
            band.weight = probability(band.weight, 0.0);
        }
        if review
            .sticky_band
            .is_some_and(|b| !b.low.is_finite() || !b.high.is_finite())
        {
            review.sticky_band = None;
        }

        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("rungs_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg.normalized(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn garbage_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            br#"{ "max_level": 24, "review": { "deterministic": true } }"#,
        )
        .unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.max_level, 24.0);
        assert!(cfg.review.deterministic);
        assert_eq!(cfg.review.floor_level, 5.0);
        assert_eq!(cfg.calibration, CalibrationConfig::default());
    }

    #[test]
    fn normalized_repairs_swapped_and_out_of_range_values() {
        let mut cfg = Config {
            min_level: 34.0,
            max_level: 1.0,
            ..Config::default()
        };
        cfg.calibration.min_responses = 9;
        cfg.calibration.max_responses = 6;
        cfg.review.review_probability = 1.7;
        cfg.review.floor_level = 50.0;
        cfg.progression.fast_secs = 30.0;
        cfg.progression.slow_secs = 10.0;
        cfg.review.sticky_band = Some(StickyBand {
            low: 17.0,
            high: 15.0,
            weight: -1.0,
        });

        let cfg = cfg.normalized();
        assert_eq!((cfg.min_level, cfg.max_level), (1.0, 34.0));
        assert_eq!(cfg.calibration.min_responses, 6);
        assert_eq!(cfg.review.review_probability, 1.0);
        assert_eq!(cfg.review.floor_level, 34.0);
        assert_eq!(
            (cfg.progression.fast_secs, cfg.progression.slow_secs),
            (10.0, 30.0)
        );
        let band = cfg.review.sticky_band.unwrap();
        assert_eq!((band.low, band.high, band.weight), (15.0, 17.0, 0.0));
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let mut cfg = Config::default();
        cfg.calibration.consistency_window = Some(3);
        cfg.review.strategy = ReviewStrategy::Falloff;
        cfg.review.sticky_band = None;
        cfg.display_mode = DisplayMode::Full;
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }
}
