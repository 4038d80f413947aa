use crate::config::{Config, ReviewConfig, ReviewStrategy, StickyBand};
use rand::{Rng, RngCore};

fn unit_interval(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Picks the difficulty of the next question, which may sit below the learner's level
/// so earlier material comes back around.
pub trait LevelSelector {
    fn select_level(&self, current_level: f64, rng: &mut dyn RngCore) -> f64;
}

/// Always asks at the current level (calibration, worksheets).
pub struct CurrentLevelSelector;

impl LevelSelector for CurrentLevelSelector {
    fn select_level(&self, current_level: f64, _rng: &mut dyn RngCore) -> f64 {
        current_level
    }
}

/// Mostly current level; a fixed share of draws reviews a whole level in
/// `[floor, current)`, with part of those pinned to a sticky band.
#[derive(Debug, Clone)]
pub struct BandedReviewSelector {
    review_probability: f64,
    floor_level: f64,
    sticky_band: Option<StickyBand>,
    deterministic: bool,
}

impl BandedReviewSelector {
    pub fn new(cfg: &ReviewConfig) -> Self {
        Self {
            review_probability: unit_interval(cfg.review_probability),
            floor_level: finite_or(cfg.floor_level, 0.0),
            sticky_band: cfg
                .sticky_band
                .filter(|b| b.low.is_finite() && b.high.is_finite())
                .map(|b| StickyBand {
                    weight: unit_interval(b.weight),
                    ..b
                }),
            deterministic: cfg.deterministic,
        }
    }

    fn sticky_draw(&self, current_level: f64, rng: &mut dyn RngCore) -> Option<f64> {
        let band = self.sticky_band?;
        let low = band.low.ceil().max(self.floor_level.ceil());
        // strictly below current, like the uniform branch
        let high = band.high.floor().min(current_level.ceil() - 1.0);
        if current_level < band.low || low > high {
            return None;
        }
        if !rng.gen_bool(band.weight) {
            return None;
        }
        Some(rng.gen_range(low as i64..=high as i64) as f64)
    }
}

impl LevelSelector for BandedReviewSelector {
    fn select_level(&self, current_level: f64, rng: &mut dyn RngCore) -> f64 {
        if self.deterministic || !current_level.is_finite() || current_level <= self.floor_level {
            return current_level;
        }
        if !rng.gen_bool(self.review_probability) {
            return current_level;
        }

        if let Some(level) = self.sticky_draw(current_level, rng) {
            return level;
        }
        rng.gen_range(self.floor_level..current_level)
            .floor()
            .max(self.floor_level)
    }
}

/// Review with a logarithmic fall-off: small drops are common, big ones rare.
#[derive(Debug, Clone)]
pub struct FalloffReviewSelector {
    floor_level: f64,
    deterministic: bool,
}

impl FalloffReviewSelector {
    pub fn new(cfg: &ReviewConfig) -> Self {
        Self {
            floor_level: finite_or(cfg.floor_level, 0.0),
            deterministic: cfg.deterministic,
        }
    }
}

impl LevelSelector for FalloffReviewSelector {
    fn select_level(&self, current_level: f64, rng: &mut dyn RngCore) -> f64 {
        if self.deterministic || !current_level.is_finite() || current_level <= self.floor_level {
            return current_level;
        }

        let roll = rng.gen_range(0.0..100.0);
        let drop = if roll < 1.0 {
            rng.gen_range(4..=5) as f64
        } else if roll < 3.0 {
            3.0
        } else if roll < 8.0 {
            2.0
        } else if roll < 18.0 {
            1.0
        } else {
            0.0
        };
        (current_level - drop).max(self.floor_level)
    }
}

/// Selector for a practice session.
pub fn for_practice(config: &Config) -> Box<dyn LevelSelector> {
    match config.review.strategy {
        ReviewStrategy::Banded => Box::new(BandedReviewSelector::new(&config.review)),
        ReviewStrategy::Falloff => Box::new(FalloffReviewSelector::new(&config.review)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn draws(selector: &dyn LevelSelector, level: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| selector.select_level(level, &mut rng)).collect()
    }

    #[test]
    fn deterministic_flag_always_returns_current() {
        let mut cfg = ReviewConfig::default();
        cfg.deterministic = true;
        cfg.review_probability = 1.0;

        let selectors: Vec<Box<dyn LevelSelector>> = vec![
            Box::new(BandedReviewSelector::new(&cfg)),
            Box::new(FalloffReviewSelector::new(&cfg)),
        ];
        for selector in selectors {
            assert!(draws(selector.as_ref(), 20.0, 1000, 1)
                .iter()
                .all(|&l| l == 20.0));
        }
    }

    #[test]
    fn current_level_selector_is_static() {
        assert!(draws(&CurrentLevelSelector, 12.5, 200, 3)
            .iter()
            .all(|&l| l == 12.5));
    }

    #[test]
    fn banded_draws_stay_between_floor_and_current() {
        let selector = BandedReviewSelector::new(&ReviewConfig::default());
        for level in [5.0, 5.5, 6.0, 9.3, 15.0, 15.7, 20.0, 34.0] {
            for l in draws(&selector, level, 2000, level as u64) {
                assert!(l >= 5.0, "{l} below floor at level {level}");
                assert!(l <= level, "{l} above current level {level}");
            }
        }
    }

    #[test]
    fn banded_below_floor_returns_current() {
        let mut cfg = ReviewConfig::default();
        cfg.review_probability = 1.0;
        let selector = BandedReviewSelector::new(&cfg);
        assert!(draws(&selector, 3.0, 100, 9).iter().all(|&l| l == 3.0));
    }

    #[test]
    fn about_one_in_ten_draws_are_reviews() {
        let selector = BandedReviewSelector::new(&ReviewConfig::default());
        let results = draws(&selector, 20.0, 5000, 11);
        let reviews = results.iter().filter(|&&l| l < 20.0).count();
        let share = reviews as f64 / results.len() as f64;
        assert!(share > 0.07 && share < 0.13, "review share {share}");
    }

    #[test]
    fn sticky_band_takes_about_half_of_reviews() {
        let selector = BandedReviewSelector::new(&ReviewConfig::default());
        let results = draws(&selector, 25.0, 20000, 5);
        let reviews: Vec<f64> = results.into_iter().filter(|&l| l < 25.0).collect();
        let sticky = reviews.iter().filter(|&&l| (15.0..=17.0).contains(&l)).count();
        let share = sticky as f64 / reviews.len() as f64;
        // half pinned plus the band's uniform share of the rest
        assert!(share > 0.5 && share < 0.7, "sticky share {share}");
    }

    #[test]
    fn sticky_band_respects_current_level() {
        let mut cfg = ReviewConfig::default();
        cfg.review_probability = 1.0;
        cfg.sticky_band = Some(StickyBand {
            low: 15.0,
            high: 17.0,
            weight: 1.0,
        });
        let selector = BandedReviewSelector::new(&cfg);
        assert!(draws(&selector, 15.6, 500, 2).iter().all(|&l| l == 15.0));
        assert!(draws(&selector, 16.2, 500, 2)
            .iter()
            .all(|&l| l == 15.0 || l == 16.0));
    }

    #[test]
    fn sticky_band_never_returns_a_whole_current_level() {
        let mut cfg = ReviewConfig::default();
        cfg.review_probability = 1.0;
        cfg.sticky_band = Some(StickyBand {
            low: 15.0,
            high: 17.0,
            weight: 1.0,
        });
        let selector = BandedReviewSelector::new(&cfg);
        let results = draws(&selector, 16.0, 500, 3);
        assert!(results.iter().all(|&l| l == 15.0));
    }

    #[test]
    fn sticky_band_ignored_below_its_low_edge() {
        let mut cfg = ReviewConfig::default();
        cfg.review_probability = 1.0;
        cfg.sticky_band = Some(StickyBand {
            low: 15.0,
            high: 17.0,
            weight: 1.0,
        });
        let selector = BandedReviewSelector::new(&cfg);
        let results = draws(&selector, 14.9, 5000, 12);

        assert!(results.iter().all(|&l| (5.0..=14.0).contains(&l) && l.fract() == 0.0));
        for level in 5..=14 {
            let share = results.iter().filter(|&&l| l == level as f64).count() as f64 / 5000.0;
            assert!(share > 0.05 && share < 0.16, "level {level} share {share}");
        }
    }

    #[test]
    fn no_sticky_band_is_plain_uniform_review() {
        let mut cfg = ReviewConfig::default();
        cfg.review_probability = 1.0;
        cfg.sticky_band = None;
        let selector = BandedReviewSelector::new(&cfg);
        let results = draws(&selector, 10.0, 2000, 8);
        assert!(results.iter().all(|&l| (5.0..10.0).contains(&l) && l.fract() == 0.0));
        assert!(results.contains(&5.0) && results.contains(&9.0));
    }

    #[test]
    fn falloff_never_leaves_floor_or_exceeds_current() {
        let selector = FalloffReviewSelector::new(&ReviewConfig::default());
        for level in [5.0, 6.0, 8.5, 12.0, 30.0] {
            for l in draws(&selector, level, 2000, 4) {
                assert!(l >= 5.0 && l <= level);
            }
        }
    }

    #[test]
    fn falloff_mostly_stays_put() {
        let selector = FalloffReviewSelector::new(&ReviewConfig::default());
        let results = draws(&selector, 20.0, 5000, 6);
        let same = results.iter().filter(|&&l| l == 20.0).count() as f64 / 5000.0;
        assert!(same > 0.77 && same < 0.87, "stay share {same}");
        assert!(results.iter().any(|&l| l == 19.0));
    }

    #[test]
    fn strategy_from_config() {
        let mut config = Config::default();
        config.review.deterministic = true;
        config.review.strategy = ReviewStrategy::Falloff;
        let selector = for_practice(&config);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(selector.select_level(18.0, &mut rng), 18.0);
    }
}
