use serde::{Deserialize, Serialize};

/// How much of the level number is shown to the learner.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DisplayMode {
    /// Encouragement based on recent accuracy, no numbers.
    #[default]
    Mastery,
    /// Whole-level band such as "5-6".
    Growth,
    /// Exact level to one decimal.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Encouragement {
    #[strum(to_string = "Let's get started!")]
    GettingStarted,
    #[strum(to_string = "Mastering this!")]
    Mastering,
    #[strum(to_string = "Right level of challenge!")]
    Optimal,
    #[strum(to_string = "Building strong skills!")]
    Building,
    #[strum(to_string = "Exploring new concepts!")]
    Exploring,
}

impl Encouragement {
    /// 70-85% recent accuracy is the target zone.
    pub fn from_accuracy(accuracy: Option<f64>) -> Self {
        match accuracy {
            Some(a) if a >= 0.85 => Encouragement::Mastering,
            Some(a) if a >= 0.70 => Encouragement::Optimal,
            Some(a) if a >= 0.50 => Encouragement::Building,
            Some(a) if a.is_finite() => Encouragement::Exploring,
            _ => Encouragement::GettingStarted,
        }
    }
}

pub fn level_band(level: f64, max_level: f64) -> String {
    let lower = level.floor();
    let upper = (lower + 1.0).min(max_level.floor());
    format!("{lower:.0}-{upper:.0}")
}

pub fn format_level(mode: DisplayMode, level: f64, max_level: f64, accuracy: Option<f64>) -> String {
    match mode {
        DisplayMode::Mastery => Encouragement::from_accuracy(accuracy).to_string(),
        DisplayMode::Growth => format!("Level {}", level_band(level, max_level)),
        DisplayMode::Full => format!("Level {level:.1}"),
    }
}
