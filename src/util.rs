pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Snap a value to the nearest 0.5 step (halves round away from zero).
pub fn snap_to_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// Clamp a level into `[min, max]`. Non-finite input falls back to `min`.
pub fn clamp_level(level: f64, min: f64, max: f64) -> f64 {
    if level.is_nan() {
        return min;
    }
    level.clamp(min, max)
}

/// Elapsed seconds as supplied by a caller, with clock skew and garbage mapped to `None`.
pub fn sane_secs(secs: f64) -> Option<f64> {
    if secs.is_finite() && secs >= 0.0 {
        Some(secs)
    } else {
        None
    }
}
