//! Exponential mapping between a 0–100 slider and a search timeout in seconds.
//!
//! Fine steps at short durations, coarse steps at long ones.

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;
pub const SLIDER_MAX: u8 = 100;

fn log_scale() -> (f64, f64) {
    let min_log = (MIN_TIMEOUT_SECS as f64).ln();
    let max_log = (MAX_TIMEOUT_SECS as f64).ln();
    (min_log, (max_log - min_log) / SLIDER_MAX as f64)
}

/// Slider position (clamped to 0–100) to whole seconds.
pub fn slider_to_seconds(position: u8) -> u64 {
    let position = position.min(SLIDER_MAX);
    let (min_log, scale) = log_scale();
    let secs = (min_log + scale * position as f64).exp().round() as u64;
    secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
}

/// Seconds (clamped to the valid range) to the nearest slider position.
pub fn seconds_to_slider(seconds: u64) -> u8 {
    let seconds = seconds.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    let (min_log, scale) = log_scale();
    let position = ((seconds as f64).ln() - min_log) / scale;
    position.round().clamp(0.0, SLIDER_MAX as f64) as u8
}

/// Human-readable timeout: `45s`, `2m 5s`, `1h 0m`.
pub fn format_timeout(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
