//! FSRS spaced repetition engine
//!
//! This module provides:
//! - The FSRS-5 memory model formulas (stability, difficulty, retrievability)
//! - Three-tier interval fuzz
//! - The card state machine that applies the model to a card's schedule

pub mod algorithm;
pub mod fuzz;
pub mod scheduler;

pub use algorithm::{validate_weights, Weights, DEFAULT_WEIGHTS, MAX_INTERVAL_DAYS, MIN_STABILITY};
pub use scheduler::{preview, review, SchedulerParams};

/// Format an interval in days to a human-readable string
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(5), "5d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
        assert_eq!(format_interval(730), "2y");
    }
}
