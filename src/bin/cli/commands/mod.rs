pub mod cards;
pub mod session;
pub mod stats;
pub mod study;

use chrono::{DateTime, Utc};

use lexis_lib::study::fsrs::format_interval;
use lexis_lib::study::CardSchedule;

/// "due now", "due in 3d" or "due in 10m"
pub fn describe_due(schedule: &CardSchedule, now: DateTime<Utc>) -> String {
    let until = schedule.due - now;
    if until.num_seconds() <= 0 {
        return "due now".to_string();
    }
    if until.num_days() >= 1 {
        return format!("due in {}", format_interval(until.num_days() as u32));
    }
    if until.num_hours() >= 1 {
        format!("due in {}h", until.num_hours())
    } else {
        format!("due in {}m", until.num_minutes().max(1))
    }
}
