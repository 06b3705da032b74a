//! Local day boundaries for per-user daily limits

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an IANA zone name, falling back to UTC
pub fn parse_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            if !name.trim().is_empty() {
                log::warn!("Unknown timezone {:?}, using UTC", name);
            }
            Tz::UTC
        }
    }
}

/// The user's local calendar date at `now`
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Start of the local day containing `now`, as a UTC instant
pub fn day_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    start_of(local_date(now, tz), tz)
}

/// First instant of a local date. Midnight can fall in a DST gap, in which
/// case the day starts at the first valid local time after it.
fn start_of(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let mut local = midnight;
    for _ in 0..4 {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(t) => return t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => local += Duration::minutes(30),
        }
    }
    Utc.from_utc_datetime(&midnight)
}
