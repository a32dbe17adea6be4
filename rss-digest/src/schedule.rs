//! Daily trigger for the `schedule` command.
//!
//! Cycles are awaited one after another, so two never overlap, and a run that
//! overshoots the next slot simply makes the loop wait for the following one.

use crate::cycle::DigestCycle;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::Display;
use tracing::{error, info, warn};

/// Parses `HH:MM`.
pub fn parse_schedule_time(value: &str) -> Option<NaiveTime> {
    let (hour, minute) = value.trim().split_once(':')?;
    NaiveTime::from_hms_opt(hour.trim().parse().ok()?, minute.trim().parse().ok()?, 0)
}

/// Parses an IANA zone name such as `Asia/Shanghai`. Blank means "use the
/// machine's local zone" and yields `None` like an unknown name does.
pub fn parse_schedule_tz(name: &str) -> Option<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    name.parse().ok()
}

/// The first `at` wall-clock time strictly after `now`, in `now`'s zone.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        let naive = day.and_time(at);
        // A slot that falls into a DST gap moves forward an hour.
        let candidate = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest());

        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
        day = day.succ_opt().unwrap_or(day);
    }
}

/// Runs a cycle now, then once a day at `at` wall-clock time in `tz`, forever.
pub async fn run_daily<Z>(cycle: &DigestCycle, at: NaiveTime, tz: Z)
where
    Z: TimeZone,
    Z::Offset: Display,
{
    info!("Scheduler running. Daily execution at {}; starting first run now.", at.format("%H:%M"));

    loop {
        let started = Utc::now();
        match cycle.run_once().await {
            Ok(report) => info!(
                "Completed in {:.2}s: ingested {}, sent {}, groups {}",
                (Utc::now() - started).num_milliseconds() as f64 / 1000.0,
                report.result.ingested,
                report.result.sent,
                report.result.groups
            ),
            Err(e) => error!(
                "Scheduled cycle failed after {:.2}s: {}",
                (Utc::now() - started).num_milliseconds() as f64 / 1000.0,
                e
            ),
        }

        let now = Utc::now().with_timezone(&tz);
        let next = next_run_after(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        if wait.is_zero() {
            warn!("Next run time {} is not in the future; running again", next);
        }
        info!("Next run at {}", next);
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hh_mm() {
        assert_eq!(parse_schedule_time("08:30"), NaiveTime::from_hms_opt(8, 30, 0));
        assert_eq!(parse_schedule_time(" 23:05 "), NaiveTime::from_hms_opt(23, 5, 0));
        assert_eq!(parse_schedule_time("24:00"), None);
        assert_eq!(parse_schedule_time("0830"), None);
        assert_eq!(parse_schedule_time("aa:bb"), None);
    }

    #[test]
    fn next_run_is_today_or_tomorrow() {
        let at = NaiveTime::from_hms_opt(8, 30, 0).unwrap();

        let before = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(next_run_after(&before, at), Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap());

        let exactly = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(next_run_after(&exactly, at), Utc.with_ymd_and_hms(2025, 3, 2, 8, 30, 0).unwrap());

        let after = Utc.with_ymd_and_hms(2025, 12, 31, 9, 0, 0).unwrap();
        assert_eq!(next_run_after(&after, at), Utc.with_ymd_and_hms(2026, 1, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn parses_zone_names() {
        assert_eq!(parse_schedule_tz("Asia/Shanghai"), Some(chrono_tz::Asia::Shanghai));
        assert_eq!(parse_schedule_tz(" Europe/Berlin "), Some(chrono_tz::Europe::Berlin));
        assert_eq!(parse_schedule_tz("Mars/Olympus"), None);
        assert_eq!(parse_schedule_tz(""), None);
    }

    #[test]
    fn next_run_follows_the_configured_zone() {
        let at = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        let shanghai = chrono_tz::Asia::Shanghai;

        // 23:00 UTC is already 07:00 the next day in Shanghai
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap().with_timezone(&shanghai);
        let next = next_run_after(&now, at);
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 3, 2, 0, 30, 0).unwrap());
    }

    #[test]
    fn slot_in_dst_gap_moves_forward() {
        let at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let berlin = chrono_tz::Europe::Berlin;

        // 2025-03-30 02:30 does not exist in Berlin
        let now = berlin.with_ymd_and_hms(2025, 3, 30, 0, 0, 0).unwrap();
        let next = next_run_after(&now, at);
        assert_eq!(next, berlin.with_ymd_and_hms(2025, 3, 30, 3, 30, 0).unwrap());
    }
}
