//! Five-field cron expressions.
//!
//! The grammar is the classic one: literal numbers, `*`, `a-b` ranges,
//! `a,b,c` lists, and `*/n` / `a-b/n` steps, over the fields minute, hour,
//! day-of-month, month, day-of-week. Day-of-week 0 and 7 both mean Sunday.
//! A timestamp matches when all five wall-clock values are in their
//! field's set.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

/// Upper bound for the next-run search, in minutes (five years).
const NEXT_RUN_HORIZON_MINUTES: i64 = 5 * 366 * 24 * 60;

/// A parsed five-field cron expression. Field sets are bitmasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
}

impl CronExpr {
    /// Parse an expression, rejecting wrong arity and unparseable fields.
    pub fn parse(expr: &str) -> crate::Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(crate::Error::invalid_cron(
                expr,
                format!("expected five fields, got {}", fields.len()),
            ));
        }

        let minutes = parse_field(fields[0], 0, 59, false)
            .map_err(|m| crate::Error::invalid_cron(expr, format!("minute field: {}", m)))?;
        let hours = parse_field(fields[1], 0, 23, false)
            .map_err(|m| crate::Error::invalid_cron(expr, format!("hour field: {}", m)))?;
        let days_of_month = parse_field(fields[2], 1, 31, false)
            .map_err(|m| crate::Error::invalid_cron(expr, format!("day-of-month field: {}", m)))?;
        let months = parse_field(fields[3], 1, 12, false)
            .map_err(|m| crate::Error::invalid_cron(expr, format!("month field: {}", m)))?;
        let days_of_week = parse_field(fields[4], 0, 7, true)
            .map_err(|m| crate::Error::invalid_cron(expr, format!("day-of-week field: {}", m)))?;

        Ok(Self {
            source: expr.to_string(),
            minutes,
            hours: hours as u32,
            days_of_month: days_of_month as u32,
            months: months as u16,
            days_of_week: days_of_week as u8,
        })
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the wall-clock components of `dt` are all in their sets.
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        self.minutes & (1u64 << dt.minute()) != 0
            && self.hours & (1u32 << dt.hour()) != 0
            && self.days_of_month & (1u32 << dt.day()) != 0
            && self.months & (1u16 << dt.month()) != 0
            && self.days_of_week & (1u8 << dt.weekday().num_days_from_sunday()) != 0
    }

    /// The next matching instant strictly after `from`, evaluated in the
    /// given zone (UTC when `zone` is `None` means the caller wants local
    /// time and passes it pre-converted). Returns `None` when nothing
    /// matches within a five-year horizon.
    pub fn next_run<Tz: TimeZone>(&self, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        // Advance to the next whole minute.
        let mut candidate = from.clone() - Duration::seconds(from.second() as i64)
            - Duration::nanoseconds(from.nanosecond() as i64)
            + Duration::minutes(1);
        for _ in 0..NEXT_RUN_HORIZON_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate = candidate + Duration::minutes(1);
        }
        None
    }

    /// Convenience for UTC callers.
    pub fn next_run_utc(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_run(&from)
    }
}

/// Parse one field into a bitmask over `[min, max]`. For the day-of-week
/// field, 7 folds into 0 (Sunday).
fn parse_field(spec: &str, min: u32, max: u32, is_dow: bool) -> Result<u64, String> {
    let mut mask: u64 = 0;

    for term in spec.split(',') {
        if term.is_empty() {
            return Err("empty list term".to_string());
        }

        let has_step = term.contains('/');
        let (range, step) = match term.split_once('/') {
            Some((range, step)) => {
                let step: u32 =
                    step.parse().map_err(|_| format!("invalid step '{}'", step))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, step)
            }
            None => (term, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let lo: u32 = a.parse().map_err(|_| format!("invalid number '{}'", a))?;
            let hi: u32 = b.parse().map_err(|_| format!("invalid number '{}'", b))?;
            (lo, hi)
        } else {
            let v: u32 = range.parse().map_err(|_| format!("invalid number '{}'", range))?;
            if has_step {
                // `a/n` counts from a to the field maximum.
                (v, max)
            } else {
                (v, v)
            }
        };

        if lo > hi {
            return Err(format!("range {}-{} is inverted", lo, hi));
        }
        if lo < min || hi > max {
            return Err(format!("value out of range {}-{}", min, max));
        }

        let mut v = lo;
        while v <= hi {
            let bit = if is_dow && v == 7 { 0 } else { v };
            mask |= 1u64 << bit;
            v += step;
        }
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn business_hours_expression() {
        let cron = CronExpr::parse("*/15 9-17 * * 1-5").unwrap();

        // Tuesday 2024-06-04.
        assert!(cron.matches(&utc(2024, 6, 4, 9, 0)));
        assert!(cron.matches(&utc(2024, 6, 4, 9, 15)));
        assert!(!cron.matches(&utc(2024, 6, 4, 9, 7)));
        assert!(!cron.matches(&utc(2024, 6, 4, 18, 0)));
        // Sunday 2024-06-02.
        assert!(!cron.matches(&utc(2024, 6, 2, 9, 0)));
    }

    #[test]
    fn sunday_is_zero_and_seven() {
        let zero = CronExpr::parse("0 0 * * 0").unwrap();
        let seven = CronExpr::parse("0 0 * * 7").unwrap();
        let sunday = utc(2024, 6, 2, 0, 0);
        assert!(zero.matches(&sunday));
        assert!(seven.matches(&sunday));
        assert_eq!(zero.days_of_week, seven.days_of_week);
    }

    #[test]
    fn lists_and_ranges_combine() {
        let cron = CronExpr::parse("0,30 1-3,5 * * *").unwrap();
        assert!(cron.matches(&utc(2024, 6, 4, 2, 30)));
        assert!(cron.matches(&utc(2024, 6, 4, 5, 0)));
        assert!(!cron.matches(&utc(2024, 6, 4, 4, 0)));
        assert!(!cron.matches(&utc(2024, 6, 4, 2, 15)));
    }

    #[test]
    fn stepped_range() {
        let cron = CronExpr::parse("10-30/10 * * * *").unwrap();
        assert!(cron.matches(&utc(2024, 6, 4, 0, 10)));
        assert!(cron.matches(&utc(2024, 6, 4, 0, 20)));
        assert!(cron.matches(&utc(2024, 6, 4, 0, 30)));
        assert!(!cron.matches(&utc(2024, 6, 4, 0, 15)));
        assert!(!cron.matches(&utc(2024, 6, 4, 0, 40)));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(CronExpr::parse("* * * *").is_err());
        assert!(CronExpr::parse("* * * * * *").is_err());
    }

    #[test]
    fn rejects_unparseable_fields() {
        assert!(CronExpr::parse("x * * * *").is_err());
        assert!(CronExpr::parse("0 25 * * *").is_err());
        assert!(CronExpr::parse("0 0 0 * *").is_err());
        assert!(CronExpr::parse("*/0 * * * *").is_err());
        assert!(CronExpr::parse("30-10 * * * *").is_err());
    }

    #[test]
    fn next_run_advances_to_match() {
        let cron = CronExpr::parse("30 3 * * *").unwrap();
        let next = cron.next_run_utc(utc(2024, 6, 4, 9, 0)).unwrap();
        assert_eq!(next, utc(2024, 6, 5, 3, 30));

        // Strictly after `from`, even when `from` itself matches.
        let next = cron.next_run_utc(utc(2024, 6, 4, 3, 30)).unwrap();
        assert_eq!(next, utc(2024, 6, 5, 3, 30));
    }

    #[test]
    fn next_run_respects_timezone_wall_clock() {
        let cron = CronExpr::parse("0 9 * * *").unwrap();
        let zone: chrono_tz::Tz = "America/New_York".parse().unwrap();
        let from = utc(2024, 6, 4, 0, 0).with_timezone(&zone);
        let next = cron.next_run(&from).unwrap();
        assert_eq!(next.hour(), 9);
        // 09:00 EDT is 13:00 UTC.
        assert_eq!(next.with_timezone(&Utc), utc(2024, 6, 4, 13, 0));
    }
}
