//! Free-text time specifications for reminders and alerts.
//!
//! Parses expressions such as "in 30 minutes", "at 3pm", "15:40 tomorrow",
//! "friday" or "2026-11-02 08:00" into a [`TriggerSpec`], and resolves a spec
//! to an absolute instant in the user's timezone.

use std::sync::OnceLock;

use chrono::{
    DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::TriggerError;
use crate::types::RecurringPattern;

/// When a trigger should fire, before resolution against "now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    /// Offset from now.
    Relative { minutes: i64 },
    /// Today at the given time, or tomorrow if already passed. `hour` is only
    /// absent for a bare "tomorrow", which uses the default hour.
    TimeOfDay {
        hour: Option<u32>,
        minute: u32,
        tomorrow: bool,
    },
    /// Next occurrence of the weekday, strictly after today.
    Weekday {
        weekday: Weekday,
        hour: Option<u32>,
        minute: u32,
    },
    /// A calendar date, at the default hour unless a time is given.
    Date {
        date: NaiveDate,
        hour: Option<u32>,
        minute: u32,
    },
    /// An absolute instant.
    At(DateTime<Utc>),
    /// A condition evaluated outside the scheduler.
    Condition(String),
}

struct SpecPatterns {
    minutes: Regex,
    hours: Regex,
    days: Regex,
    clock: Regex,
    date: Regex,
    weekday: Regex,
}

fn patterns() -> &'static SpecPatterns {
    static PATTERNS: OnceLock<SpecPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SpecPatterns {
        minutes: Regex::new(r"(\d+)\s*(?:minutes?|mins?)\b").expect("Invalid minutes regex"),
        hours: Regex::new(r"(\d+)\s*(?:hours?|hrs?)\b").expect("Invalid hours regex"),
        days: Regex::new(r"(\d+)\s*days?\b").expect("Invalid days regex"),
        clock: Regex::new(r"\b(\d{1,2}):(\d{2})\s*(am|pm)?\b|\b(\d{1,2})\s*(am|pm)\b")
            .expect("Invalid clock regex"),
        date: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("Invalid date regex"),
        weekday: Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
            .expect("Invalid weekday regex"),
    })
}

fn unparseable(input: &str) -> TriggerError {
    TriggerError::InvalidSpec(format!(
        "Couldn't parse time '{}'. Try: 'in 30 minutes', 'at 3pm', or 'at 15:40'",
        input.trim()
    ))
}

impl TriggerSpec {
    /// Parse a free-text time expression.
    pub fn parse(input: &str) -> Result<Self, TriggerError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(unparseable(input));
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(TriggerSpec::At(at.with_timezone(&Utc)));
        }

        let text = trimmed.to_lowercase();
        let p = patterns();
        let clock = parse_clock(p, &text)?;
        let (hour, minute) = match clock {
            Some((h, m)) => (Some(h), m),
            None => (None, 0),
        };

        if let Some(caps) = p.date.captures(&text) {
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().map_err(|_| unparseable(input))?,
                caps[2].parse().map_err(|_| unparseable(input))?,
                caps[3].parse().map_err(|_| unparseable(input))?,
            )
            .ok_or_else(|| TriggerError::InvalidSpec(format!("Invalid date in '{}'", trimmed)))?;
            return Ok(TriggerSpec::Date { date, hour, minute });
        }

        let relative = relative_minutes(p, &text).ok_or_else(|| too_far(trimmed))?;
        if relative > 0 {
            return Ok(TriggerSpec::Relative { minutes: relative });
        }

        if let Some(caps) = p.weekday.captures(&text) {
            let weekday: Weekday = caps[1].parse().map_err(|_| unparseable(input))?;
            return Ok(TriggerSpec::Weekday {
                weekday,
                hour,
                minute,
            });
        }

        let tomorrow = text.contains("tomorrow");
        if hour.is_some() || tomorrow {
            return Ok(TriggerSpec::TimeOfDay {
                hour,
                minute,
                tomorrow,
            });
        }

        Err(unparseable(input))
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, TriggerSpec::Condition(_))
    }

    /// Resolve to an absolute instant in `now`'s timezone.
    ///
    /// A condition resolves to `now`; its trigger is never fired by time.
    pub fn resolve(&self, now: DateTime<Tz>, default_hour: u32) -> Result<DateTime<Tz>, TriggerError> {
        let tz = now.timezone();
        let today = now.date_naive();
        match self {
            TriggerSpec::Relative { minutes } => {
                if *minutes <= 0 {
                    return Err(TriggerError::InvalidSpec(
                        "Relative offset must be positive".to_string(),
                    ));
                }
                Duration::try_minutes(*minutes)
                    .and_then(|offset| now.checked_add_signed(offset))
                    .ok_or_else(|| too_far(&format!("in {} minutes", minutes)))
            }
            TriggerSpec::TimeOfDay {
                hour,
                minute,
                tomorrow,
            } => {
                let hour = hour.unwrap_or(default_hour);
                let date = if *tomorrow { next_day(today)? } else { today };
                let target = local_at(&tz, date, hour, *minute)?;
                if !*tomorrow && target <= now {
                    return local_at(&tz, next_day(today)?, hour, *minute);
                }
                Ok(target)
            }
            TriggerSpec::Weekday {
                weekday,
                hour,
                minute,
            } => {
                let mut days_ahead = weekday.num_days_from_monday() as i64
                    - today.weekday().num_days_from_monday() as i64;
                if days_ahead <= 0 {
                    days_ahead += 7;
                }
                let date = today
                    .checked_add_days(Days::new(days_ahead as u64))
                    .ok_or_else(|| TriggerError::InvalidSpec("Date out of range".to_string()))?;
                local_at(&tz, date, hour.unwrap_or(default_hour), *minute)
            }
            TriggerSpec::Date { date, hour, minute } => {
                let target = local_at(&tz, *date, hour.unwrap_or(default_hour), *minute)?;
                if target <= now {
                    return Err(TriggerError::InvalidSpec(format!(
                        "{} is in the past",
                        target.format("%Y-%m-%d %H:%M")
                    )));
                }
                Ok(target)
            }
            TriggerSpec::At(at) => {
                let target = at.with_timezone(&tz);
                if target <= now {
                    return Err(TriggerError::InvalidSpec(format!(
                        "{} is in the past",
                        target.format("%Y-%m-%d %H:%M")
                    )));
                }
                Ok(target)
            }
            TriggerSpec::Condition(_) => Ok(now),
        }
    }
}

fn parse_clock(p: &SpecPatterns, text: &str) -> Result<Option<(u32, u32)>, TriggerError> {
    if text.contains("noon") {
        return Ok(Some((12, 0)));
    }
    if text.contains("midnight") {
        return Ok(Some((0, 0)));
    }
    let Some(caps) = p.clock.captures(text) else {
        return Ok(None);
    };

    let (hour_str, minute, meridiem) = match (caps.get(1), caps.get(4)) {
        (Some(h), _) => (
            h.as_str(),
            caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(60)),
            caps.get(3).map(|m| m.as_str()),
        ),
        (None, Some(h)) => (h.as_str(), 0, caps.get(5).map(|m| m.as_str())),
        (None, None) => return Ok(None),
    };
    let mut hour: u32 = hour_str.parse().unwrap_or(99);

    let invalid = || TriggerError::InvalidSpec(format!("Invalid time of day in '{}'", text));
    match meridiem {
        Some(ampm) => {
            if !(1..=12).contains(&hour) {
                return Err(invalid());
            }
            if ampm == "pm" && hour != 12 {
                hour += 12;
            } else if ampm == "am" && hour == 12 {
                hour = 0;
            }
        }
        None if hour > 23 => return Err(invalid()),
        None => {}
    }
    if minute > 59 {
        return Err(invalid());
    }
    Ok(Some((hour, minute)))
}

/// Total offset in minutes, `None` when a number does not fit.
fn relative_minutes(p: &SpecPatterns, text: &str) -> Option<i64> {
    let capture = |re: &Regex, unit: i64| -> Option<i64> {
        match re.captures(text) {
            Some(c) => c[1].parse::<i64>().ok()?.checked_mul(unit),
            None => Some(0),
        }
    };
    let mut minutes = capture(&p.minutes, 1)?
        .checked_add(capture(&p.hours, 60)?)?
        .checked_add(capture(&p.days, 1440)?)?;
    if minutes == 0 {
        if text.contains("half an hour") {
            minutes = 30;
        } else if text.contains("an hour") || text.contains("one hour") {
            minutes = 60;
        }
    }
    Some(minutes)
}

fn too_far(input: &str) -> TriggerError {
    TriggerError::InvalidSpec(format!("Time '{}' is too far in the future", input))
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, TriggerError> {
    date.succ_opt()
        .ok_or_else(|| TriggerError::InvalidSpec("Date out of range".to_string()))
}

fn local_at(tz: &Tz, date: NaiveDate, hour: u32, minute: u32) -> Result<DateTime<Tz>, TriggerError> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| TriggerError::InvalidSpec(format!("Invalid time {:02}:{:02}", hour, minute)))?;
    localize(tz, naive)
}

/// Attach a timezone to a wall-clock time. Times inside a DST gap move
/// forward by an hour; ambiguous times take the earlier instant.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, TriggerError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .ok_or_else(|| TriggerError::InvalidSpec(format!("Nonexistent local time {}", naive)))
}

impl RecurringPattern {
    /// One step forward, keeping the wall-clock time.
    pub fn advance(&self, from: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let naive = from.naive_local();
        let next = match self {
            RecurringPattern::Daily => naive.checked_add_days(Days::new(1)),
            RecurringPattern::Weekly => naive.checked_add_days(Days::new(7)),
            RecurringPattern::Monthly => naive.checked_add_months(Months::new(1)),
        }?;
        localize(&from.timezone(), next).ok()
    }

    /// First occurrence after `previous` that is strictly later than `now`.
    pub fn next_after(&self, previous: DateTime<Tz>, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut next = self.advance(previous)?;
        // Bounded so a corrupt timestamp cannot spin forever.
        for _ in 0..10_000 {
            if next > now {
                return Some(next);
            }
            next = self.advance(next)?;
        }
        None
    }
}
