//! Time windows, window division, and named-range resolution.

use crate::CoreError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TimeWindow: half-open [start, end)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawWindow> for TimeWindow {
    type Error = CoreError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        TimeWindow::new(raw.start, raw.end)
    }
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if start >= end {
            return Err(CoreError::invalid_argument(format!(
                "window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Millisecond RFC 3339 form expected by the remote service.
    pub fn wire_start(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn wire_end(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.wire_start(), self.wire_end())
    }
}

// ---------------------------------------------------------------------------
// TimeRange: named (resolved later) or custom
// ---------------------------------------------------------------------------

/// The time range a query is evaluated over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeRange {
    /// A relative range understood by the remote service, e.g. `LAST_24_HOURS`.
    Named(String),
    /// An explicit window.
    Custom(TimeWindow),
}

impl TimeRange {
    pub fn named(name: impl Into<String>) -> Self {
        TimeRange::Named(name.into())
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, TimeRange::Custom(_))
    }

    /// Resolve to concrete instants, consulting `resolver` only for named ranges.
    pub fn resolve(&self, resolver: &dyn WindowResolver) -> Result<TimeWindow, CoreError> {
        match self {
            TimeRange::Custom(window) => Ok(*window),
            TimeRange::Named(name) => resolver.resolve_named_range(name),
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::Named("LAST_24_HOURS".into())
    }
}

// ---------------------------------------------------------------------------
// Window Divider
// ---------------------------------------------------------------------------

/// How to partition a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    /// Split into this many sub-windows of (approximately) equal length.
    Slots(u32),
    /// Split into sub-windows of this length; the last one is truncated to `end`.
    Delta(Duration),
}

/// Partition `[start, end)` into ordered, contiguous, non-empty sub-windows.
pub fn divide(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    division: Division,
) -> Result<Vec<TimeWindow>, CoreError> {
    let window = TimeWindow::new(start, end)?;
    match division {
        Division::Slots(slots) => divide_slots(window, slots),
        Division::Delta(delta) => divide_delta(window, delta),
    }
}

fn divide_slots(window: TimeWindow, slots: u32) -> Result<Vec<TimeWindow>, CoreError> {
    if slots < 1 {
        return Err(CoreError::invalid_argument("slots must be at least 1"));
    }

    // Microsecond grid; boundaries are rounded down so every slot stays non-empty.
    let total_us = window
        .duration()
        .num_microseconds()
        .ok_or_else(|| CoreError::invalid_argument("window too large to divide"))?
        as i128;
    let slots = (slots as i128).min(total_us.max(1));

    let mut windows = Vec::with_capacity(slots as usize);
    let mut cursor = window.start;
    for i in 1..=slots {
        let next = if i == slots {
            window.end
        } else {
            window.start + Duration::microseconds((total_us * i / slots) as i64)
        };
        windows.push(TimeWindow {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    Ok(windows)
}

fn divide_delta(window: TimeWindow, delta: Duration) -> Result<Vec<TimeWindow>, CoreError> {
    if delta <= Duration::zero() {
        return Err(CoreError::invalid_argument("delta must be positive"));
    }

    let mut windows = Vec::new();
    let mut cursor = window.start;
    while cursor < window.end {
        let next = cursor
            .checked_add_signed(delta)
            .map_or(window.end, |n| n.min(window.end));
        windows.push(TimeWindow {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    Ok(windows)
}

/// Parse a compact duration such as `"90s"`, `"2h"`, `"1d"` or `"1h30m"`.
pub fn parse_delta(text: &str) -> Result<Duration, CoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_argument("empty delta"));
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if ch.is_whitespace() {
            continue;
        }
        let amount: i64 = digits
            .parse()
            .map_err(|_| CoreError::invalid_argument(format!("invalid delta: {text}")))?;
        digits.clear();
        let step = match ch {
            's' => Duration::try_seconds(amount),
            'm' => Duration::try_minutes(amount),
            'h' => Duration::try_hours(amount),
            'd' => Duration::try_days(amount),
            'w' => Duration::try_weeks(amount),
            other => {
                return Err(CoreError::invalid_argument(format!(
                    "invalid delta unit '{other}' in {text}"
                )))
            }
        };
        total = step
            .and_then(|step| total.checked_add(&step))
            .ok_or_else(|| CoreError::invalid_argument(format!("delta {text} is out of range")))?;
    }

    if !digits.is_empty() {
        return Err(CoreError::invalid_argument(format!(
            "delta {text} is missing a unit"
        )));
    }
    if total <= Duration::zero() {
        return Err(CoreError::invalid_argument("delta must be positive"));
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Named range resolution
// ---------------------------------------------------------------------------

/// Resolves caller-relative range names to concrete instants.
pub trait WindowResolver: Send + Sync {
    fn resolve_named_range(&self, name: &str) -> Result<TimeWindow, CoreError>;
}

/// Calendar-based resolver anchored on a fixed or live "now".
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarResolver {
    now: Option<DateTime<Utc>>,
}

impl CalendarResolver {
    /// Resolve relative to the system clock at call time.
    pub fn system() -> Self {
        Self { now: None }
    }

    /// Resolve relative to a fixed instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

fn midnight(date: NaiveDate) -> Result<DateTime<Utc>, CoreError> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| CoreError::invalid_argument(format!("no midnight for {date}")))
}

fn first_of_month(year: i32, month: u32) -> Result<DateTime<Utc>, CoreError> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::invalid_argument(format!("invalid month {year}-{month}")))?;
    midnight(date)
}

impl WindowResolver for CalendarResolver {
    fn resolve_named_range(&self, name: &str) -> Result<TimeWindow, CoreError> {
        let now = self.now();
        let today = midnight(now.date_naive())?;
        let week_start = today - Duration::days(now.weekday().num_days_from_monday() as i64);
        let month_start = first_of_month(now.year(), now.month())?;

        let (start, end) = match name {
            "LAST_MINUTE" => (now - Duration::minutes(1), now),
            "LAST_10_MINUTES" => (now - Duration::minutes(10), now),
            "LAST_30_MINUTES" => (now - Duration::minutes(30), now),
            "LAST_HOUR" => (now - Duration::hours(1), now),
            "CURRENT_DAY" => (today, now),
            "PREVIOUS_DAY" => (today - Duration::days(1), today),
            "LAST_24_HOURS" => (now - Duration::hours(24), now),
            "LAST_2_DAYS" => (now - Duration::days(2), now),
            "LAST_3_DAYS" => (now - Duration::days(3), now),
            "CURRENT_WEEK" => (week_start, now),
            "PREVIOUS_WEEK" => (week_start - Duration::weeks(1), week_start),
            "CURRENT_MONTH" => (month_start, now),
            "PREVIOUS_MONTH" => {
                let (year, month) = if now.month() == 1 {
                    (now.year() - 1, 12)
                } else {
                    (now.year(), now.month() - 1)
                };
                (first_of_month(year, month)?, month_start)
            }
            "CURRENT_YEAR" => (first_of_month(now.year(), 1)?, now),
            "PREVIOUS_YEAR" => (
                first_of_month(now.year() - 1, 1)?,
                first_of_month(now.year(), 1)?,
            ),
            other => return Err(CoreError::UnsupportedRange(other.to_string())),
        };

        TimeWindow::new(start, end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
