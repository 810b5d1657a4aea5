//! Availability resolution.
//!
//! Pure functions deciding whether an instant is bookable against an
//! account's weekly template and its blocked intervals. Nothing here performs
//! I/O or reads the clock; the reference instant `now` is always passed in.
//!
//! Malformed input never raises an error from [`is_bookable`]: an unknown
//! timezone, inverted or overlapping ranges, a weekday listed twice, an
//! inverted blocked interval or a non-positive duration all mean "not
//! bookable".

use crate::errors::BookingError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const MINUTES_PER_DAY: u16 = 24 * 60;
const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Wall-clock time of day with minute precision, `00:00` through `24:00`.
///
/// `24:00` is only meaningful as the end of a range and denotes the
/// following midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Midnight at the start of the day.
    pub const START_OF_DAY: ClockTime = ClockTime(0);

    /// Midnight at the end of the day (`24:00`).
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        (total <= MINUTES_PER_DAY).then_some(ClockTime(total))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    fn seconds(self) -> u32 {
        u32::from(self.0) * 60
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for ClockTime {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BookingError::BadRequest(format!("Invalid time of day '{}'", s));

        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = hour.parse().map_err(|_| invalid())?;
        let minute: u16 = minute.parse().map_err(|_| invalid())?;

        ClockTime::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Local-time window within one day. `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeRange {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// Parse a range from two `"HH:MM"` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, BookingError> {
        Ok(Self::new(start.parse()?, end.parse()?))
    }

    fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Bookable ranges for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub weekday: Weekday,
    pub ranges: Vec<TimeRange>,
}

/// Weekly availability template in an IANA timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub timezone: String,
    pub days: Vec<DayAvailability>,
}

impl WeeklyAvailability {
    /// Check the template and return its parsed timezone.
    ///
    /// Rejects an unknown timezone, a weekday listed twice, and ranges that
    /// are empty, inverted or overlap another range of the same day.
    pub fn validate(&self) -> Result<Tz, BookingError> {
        let tz: Tz = self.timezone.parse().map_err(|_| {
            BookingError::BadRequest(format!("Unknown timezone '{}'", self.timezone))
        })?;

        let mut seen = HashSet::new();
        for day in &self.days {
            if !seen.insert(day.weekday) {
                return Err(BookingError::BadRequest(format!(
                    "Weekday {} is listed more than once",
                    day.weekday
                )));
            }

            if let Some(range) = day.ranges.iter().find(|r| r.start >= r.end) {
                return Err(BookingError::BadRequest(format!(
                    "Range {}-{} on {} is empty or inverted",
                    range.start, range.end, day.weekday
                )));
            }

            let mut sorted = day.ranges.clone();
            sorted.sort_by_key(|r| r.start);
            if sorted
                .iter()
                .zip(sorted.iter().skip(1))
                .any(|(a, b)| a.overlaps(b))
            {
                return Err(BookingError::BadRequest(format!(
                    "Ranges on {} overlap",
                    day.weekday
                )));
            }
        }

        Ok(tz)
    }

    fn ranges_for(&self, weekday: Weekday) -> &[TimeRange] {
        self.days
            .iter()
            .find(|d| d.weekday == weekday)
            .map(|d| d.ranges.as_slice())
            .unwrap_or(&[])
    }
}

/// Absolute `[start, end)` range that overrides the weekly template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BlockedInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Decide whether `[instant, instant + duration)` can be booked.
///
/// The candidate must start no earlier than `now + min_notice`, fall wholly
/// within one range of the local weekday it starts on, and overlap none of
/// the blocked intervals. Blocked intervals win over the template.
pub fn is_bookable(
    template: &WeeklyAvailability,
    blocked: &[BlockedInterval],
    duration: Duration,
    min_notice: Duration,
    instant: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    if duration <= Duration::zero() || min_notice < Duration::zero() {
        return false;
    }

    let Ok(tz) = template.validate() else {
        return false;
    };

    if blocked.iter().any(BlockedInterval::is_inverted) {
        return false;
    }

    match now.checked_add_signed(min_notice) {
        Some(earliest) if instant >= earliest => {}
        _ => return false,
    }

    let Some(end) = instant.checked_add_signed(duration) else {
        return false;
    };

    if !within_template(template, tz, instant, end) {
        return false;
    }

    !blocked.iter().any(|b| b.overlaps(instant, end))
}

/// Whether `[start, end)` lies inside a single range of one local day.
fn within_template(
    template: &WeeklyAvailability,
    tz: Tz,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    let local_start = start.with_timezone(&tz);
    let local_end = end.with_timezone(&tz);
    let date = local_start.date_naive();

    let start_secs = local_start.num_seconds_from_midnight();
    let end_secs = if local_end.date_naive() == date {
        local_end.num_seconds_from_midnight()
    } else if Some(local_end.date_naive()) == date.succ_opt()
        && local_end.num_seconds_from_midnight() == 0
    {
        SECONDS_PER_DAY
    } else {
        return false;
    };

    if end_secs <= start_secs {
        return false;
    }

    template
        .ranges_for(date.weekday())
        .iter()
        .any(|r| r.start.seconds() <= start_secs && end_secs <= r.end.seconds())
}

/// Enumerate the bookable start instants of one local `date`.
///
/// Walks each range of the date's weekday in `step` increments and keeps the
/// starts accepted by [`is_bookable`]. Local times that do not exist on that
/// date (DST gaps) are skipped; ambiguous ones resolve to the earlier instant.
pub fn bookable_starts(
    template: &WeeklyAvailability,
    blocked: &[BlockedInterval],
    date: NaiveDate,
    duration: Duration,
    min_notice: Duration,
    now: DateTime<Utc>,
    step: Duration,
) -> Vec<DateTime<Utc>> {
    let Ok(tz) = template.validate() else {
        return Vec::new();
    };
    let step_secs = step.num_seconds();
    let duration_secs = duration.num_seconds();
    if step_secs <= 0 || duration_secs <= 0 {
        return Vec::new();
    }

    let mut ranges = template.ranges_for(date.weekday()).to_vec();
    ranges.sort_by_key(|r| r.start);

    let mut starts = Vec::new();
    for range in ranges {
        let range_end = i64::from(range.end.seconds());
        let mut offset = i64::from(range.start.seconds());

        while offset + duration_secs <= range_end {
            if let Some(candidate) = local_instant(tz, date, offset) {
                if is_bookable(template, blocked, duration, min_notice, candidate, now)
                    && starts.last() != Some(&candidate)
                {
                    starts.push(candidate);
                }
            }
            offset += step_secs;
        }
    }

    starts
}

fn local_instant(tz: Tz, date: NaiveDate, seconds_from_midnight: i64) -> Option<DateTime<Utc>> {
    let secs = u32::try_from(seconds_from_midnight).ok()?;
    let naive = date.and_hms_opt(secs / 3600, (secs % 3600) / 60, secs % 60)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
