//! Weekly availability model.
//!
//! The tutor's recurring open hours are a mapping from weekday to an ordered,
//! non-overlapping list of time-of-day intervals. All comparisons happen in
//! minutes-of-day within the fixed application timezone, never in raw instant
//! arithmetic, so bookings behave identically on both sides of a DST switch.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default open hours applied when no availability has been configured.
pub const DEFAULT_DAY_START: TimeOfDay = TimeOfDay(7 * 60);
pub const DEFAULT_DAY_END: TimeOfDay = TimeOfDay(21 * 60);

/// A time of day in minutes since midnight, parsed from and rendered as
/// `"HH:MM"`.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Create from minutes since midnight. Values past 23:59 are rejected.
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes < 24 * 60 {
            Some(Self(minutes))
        } else {
            None
        }
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    /// Parse a strict `"HH:MM"` time pattern.
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return None;
        }
        if !bytes[..2].iter().chain(&bytes[3..]).all(u8::is_ascii_digit) {
            return None;
        }
        let hours: u16 = value[..2].parse().ok()?;
        let minutes: u16 = value[3..].parse().ok()?;
        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(Self(hours * 60 + minutes))
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid time of day: {}", s))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Weekday keys, serialized in lowercase to match the stored settings JSON.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

/// One open interval within a day. Invariant: `end > start`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyInterval {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// Weekly open hours: weekday to sorted, disjoint intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyAvailability(BTreeMap<Weekday, Vec<DailyInterval>>);

impl Default for WeeklyAvailability {
    /// Open every day of the week from 07:00 to 21:00.
    fn default() -> Self {
        let default_day = vec![DailyInterval {
            start: DEFAULT_DAY_START,
            end: DEFAULT_DAY_END,
        }];
        Self(
            Weekday::ALL
                .iter()
                .map(|day| (*day, default_day.clone()))
                .collect(),
        )
    }
}

impl WeeklyAvailability {
    /// An availability with no open hours at all; every candidate rejects.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a sanitized availability from untrusted JSON.
    ///
    /// Entries failing the time pattern or with `end <= start` are dropped,
    /// the surviving intervals are sorted by start and overlapping or
    /// touching runs are merged into minimal disjoint intervals.
    pub fn sanitize(raw: &serde_json::Value) -> Self {
        let mut days = BTreeMap::new();

        let Some(object) = raw.as_object() else {
            return Self(days);
        };

        for day in Weekday::ALL {
            let Some(entries) = object.get(day.as_str()).and_then(|v| v.as_array()) else {
                continue;
            };

            let mut intervals: Vec<DailyInterval> = entries
                .iter()
                .filter_map(|entry| {
                    let start = TimeOfDay::parse(entry.get("start")?.as_str()?)?;
                    let end = TimeOfDay::parse(entry.get("end")?.as_str()?)?;
                    (start < end).then_some(DailyInterval { start, end })
                })
                .collect();

            if intervals.is_empty() {
                continue;
            }

            intervals.sort_by_key(|interval| interval.start);
            days.insert(day, merge_overlapping(intervals));
        }

        Self(days)
    }

    pub fn day(&self, day: Weekday) -> &[DailyInterval] {
        self.0.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_day(&mut self, day: Weekday, intervals: Vec<DailyInterval>) {
        if intervals.is_empty() {
            self.0.remove(&day);
        } else {
            self.0.insert(day, intervals);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn merge_overlapping(intervals: Vec<DailyInterval>) -> Vec<DailyInterval> {
    let mut merged: Vec<DailyInterval> = Vec::with_capacity(intervals.len());

    for next in intervals {
        match merged.last_mut() {
            Some(current) if next.start <= current.end => {
                if next.end > current.end {
                    current.end = next.end;
                }
            }
            _ => merged.push(next),
        }
    }

    merged
}

/// Minutes since local midnight for an instant, in the given timezone.
pub fn minutes_of_day(instant: DateTime<Utc>, tz: Tz) -> u16 {
    let local = instant.with_timezone(&tz);
    (local.hour() * 60 + local.minute()) as u16
}

/// Check whether `[start, end]` is bookable under the given availability.
///
/// The interval must fall on a single calendar day in `tz` and be fully
/// contained within one of that weekday's configured intervals. A weekday
/// with no intervals rejects every candidate.
pub fn is_slot_within_availability(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    availability: &WeeklyAvailability,
    tz: Tz,
) -> bool {
    let local_start = start.with_timezone(&tz);
    let local_end = end.with_timezone(&tz);

    // No midnight-crossing lessons.
    if local_start.date_naive() != local_end.date_naive() {
        return false;
    }

    let day_intervals = availability.day(local_start.weekday().into());
    if day_intervals.is_empty() {
        return false;
    }

    let start_minutes = minutes_of_day(start, tz);
    let end_minutes = minutes_of_day(end, tz);

    day_intervals.iter().any(|interval| {
        start_minutes >= interval.start.minutes() && end_minutes <= interval.end.minutes()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zurich() -> Tz {
        chrono_tz::Europe::Zurich
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_time_of_day_parsing() {
        assert_eq!(TimeOfDay::parse("07:00").unwrap().minutes(), 420);
        assert_eq!(TimeOfDay::parse("23:59").unwrap().minutes(), 1439);
        assert!(TimeOfDay::parse("24:00").is_none());
        assert!(TimeOfDay::parse("7:00").is_none());
        assert!(TimeOfDay::parse("07:60").is_none());
        assert!(TimeOfDay::parse("0700").is_none());
        assert!(TimeOfDay::parse("ab:cd").is_none());
    }

    #[test]
    fn test_time_of_day_display() {
        assert_eq!(TimeOfDay::parse("07:05").unwrap().to_string(), "07:05");
    }

    #[test]
    fn test_sanitize_drops_malformed_entries() {
        let raw = json!({
            "monday": [
                { "start": "09:00", "end": "12:00" },
                { "start": "25:00", "end": "26:00" },
                { "start": "14:00", "end": "13:00" },
                { "start": "garbage" },
                42
            ],
            "holiday": [{ "start": "09:00", "end": "10:00" }]
        });

        let availability = WeeklyAvailability::sanitize(&raw);
        assert_eq!(
            availability.day(Weekday::Monday),
            &[DailyInterval {
                start: TimeOfDay::parse("09:00").unwrap(),
                end: TimeOfDay::parse("12:00").unwrap(),
            }]
        );
        assert!(availability.day(Weekday::Tuesday).is_empty());
    }

    #[test]
    fn test_sanitize_sorts_and_merges() {
        let raw = json!({
            "friday": [
                { "start": "15:00", "end": "18:00" },
                { "start": "08:00", "end": "10:00" },
                { "start": "09:30", "end": "11:00" },
                { "start": "11:00", "end": "12:00" }
            ]
        });

        let availability = WeeklyAvailability::sanitize(&raw);
        let friday = availability.day(Weekday::Friday);
        assert_eq!(friday.len(), 2);
        assert_eq!(friday[0].start.to_string(), "08:00");
        assert_eq!(friday[0].end.to_string(), "12:00");
        assert_eq!(friday[1].start.to_string(), "15:00");
        assert_eq!(friday[1].end.to_string(), "18:00");
    }

    #[test]
    fn test_sanitize_non_object_is_empty() {
        assert!(WeeklyAvailability::sanitize(&json!(null)).is_empty());
        assert!(WeeklyAvailability::sanitize(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_slot_within_default_availability() {
        let availability = WeeklyAvailability::default();
        // Tuesday 2026-06-09, 10:00-10:45 local (CEST = UTC+2).
        let start = utc(2026, 6, 9, 8, 0);
        let end = utc(2026, 6, 9, 8, 45);
        assert!(is_slot_within_availability(
            start,
            end,
            &availability,
            zurich()
        ));
    }

    #[test]
    fn test_slot_outside_open_hours() {
        let availability = WeeklyAvailability::default();
        // 22:00-22:45 local is past the 21:00 close.
        let start = utc(2026, 6, 9, 20, 0);
        let end = utc(2026, 6, 9, 20, 45);
        assert!(!is_slot_within_availability(
            start,
            end,
            &availability,
            zurich()
        ));
    }

    #[test]
    fn test_slot_ending_exactly_at_close_is_allowed() {
        let availability = WeeklyAvailability::default();
        // 20:15-21:00 local.
        let start = utc(2026, 6, 9, 18, 15);
        let end = utc(2026, 6, 9, 19, 0);
        assert!(is_slot_within_availability(
            start,
            end,
            &availability,
            zurich()
        ));
    }

    #[test]
    fn test_midnight_crossing_rejected() {
        let raw = json!({ "tuesday": [{ "start": "00:00", "end": "23:59" }],
                          "wednesday": [{ "start": "00:00", "end": "23:59" }] });
        let availability = WeeklyAvailability::sanitize(&raw);
        // 23:30 Tuesday to 00:15 Wednesday local.
        let start = utc(2026, 6, 9, 21, 30);
        let end = utc(2026, 6, 9, 22, 15);
        assert!(!is_slot_within_availability(
            start,
            end,
            &availability,
            zurich()
        ));
    }

    #[test]
    fn test_day_without_intervals_rejects_everything() {
        let raw = json!({ "monday": [{ "start": "07:00", "end": "21:00" }] });
        let availability = WeeklyAvailability::sanitize(&raw);
        // A Tuesday slot against Monday-only availability.
        let start = utc(2026, 6, 9, 8, 0);
        let end = utc(2026, 6, 9, 8, 45);
        assert!(!is_slot_within_availability(
            start,
            end,
            &availability,
            zurich()
        ));
    }

    #[test]
    fn test_dst_switch_uses_local_clock() {
        let availability = WeeklyAvailability::default();
        // Sunday 2026-03-29 is the CET -> CEST switch in Zurich; 10:00 local
        // that morning is 08:00 UTC. The local clock decides containment.
        let start = utc(2026, 3, 29, 8, 0);
        let end = utc(2026, 3, 29, 8, 45);
        let local = start.with_timezone(&zurich());
        assert_eq!(local.hour(), 10);
        assert!(is_slot_within_availability(
            start,
            end,
            &availability,
            zurich()
        ));
    }
}
