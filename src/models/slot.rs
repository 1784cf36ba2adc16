use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A (date, time-label) pair from the daily grid: the unit of reservation.
///
/// Ordering is by date, then time, which gives conflict sets and boards a
/// stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    pub fn parse(date: &str, time: &str) -> anyhow::Result<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("invalid date: {date}"))?;
        Ok(Self {
            date,
            time: parse_time(time)?,
        })
    }

    /// The instant the slot starts, in shop-local time.
    pub fn instant(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
    Past,
}

/// Static grid configuration: ordered time labels per day and how many
/// candidate days (starting today) are offered.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    times: Vec<NaiveTime>,
    window_days: u32,
}

pub const DEFAULT_TIME_LABELS: &[&str] = &[
    "10:00", "10:30", "11:00", "11:30", "12:00", "12:30", "13:00", "13:30", "14:00", "14:30",
    "15:00", "15:30", "16:00", "16:30", "17:00", "17:30", "18:00", "18:30", "19:00", "19:30",
    "20:00", "20:30", "21:00",
];

impl SlotGrid {
    pub fn from_labels<S: AsRef<str>>(labels: &[S], window_days: u32) -> anyhow::Result<Self> {
        if labels.is_empty() {
            return Err(anyhow::anyhow!("slot grid needs at least one time label"));
        }
        if window_days == 0 {
            return Err(anyhow::anyhow!("booking window must be at least one day"));
        }

        let mut times = labels
            .iter()
            .map(|l| parse_time(l.as_ref().trim()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        times.sort();
        times.dedup();

        Ok(Self { times, window_days })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn contains(&self, time: &NaiveTime) -> bool {
        self.times.binary_search(time).is_ok()
    }

    /// Candidate days, `today` first.
    pub fn days(&self, today: NaiveDate) -> Vec<NaiveDate> {
        (0..self.window_days)
            .filter_map(|i| today.checked_add_days(Days::new(i as u64)))
            .collect()
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        let times = DEFAULT_TIME_LABELS
            .iter()
            .filter_map(|l| NaiveTime::parse_from_str(l, "%H:%M").ok())
            .collect();
        Self {
            times,
            window_days: 7,
        }
    }
}

pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}

/// Serializes a `NaiveTime` as its `HH:MM` grid label.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
