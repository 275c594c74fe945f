//! Weekday tokens, day sets and time modes as they appear on the wire.
//!
//! Day tokens are the three-letter abbreviations `MON` … `SUN`. Parsing is
//! case-insensitive but otherwise exact: `"mon"` is Monday, `"MONDAY"` and
//! `"MO"` are rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    /// All days in weekday order, Monday first.
    pub const ALL: [Day; 7] = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Day::Mon => "MON",
            Day::Tue => "TUE",
            Day::Wed => "WED",
            Day::Thu => "THU",
            Day::Fri => "FRI",
            Day::Sat => "SAT",
            Day::Sun => "SUN",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Day {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::ALL
            .into_iter()
            .find(|d| d.token().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnknownDay(s.to_string()))
    }
}

impl TryFrom<String> for Day {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Day> for &'static str {
    fn from(day: Day) -> Self {
        day.token()
    }
}

impl From<Weekday> for Day {
    fn from(w: Weekday) -> Self {
        Day::ALL[w.num_days_from_monday() as usize]
    }
}

impl From<Day> for Weekday {
    fn from(day: Day) -> Self {
        match day {
            Day::Mon => Weekday::Mon,
            Day::Tue => Weekday::Tue,
            Day::Wed => Weekday::Wed,
            Day::Thu => Weekday::Thu,
            Day::Fri => Weekday::Fri,
            Day::Sat => Weekday::Sat,
            Day::Sun => Weekday::Sun,
        }
    }
}

/// A set of weekdays. Iterates Monday first regardless of insertion order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DaySet(u8);

impl DaySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn single(day: Day) -> Self {
        Self(day.bit())
    }

    pub fn insert(&mut self, day: Day) {
        self.0 |= day.bit();
    }

    pub fn remove(&mut self, day: Day) {
        self.0 &= !day.bit();
    }

    pub fn contains(&self, day: Day) -> bool {
        self.0 & day.bit() != 0
    }

    /// Copy of this set minus `day`.
    pub fn without(mut self, day: Day) -> Self {
        self.remove(day);
        self
    }

    pub fn union(self, other: DaySet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Day> + '_ {
        Day::ALL.into_iter().filter(|d| self.contains(*d))
    }

    /// Wire tokens in weekday order.
    pub fn tokens(&self) -> Vec<String> {
        self.iter().map(|d| d.token().to_string()).collect()
    }

    /// Parse wire tokens. Duplicates collapse; any unknown token fails the whole list.
    pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ProtocolError> {
        tokens.iter().map(|t| t.as_ref().parse::<Day>()).collect()
    }
}

impl FromIterator<Day> for DaySet {
    fn from_iter<I: IntoIterator<Item = Day>>(iter: I) -> Self {
        let mut set = DaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Debug for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().join(","))
    }
}

impl Serialize for DaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for DaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let days = Vec::<Day>::deserialize(deserializer)?;
        Ok(days.into_iter().collect())
    }
}

/// How a command's fire time is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeMode {
    /// Wall-clock time carried in the `time` field.
    Absolute,
    /// Signed minutes from sunrise carried in `offsetMinutes`.
    Sunrise,
    /// Signed minutes from sunset carried in `offsetMinutes`.
    Sunset,
}

impl TimeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeMode::Absolute => "ABSOLUTE",
            TimeMode::Sunrise => "SUNRISE",
            TimeMode::Sunset => "SUNSET",
        }
    }
}

impl FromStr for TimeMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [TimeMode::Absolute, TimeMode::Sunrise, TimeMode::Sunset]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnknownMode(s.to_string()))
    }
}

/// Wire form of an absolute time: always `HH:MM:SS`.
pub fn format_clock_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Accepts `HH:MM:SS` and `HH:MM`.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime, ProtocolError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| ProtocolError::InvalidTime(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_tokens_are_case_insensitive() {
        assert_eq!("mon".parse::<Day>().unwrap(), Day::Mon);
        assert_eq!("Wed".parse::<Day>().unwrap(), Day::Wed);
        assert_eq!("SUN".parse::<Day>().unwrap(), Day::Sun);
    }

    #[test]
    fn day_tokens_require_exact_abbreviation() {
        assert!("MONDAY".parse::<Day>().is_err());
        assert!("MO".parse::<Day>().is_err());
        assert!(" MON".parse::<Day>().is_err());
        assert_eq!(
            "TUESDAY".parse::<Day>().unwrap_err(),
            ProtocolError::UnknownDay("TUESDAY".to_string())
        );
    }

    #[test]
    fn day_set_iterates_in_weekday_order() {
        let set: DaySet = [Day::Fri, Day::Mon, Day::Wed].into_iter().collect();
        assert_eq!(set.tokens(), vec!["MON", "WED", "FRI"]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_string(), "MON,WED,FRI");
    }

    #[test]
    fn without_removes_only_that_day() {
        let set: DaySet = [Day::Mon, Day::Wed].into_iter().collect();
        let rest = set.without(Day::Wed);
        assert_eq!(rest, DaySet::single(Day::Mon));
        assert!(set.contains(Day::Wed), "original set is untouched");
        assert!(DaySet::single(Day::Sat).without(Day::Sat).is_empty());
    }

    #[test]
    fn parse_tokens_rejects_any_bad_token() {
        let ok = DaySet::parse_tokens(&["mon", "MON", "tue"]).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(DaySet::parse_tokens(&["MON", "FUNDAY"]).is_err());
    }

    #[test]
    fn weekday_conversions_agree() {
        for day in Day::ALL {
            let weekday: Weekday = day.into();
            assert_eq!(Day::from(weekday), day);
        }
    }

    #[test]
    fn clock_time_accepts_short_form() {
        let t = parse_clock_time("07:30").unwrap();
        assert_eq!(format_clock_time(t), "07:30:00");
        assert!(parse_clock_time("25:00:00").is_err());
        assert!(parse_clock_time("seven").is_err());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("sunset".parse::<TimeMode>().unwrap(), TimeMode::Sunset);
        assert!("NOON".parse::<TimeMode>().is_err());
    }
}
