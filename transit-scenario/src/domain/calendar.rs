//! Calendar helpers: day-of-week indexing and service date ranges.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Day of the week, ordered Sunday first to match GTFS query fields.
///
/// Used as an index into fixed 7-element arrays rather than matching on
/// day names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// All days in index order.
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// The day of the week a date falls on.
    pub fn of(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_sunday() as usize]
    }

    /// Position in [`Weekday::ALL`] (Sunday = 0).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase English name, as used for GraphQL field aliases.
    pub fn name(self) -> &'static str {
        match self {
            Weekday::Sunday => "sunday",
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every date from `start` to `end`, inclusive. Empty if `end < start`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekday_of_known_dates() {
        assert_eq!(Weekday::of(date(2024, 8, 19)), Weekday::Monday);
        assert_eq!(Weekday::of(date(2024, 8, 25)), Weekday::Sunday);
        assert_eq!(Weekday::of(date(2024, 8, 24)), Weekday::Saturday);
    }

    #[test]
    fn index_matches_all_order() {
        for (i, day) in Weekday::ALL.iter().enumerate() {
            assert_eq!(day.index(), i);
        }
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Weekday::Wednesday).unwrap();
        assert_eq!(json, "\"wednesday\"");
    }

    #[test]
    fn range_is_inclusive() {
        let days = date_range(date(2024, 8, 19), date(2024, 8, 25));
        assert_eq!(days.len(), 7);
        assert_eq!(days.first(), Some(&date(2024, 8, 19)));
        assert_eq!(days.last(), Some(&date(2024, 8, 25)));
    }

    #[test]
    fn range_single_and_empty() {
        assert_eq!(date_range(date(2024, 1, 1), date(2024, 1, 1)).len(), 1);
        assert!(date_range(date(2024, 1, 2), date(2024, 1, 1)).is_empty());
    }
}
