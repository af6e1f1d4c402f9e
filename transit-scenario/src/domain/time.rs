//! GTFS time-of-day handling.
//!
//! GTFS departure times are "HH:MM:SS" strings measured from local midnight
//! of the service day. Hours may run past 23: a trip leaving at "25:30:00"
//! belongs to the previous service day but departs at 01:30 on the clock.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds in one day.
pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Error returned when parsing an invalid GTFS time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid GTFS time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A GTFS time of day, stored as seconds since the service day's midnight.
///
/// # Examples
///
/// ```
/// use transit_scenario::domain::GtfsTime;
///
/// let t = GtfsTime::parse("25:30:00").unwrap();
/// assert_eq!(t.seconds(), 91_800);
/// assert_eq!(t.hour_of_day(), 1);
/// assert_eq!(t.to_string(), "25:30:00");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GtfsTime(u32);

impl GtfsTime {
    /// Create a time from seconds since midnight.
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    /// Create a time from hour, minute and second components.
    ///
    /// Hours above 23 are allowed.
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Self {
        Self(hour * 3600 + minute * 60 + second)
    }

    /// Parse an "HH:MM:SS" string.
    ///
    /// The hour field may have one or more digits and may exceed 23.
    /// Minutes and seconds must be two digits in 0-59.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_scenario::domain::GtfsTime;
    ///
    /// assert!(GtfsTime::parse("05:00:00").is_ok());
    /// assert!(GtfsTime::parse("5:00:00").is_ok());
    /// assert!(GtfsTime::parse("27:59:59").is_ok());
    ///
    /// assert!(GtfsTime::parse("05:00").is_err());
    /// assert!(GtfsTime::parse("05:60:00").is_err());
    /// assert!(GtfsTime::parse("aa:00:00").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.trim().split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TimeError::new("expected HH:MM:SS format"));
        };

        if h.is_empty() || h.len() > 3 || !h.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::new("invalid hour digits"));
        }
        let hour: u32 = h
            .parse()
            .map_err(|_| TimeError::new("invalid hour digits"))?;

        let minute =
            parse_two_digits(m.as_bytes()).ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        let second =
            parse_two_digits(sec.as_bytes()).ok_or_else(|| TimeError::new("invalid second digits"))?;
        if second > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }

        Ok(Self::from_hms(hour, minute, second))
    }

    /// Seconds since the service day's midnight (may exceed one day).
    pub fn seconds(&self) -> u32 {
        self.0
    }

    /// Clock hour (0-23) this time falls in, wrapping after-midnight
    /// service back onto the 24-hour clock.
    pub fn hour_of_day(&self) -> usize {
        ((self.0 % SECONDS_PER_DAY) / 3600) as usize
    }
}

impl fmt::Debug for GtfsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GtfsTime({self})")
    }
}

impl fmt::Display for GtfsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.0 / 3600;
        let m = (self.0 % 3600) / 60;
        let s = self.0 % 60;
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}

impl Serialize for GtfsTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GtfsTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GtfsTime::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse two ASCII digits into a number.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = bytes[0].checked_sub(b'0').filter(|&d| d <= 9)?;
    let d2 = bytes[1].checked_sub(b'0').filter(|&d| d <= 9)?;
    Some((d1 * 10 + d2) as u32)
}
