//! Service level tiers.

use serde::{Deserialize, Serialize};

/// Trips required over a list of clock hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCriterion {
    /// Clock hours (0-23), in evaluation order. Order matters for the
    /// route-level rule, which checks `min_tph` in the last hour only.
    pub hours: Vec<usize>,
    pub min_tph: u32,
    pub min_total: u32,
}

impl HourCriterion {
    pub fn new(hours: impl Into<Vec<usize>>, min_tph: u32, min_total: u32) -> Self {
        Self {
            hours: hours.into(),
            min_tph,
            min_total,
        }
    }
}

/// Minimum departures at a stop over a pair of clock hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightSegment {
    pub hours: [usize; 2],
    pub min_total: u32,
}

/// A named tier and the criteria a stop must meet to be in it.
///
/// A stop qualifies when it is in every set contributed by a configured
/// criterion. A tier with no criteria contains no stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLevelConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<HourCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<HourCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekend: Option<HourCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_segments: Option<Vec<NightSegment>>,
    /// Minimum distinct trips per route-direction over the whole day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any: Option<u32>,
}

const MIDDAY: [usize; 8] = [9, 10, 11, 12, 13, 14, 15, 16];
const SHOULDERS: [usize; 8] = [6, 7, 8, 17, 18, 19, 20, 21];
const ALL_NIGHT: [usize; 24] = [
    5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 0, 1, 2, 3, 4,
];

fn night_segments(min_total: u32) -> Vec<NightSegment> {
    [[23, 0], [1, 2], [3, 4], [2, 3]]
        .into_iter()
        .map(|hours| NightSegment { hours, min_total })
        .collect()
}

impl ServiceLevelConfig {
    /// A tier with no criteria.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peak: None,
            extended: None,
            weekend: None,
            night_segments: None,
            any: None,
        }
    }

    pub fn with_peak(mut self, criterion: HourCriterion) -> Self {
        self.peak = Some(criterion);
        self
    }

    pub fn with_extended(mut self, criterion: HourCriterion) -> Self {
        self.extended = Some(criterion);
        self
    }

    pub fn with_weekend(mut self, criterion: HourCriterion) -> Self {
        self.weekend = Some(criterion);
        self
    }

    pub fn with_night_segments(mut self, segments: Vec<NightSegment>) -> Self {
        self.night_segments = Some(segments);
        self
    }

    pub fn with_any(mut self, min_trips: u32) -> Self {
        self.any = Some(min_trips);
        self
    }

    pub fn has_criteria(&self) -> bool {
        self.peak.is_some()
            || self.extended.is_some()
            || self.weekend.is_some()
            || self.night_segments.is_some()
            || self.any.is_some()
    }

    /// The WSDOT frequency-of-service tiers, strongest first.
    pub fn wsdot_levels() -> Vec<ServiceLevelConfig> {
        vec![
            Self::new("level1")
                .with_peak(HourCriterion::new(MIDDAY, 4, 40))
                .with_extended(HourCriterion::new(SHOULDERS, 3, 32))
                .with_weekend(HourCriterion::new(MIDDAY, 3, 32))
                .with_night_segments(night_segments(0)),
            Self::new("level2")
                .with_peak(HourCriterion::new(MIDDAY, 3, 32))
                .with_extended(HourCriterion::new(SHOULDERS, 1, 16))
                .with_weekend(HourCriterion::new(MIDDAY, 1, 16)),
            Self::new("level3")
                .with_peak(HourCriterion::new(MIDDAY, 1, 16))
                .with_extended(HourCriterion::new(SHOULDERS, 0, 8))
                .with_weekend(HourCriterion::new(MIDDAY, 0, 8)),
            Self::new("level4").with_peak(HourCriterion::new(MIDDAY, 0, 8)),
            Self::new("level5").with_any(6),
            Self::new("level6").with_any(2),
            Self::new("levelNights")
                .with_peak(HourCriterion::new(ALL_NIGHT, 0, 4))
                .with_night_segments(night_segments(1)),
            Self::new("levelAll").with_any(1),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wsdot_tiers_in_order() {
        let names: Vec<_> = ServiceLevelConfig::wsdot_levels().into_iter().map(|l| l.name).collect();
        assert_eq!(
            names,
            ["level1", "level2", "level3", "level4", "level5", "level6", "levelNights", "levelAll"]
        );
    }

    #[test]
    fn level1_thresholds() {
        let level1 = &ServiceLevelConfig::wsdot_levels()[0];
        let peak = level1.peak.as_ref().unwrap();
        assert_eq!(peak.hours, MIDDAY);
        assert_eq!((peak.min_tph, peak.min_total), (4, 40));
        assert_eq!(level1.night_segments.as_ref().unwrap().len(), 4);
        assert!(level1.any.is_none());
    }

    #[test]
    fn night_tier_covers_every_hour() {
        let nights = ServiceLevelConfig::wsdot_levels()
            .into_iter()
            .find(|l| l.name == "levelNights")
            .unwrap();
        let mut hours = nights.peak.unwrap().hours;
        assert_eq!(hours.last(), Some(&4));
        hours.sort_unstable();
        assert_eq!(hours, (0..24).collect::<Vec<_>>());
    }

    #[test]
    fn empty_tier_has_no_criteria() {
        assert!(!ServiceLevelConfig::new("custom").has_criteria());
        assert!(ServiceLevelConfig::new("custom").with_any(3).has_criteria());
    }

    #[test]
    fn deserializes_custom_tier() {
        let level: ServiceLevelConfig = serde_json::from_str(
            r#"{"name":"custom","peak":{"hours":[7,8],"min_tph":2,"min_total":5},
                "night_segments":[{"hours":[23,0],"min_total":1}]}"#,
        )
        .unwrap();
        assert_eq!(level.peak.unwrap().hours, vec![7, 8]);
        assert_eq!(level.night_segments.unwrap()[0].hours, [23, 0]);
    }
}
