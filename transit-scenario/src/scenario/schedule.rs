//! Schedule query batching.
//!
//! Departures are fetched for up to `batch_size` stops and up to seven
//! consecutive dates per query. The query has one aliased field per weekday,
//! so seven consecutive dates never collide on a field.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{Departure, StopId, Weekday};

/// Dates of one query window, indexed by weekday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekDates([Option<NaiveDate>; 7]);

impl WeekDates {
    /// Place each date in its weekday slot. Later dates overwrite earlier
    /// ones on the same weekday.
    pub fn from_dates(dates: &[NaiveDate]) -> Self {
        let mut slots = [None; 7];
        for &date in dates {
            slots[Weekday::of(date).index()] = Some(date);
        }
        Self(slots)
    }

    pub fn get(&self, day: Weekday) -> Option<NaiveDate> {
        self.0[day.index()]
    }

    /// Set weekdays with their dates, Sunday first.
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, NaiveDate)> + '_ {
        Weekday::ALL
            .into_iter()
            .filter_map(|day| self.get(day).map(|date| (day, date)))
    }

    pub fn len(&self) -> usize {
        self.0.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One schedule query: a batch of stops over one week window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTask {
    pub stop_ids: Vec<StopId>,
    pub dates: WeekDates,
}

impl ScheduleTask {
    /// Variables for the stop-departures query.
    pub fn variables(&self) -> Value {
        let mut vars = Map::new();
        vars.insert("ids".to_string(), Value::from(self.stop_ids.clone()));
        for day in Weekday::ALL {
            let date = self.dates.get(day);
            vars.insert(
                day.name().to_string(),
                date.map_or(Value::Null, |d| Value::String(d.to_string())),
            );
            vars.insert(format!("include_{day}"), Value::Bool(date.is_some()));
        }
        Value::Object(vars)
    }

    /// Split a response into per-(stop, date) departure lists.
    ///
    /// Weekday fields the task did not request are ignored.
    pub fn collect(&self, response: StopDeparturesResponse) -> Vec<(StopId, NaiveDate, Vec<Departure>)> {
        let mut out = Vec::new();
        for mut row in response.stops {
            for (day, date) in self.dates.iter() {
                let departures = row.days.remove(&day).flatten().unwrap_or_default();
                out.push((row.id, date, departures));
            }
        }
        out
    }
}

/// Response of the stop-departures query.
#[derive(Debug, Default, Deserialize)]
pub struct StopDeparturesResponse {
    #[serde(default)]
    pub stops: Vec<StopDeparturesRow>,
}

#[derive(Debug, Deserialize)]
pub struct StopDeparturesRow {
    pub id: StopId,
    #[serde(flatten)]
    days: HashMap<Weekday, Option<Vec<Departure>>>,
}

/// Partition stops and dates into schedule tasks.
///
/// Stops are split into batches of `batch_size`, dates into runs of seven
/// consecutive days; every (stop batch, date run) pair is one task.
pub fn schedule_tasks(stop_ids: &[StopId], dates: &[NaiveDate], batch_size: usize) -> Vec<ScheduleTask> {
    let batch_size = batch_size.max(1);
    let mut tasks = Vec::new();
    for stops in stop_ids.chunks(batch_size) {
        for week in dates.chunks(7) {
            tasks.push(ScheduleTask {
                stop_ids: stops.to_vec(),
                dates: WeekDates::from_dates(week),
            });
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::date_range;
    use serde_json::json;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn partitions_stops_and_weeks() {
        let stops: Vec<i64> = (1..=250).collect();
        let dates = date_range(date(8, 1), date(8, 10));
        let tasks = schedule_tasks(&stops, &dates, 100);

        // 3 stop batches x 2 date windows
        assert_eq!(tasks.len(), 6);
        assert_eq!(tasks[0].stop_ids.len(), 100);
        assert_eq!(tasks[0].dates.len(), 7);
        assert_eq!(tasks[1].dates.len(), 3);
        assert_eq!(tasks[5].stop_ids.len(), 50);
    }

    #[test]
    fn no_stops_means_no_tasks() {
        assert!(schedule_tasks(&[], &[date(8, 1)], 100).is_empty());
        assert!(schedule_tasks(&[1], &[], 100).is_empty());
    }

    #[test]
    fn variables_include_only_set_days() {
        // 2024-08-19 is a Monday
        let task = ScheduleTask {
            stop_ids: vec![1, 2],
            dates: WeekDates::from_dates(&[date(8, 19), date(8, 20)]),
        };
        let vars = task.variables();
        assert_eq!(vars["ids"], json!([1, 2]));
        assert_eq!(vars["monday"], "2024-08-19");
        assert_eq!(vars["include_monday"], true);
        assert_eq!(vars["tuesday"], "2024-08-20");
        assert_eq!(vars["sunday"], Value::Null);
        assert_eq!(vars["include_sunday"], false);
    }

    #[test]
    fn collect_maps_weekday_fields_to_dates() {
        let task = ScheduleTask {
            stop_ids: vec![1],
            dates: WeekDates::from_dates(&[date(8, 19), date(8, 20)]),
        };
        let response: StopDeparturesResponse = serde_json::from_value(json!({
            "stops": [{
                "id": 1,
                "monday": [{"departure_time": "08:00:00", "trip": {"id": 5, "direction_id": 0, "route": {"id": 9}}}],
                "tuesday": null
            }]
        }))
        .unwrap();

        let rows = task.collect(response);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[0].1, date(8, 19));
        assert_eq!(rows[0].2.len(), 1);
        assert_eq!(rows[1].1, date(8, 20));
        assert!(rows[1].2.is_empty());
    }
}
