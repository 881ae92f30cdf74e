//! Per-station feature aggregation
//!
//! Left-aggregates charge sessions onto stations over a trailing window.
//! Every station yields a row, with zero aggregates when it has no
//! qualifying sessions. A session qualifies when it started on or after the
//! cutoff and has a recorded end.

use crate::models::{ChargeSession, Station, StationStats, UNKNOWN_NEIGHBORHOOD};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

/// Default length of the trailing window
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// Start of the trailing window ending at `now`
pub fn cutoff(now: NaiveDateTime, window_days: u32) -> NaiveDateTime {
    now - Duration::days(window_days as i64)
}

/// Builds [`StationStats`] rows from raw station and session history
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    window_days: u32,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS)
    }
}

#[derive(Default)]
struct Accumulator {
    count: u32,
    duration_sum: f64,
    energy_sum: f64,
    energy_count: u32,
}

impl FeatureBuilder {
    pub fn new(window_days: u32) -> Self {
        Self { window_days }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// True if the session counts toward the window ending at `now`
    pub fn qualifies(&self, session: &ChargeSession, now: NaiveDateTime) -> bool {
        session.started_at >= cutoff(now, self.window_days) && session.ended_at.is_some()
    }

    /// Aggregate sessions per station. Rows come back ordered by station id.
    pub fn build(
        &self,
        stations: &[Station],
        sessions: &[ChargeSession],
        now: NaiveDateTime,
    ) -> Vec<StationStats> {
        let mut acc: BTreeMap<i32, Accumulator> = stations
            .iter()
            .map(|s| (s.station_id, Accumulator::default()))
            .collect();

        for session in sessions {
            if !self.qualifies(session, now) {
                continue;
            }
            // Sessions of stations we do not know about are dropped
            let Some(entry) = acc.get_mut(&session.station_id) else {
                continue;
            };
            let Some(ended_at) = session.ended_at else {
                continue;
            };
            entry.count += 1;
            entry.duration_sum += whole_minutes(session.started_at, ended_at) as f64;
            if let Some(energy) = session.energy_kwh {
                entry.energy_sum += energy;
                entry.energy_count += 1;
            }
        }

        let mut rows: Vec<StationStats> = stations
            .iter()
            .map(|station| {
                let a = &acc[&station.station_id];
                StationStats {
                    station_id: station.station_id,
                    power_kw: station.power_kw,
                    neighborhood: normalize_neighborhood(station.neighborhood.as_deref()),
                    session_count: a.count,
                    avg_duration_min: mean(a.duration_sum, a.count),
                    avg_energy_kwh: mean(a.energy_sum, a.energy_count),
                    window_days: self.window_days,
                }
            })
            .collect();
        rows.sort_by_key(|r| r.station_id);
        rows.dedup_by_key(|r| r.station_id);
        rows
    }
}

/// Map a missing neighborhood code onto the sentinel category
pub fn normalize_neighborhood(code: Option<&str>) -> String {
    code.unwrap_or(UNKNOWN_NEIGHBORHOOD).to_string()
}

/// Minutes between two timestamps, truncated toward zero
fn whole_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_minutes()
}

fn mean(sum: f64, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn now() -> NaiveDateTime {
        at(30, 12, 0)
    }

    fn station(id: i32, nil: Option<&str>) -> Station {
        Station {
            station_id: id,
            power_kw: 22.0,
            neighborhood: nil.map(str::to_string),
        }
    }

    fn session(
        id: i32,
        station_id: i32,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        energy: Option<f64>,
    ) -> ChargeSession {
        ChargeSession {
            session_id: id,
            station_id,
            started_at: start,
            ended_at: end,
            energy_kwh: energy,
        }
    }

    #[test]
    fn test_station_without_sessions_has_zero_aggregates() {
        let builder = FeatureBuilder::default();
        let rows = builder.build(&[station(7, Some("Duomo"))], &[], now());

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.session_count, 0);
        assert_eq!(row.avg_duration_min, 0.0);
        assert_eq!(row.avg_energy_kwh, 0.0);
        assert_eq!(row.avg_daily_sessions(), 0.0);
    }

    #[test]
    fn test_averages_over_completed_sessions() {
        let builder = FeatureBuilder::default();
        let sessions = vec![
            session(1, 1, at(10, 8, 0), Some(at(10, 8, 30)), Some(10.0)),
            session(2, 1, at(11, 9, 0), Some(at(11, 10, 0)), Some(20.0)),
        ];
        let rows = builder.build(&[station(1, Some("Brera"))], &sessions, now());

        assert_eq!(rows[0].session_count, 2);
        assert!((rows[0].avg_duration_min - 45.0).abs() < 1e-9);
        assert!((rows[0].avg_energy_kwh - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_session_never_contributes() {
        let builder = FeatureBuilder::default();
        let sessions = vec![
            session(1, 1, at(29, 8, 0), None, Some(99.0)),
            session(2, 1, at(20, 8, 0), Some(at(20, 8, 20)), Some(5.0)),
        ];
        let rows = builder.build(&[station(1, None)], &sessions, now());

        assert_eq!(rows[0].session_count, 1);
        assert!((rows[0].avg_duration_min - 20.0).abs() < 1e-9);
        assert!((rows[0].avg_energy_kwh - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_sessions_before_cutoff_are_excluded() {
        let builder = FeatureBuilder::new(10);
        let sessions = vec![
            // 10 days before now exactly: on the cutoff, qualifies
            session(1, 1, at(20, 12, 0), Some(at(20, 13, 0)), Some(1.0)),
            // One minute earlier: excluded
            session(2, 1, at(20, 11, 59), Some(at(20, 13, 0)), Some(1.0)),
        ];
        let rows = builder.build(&[station(1, None)], &sessions, now());
        assert_eq!(rows[0].session_count, 1);
        assert_eq!(rows[0].window_days, 10);
    }

    #[test]
    fn test_missing_energy_excluded_from_energy_average_only() {
        let builder = FeatureBuilder::default();
        let sessions = vec![
            session(1, 1, at(10, 8, 0), Some(at(10, 8, 10)), None),
            session(2, 1, at(10, 9, 0), Some(at(10, 9, 30)), Some(8.0)),
        ];
        let rows = builder.build(&[station(1, None)], &sessions, now());
        assert_eq!(rows[0].session_count, 2);
        assert!((rows[0].avg_duration_min - 20.0).abs() < 1e-9);
        assert!((rows[0].avg_energy_kwh - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_truncates_to_whole_minutes() {
        let builder = FeatureBuilder::default();
        let start = at(10, 8, 0);
        let end = start + Duration::seconds(59 * 60 + 59);
        let rows = builder.build(
            &[station(1, None)],
            &[session(1, 1, start, Some(end), Some(1.0))],
            now(),
        );
        assert_eq!(rows[0].avg_duration_min, 59.0);
    }

    #[test]
    fn test_null_neighborhood_maps_to_sentinel() {
        let builder = FeatureBuilder::default();
        let rows = builder.build(
            &[station(2, None), station(1, Some("Isola")), station(3, Some(""))],
            &[],
            now(),
        );
        let nils: Vec<_> = rows.iter().map(|r| r.neighborhood.as_str()).collect();
        assert_eq!(nils, vec!["Isola", UNKNOWN_NEIGHBORHOOD, ""]);
        let ids: Vec<_> = rows.iter().map(|r| r.station_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_sessions_of_unknown_stations_ignored() {
        let builder = FeatureBuilder::default();
        let rows = builder.build(
            &[station(1, None)],
            &[session(1, 42, at(10, 8, 0), Some(at(10, 9, 0)), Some(1.0))],
            now(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_count, 0);
    }
}
