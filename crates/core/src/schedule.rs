//! Region schedule snapshots from the routing peer and the per-dispatch index built from them.
//!
//! A snapshot lists, per service date, every shift team's route and the stops on it. Read paths
//! only care about a handful of dispatch ids, so [`ScheduleSnapshotIndex`] keeps just those.
//! Indexes live for one request and are never persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One routing-peer snapshot for a service region (market).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSchedule {
    /// Ordered by service date; the first entry is today's.
    pub date_schedules: Vec<DateSchedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSchedule {
    pub service_date: Option<NaiveDate>,
    pub shift_teams: Vec<ShiftTeamSchedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftTeamSchedule {
    pub shift_team_id: i64,
    pub stops: Vec<RouteStop>,
}

/// A stop on a shift team's route. Rest breaks and other non-visit stops carry no dispatch id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStop {
    pub dispatch_id: Option<i64>,
    pub arrival_sec: Option<i64>,
    pub complete_sec: Option<i64>,
    pub phase: Option<RouteVisitPhase>,
}

/// Routing peer's view of where a routed visit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteVisitPhase {
    Uncommitted,
    Committed,
    EnRoute,
    OnScene,
    Complete,
    #[serde(other)]
    Unknown,
}

/// Estimates for one dispatch record taken from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareRequestSchedule {
    pub dispatch_id: i64,
    pub shift_team_id: i64,
    pub service_date: Option<NaiveDate>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub phase: Option<RouteVisitPhase>,
}

/// Lookup from dispatch id to its routed estimates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSnapshotIndex {
    by_dispatch: HashMap<i64, CareRequestSchedule>,
}

impl ScheduleSnapshotIndex {
    /// Scans every date, shift team and stop of `snapshot`, keeping stops whose dispatch id is
    /// in `interest`. When a dispatch id appears more than once the earliest date wins.
    pub fn build(snapshot: &RegionSchedule, interest: &HashSet<i64>) -> Self {
        let mut by_dispatch = HashMap::new();
        if interest.is_empty() {
            return Self { by_dispatch };
        }

        for date_schedule in &snapshot.date_schedules {
            for shift_team in &date_schedule.shift_teams {
                for stop in &shift_team.stops {
                    let Some(dispatch_id) = stop.dispatch_id else {
                        continue;
                    };
                    if !interest.contains(&dispatch_id) {
                        continue;
                    }
                    by_dispatch
                        .entry(dispatch_id)
                        .or_insert_with(|| CareRequestSchedule {
                            dispatch_id,
                            shift_team_id: shift_team.shift_team_id,
                            service_date: date_schedule.service_date,
                            estimated_arrival: stop.arrival_sec.and_then(from_unix),
                            estimated_completion: stop.complete_sec.and_then(from_unix),
                            phase: stop.phase,
                        });
                }
            }
        }

        Self { by_dispatch }
    }

    pub fn get(&self, dispatch_id: i64) -> Option<&CareRequestSchedule> {
        self.by_dispatch.get(&dispatch_id)
    }

    pub fn estimated_arrival(&self, dispatch_id: i64) -> Option<DateTime<Utc>> {
        self.get(dispatch_id).and_then(|s| s.estimated_arrival)
    }

    pub fn len(&self) -> usize {
        self.by_dispatch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dispatch.is_empty()
    }

    pub fn into_map(self) -> HashMap<i64, CareRequestSchedule> {
        self.by_dispatch
    }
}

/// Finds the shift team routed to `dispatch_id` on the snapshot's first (today's) date.
///
/// Later dates are ignored: a visit can only be committed to a team that is working today.
pub fn first_scheduled_shift_team(snapshot: &RegionSchedule, dispatch_id: i64) -> Option<i64> {
    let today = snapshot.date_schedules.first()?;
    today
        .shift_teams
        .iter()
        .find(|team| {
            team.stops
                .iter()
                .any(|stop| stop.dispatch_id == Some(dispatch_id))
        })
        .map(|team| team.shift_team_id)
}

fn from_unix(sec: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(sec, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(dispatch_id: i64, arrival: i64, complete: i64, phase: RouteVisitPhase) -> RouteStop {
        RouteStop {
            dispatch_id: Some(dispatch_id),
            arrival_sec: Some(arrival),
            complete_sec: Some(complete),
            phase: Some(phase),
        }
    }

    fn snapshot() -> RegionSchedule {
        RegionSchedule {
            date_schedules: vec![
                DateSchedule {
                    service_date: NaiveDate::from_ymd_opt(1938, 1, 10),
                    shift_teams: vec![
                        ShiftTeamSchedule {
                            shift_team_id: 1,
                            stops: vec![
                                RouteStop::default(),
                                stop(101, 1_000, 5_000, RouteVisitPhase::Committed),
                            ],
                        },
                        ShiftTeamSchedule {
                            shift_team_id: 2,
                            stops: vec![stop(102, 2_000, 6_000, RouteVisitPhase::EnRoute)],
                        },
                    ],
                },
                DateSchedule {
                    service_date: NaiveDate::from_ymd_opt(1906, 4, 28),
                    shift_teams: vec![ShiftTeamSchedule {
                        shift_team_id: 3,
                        stops: vec![
                            stop(103, 3_000, 7_000, RouteVisitPhase::Uncommitted),
                            stop(101, 9_000, 9_500, RouteVisitPhase::Uncommitted),
                        ],
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_build_keeps_only_interesting_dispatches() {
        let interest: HashSet<i64> = [101, 103, 555].into_iter().collect();
        let index = ScheduleSnapshotIndex::build(&snapshot(), &interest);

        assert_eq!(index.len(), 2);
        assert!(index.get(102).is_none());
        assert!(index.get(555).is_none());

        let third = index.get(103).unwrap();
        assert_eq!(third.shift_team_id, 3);
        assert_eq!(third.service_date, NaiveDate::from_ymd_opt(1906, 4, 28));
        assert_eq!(third.phase, Some(RouteVisitPhase::Uncommitted));
        assert_eq!(
            third.estimated_completion,
            DateTime::<Utc>::from_timestamp(7_000, 0)
        );
    }

    #[test]
    fn test_build_prefers_earliest_date_for_repeated_dispatch() {
        let interest: HashSet<i64> = [101].into_iter().collect();
        let index = ScheduleSnapshotIndex::build(&snapshot(), &interest);

        let first = index.get(101).unwrap();
        assert_eq!(first.shift_team_id, 1);
        assert_eq!(
            index.estimated_arrival(101),
            DateTime::<Utc>::from_timestamp(1_000, 0)
        );
    }

    #[test]
    fn test_build_with_empty_snapshot_or_interest() {
        let interest: HashSet<i64> = [101].into_iter().collect();
        assert!(ScheduleSnapshotIndex::build(&RegionSchedule::default(), &interest).is_empty());
        assert!(ScheduleSnapshotIndex::build(&snapshot(), &HashSet::new()).is_empty());
    }

    #[test]
    fn test_first_scheduled_shift_team_matches_today() {
        assert_eq!(first_scheduled_shift_team(&snapshot(), 102), Some(2));
        assert_eq!(first_scheduled_shift_team(&snapshot(), 101), Some(1));
    }

    #[test]
    fn test_first_scheduled_shift_team_ignores_later_dates() {
        assert_eq!(first_scheduled_shift_team(&snapshot(), 103), None);

        let mut later_only = snapshot();
        later_only.date_schedules.insert(0, DateSchedule::default());
        assert_eq!(first_scheduled_shift_team(&later_only, 102), None);
    }

    #[test]
    fn test_first_scheduled_shift_team_empty_snapshot() {
        assert_eq!(first_scheduled_shift_team(&RegionSchedule::default(), 1), None);
    }

    #[test]
    fn test_unknown_phase_deserialises() {
        let phase: RouteVisitPhase = serde_json::from_str("\"teleporting\"").unwrap();
        assert_eq!(phase, RouteVisitPhase::Unknown);
    }
}
