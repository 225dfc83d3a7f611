//! Request and response bodies for the REST surface.
//!
//! Time windows travel as unix seconds; conversions into core types validate them.

use caremanager_core::gateways::DispatchRecord;
use caremanager_core::{
    AvailabilityWindow, CanScheduleOutcome, DateAvailability, DispatchUpdatePush,
    DispatchVisitPush, PushedPatient, ReconcileOutcome, ScheduleVisitRequest, Visit,
    VisitListElement, VisitResult, VisitStatusGroup, VisitView,
};
use caremanager_core::validation::require_window;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start_timestamp_sec: i64,
    pub end_timestamp_sec: i64,
}

impl TimeWindow {
    pub fn into_window(self) -> VisitResult<AvailabilityWindow> {
        require_window(self.start_timestamp_sec, self.end_timestamp_sec)
    }
}

impl From<AvailabilityWindow> for TimeWindow {
    fn from(window: AvailabilityWindow) -> Self {
        Self {
            start_timestamp_sec: window.start.timestamp(),
            end_timestamp_sec: window.end.timestamp(),
        }
    }
}

fn group_name(group: VisitStatusGroup) -> &'static str {
    match group {
        VisitStatusGroup::Active => "active",
        VisitStatusGroup::Upcoming => "upcoming",
        VisitStatusGroup::Past => "past",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisitRes {
    pub id: i64,
    pub episode_id: i64,
    pub dispatch_id: Option<i64>,
    pub status: Option<String>,
    /// One of `active`, `upcoming` or `past`.
    pub status_group: String,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub patient_availability: Option<TimeWindow>,
    pub car_id: Option<i64>,
    pub provider_user_ids: Vec<i64>,
    pub created_by_user_id: Option<i64>,
    pub updated_by_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Visit> for VisitRes {
    fn from(visit: Visit) -> Self {
        let status_group = group_name(visit.status_group()).to_string();
        Self {
            id: visit.id,
            episode_id: visit.episode_id,
            dispatch_id: visit.dispatch_id,
            status: visit.status,
            status_group,
            status_updated_at: visit.status_updated_at,
            patient_availability: visit.patient_availability.map(TimeWindow::from),
            car_id: visit.car_id,
            provider_user_ids: visit.provider_user_ids,
            created_by_user_id: visit.created_by_user_id,
            updated_by_user_id: visit.updated_by_user_id,
            created_at: visit.created_at,
            updated_at: visit.updated_at,
        }
    }
}

impl From<VisitView> for VisitRes {
    fn from(view: VisitView) -> Self {
        view.visit.into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EpisodeVisitRes {
    pub visit: VisitRes,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub shift_team_id: Option<i64>,
    pub is_scheduling_in_progress: bool,
}

impl From<VisitListElement> for EpisodeVisitRes {
    fn from(element: VisitListElement) -> Self {
        Self {
            visit: element.visit.into(),
            estimated_arrival: element.estimated_arrival,
            shift_team_id: element.schedule.map(|s| s.shift_team_id),
            is_scheduling_in_progress: element.is_scheduling_in_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListEpisodeVisitsRes {
    pub visits: Vec<EpisodeVisitRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateVisitStatusReq {
    /// `on_route`, `on_scene`, `complete`, `committed` or `archived`.
    pub status: String,
    pub acting_user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateVisitEpisodeReq {
    pub episode_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScheduleVisitReq {
    pub dispatch_id: i64,
    pub episode_id: i64,
    pub patient_availability: TimeWindow,
    pub acting_user_id: i64,
}

impl ScheduleVisitReq {
    pub fn into_request(self) -> VisitResult<ScheduleVisitRequest> {
        Ok(ScheduleVisitRequest {
            dispatch_id: self.dispatch_id,
            episode_id: self.episode_id,
            window: self.patient_availability.into_window()?,
            acting_user_id: self.acting_user_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CanScheduleVisitReq {
    pub dispatch_id: i64,
    pub patient_availability: TimeWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CanScheduleVisitRes {
    pub can_schedule: bool,
    /// `schedulable`, `advanced_care_unavailable` or `time_slot_unavailable`.
    pub reason: String,
}

impl From<CanScheduleOutcome> for CanScheduleVisitRes {
    fn from(outcome: CanScheduleOutcome) -> Self {
        let reason = match outcome {
            CanScheduleOutcome::Schedulable => "schedulable",
            CanScheduleOutcome::AdvancedCareUnavailable => "advanced_care_unavailable",
            CanScheduleOutcome::TimeSlotUnavailable => "time_slot_unavailable",
        };
        Self {
            can_schedule: outcome.can_schedule(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisitAvailabilityReq {
    pub dispatch_id: i64,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DateAvailabilityRes {
    pub date: NaiveDate,
    pub is_available: bool,
}

impl From<DateAvailability> for DateAvailabilityRes {
    fn from(value: DateAvailability) -> Self {
        Self {
            date: value.date,
            is_available: value.is_available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisitAvailabilityRes {
    pub availability: Vec<DateAvailabilityRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CancelVisitReq {
    pub dispatch_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PushedPatientReq {
    pub first_name: String,
    pub last_name: String,
    pub medical_record_number: String,
}

/// A dispatch record pushed by the booking peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateVisitFromDispatchReq {
    pub dispatch_id: i64,
    pub original_dispatch_id: Option<i64>,
    pub source_dispatch_id: Option<i64>,
    pub market_id: i64,
    pub service_line_id: i64,
    pub status: String,
    pub status_updated_at: DateTime<Utc>,
    pub patient_availability: Option<TimeWindow>,
    pub car_id: Option<i64>,
    #[serde(default)]
    pub provider_user_ids: Vec<i64>,
    pub created_by_user_id: Option<i64>,
    pub patient: PushedPatientReq,
}

impl CreateVisitFromDispatchReq {
    pub fn into_push(self) -> VisitResult<DispatchVisitPush> {
        let patient_availability = self
            .patient_availability
            .map(TimeWindow::into_window)
            .transpose()?;
        Ok(DispatchVisitPush {
            dispatch_id: self.dispatch_id,
            original_dispatch_id: self.original_dispatch_id,
            source_dispatch_id: self.source_dispatch_id,
            market_id: self.market_id,
            service_line_id: self.service_line_id,
            status: self.status,
            status_updated_at: self.status_updated_at,
            patient_availability,
            car_id: self.car_id,
            provider_user_ids: self.provider_user_ids,
            created_by_user_id: self.created_by_user_id,
            patient: PushedPatient {
                first_name: self.patient.first_name,
                last_name: self.patient.last_name,
                medical_record_number: self.patient.medical_record_number,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateVisitFromDispatchRes {
    pub visit: VisitRes,
    /// `original_dispatch`, `duplicate_of` or `create_new`.
    pub resolved_by: String,
    pub created_episode_id: Option<i64>,
    pub patient_id: Option<i64>,
}

impl From<ReconcileOutcome> for CreateVisitFromDispatchRes {
    fn from(outcome: ReconcileOutcome) -> Self {
        use caremanager_core::EpisodeResolution;
        let resolved_by = match outcome.resolved_by {
            EpisodeResolution::OriginalDispatch => "original_dispatch",
            EpisodeResolution::DuplicateOf => "duplicate_of",
            EpisodeResolution::CreateNew => "create_new",
        };
        Self {
            visit: outcome.visit.into(),
            resolved_by: resolved_by.to_string(),
            created_episode_id: outcome.created_episode.map(|e| e.id),
            patient_id: outcome.patient.map(|p| p.id),
        }
    }
}

/// A change to a dispatch record pushed by the booking peer. Omitted fields keep their stored
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateVisitFromDispatchReq {
    pub dispatch_id: i64,
    pub status: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub patient_availability: Option<TimeWindow>,
    pub car_id: Option<i64>,
    pub provider_user_ids: Option<Vec<i64>>,
    pub updated_by_user_id: Option<i64>,
    pub service_line_id: Option<i64>,
    pub original_dispatch_id: Option<i64>,
}

impl UpdateVisitFromDispatchReq {
    pub fn into_push(self) -> VisitResult<DispatchUpdatePush> {
        let patient_availability = self
            .patient_availability
            .map(TimeWindow::into_window)
            .transpose()?;
        Ok(DispatchUpdatePush {
            dispatch_id: self.dispatch_id,
            status: self.status,
            status_updated_at: self.status_updated_at,
            patient_availability,
            car_id: self.car_id,
            provider_user_ids: self.provider_user_ids,
            updated_by_user_id: self.updated_by_user_id,
            service_line_id: self.service_line_id,
            original_dispatch_id: self.original_dispatch_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateLatestVisitRes {
    /// Id of the new dispatch record.
    pub dispatch_id: i64,
}

impl From<DispatchRecord> for DuplicateLatestVisitRes {
    fn from(record: DispatchRecord) -> Self {
        Self {
            dispatch_id: record.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn visit(status: Option<&str>) -> Visit {
        let now = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
        Visit {
            id: 1,
            episode_id: 2,
            dispatch_id: Some(42),
            status: status.map(str::to_string),
            status_updated_at: Some(now),
            patient_availability: Some(
                AvailabilityWindow::from_unix_seconds(1_677_672_000, 1_677_675_600).unwrap(),
            ),
            car_id: None,
            provider_user_ids: vec![501],
            created_by_user_id: Some(5),
            updated_by_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_visit_res_carries_group_and_window_seconds() {
        let res = VisitRes::from(visit(Some("on_scene")));
        assert_eq!(res.status_group, "active");
        assert_eq!(
            res.patient_availability,
            Some(TimeWindow {
                start_timestamp_sec: 1_677_672_000,
                end_timestamp_sec: 1_677_675_600,
            })
        );

        assert_eq!(VisitRes::from(visit(None)).status_group, "past");
        assert_eq!(VisitRes::from(visit(Some("requested"))).status_group, "upcoming");
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let window = TimeWindow {
            start_timestamp_sec: 200,
            end_timestamp_sec: 100,
        };
        assert!(window.into_window().is_err());
    }

    #[test]
    fn test_push_request_decodes_without_providers() {
        let req: CreateVisitFromDispatchReq = serde_json::from_value(serde_json::json!({
            "dispatch_id": 42,
            "original_dispatch_id": null,
            "source_dispatch_id": null,
            "market_id": 159,
            "service_line_id": 9,
            "status": "requested",
            "status_updated_at": "2023-03-01T12:00:00Z",
            "patient_availability": null,
            "car_id": null,
            "created_by_user_id": null,
            "patient": {"first_name": "Evelyn", "last_name": "Boyd", "medical_record_number": "MRN-1"}
        }))
        .unwrap();
        let push = req.into_push().unwrap();
        assert!(push.provider_user_ids.is_empty());
        assert_eq!(push.patient.medical_record_number, "MRN-1");
    }

    #[test]
    fn test_update_push_request_keeps_omitted_fields_absent() {
        let req: UpdateVisitFromDispatchReq = serde_json::from_value(serde_json::json!({
            "dispatch_id": 42,
            "status": "archived",
            "patient_availability": {"start_timestamp_sec": 100, "end_timestamp_sec": 200}
        }))
        .unwrap();
        let push = req.into_push().unwrap();
        assert_eq!(push.status.as_deref(), Some("archived"));
        assert_eq!(push.provider_user_ids, None);
        assert_eq!(push.service_line_id, None);
        assert_eq!(push.patient_availability.unwrap().end.timestamp(), 200);

        let inverted = UpdateVisitFromDispatchReq {
            dispatch_id: 42,
            patient_availability: Some(TimeWindow {
                start_timestamp_sec: 200,
                end_timestamp_sec: 100,
            }),
            ..UpdateVisitFromDispatchReq::default()
        };
        assert!(inverted.into_push().is_err());
    }

    #[test]
    fn test_can_schedule_reason() {
        let res = CanScheduleVisitRes::from(CanScheduleOutcome::TimeSlotUnavailable);
        assert!(!res.can_schedule);
        assert_eq!(res.reason, "time_slot_unavailable");
        assert!(CanScheduleVisitRes::from(CanScheduleOutcome::Schedulable).can_schedule);
    }
}
