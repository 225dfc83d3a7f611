//! Persisted care manager rows and the payloads used to create or change them.

use crate::error::{VisitError, VisitResult};
use crate::status::VisitStatusGroup;
use caremanager_types::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scheduled or attended clinical encounter.
///
/// At most one visit exists per non-null `dispatch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub episode_id: i64,
    /// Booking-peer dispatch record this visit mirrors. Absent for visits created before any
    /// dispatch record exists, such as phone-call visits.
    pub dispatch_id: Option<i64>,
    pub status: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub patient_availability: Option<AvailabilityWindow>,
    pub car_id: Option<i64>,
    pub provider_user_ids: Vec<i64>,
    pub created_by_user_id: Option<i64>,
    pub updated_by_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn status_group(&self) -> VisitStatusGroup {
        VisitStatusGroup::from_status(self.status.as_deref())
    }
}

/// Fields of a visit row to insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewVisit {
    pub episode_id: i64,
    pub dispatch_id: Option<i64>,
    pub status: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub patient_availability: Option<AvailabilityWindow>,
    pub car_id: Option<i64>,
    pub provider_user_ids: Vec<i64>,
    pub created_by_user_id: Option<i64>,
}

/// A status change to persist after the booking peer accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitStatusUpdate {
    pub visit_id: i64,
    pub status: String,
    /// `None` leaves the stored providers untouched.
    pub provider_user_ids: Option<Vec<i64>>,
    pub updated_by_user_id: i64,
    pub updated_at: DateTime<Utc>,
}

/// Fields the booking peer reported for the visit mirroring a dispatch record. `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitDispatchUpdate {
    pub dispatch_id: i64,
    pub status: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub patient_availability: Option<AvailabilityWindow>,
    pub car_id: Option<i64>,
    pub provider_user_ids: Option<Vec<i64>>,
    pub updated_by_user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeUpdate {
    pub service_line_id: Option<i64>,
    pub original_dispatch_id: Option<i64>,
}

/// The clinical spell that owns one or more visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub patient_id: i64,
    pub market_id: i64,
    pub service_line_id: i64,
    /// Dispatch record the episode was opened from; later pushes that reference it as their
    /// original dispatch join this episode.
    pub original_dispatch_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisode {
    pub market_id: i64,
    pub service_line_id: i64,
    pub original_dispatch_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// External EHR medical record number; unique across patients.
    pub medical_record_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub medical_record_number: NonEmptyText,
}

/// A half-open time range during which the patient can receive the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> VisitResult<Self> {
        if end <= start {
            return Err(VisitError::InvalidArgument(format!(
                "availability window end {end} must be after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Builds a window from unix seconds, as carried on the wire.
    pub fn from_unix_seconds(start_sec: i64, end_sec: i64) -> VisitResult<Self> {
        let start = DateTime::<Utc>::from_timestamp(start_sec, 0).ok_or_else(|| {
            VisitError::InvalidArgument(format!("invalid availability start {start_sec}"))
        })?;
        let end = DateTime::<Utc>::from_timestamp(end_sec, 0).ok_or_else(|| {
            VisitError::InvalidArgument(format!("invalid availability end {end_sec}"))
        })?;
        Self::new(start, end)
    }
}
