//! Booking peer contract.
//!
//! The booking peer owns dispatch records, their status, availability checks and service-line
//! assignment. Only the calls this crate needs are modelled here; the HTTP client lives in
//! `caremanager-peers`.

use crate::config::CoreConfig;
use crate::constants::{AVAILABILITY_STATUS_AVAILABLE, DISPATCH_STATUS_ARCHIVED};
use crate::error::{PeerError, VisitError, VisitResult};
use crate::models::AvailabilityWindow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Patient location in micro-degrees, as stored on the dispatch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchLocation {
    pub latitude_e6: i32,
    pub longitude_e6: i32,
}

impl DispatchLocation {
    pub fn latitude(&self) -> f64 {
        f64::from(self.latitude_e6) / 1e6
    }

    pub fn longitude(&self) -> f64 {
        f64::from(self.longitude_e6) / 1e6
    }
}

/// The dispatch record's current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatus {
    /// Booking-peer row id of this status entry; ETA windows are attached to it.
    pub id: i64,
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: i64,
    pub market_id: i64,
    pub location: Option<DispatchLocation>,
    pub current_status: Option<DispatchStatus>,
}

impl DispatchRecord {
    pub fn require_location(&self) -> VisitResult<DispatchLocation> {
        self.location.ok_or_else(|| {
            VisitError::FailedPrecondition(format!("dispatch {} has no location", self.id))
        })
    }

    pub fn require_status(&self) -> VisitResult<&DispatchStatus> {
        self.current_status.as_ref().ok_or_else(|| {
            VisitError::FailedPrecondition(format!("dispatch {} has no current status", self.id))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: i64,
    /// IANA time zone name, e.g. `America/Denver`.
    pub tz_name: String,
}

impl Market {
    pub fn time_zone(&self) -> VisitResult<Tz> {
        self.tz_name.parse::<Tz>().map_err(|_| {
            VisitError::Internal(format!(
                "market {} has unknown time zone {}",
                self.id, self.tz_name
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub id: i64,
    pub name: String,
}

/// What an availability probe asks about: a concrete window or a whole calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilitySlot {
    Window(AvailabilityWindow),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityQuery {
    pub dispatch_id: i64,
    pub market_id: i64,
    pub location: DispatchLocation,
    pub slot: AvailabilitySlot,
}

impl AvailabilityQuery {
    pub fn for_record(record: &DispatchRecord, slot: AvailabilitySlot) -> VisitResult<Self> {
        Ok(Self {
            dispatch_id: record.id,
            market_id: record.market_id,
            location: record.require_location()?,
            slot,
        })
    }
}

/// Availability answer from the booking peer.
///
/// The peer has a growing list of "limited" and "unavailable" variants; only the exact
/// `available` value allows scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityStatus(pub String);

impl AvailabilityStatus {
    pub fn is_available(&self) -> bool {
        self.0 == AVAILABILITY_STATUS_AVAILABLE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A remote status change for a dispatch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStatusUpdate {
    pub status: String,
    pub shift_team_id: Option<i64>,
    pub comment: Option<String>,
}

impl DispatchStatusUpdate {
    /// Builds an update, attaching the configured cancellation comment when archiving.
    pub fn new(status: &str, shift_team_id: Option<i64>, config: &CoreConfig) -> Self {
        let comment = (status == DISPATCH_STATUS_ARCHIVED)
            .then(|| config.cancellation_comment().to_string());
        Self {
            status: status.to_string(),
            shift_team_id,
            comment,
        }
    }
}

/// Estimated arrival window, expressed in the market's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtaWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl EtaWindow {
    pub fn in_zone(window: &AvailabilityWindow, tz: Tz) -> Self {
        Self {
            start: window.start.with_timezone(&tz),
            end: window.end.with_timezone(&tz),
        }
    }

    /// Calendar date the visit is assigned to, in market local time.
    pub fn assignment_date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

#[async_trait]
pub trait BookingGateway: Send + Sync {
    async fn get_dispatch_record(&self, dispatch_id: i64) -> Result<DispatchRecord, PeerError>;

    async fn get_market(&self, market_id: i64) -> Result<Market, PeerError>;

    async fn get_possible_service_lines(
        &self,
        dispatch_id: i64,
    ) -> Result<Vec<ServiceLine>, PeerError>;

    /// Idempotent on the peer side.
    async fn update_service_line(
        &self,
        dispatch_id: i64,
        service_line_id: i64,
        assignment_date: Option<NaiveDate>,
    ) -> Result<(), PeerError>;

    async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityStatus, PeerError>;

    async fn update_dispatch_status(
        &self,
        dispatch_id: i64,
        update: &DispatchStatusUpdate,
    ) -> Result<(), PeerError>;

    async fn upsert_eta_window(
        &self,
        dispatch_id: i64,
        dispatch_status_id: i64,
        window: &EtaWindow,
    ) -> Result<(), PeerError>;

    async fn get_shift_team_member_ids(&self, shift_team_id: i64) -> Result<Vec<i64>, PeerError>;

    /// Creates a copy of a dispatch record for a follow-up visit and returns the copy.
    async fn duplicate_dispatch(&self, dispatch_id: i64) -> Result<DispatchRecord, PeerError>;

    /// A dispatch record is eligible iff the advanced-care line is among its possible lines.
    async fn is_advanced_care_eligible(
        &self,
        dispatch_id: i64,
        service_line_name: &str,
    ) -> Result<bool, PeerError> {
        let lines = self.get_possible_service_lines(dispatch_id).await?;
        Ok(lines.iter().any(|line| line.name == service_line_name))
    }
}
