//! Availability queries and the visit scheduling saga.
//!
//! Scheduling acts on the remote dispatch record first and only then materialises a local
//! visit. Remote steps are not compensated when a later step fails: the booking peer is the
//! source of truth and partial progress there is reported to the caller, not rolled back.

use crate::config::CoreConfig;
use crate::constants::DISPATCH_STATUS_ACCEPTED;
use crate::error::{StoreError, VisitError, VisitResult};
use crate::gateways::{
    AvailabilityQuery, AvailabilitySlot, BookingGateway, DispatchRecord, DispatchStatusUpdate,
    EtaWindow,
};
use crate::models::{AvailabilityWindow, NewVisit, Visit};
use crate::store::VisitStore;
use crate::validation::require_positive;
use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of [`AvailabilityService::can_schedule_visit`]. Negative answers are results, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanScheduleOutcome {
    Schedulable,
    AdvancedCareUnavailable,
    TimeSlotUnavailable,
}

impl CanScheduleOutcome {
    pub fn can_schedule(self) -> bool {
        self == CanScheduleOutcome::Schedulable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub is_available: bool,
}

/// Eligibility and slot probes against the booking peer. Stateless.
#[derive(Clone)]
pub struct AvailabilityService {
    booking: Arc<dyn BookingGateway>,
    config: CoreConfig,
}

impl AvailabilityService {
    pub fn new(booking: Arc<dyn BookingGateway>, config: CoreConfig) -> Self {
        Self { booking, config }
    }

    pub async fn can_schedule_visit(
        &self,
        dispatch_id: i64,
        window: AvailabilityWindow,
    ) -> VisitResult<CanScheduleOutcome> {
        let dispatch_id = require_positive("dispatch_id", dispatch_id)?;
        let record = self
            .booking
            .get_dispatch_record(dispatch_id)
            .await
            .map_err(VisitError::booking)?;
        self.assess(&record, window).await
    }

    /// Checks each requested date concurrently. Any failing probe fails the whole call and
    /// drops the probes still in flight.
    pub async fn get_visit_availability(
        &self,
        dispatch_id: i64,
        dates: &[NaiveDate],
    ) -> VisitResult<Vec<DateAvailability>> {
        let dispatch_id = require_positive("dispatch_id", dispatch_id)?;
        let record = self
            .booking
            .get_dispatch_record(dispatch_id)
            .await
            .map_err(VisitError::booking)?;

        if !self.is_eligible(record.id).await? {
            return Err(not_eligible(record.id));
        }
        self.assign_advanced_care(record.id, None).await?;

        let probes = dates.iter().map(|date| {
            let record = &record;
            async move {
                let query = AvailabilityQuery::for_record(record, AvailabilitySlot::Date(*date))?;
                let status = self
                    .booking
                    .check_availability(&query)
                    .await
                    .map_err(VisitError::booking)?;
                tracing::debug!(
                    dispatch_id = record.id,
                    %date,
                    availability = status.as_str(),
                    "date availability"
                );
                Ok::<_, VisitError>(DateAvailability {
                    date: *date,
                    is_available: status.is_available(),
                })
            }
        });

        try_join_all(probes).await
    }

    /// Like [`Self::can_schedule_visit`] but turns every negative answer into
    /// `FailedPrecondition`.
    pub(crate) async fn ensure_schedulable(
        &self,
        record: &DispatchRecord,
        window: AvailabilityWindow,
    ) -> VisitResult<()> {
        match self.assess(record, window).await? {
            CanScheduleOutcome::Schedulable => Ok(()),
            CanScheduleOutcome::AdvancedCareUnavailable => Err(not_eligible(record.id)),
            CanScheduleOutcome::TimeSlotUnavailable => Err(VisitError::FailedPrecondition(
                format!("cannot schedule visit for dispatch {}", record.id),
            )),
        }
    }

    pub(crate) async fn assign_advanced_care(
        &self,
        dispatch_id: i64,
        assignment_date: Option<NaiveDate>,
    ) -> VisitResult<()> {
        self.booking
            .update_service_line(
                dispatch_id,
                self.config.advanced_care_service_line_id(),
                assignment_date,
            )
            .await
            .map_err(VisitError::booking)
    }

    async fn assess(
        &self,
        record: &DispatchRecord,
        window: AvailabilityWindow,
    ) -> VisitResult<CanScheduleOutcome> {
        if !self.is_eligible(record.id).await? {
            return Ok(CanScheduleOutcome::AdvancedCareUnavailable);
        }
        self.assign_advanced_care(record.id, None).await?;

        let query = AvailabilityQuery::for_record(record, AvailabilitySlot::Window(window))?;
        let status = self
            .booking
            .check_availability(&query)
            .await
            .map_err(VisitError::booking)?;
        if !status.is_available() {
            tracing::info!(
                dispatch_id = record.id,
                availability = status.as_str(),
                "time slot unavailable"
            );
            return Ok(CanScheduleOutcome::TimeSlotUnavailable);
        }
        Ok(CanScheduleOutcome::Schedulable)
    }

    async fn is_eligible(&self, dispatch_id: i64) -> VisitResult<bool> {
        self.booking
            .is_advanced_care_eligible(dispatch_id, self.config.advanced_care_service_line_name())
            .await
            .map_err(VisitError::booking)
    }
}

fn not_eligible(dispatch_id: i64) -> VisitError {
    VisitError::FailedPrecondition(format!(
        "dispatch {dispatch_id} is not eligible for Advanced Care"
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleVisitRequest {
    pub dispatch_id: i64,
    pub episode_id: i64,
    pub window: AvailabilityWindow,
    pub acting_user_id: i64,
}

/// Drives a dispatch record through scheduling and materialises its local visit.
#[derive(Clone)]
pub struct SchedulingOrchestrator {
    store: Arc<dyn VisitStore>,
    booking: Arc<dyn BookingGateway>,
    availability: AvailabilityService,
}

impl SchedulingOrchestrator {
    pub fn new(
        store: Arc<dyn VisitStore>,
        booking: Arc<dyn BookingGateway>,
        config: CoreConfig,
    ) -> Self {
        let availability = AvailabilityService::new(booking.clone(), config);
        Self {
            store,
            booking,
            availability,
        }
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    pub async fn schedule_visit(&self, request: ScheduleVisitRequest) -> VisitResult<Visit> {
        let dispatch_id = require_positive("dispatch_id", request.dispatch_id)?;
        let episode_id = require_positive("episode_id", request.episode_id)?;
        let acting_user_id = require_positive("acting_user_id", request.acting_user_id)?;

        if self.store.get_episode(episode_id).await?.is_none() {
            return Err(VisitError::NotFound(format!("episode {episode_id} not found")));
        }

        let record = self
            .booking
            .get_dispatch_record(dispatch_id)
            .await
            .map_err(VisitError::booking)?;
        let market = self
            .booking
            .get_market(record.market_id)
            .await
            .map_err(VisitError::booking)?;

        self.availability
            .ensure_schedulable(&record, request.window)
            .await?;
        tracing::info!(dispatch_id, market_id = market.id, "dispatch is schedulable");

        let tz = market.time_zone()?;
        let eta = EtaWindow::in_zone(&request.window, tz);
        let status_id = record.require_status()?.id;
        self.booking
            .upsert_eta_window(dispatch_id, status_id, &eta)
            .await
            .map_err(VisitError::booking)?;
        tracing::info!(dispatch_id, "eta window upserted");

        self.availability
            .assign_advanced_care(dispatch_id, Some(eta.assignment_date()))
            .await?;

        let accept = DispatchStatusUpdate {
            status: DISPATCH_STATUS_ACCEPTED.to_string(),
            shift_team_id: None,
            comment: None,
        };
        self.booking
            .update_dispatch_status(dispatch_id, &accept)
            .await
            .map_err(VisitError::booking)?;

        // The status change above may already have made the booking peer push this visit.
        let record = self
            .booking
            .get_dispatch_record(dispatch_id)
            .await
            .map_err(VisitError::booking)?;
        let current = record.current_status.as_ref();

        self.find_or_create_visit(NewVisit {
            episode_id,
            dispatch_id: Some(dispatch_id),
            status: current.map(|s| s.name.clone()),
            status_updated_at: current.and_then(|s| s.started_at),
            created_by_user_id: Some(acting_user_id),
            ..NewVisit::default()
        })
        .await
    }

    /// Duplicates the dispatch record of the episode's newest visit that has one. A visit later
    /// pushed for the copy carries the original as its source dispatch and joins this episode.
    pub async fn duplicate_latest_visit(&self, episode_id: i64) -> VisitResult<DispatchRecord> {
        let episode_id = require_positive("episode_id", episode_id)?;
        if self.store.get_episode(episode_id).await?.is_none() {
            return Err(VisitError::NotFound(format!("episode {episode_id} not found")));
        }

        let source = self
            .store
            .list_episode_visits(episode_id)
            .await?
            .into_iter()
            .find_map(|visit| visit.dispatch_id)
            .ok_or_else(|| {
                VisitError::FailedPrecondition(format!(
                    "episode {episode_id} has no visit with a dispatch record"
                ))
            })?;

        let copy = self
            .booking
            .duplicate_dispatch(source)
            .await
            .map_err(VisitError::booking)?;
        tracing::info!(
            episode_id,
            source_dispatch_id = source,
            dispatch_id = copy.id,
            "dispatch duplicated"
        );
        Ok(copy)
    }

    /// Returns the visit for `visit.dispatch_id` if one exists, otherwise inserts `visit`.
    ///
    /// Best effort, not a strict guarantee: the existence check and the insert are separate
    /// store calls. When another writer lands in between, the store's uniqueness violation is
    /// taken as "already created" and the winner's row is returned.
    pub async fn find_or_create_visit(&self, visit: NewVisit) -> VisitResult<Visit> {
        let dispatch_id = visit
            .dispatch_id
            .ok_or_else(|| VisitError::Internal("visit to materialise has no dispatch id".into()))?;

        if let Some(existing) = self.store.get_visit_by_dispatch_id(dispatch_id).await? {
            tracing::info!(dispatch_id, visit_id = existing.id, "reusing existing visit");
            return Ok(existing);
        }

        match self.store.create_visit(visit).await {
            Ok(created) => {
                tracing::info!(dispatch_id, visit_id = created.id, "visit created");
                Ok(created)
            }
            Err(StoreError::UniqueViolation { dispatch_id }) => {
                tracing::warn!(dispatch_id, "visit created concurrently, returning existing row");
                self.store
                    .get_visit_by_dispatch_id(dispatch_id)
                    .await?
                    .ok_or_else(|| {
                        VisitError::Internal(format!(
                            "visit for dispatch {dispatch_id} conflicted but could not be read"
                        ))
                    })
            }
            Err(err) => Err(err.into()),
        }
    }
}
