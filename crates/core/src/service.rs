//! Single entry point used by the transport layers.

use crate::config::CoreConfig;
use crate::coordinator::VisitStatusCoordinator;
use crate::episode_visits::{EpisodeVisits, VisitListElement, VisitView};
use crate::error::VisitResult;
use crate::gateways::{BookingGateway, DispatchRecord, RoutingGateway};
use crate::models::{AvailabilityWindow, Visit};
use crate::reconciler::{
    DispatchUpdatePush, DispatchVisitPush, ReconcileOutcome, VisitReconciler,
};
use crate::scheduling::{
    CanScheduleOutcome, DateAvailability, ScheduleVisitRequest, SchedulingOrchestrator,
};
use crate::status::VisitTransition;
use crate::store::VisitStore;
use chrono::NaiveDate;
use std::sync::Arc;

/// Visit lifecycle operations wired to one store and one pair of peers. Cheap to clone.
#[derive(Clone)]
pub struct CareManagerService {
    coordinator: VisitStatusCoordinator,
    orchestrator: SchedulingOrchestrator,
    reconciler: VisitReconciler,
    episode_visits: EpisodeVisits,
}

impl CareManagerService {
    pub fn new(
        store: Arc<dyn VisitStore>,
        booking: Arc<dyn BookingGateway>,
        routing: Arc<dyn RoutingGateway>,
        config: CoreConfig,
    ) -> Self {
        Self {
            coordinator: VisitStatusCoordinator::new(
                store.clone(),
                booking.clone(),
                routing.clone(),
                config.clone(),
            ),
            orchestrator: SchedulingOrchestrator::new(store.clone(), booking, config),
            reconciler: VisitReconciler::new(store.clone()),
            episode_visits: EpisodeVisits::new(store, routing),
        }
    }

    pub async fn get_visit(&self, visit_id: i64) -> VisitResult<VisitView> {
        self.episode_visits.get_visit(visit_id).await
    }

    pub async fn list_episode_visits(&self, episode_id: i64) -> VisitResult<Vec<VisitListElement>> {
        self.episode_visits.list_episode_visits(episode_id).await
    }

    pub async fn update_visit_episode(&self, visit_id: i64, episode_id: i64) -> VisitResult<Visit> {
        self.episode_visits
            .update_visit_episode(visit_id, episode_id)
            .await
    }

    pub async fn transition_status(
        &self,
        visit_id: i64,
        transition: VisitTransition,
        acting_user_id: i64,
    ) -> VisitResult<Visit> {
        self.coordinator
            .transition_status(visit_id, transition, acting_user_id)
            .await
    }

    pub async fn cancel_visit(&self, dispatch_id: i64) -> VisitResult<()> {
        self.coordinator.cancel_visit(dispatch_id).await
    }

    pub async fn schedule_visit(&self, request: ScheduleVisitRequest) -> VisitResult<Visit> {
        self.orchestrator.schedule_visit(request).await
    }

    pub async fn can_schedule_visit(
        &self,
        dispatch_id: i64,
        window: AvailabilityWindow,
    ) -> VisitResult<CanScheduleOutcome> {
        self.orchestrator
            .availability()
            .can_schedule_visit(dispatch_id, window)
            .await
    }

    pub async fn get_visit_availability(
        &self,
        dispatch_id: i64,
        dates: &[NaiveDate],
    ) -> VisitResult<Vec<DateAvailability>> {
        self.orchestrator
            .availability()
            .get_visit_availability(dispatch_id, dates)
            .await
    }

    pub async fn create_visit_from_dispatch(
        &self,
        push: DispatchVisitPush,
    ) -> VisitResult<ReconcileOutcome> {
        self.reconciler.create_visit_from_dispatch(push).await
    }

    pub async fn update_visit_from_dispatch(&self, push: DispatchUpdatePush) -> VisitResult<Visit> {
        self.reconciler.update_visit_from_dispatch(push).await
    }

    pub async fn duplicate_latest_visit(&self, episode_id: i64) -> VisitResult<DispatchRecord> {
        self.orchestrator.duplicate_latest_visit(episode_id).await
    }
}
