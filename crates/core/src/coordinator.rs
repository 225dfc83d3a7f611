//! User-requested visit status transitions.
//!
//! The booking peer is authoritative for visit status: every transition is sent there first and
//! the local row is only written once the peer accepted it.

use crate::config::CoreConfig;
use crate::constants::DISPATCH_STATUS_ARCHIVED;
use crate::error::{VisitError, VisitResult};
use crate::gateways::{BookingGateway, DispatchStatusUpdate, RoutingGateway};
use crate::models::{Visit, VisitStatusUpdate};
use crate::status::VisitTransition;
use crate::store::VisitStore;
use crate::validation::require_positive;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct VisitStatusCoordinator {
    store: Arc<dyn VisitStore>,
    booking: Arc<dyn BookingGateway>,
    routing: Arc<dyn RoutingGateway>,
    config: CoreConfig,
}

impl VisitStatusCoordinator {
    pub fn new(
        store: Arc<dyn VisitStore>,
        booking: Arc<dyn BookingGateway>,
        routing: Arc<dyn RoutingGateway>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            booking,
            routing,
            config,
        }
    }

    /// Moves a visit to `transition`.
    ///
    /// Committing stamps the members of today's routed shift team as the visit's providers;
    /// other transitions leave providers as they are. The current status is not checked: the
    /// booking peer decides whether a change is acceptable.
    pub async fn transition_status(
        &self,
        visit_id: i64,
        transition: VisitTransition,
        acting_user_id: i64,
    ) -> VisitResult<Visit> {
        let visit_id = require_positive("visit_id", visit_id)?;
        let acting_user_id = require_positive("acting_user_id", acting_user_id)?;

        let visit = self
            .store
            .get_visit(visit_id)
            .await?
            .ok_or_else(|| VisitError::NotFound(format!("visit {visit_id} not found")))?;
        let dispatch_id = visit.dispatch_id.ok_or_else(|| {
            VisitError::FailedPrecondition(format!(
                "visit {visit_id} doesn't have a reference to a dispatch record"
            ))
        })?;
        let episode = self
            .store
            .get_episode(visit.episode_id)
            .await?
            .ok_or_else(|| {
                VisitError::NotFound(format!("episode {} not found", visit.episode_id))
            })?;

        let (shift_team_id, provider_user_ids) = if transition.requires_shift_team() {
            let shift_team_id = self
                .routing
                .first_scheduled_shift_team(dispatch_id, episode.market_id)
                .await
                .map_err(VisitError::routing)?
                .ok_or_else(|| {
                    VisitError::FailedPrecondition(format!(
                        "could not find an available shift team for visit {visit_id}"
                    ))
                })?;
            let members = self
                .booking
                .get_shift_team_member_ids(shift_team_id)
                .await
                .map_err(VisitError::booking)?;
            (Some(shift_team_id), Some(members))
        } else {
            (None, None)
        };

        let status = transition.booking_status();
        let update = DispatchStatusUpdate::new(status, shift_team_id, &self.config);
        self.booking
            .update_dispatch_status(dispatch_id, &update)
            .await
            .map_err(VisitError::booking)?;
        tracing::info!(visit_id, dispatch_id, status, ?shift_team_id, "remote status updated");

        self.store
            .update_visit_status_and_providers(VisitStatusUpdate {
                visit_id,
                status: status.to_string(),
                provider_user_ids,
                updated_by_user_id: acting_user_id,
                updated_at: Utc::now(),
            })
            .await?
            .ok_or_else(|| VisitError::NotFound(format!("visit {visit_id} not found")))
    }

    /// Archives the dispatch record on the booking peer, stopping its scheduling.
    pub async fn cancel_visit(&self, dispatch_id: i64) -> VisitResult<()> {
        let dispatch_id = require_positive("dispatch_id", dispatch_id)?;
        let update = DispatchStatusUpdate::new(DISPATCH_STATUS_ARCHIVED, None, &self.config);
        self.booking
            .update_dispatch_status(dispatch_id, &update)
            .await
            .map_err(VisitError::booking)?;
        tracing::info!(dispatch_id, "dispatch archived");
        Ok(())
    }
}
