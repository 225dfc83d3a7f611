//! Read paths over an episode's visits, enriched with routing estimates.

use crate::constants::DISPATCH_STATUS_ARCHIVED;
use crate::error::{VisitError, VisitResult};
use crate::gateways::RoutingGateway;
use crate::models::Visit;
use crate::schedule::CareRequestSchedule;
use crate::status::VisitStatusGroup;
use crate::store::VisitStore;
use crate::validation::require_positive;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// A visit with its derived status group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitView {
    pub visit: Visit,
    pub status_group: VisitStatusGroup,
}

impl From<Visit> for VisitView {
    fn from(visit: Visit) -> Self {
        let status_group = visit.status_group();
        Self {
            visit,
            status_group,
        }
    }
}

/// One row of an episode's visit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitListElement {
    pub visit: Visit,
    pub status_group: VisitStatusGroup,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub schedule: Option<CareRequestSchedule>,
    pub is_scheduling_in_progress: bool,
}

/// A visit is still being scheduled while it has a live dispatch record but no agreed
/// availability window.
pub fn is_scheduling_in_progress(visit: &Visit) -> bool {
    visit.dispatch_id.is_some()
        && visit.status.as_deref() != Some(DISPATCH_STATUS_ARCHIVED)
        && visit.patient_availability.is_none()
}

#[derive(Clone)]
pub struct EpisodeVisits {
    store: Arc<dyn VisitStore>,
    routing: Arc<dyn RoutingGateway>,
}

impl EpisodeVisits {
    pub fn new(store: Arc<dyn VisitStore>, routing: Arc<dyn RoutingGateway>) -> Self {
        Self { store, routing }
    }

    pub async fn get_visit(&self, visit_id: i64) -> VisitResult<VisitView> {
        let visit_id = require_positive("visit_id", visit_id)?;
        self.store
            .get_visit(visit_id)
            .await?
            .map(VisitView::from)
            .ok_or_else(|| VisitError::NotFound(format!("visit {visit_id} not found")))
    }

    /// Lists an episode's visits, newest first. Routed visits carry today's estimates from one
    /// snapshot of the episode's market.
    pub async fn list_episode_visits(&self, episode_id: i64) -> VisitResult<Vec<VisitListElement>> {
        let episode_id = require_positive("episode_id", episode_id)?;
        let episode = self
            .store
            .get_episode(episode_id)
            .await?
            .ok_or_else(|| VisitError::NotFound(format!("episode {episode_id} not found")))?;

        let visits = self.store.list_episode_visits(episode_id).await?;
        let dispatch_ids: HashSet<i64> = visits.iter().filter_map(|v| v.dispatch_id).collect();
        let index = self
            .routing
            .schedules_for(&dispatch_ids, episode.market_id)
            .await
            .map_err(VisitError::routing)?;

        Ok(visits
            .into_iter()
            .map(|visit| {
                let schedule = visit.dispatch_id.and_then(|id| index.get(id).cloned());
                VisitListElement {
                    status_group: visit.status_group(),
                    estimated_arrival: schedule.as_ref().and_then(|s| s.estimated_arrival),
                    is_scheduling_in_progress: is_scheduling_in_progress(&visit),
                    schedule,
                    visit,
                }
            })
            .collect())
    }

    /// Moves a visit to another episode.
    pub async fn update_visit_episode(&self, visit_id: i64, episode_id: i64) -> VisitResult<Visit> {
        let visit_id = require_positive("visit_id", visit_id)?;
        let episode_id = require_positive("episode_id", episode_id)?;

        if self.store.get_episode(episode_id).await?.is_none() {
            return Err(VisitError::InvalidArgument(format!(
                "episode {episode_id} not found"
            )));
        }

        let visit = self
            .store
            .update_visit_episode(visit_id, episode_id)
            .await?
            .ok_or_else(|| VisitError::NotFound(format!("visit {visit_id} not found")))?;
        tracing::info!(visit_id, episode_id, "visit moved to episode");
        Ok(visit)
    }
}
