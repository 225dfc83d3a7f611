//! Routing peer contract: region schedule snapshots.

use crate::error::PeerError;
use crate::schedule::{first_scheduled_shift_team, RegionSchedule, ScheduleSnapshotIndex};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

#[async_trait]
pub trait RoutingGateway: Send + Sync {
    /// Fetches the region snapshot for `market_id`. `None` asks for the peer's default range,
    /// which starts today.
    async fn get_region_schedule(
        &self,
        market_id: i64,
        service_date: Option<NaiveDate>,
    ) -> Result<RegionSchedule, PeerError>;

    /// Shift team routed to `dispatch_id` today, if any.
    ///
    /// Fetches a whole region snapshot. Meant for manual, low-frequency triggers, not polling.
    async fn first_scheduled_shift_team(
        &self,
        dispatch_id: i64,
        market_id: i64,
    ) -> Result<Option<i64>, PeerError> {
        let snapshot = self.get_region_schedule(market_id, None).await?;
        Ok(first_scheduled_shift_team(&snapshot, dispatch_id))
    }

    /// Builds a schedule index for the given dispatch ids from one market snapshot.
    async fn schedules_for(
        &self,
        dispatch_ids: &HashSet<i64>,
        market_id: i64,
    ) -> Result<ScheduleSnapshotIndex, PeerError> {
        if dispatch_ids.is_empty() {
            return Ok(ScheduleSnapshotIndex::default());
        }
        let snapshot = self.get_region_schedule(market_id, None).await?;
        Ok(ScheduleSnapshotIndex::build(&snapshot, dispatch_ids))
    }
}
