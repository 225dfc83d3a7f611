//! Scripted in-memory peers for tests.
//!
//! Both fakes record every call in order, so tests can assert on sequencing (for example that a
//! remote status update happened before a local write), and accept injected failures per
//! operation.

use crate::error::PeerError;
use crate::gateways::{
    AvailabilityQuery, AvailabilitySlot, AvailabilityStatus, BookingGateway, DispatchLocation,
    DispatchRecord, DispatchStatus, DispatchStatusUpdate, EtaWindow, Market, RoutingGateway,
    ServiceLine,
};
use crate::schedule::RegionSchedule;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingOp {
    GetDispatchRecord,
    GetMarket,
    GetPossibleServiceLines,
    UpdateServiceLine,
    CheckAvailability,
    UpdateDispatchStatus,
    UpsertEtaWindow,
    GetShiftTeamMemberIds,
    DuplicateDispatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingCall {
    GetDispatchRecord(i64),
    GetMarket(i64),
    GetPossibleServiceLines(i64),
    UpdateServiceLine {
        dispatch_id: i64,
        service_line_id: i64,
        assignment_date: Option<NaiveDate>,
    },
    CheckAvailability(AvailabilityQuery),
    UpdateDispatchStatus {
        dispatch_id: i64,
        update: DispatchStatusUpdate,
    },
    UpsertEtaWindow {
        dispatch_id: i64,
        dispatch_status_id: i64,
        window: EtaWindow,
    },
    GetShiftTeamMemberIds(i64),
    DuplicateDispatch(i64),
}

impl BookingCall {
    pub fn op(&self) -> BookingOp {
        match self {
            BookingCall::GetDispatchRecord(_) => BookingOp::GetDispatchRecord,
            BookingCall::GetMarket(_) => BookingOp::GetMarket,
            BookingCall::GetPossibleServiceLines(_) => BookingOp::GetPossibleServiceLines,
            BookingCall::UpdateServiceLine { .. } => BookingOp::UpdateServiceLine,
            BookingCall::CheckAvailability(_) => BookingOp::CheckAvailability,
            BookingCall::UpdateDispatchStatus { .. } => BookingOp::UpdateDispatchStatus,
            BookingCall::UpsertEtaWindow { .. } => BookingOp::UpsertEtaWindow,
            BookingCall::GetShiftTeamMemberIds(_) => BookingOp::GetShiftTeamMemberIds,
            BookingCall::DuplicateDispatch(_) => BookingOp::DuplicateDispatch,
        }
    }
}

/// Runs after the fake accepted a status update, before the call returns to the caller.
pub type StatusHook = Arc<dyn Fn(i64, DispatchStatusUpdate) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct BookingState {
    records: HashMap<i64, DispatchRecord>,
    markets: HashMap<i64, Market>,
    service_lines: HashMap<i64, Vec<ServiceLine>>,
    window_availability: Option<String>,
    date_availability: HashMap<NaiveDate, String>,
    shift_teams: HashMap<i64, Vec<i64>>,
    failures: HashMap<BookingOp, PeerError>,
    date_failures: HashMap<NaiveDate, PeerError>,
    on_status_update: Option<StatusHook>,
    next_status_id: i64,
    calls: Vec<BookingCall>,
}

/// In-memory booking peer.
///
/// Unknown dispatch records and markets answer `PeerError::NotFound`. Window probes answer
/// `available` unless overridden; date probes answer `unavailable` unless scripted.
#[derive(Clone, Default)]
pub struct FakeBooking {
    state: Arc<Mutex<BookingState>>,
}

impl FakeBooking {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BookingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an advanced-care eligible dispatch record in `market_id` with status
    /// `requested`.
    pub fn add_eligible_dispatch(&self, dispatch_id: i64, market_id: i64) {
        self.add_dispatch(dispatch_id, market_id, &["Acute Care", "Advanced Care"]);
    }

    pub fn add_dispatch(&self, dispatch_id: i64, market_id: i64, service_lines: &[&str]) {
        let mut state = self.state();
        state.next_status_id += 1;
        let status_id = state.next_status_id;
        state.records.insert(
            dispatch_id,
            DispatchRecord {
                id: dispatch_id,
                market_id,
                location: Some(DispatchLocation {
                    latitude_e6: 39_739_236,
                    longitude_e6: -104_990_251,
                }),
                current_status: Some(DispatchStatus {
                    id: status_id,
                    name: "requested".into(),
                    started_at: Some(Utc::now()),
                }),
            },
        );
        let lines = service_lines
            .iter()
            .enumerate()
            .map(|(i, name)| ServiceLine {
                id: i as i64 + 1,
                name: (*name).to_string(),
            })
            .collect();
        state.service_lines.insert(dispatch_id, lines);
    }

    pub fn add_market(&self, market_id: i64, tz_name: &str) {
        self.state().markets.insert(
            market_id,
            Market {
                id: market_id,
                tz_name: tz_name.to_string(),
            },
        );
    }

    pub fn set_window_availability(&self, status: &str) {
        self.state().window_availability = Some(status.to_string());
    }

    pub fn set_date_availability(&self, date: NaiveDate, status: &str) {
        self.state().date_availability.insert(date, status.to_string());
    }

    pub fn add_shift_team(&self, shift_team_id: i64, member_ids: Vec<i64>) {
        self.state().shift_teams.insert(shift_team_id, member_ids);
    }

    pub fn fail(&self, op: BookingOp, err: PeerError) {
        self.state().failures.insert(op, err);
    }

    pub fn fail_date(&self, date: NaiveDate, err: PeerError) {
        self.state().date_failures.insert(date, err);
    }

    pub fn on_status_update(&self, hook: StatusHook) {
        self.state().on_status_update = Some(hook);
    }

    pub fn calls(&self) -> Vec<BookingCall> {
        self.state().calls.clone()
    }

    pub fn ops(&self) -> Vec<BookingOp> {
        self.state().calls.iter().map(BookingCall::op).collect()
    }

    pub fn count(&self, op: BookingOp) -> usize {
        self.state().calls.iter().filter(|c| c.op() == op).count()
    }

    fn record(&self, call: BookingCall) -> Result<(), PeerError> {
        let mut state = self.state();
        let op = call.op();
        state.calls.push(call);
        match state.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BookingGateway for FakeBooking {
    async fn get_dispatch_record(&self, dispatch_id: i64) -> Result<DispatchRecord, PeerError> {
        self.record(BookingCall::GetDispatchRecord(dispatch_id))?;
        self.state()
            .records
            .get(&dispatch_id)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("dispatch {dispatch_id}")))
    }

    async fn get_market(&self, market_id: i64) -> Result<Market, PeerError> {
        self.record(BookingCall::GetMarket(market_id))?;
        self.state()
            .markets
            .get(&market_id)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("market {market_id}")))
    }

    async fn get_possible_service_lines(
        &self,
        dispatch_id: i64,
    ) -> Result<Vec<ServiceLine>, PeerError> {
        self.record(BookingCall::GetPossibleServiceLines(dispatch_id))?;
        Ok(self
            .state()
            .service_lines
            .get(&dispatch_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_service_line(
        &self,
        dispatch_id: i64,
        service_line_id: i64,
        assignment_date: Option<NaiveDate>,
    ) -> Result<(), PeerError> {
        self.record(BookingCall::UpdateServiceLine {
            dispatch_id,
            service_line_id,
            assignment_date,
        })
    }

    async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityStatus, PeerError> {
        self.record(BookingCall::CheckAvailability(query.clone()))?;
        let state = self.state();
        let status = match query.slot {
            AvailabilitySlot::Window(_) => state
                .window_availability
                .clone()
                .unwrap_or_else(|| "available".into()),
            AvailabilitySlot::Date(date) => {
                if let Some(err) = state.date_failures.get(&date) {
                    return Err(err.clone());
                }
                state
                    .date_availability
                    .get(&date)
                    .cloned()
                    .unwrap_or_else(|| "unavailable".into())
            }
        };
        Ok(AvailabilityStatus(status))
    }

    async fn update_dispatch_status(
        &self,
        dispatch_id: i64,
        update: &DispatchStatusUpdate,
    ) -> Result<(), PeerError> {
        self.record(BookingCall::UpdateDispatchStatus {
            dispatch_id,
            update: update.clone(),
        })?;
        let hook = {
            let mut state = self.state();
            state.next_status_id += 1;
            let status_id = state.next_status_id;
            if let Some(record) = state.records.get_mut(&dispatch_id) {
                record.current_status = Some(DispatchStatus {
                    id: status_id,
                    name: update.status.clone(),
                    started_at: Some(Utc::now()),
                });
            }
            state.on_status_update.clone()
        };
        if let Some(hook) = hook {
            hook(dispatch_id, update.clone()).await;
        }
        Ok(())
    }

    async fn upsert_eta_window(
        &self,
        dispatch_id: i64,
        dispatch_status_id: i64,
        window: &EtaWindow,
    ) -> Result<(), PeerError> {
        self.record(BookingCall::UpsertEtaWindow {
            dispatch_id,
            dispatch_status_id,
            window: *window,
        })
    }

    async fn get_shift_team_member_ids(&self, shift_team_id: i64) -> Result<Vec<i64>, PeerError> {
        self.record(BookingCall::GetShiftTeamMemberIds(shift_team_id))?;
        self.state()
            .shift_teams
            .get(&shift_team_id)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("shift team {shift_team_id}")))
    }

    /// Copies the record under the next free id with a fresh `requested` status.
    async fn duplicate_dispatch(&self, dispatch_id: i64) -> Result<DispatchRecord, PeerError> {
        self.record(BookingCall::DuplicateDispatch(dispatch_id))?;
        let mut state = self.state();
        let source = state
            .records
            .get(&dispatch_id)
            .cloned()
            .ok_or_else(|| PeerError::NotFound(format!("dispatch {dispatch_id}")))?;
        let copy_id = state.records.keys().max().copied().unwrap_or(0) + 1;
        state.next_status_id += 1;
        let copy = DispatchRecord {
            id: copy_id,
            current_status: Some(DispatchStatus {
                id: state.next_status_id,
                name: "requested".into(),
                started_at: Some(Utc::now()),
            }),
            ..source
        };
        let lines = state
            .service_lines
            .get(&dispatch_id)
            .cloned()
            .unwrap_or_default();
        state.service_lines.insert(copy_id, lines);
        state.records.insert(copy_id, copy.clone());
        Ok(copy)
    }
}

#[derive(Default)]
struct RoutingState {
    schedules: HashMap<i64, RegionSchedule>,
    failure: Option<PeerError>,
    calls: Vec<i64>,
}

/// In-memory routing peer. Markets without a scripted snapshot return an empty schedule.
#[derive(Clone, Default)]
pub struct FakeRouting {
    state: Arc<Mutex<RoutingState>>,
}

impl FakeRouting {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RoutingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_schedule(&self, market_id: i64, schedule: RegionSchedule) {
        self.state().schedules.insert(market_id, schedule);
    }

    pub fn fail(&self, err: PeerError) {
        self.state().failure = Some(err);
    }

    /// Market ids of every snapshot fetched, in order.
    pub fn calls(&self) -> Vec<i64> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl RoutingGateway for FakeRouting {
    async fn get_region_schedule(
        &self,
        market_id: i64,
        _service_date: Option<NaiveDate>,
    ) -> Result<RegionSchedule, PeerError> {
        let mut state = self.state();
        state.calls.push(market_id);
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        Ok(state.schedules.get(&market_id).cloned().unwrap_or_default())
    }
}
