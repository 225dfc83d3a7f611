//! # Care Manager Core
//!
//! Visit lifecycle orchestration for the care manager service.
//!
//! This crate contains:
//! - The visit status vocabulary and the transition table
//! - Typed contracts for the booking and routing peers
//! - The local persistence contract, with an in-memory implementation
//! - Status transitions, the scheduling saga, availability probes and visit reconciliation
//!
//! **No API concerns**: HTTP servers, authentication and wire DTOs belong in `api-rest` or
//! `api-shared`; peer HTTP clients belong in `caremanager-peers`.

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod episode_visits;
pub mod error;
pub mod gateways;
pub mod models;
pub mod reconciler;
pub mod schedule;
pub mod scheduling;
pub mod service;
pub mod status;
pub mod store;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::CoreConfig;
pub use coordinator::VisitStatusCoordinator;
pub use episode_visits::{EpisodeVisits, VisitListElement, VisitView};
pub use error::{ErrorKind, PeerError, StoreError, StoreResult, VisitError, VisitResult};
pub use models::{
    AvailabilityWindow, Episode, EpisodeUpdate, NewEpisode, NewPatient, NewVisit, Patient, Visit,
    VisitDispatchUpdate,
};
pub use reconciler::{
    DispatchUpdatePush, DispatchVisitPush, EpisodeResolution, PushedPatient, ReconcileOutcome,
    VisitReconciler,
};
pub use schedule::{CareRequestSchedule, RegionSchedule, ScheduleSnapshotIndex};
pub use scheduling::{
    AvailabilityService, CanScheduleOutcome, DateAvailability, ScheduleVisitRequest,
    SchedulingOrchestrator,
};
pub use service::CareManagerService;
pub use status::{VisitStatusGroup, VisitTransition};
pub use store::{EpisodeTarget, InMemoryStore, ReconciledVisit, VisitStore};
