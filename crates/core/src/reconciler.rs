//! Materialises visits pushed by the booking peer.
//!
//! A push is keyed by dispatch id and carries two optional lineage references. The owning episode
//! is resolved by trying [`RESOLUTION_ORDER`] in turn; the first strategy that finds (or may
//! create) an episode wins.
//!
//! Later changes to the dispatch record arrive as [`DispatchUpdatePush`] and are applied to the
//! visit that mirrors it, so local rows follow the booking peer's status.

use crate::error::{StoreError, VisitError, VisitResult};
use crate::models::{
    AvailabilityWindow, Episode, EpisodeUpdate, NewEpisode, NewPatient, NewVisit, Patient, Visit,
    VisitDispatchUpdate,
};
use crate::store::{EpisodeTarget, VisitStore};
use crate::validation::{positive_or_none, require_positive};
use caremanager_types::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedPatient {
    pub first_name: String,
    pub last_name: String,
    pub medical_record_number: String,
}

/// A visit-creation event from the booking peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchVisitPush {
    pub dispatch_id: i64,
    /// Dispatch record the clinical encounter was first opened from.
    pub original_dispatch_id: Option<i64>,
    /// Dispatch record this one duplicates.
    pub source_dispatch_id: Option<i64>,
    pub market_id: i64,
    pub service_line_id: i64,
    pub status: String,
    pub status_updated_at: DateTime<Utc>,
    pub patient_availability: Option<AvailabilityWindow>,
    pub car_id: Option<i64>,
    #[serde(default)]
    pub provider_user_ids: Vec<i64>,
    pub created_by_user_id: Option<i64>,
    pub patient: PushedPatient,
}

/// A change to a dispatch record that already has a local visit. Absent fields are left as
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchUpdatePush {
    pub dispatch_id: i64,
    pub status: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub patient_availability: Option<AvailabilityWindow>,
    pub car_id: Option<i64>,
    pub provider_user_ids: Option<Vec<i64>>,
    pub updated_by_user_id: Option<i64>,
    /// Moves the owning episode to this service line.
    pub service_line_id: Option<i64>,
    pub original_dispatch_id: Option<i64>,
}

/// How a pushed visit's episode was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeResolution {
    /// The episode opened from `original_dispatch_id`.
    OriginalDispatch,
    /// The episode of the visit for `source_dispatch_id`.
    DuplicateOf,
    /// A new episode, for a patient found or created by medical record number.
    CreateNew,
}

pub const RESOLUTION_ORDER: [EpisodeResolution; 3] = [
    EpisodeResolution::OriginalDispatch,
    EpisodeResolution::DuplicateOf,
    EpisodeResolution::CreateNew,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub visit: Visit,
    pub resolved_by: EpisodeResolution,
    pub created_episode: Option<Episode>,
    pub patient: Option<Patient>,
}

#[derive(Clone)]
pub struct VisitReconciler {
    store: Arc<dyn VisitStore>,
}

impl VisitReconciler {
    pub fn new(store: Arc<dyn VisitStore>) -> Self {
        Self { store }
    }

    /// Creates the local visit for a pushed dispatch record.
    ///
    /// Fails with `AlreadyExists` if a visit for the dispatch id exists, whether it was there
    /// before the call or was inserted concurrently.
    pub async fn create_visit_from_dispatch(
        &self,
        push: DispatchVisitPush,
    ) -> VisitResult<ReconcileOutcome> {
        let dispatch_id = require_positive("dispatch_id", push.dispatch_id)?;
        if push.status.trim().is_empty() {
            return Err(VisitError::InvalidArgument("visit.status cannot be empty".into()));
        }

        if self.store.get_visit_by_dispatch_id(dispatch_id).await?.is_some() {
            return Err(already_exists(dispatch_id));
        }

        let (resolved_by, target) = self.resolve_episode(&push).await?;
        let visit = NewVisit {
            episode_id: 0,
            dispatch_id: Some(dispatch_id),
            status: Some(push.status),
            status_updated_at: Some(push.status_updated_at),
            patient_availability: push.patient_availability,
            car_id: push.car_id,
            provider_user_ids: push.provider_user_ids,
            created_by_user_id: push.created_by_user_id,
        };

        let written = match self.store.insert_reconciled_visit(target, visit).await {
            Ok(written) => written,
            Err(StoreError::UniqueViolation { dispatch_id }) => {
                tracing::warn!(dispatch_id, "pushed visit lost insert race");
                return Err(already_exists(dispatch_id));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            dispatch_id,
            visit_id = written.visit.id,
            episode_id = written.visit.episode_id,
            ?resolved_by,
            patient_created = written.patient_created,
            "pushed visit reconciled"
        );

        Ok(ReconcileOutcome {
            visit: written.visit,
            resolved_by,
            created_episode: written.episode,
            patient: written.patient,
        })
    }

    /// Applies a dispatch record change to its local visit.
    ///
    /// Fails with `NotFound` when no visit mirrors the dispatch record. A push that carries a
    /// service line also moves the owning episode to it.
    pub async fn update_visit_from_dispatch(&self, push: DispatchUpdatePush) -> VisitResult<Visit> {
        let dispatch_id = require_positive("dispatch_id", push.dispatch_id)?;
        let updated_by_user_id = push
            .updated_by_user_id
            .map(|id| require_positive("updated_by_user_id", id))
            .transpose()?;
        if push.status.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(VisitError::InvalidArgument("visit.status cannot be empty".into()));
        }

        if let Some(service_line_id) = push.service_line_id {
            let service_line_id = require_positive("episode.service_line_id", service_line_id)?;
            let visit = self
                .store
                .get_visit_by_dispatch_id(dispatch_id)
                .await?
                .ok_or_else(|| no_visit_for(dispatch_id))?;
            let update = EpisodeUpdate {
                service_line_id: Some(service_line_id),
                original_dispatch_id: positive_or_none(push.original_dispatch_id),
            };
            self.store
                .update_episode(visit.episode_id, update)
                .await?
                .ok_or_else(|| {
                    VisitError::Internal(format!(
                        "episode {} of visit {} does not exist",
                        visit.episode_id, visit.id
                    ))
                })?;
            tracing::info!(
                dispatch_id,
                episode_id = visit.episode_id,
                service_line_id,
                "episode service line updated"
            );
        }

        let visit = self
            .store
            .update_visit_by_dispatch_id(VisitDispatchUpdate {
                dispatch_id,
                status: push.status,
                status_updated_at: push.status_updated_at,
                patient_availability: push.patient_availability,
                car_id: push.car_id,
                provider_user_ids: push.provider_user_ids,
                updated_by_user_id,
            })
            .await?
            .ok_or_else(|| no_visit_for(dispatch_id))?;
        tracing::info!(
            dispatch_id,
            visit_id = visit.id,
            status = visit.status.as_deref(),
            "visit updated from dispatch"
        );
        Ok(visit)
    }

    /// Picks the owning episode for `push`, trying each strategy in [`RESOLUTION_ORDER`].
    pub async fn resolve_episode(
        &self,
        push: &DispatchVisitPush,
    ) -> VisitResult<(EpisodeResolution, EpisodeTarget)> {
        for strategy in RESOLUTION_ORDER {
            if let Some(target) = self.try_strategy(strategy, push).await? {
                return Ok((strategy, target));
            }
        }
        Err(VisitError::Internal(format!(
            "no episode resolution applied to dispatch {}",
            push.dispatch_id
        )))
    }

    async fn try_strategy(
        &self,
        strategy: EpisodeResolution,
        push: &DispatchVisitPush,
    ) -> VisitResult<Option<EpisodeTarget>> {
        match strategy {
            EpisodeResolution::OriginalDispatch => {
                let Some(original) = positive_or_none(push.original_dispatch_id) else {
                    return Ok(None);
                };
                Ok(self
                    .store
                    .get_episode_by_original_dispatch_id(original)
                    .await?
                    .map(|episode| EpisodeTarget::Existing(episode.id)))
            }
            EpisodeResolution::DuplicateOf => {
                let Some(source) = positive_or_none(push.source_dispatch_id) else {
                    return Ok(None);
                };
                Ok(self
                    .store
                    .get_visit_by_dispatch_id(source)
                    .await?
                    .map(|visit| EpisodeTarget::Existing(visit.episode_id)))
            }
            EpisodeResolution::CreateNew => {
                let (patient, episode) = new_episode_rows(push)?;
                let known = self
                    .store
                    .find_patient_by_medical_record_number(patient.medical_record_number.as_str())
                    .await?;
                Ok(Some(match known {
                    Some(known) => EpisodeTarget::NewForPatient {
                        patient_id: known.id,
                        episode,
                    },
                    None => EpisodeTarget::New { patient, episode },
                }))
            }
        }
    }
}

fn new_episode_rows(push: &DispatchVisitPush) -> VisitResult<(NewPatient, NewEpisode)> {
    let market_id = require_positive("episode.market_id", push.market_id)?;
    let service_line_id = require_positive("episode.service_line_id", push.service_line_id)?;
    let medical_record_number = NonEmptyText::new(
        "patient.medical_record_number",
        &push.patient.medical_record_number,
    )?;

    Ok((
        NewPatient {
            first_name: push.patient.first_name.clone(),
            last_name: push.patient.last_name.clone(),
            medical_record_number,
        },
        NewEpisode {
            market_id,
            service_line_id,
            original_dispatch_id: positive_or_none(push.original_dispatch_id),
        },
    ))
}

fn no_visit_for(dispatch_id: i64) -> VisitError {
    VisitError::NotFound(format!("no visit was found with dispatch {dispatch_id}"))
}

fn already_exists(dispatch_id: i64) -> VisitError {
    VisitError::AlreadyExists(format!("a visit for dispatch {dispatch_id} already exists"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::InMemoryStore;

    fn push(dispatch_id: i64) -> DispatchVisitPush {
        DispatchVisitPush {
            dispatch_id,
            original_dispatch_id: None,
            source_dispatch_id: None,
            market_id: 159,
            service_line_id: 9,
            status: "requested".into(),
            status_updated_at: Utc::now(),
            patient_availability: None,
            car_id: Some(3),
            provider_user_ids: vec![],
            created_by_user_id: Some(12),
            patient: PushedPatient {
                first_name: "Mary".into(),
                last_name: "Jackson".into(),
                medical_record_number: "MRN-99".into(),
            },
        }
    }

    fn reconciler() -> (InMemoryStore, VisitReconciler) {
        let store = InMemoryStore::new();
        let reconciler = VisitReconciler::new(Arc::new(store.clone()));
        (store, reconciler)
    }

    fn seed_episode(store: &InMemoryStore, original_dispatch_id: Option<i64>, mrn: &str) -> Episode {
        store
            .open_episode(
                NewPatient {
                    first_name: "Dorothy".into(),
                    last_name: "Vaughan".into(),
                    medical_record_number: NonEmptyText::new("mrn", mrn).unwrap(),
                },
                NewEpisode {
                    market_id: 159,
                    service_line_id: 9,
                    original_dispatch_id,
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_joins_episode_of_original_dispatch() {
        let (store, reconciler) = reconciler();
        seed_episode(&store, None, "MRN-1");
        let original = seed_episode(&store, Some(70), "MRN-2");
        let episodes_before = store.episode_count().unwrap();
        let patients_before = store.patient_count().unwrap();

        let mut event = push(99);
        event.original_dispatch_id = Some(70);
        let outcome = reconciler.create_visit_from_dispatch(event).await.unwrap();

        assert_eq!(outcome.resolved_by, EpisodeResolution::OriginalDispatch);
        assert_eq!(outcome.visit.episode_id, original.id);
        assert_eq!(outcome.visit.dispatch_id, Some(99));
        assert!(outcome.created_episode.is_none());
        assert_eq!(store.episode_count().unwrap(), episodes_before);
        assert_eq!(store.patient_count().unwrap(), patients_before);
    }

    #[tokio::test]
    async fn test_push_joins_episode_of_duplicated_visit() {
        let (store, reconciler) = reconciler();
        let episode = seed_episode(&store, None, "MRN-1");
        store
            .create_visit(NewVisit {
                episode_id: episode.id,
                dispatch_id: Some(50),
                ..NewVisit::default()
            })
            .await
            .unwrap();

        let mut event = push(51);
        event.original_dispatch_id = Some(12_345);
        event.source_dispatch_id = Some(50);
        let outcome = reconciler.create_visit_from_dispatch(event).await.unwrap();

        assert_eq!(outcome.resolved_by, EpisodeResolution::DuplicateOf);
        assert_eq!(outcome.visit.episode_id, episode.id);
    }

    #[tokio::test]
    async fn test_original_dispatch_takes_precedence_over_duplicate() {
        let (store, reconciler) = reconciler();
        let duplicated = seed_episode(&store, None, "MRN-1");
        store
            .create_visit(NewVisit {
                episode_id: duplicated.id,
                dispatch_id: Some(50),
                ..NewVisit::default()
            })
            .await
            .unwrap();
        let original = seed_episode(&store, Some(70), "MRN-2");

        let mut event = push(51);
        event.original_dispatch_id = Some(70);
        event.source_dispatch_id = Some(50);
        let (resolved_by, target) = reconciler.resolve_episode(&event).await.unwrap();
        assert_eq!(resolved_by, EpisodeResolution::OriginalDispatch);
        assert_eq!(target, EpisodeTarget::Existing(original.id));
    }

    #[tokio::test]
    async fn test_push_creates_patient_and_episode() {
        let (store, reconciler) = reconciler();
        let mut event = push(99);
        event.original_dispatch_id = Some(99);
        let outcome = reconciler.create_visit_from_dispatch(event).await.unwrap();

        assert_eq!(outcome.resolved_by, EpisodeResolution::CreateNew);
        let episode = outcome.created_episode.unwrap();
        assert_eq!(episode.original_dispatch_id, Some(99));
        assert_eq!(outcome.visit.episode_id, episode.id);
        assert_eq!(outcome.patient.unwrap().medical_record_number, "MRN-99");
        assert_eq!(store.patient_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_push_reuses_patient_with_same_mrn() {
        let (store, reconciler) = reconciler();
        let existing = seed_episode(&store, None, "MRN-99");

        let (resolved_by, target) = reconciler.resolve_episode(&push(99)).await.unwrap();
        assert_eq!(resolved_by, EpisodeResolution::CreateNew);
        assert!(matches!(
            target,
            EpisodeTarget::NewForPatient { patient_id, .. } if patient_id == existing.patient_id
        ));

        let outcome = reconciler.create_visit_from_dispatch(push(99)).await.unwrap();
        assert_eq!(outcome.patient.unwrap().id, existing.patient_id);
        assert_eq!(store.patient_count().unwrap(), 1);
        assert_eq!(store.episode_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_second_push_for_same_dispatch_already_exists() {
        let (store, reconciler) = reconciler();
        reconciler.create_visit_from_dispatch(push(99)).await.unwrap();
        let err = reconciler
            .create_visit_from_dispatch(push(99))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(store.visit_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pushes() {
        let (_store, reconciler) = reconciler();
        let err = reconciler.create_visit_from_dispatch(push(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut event = push(5);
        event.patient.medical_record_number = "  ".into();
        let err = reconciler.create_visit_from_dispatch(event).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut event = push(6);
        event.status = String::new();
        let err = reconciler.create_visit_from_dispatch(event).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_lineage_ids_that_are_not_positive_are_ignored() {
        let (store, reconciler) = reconciler();
        seed_episode(&store, Some(70), "MRN-1");
        let mut event = push(99);
        event.original_dispatch_id = Some(0);
        event.source_dispatch_id = Some(-1);
        let (resolved_by, _) = reconciler.resolve_episode(&event).await.unwrap();
        assert_eq!(resolved_by, EpisodeResolution::CreateNew);
    }

    #[tokio::test]
    async fn test_update_push_applies_remote_fields() {
        let (store, reconciler) = reconciler();
        let created = reconciler.create_visit_from_dispatch(push(99)).await.unwrap();

        let visit = reconciler
            .update_visit_from_dispatch(DispatchUpdatePush {
                dispatch_id: 99,
                status: Some("on_route".into()),
                status_updated_at: Some(Utc::now()),
                car_id: Some(8),
                provider_user_ids: Some(vec![31, 32]),
                updated_by_user_id: Some(4),
                ..DispatchUpdatePush::default()
            })
            .await
            .unwrap();

        assert_eq!(visit.id, created.visit.id);
        assert_eq!(visit.status.as_deref(), Some("on_route"));
        assert_eq!(visit.car_id, Some(8));
        assert_eq!(visit.provider_user_ids, vec![31, 32]);
        assert_eq!(visit.updated_by_user_id, Some(4));

        let episode = store.get_episode(visit.episode_id).await.unwrap().unwrap();
        assert_eq!(episode.service_line_id, 9);
    }

    #[tokio::test]
    async fn test_update_push_moves_episode_service_line() {
        let (store, reconciler) = reconciler();
        let created = reconciler.create_visit_from_dispatch(push(99)).await.unwrap();

        reconciler
            .update_visit_from_dispatch(DispatchUpdatePush {
                dispatch_id: 99,
                service_line_id: Some(4),
                original_dispatch_id: Some(99),
                ..DispatchUpdatePush::default()
            })
            .await
            .unwrap();

        let episode = store
            .get_episode(created.visit.episode_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(episode.service_line_id, 4);
        assert_eq!(episode.original_dispatch_id, Some(99));
    }

    #[tokio::test]
    async fn test_update_push_for_unknown_dispatch_is_not_found() {
        let (store, reconciler) = reconciler();
        let episode = seed_episode(&store, None, "MRN-1");

        let err = reconciler
            .update_visit_from_dispatch(DispatchUpdatePush {
                dispatch_id: 404,
                status: Some("archived".into()),
                ..DispatchUpdatePush::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = reconciler
            .update_visit_from_dispatch(DispatchUpdatePush {
                dispatch_id: 404,
                service_line_id: Some(4),
                ..DispatchUpdatePush::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let untouched = store.get_episode(episode.id).await.unwrap().unwrap();
        assert_eq!(untouched.service_line_id, 9);
    }

    #[tokio::test]
    async fn test_invalid_update_pushes() {
        let (_store, reconciler) = reconciler();
        reconciler.create_visit_from_dispatch(push(99)).await.unwrap();
        let cases = [
            DispatchUpdatePush::default(),
            DispatchUpdatePush {
                dispatch_id: 99,
                updated_by_user_id: Some(0),
                ..DispatchUpdatePush::default()
            },
            DispatchUpdatePush {
                dispatch_id: 99,
                status: Some(" ".into()),
                ..DispatchUpdatePush::default()
            },
            DispatchUpdatePush {
                dispatch_id: 99,
                service_line_id: Some(-3),
                ..DispatchUpdatePush::default()
            },
        ];
        for case in cases {
            let err = reconciler.update_visit_from_dispatch(case).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }
}
