//! Local persistence contract and an in-memory implementation.
//!
//! The relational query layer is out of scope for this crate; [`VisitStore`] captures the calls
//! the orchestration needs. Not-found is an ordinary outcome (`Ok(None)`), never an error.
//!
//! The one guarantee every implementation must provide: inserting a visit whose dispatch id is
//! already taken fails with [`StoreError::UniqueViolation`]. Callers rely on it to detect a
//! concurrent writer that slipped in between their existence check and their insert.

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Episode, EpisodeUpdate, NewEpisode, NewPatient, NewVisit, Patient, Visit,
    VisitDispatchUpdate, VisitStatusUpdate,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
#[cfg(any(test, feature = "test-support"))]
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which episode a reconciled visit is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeTarget {
    Existing(i64),
    /// Open a new episode for a patient already on file.
    NewForPatient { patient_id: i64, episode: NewEpisode },
    /// Open a new episode, reusing the patient with the same medical record number if one
    /// appeared since the caller looked.
    New {
        patient: NewPatient,
        episode: NewEpisode,
    },
}

/// Rows written by [`VisitStore::insert_reconciled_visit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledVisit {
    pub visit: Visit,
    /// Set when a new episode was opened.
    pub episode: Option<Episode>,
    /// Owner of the new episode, found or created.
    pub patient: Option<Patient>,
    pub patient_created: bool,
}

#[async_trait]
pub trait VisitStore: Send + Sync {
    async fn get_visit(&self, visit_id: i64) -> StoreResult<Option<Visit>>;

    async fn get_visit_by_dispatch_id(&self, dispatch_id: i64) -> StoreResult<Option<Visit>>;

    async fn create_visit(&self, visit: NewVisit) -> StoreResult<Visit>;

    /// Returns `None` when the visit does not exist.
    async fn update_visit_status_and_providers(
        &self,
        update: VisitStatusUpdate,
    ) -> StoreResult<Option<Visit>>;

    /// Applies the booking peer's view of a visit, found by dispatch id. Returns `None` when no
    /// visit mirrors that dispatch record.
    async fn update_visit_by_dispatch_id(
        &self,
        update: VisitDispatchUpdate,
    ) -> StoreResult<Option<Visit>>;

    /// Returns `None` when the visit does not exist.
    async fn update_visit_episode(
        &self,
        visit_id: i64,
        episode_id: i64,
    ) -> StoreResult<Option<Visit>>;

    async fn get_episode(&self, episode_id: i64) -> StoreResult<Option<Episode>>;

    /// Returns `None` when the episode does not exist.
    async fn update_episode(
        &self,
        episode_id: i64,
        update: EpisodeUpdate,
    ) -> StoreResult<Option<Episode>>;

    async fn get_episode_by_original_dispatch_id(
        &self,
        dispatch_id: i64,
    ) -> StoreResult<Option<Episode>>;

    /// Visits of an episode, newest first.
    async fn list_episode_visits(&self, episode_id: i64) -> StoreResult<Vec<Visit>>;

    async fn find_patient_by_medical_record_number(
        &self,
        medical_record_number: &str,
    ) -> StoreResult<Option<Patient>>;

    /// Writes the visit, and the patient and episode when `target` asks for new ones, in one
    /// local transaction. `visit.episode_id` is replaced by the resolved episode id.
    async fn insert_reconciled_visit(
        &self,
        target: EpisodeTarget,
        visit: NewVisit,
    ) -> StoreResult<ReconciledVisit>;
}

#[derive(Default)]
struct State {
    visits: BTreeMap<i64, Visit>,
    episodes: BTreeMap<i64, Episode>,
    patients: BTreeMap<i64, Patient>,
    next_visit_id: i64,
    next_episode_id: i64,
    next_patient_id: i64,
    #[cfg(any(test, feature = "test-support"))]
    armed_races: HashMap<i64, NewVisit>,
}

impl State {
    fn insert_visit(&mut self, new: NewVisit) -> StoreResult<Visit> {
        if let Some(dispatch_id) = new.dispatch_id {
            if self
                .visits
                .values()
                .any(|v| v.dispatch_id == Some(dispatch_id))
            {
                return Err(StoreError::UniqueViolation { dispatch_id });
            }
        }
        self.next_visit_id += 1;
        let now = Utc::now();
        let visit = Visit {
            id: self.next_visit_id,
            episode_id: new.episode_id,
            dispatch_id: new.dispatch_id,
            status: new.status,
            status_updated_at: new.status_updated_at,
            patient_availability: new.patient_availability,
            car_id: new.car_id,
            provider_user_ids: new.provider_user_ids,
            created_by_user_id: new.created_by_user_id,
            updated_by_user_id: None,
            created_at: now,
            updated_at: now,
        };
        self.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    fn insert_patient(&mut self, new: NewPatient) -> Patient {
        self.next_patient_id += 1;
        let patient = Patient {
            id: self.next_patient_id,
            first_name: new.first_name,
            last_name: new.last_name,
            medical_record_number: new.medical_record_number.into_inner(),
            created_at: Utc::now(),
        };
        self.patients.insert(patient.id, patient.clone());
        patient
    }

    fn insert_episode(&mut self, patient_id: i64, new: NewEpisode) -> Episode {
        self.next_episode_id += 1;
        let episode = Episode {
            id: self.next_episode_id,
            patient_id,
            market_id: new.market_id,
            service_line_id: new.service_line_id,
            original_dispatch_id: new.original_dispatch_id,
            created_at: Utc::now(),
        };
        self.episodes.insert(episode.id, episode.clone());
        episode
    }

    fn patient_by_mrn(&self, medical_record_number: &str) -> Option<&Patient> {
        self.patients
            .values()
            .find(|p| p.medical_record_number == medical_record_number)
    }
}

/// Process-local store backed by a mutex-guarded map. The lock is never held across an await.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    /// Opens an episode directly, outside the reconciliation path.
    pub fn open_episode(&self, patient: NewPatient, episode: NewEpisode) -> StoreResult<Episode> {
        let mut state = self.state()?;
        let patient_id = match state.patient_by_mrn(patient.medical_record_number.as_str()) {
            Some(existing) => existing.id,
            None => state.insert_patient(patient).id,
        };
        Ok(state.insert_episode(patient_id, episode))
    }

    pub fn visit_count(&self) -> StoreResult<usize> {
        Ok(self.state()?.visits.len())
    }

    pub fn episode_count(&self) -> StoreResult<usize> {
        Ok(self.state()?.episodes.len())
    }

    pub fn patient_count(&self) -> StoreResult<usize> {
        Ok(self.state()?.patients.len())
    }

    /// Arms a concurrent writer: the next `create_visit` for `visit.dispatch_id` first sees
    /// `visit` land, as if a push arrived between the caller's existence check and its insert.
    #[cfg(any(test, feature = "test-support"))]
    pub fn arm_concurrent_insert(&self, visit: NewVisit) -> StoreResult<()> {
        let dispatch_id = visit
            .dispatch_id
            .ok_or_else(|| StoreError::Backend("armed visit needs a dispatch id".into()))?;
        self.state()?.armed_races.insert(dispatch_id, visit);
        Ok(())
    }
}

#[async_trait]
impl VisitStore for InMemoryStore {
    async fn get_visit(&self, visit_id: i64) -> StoreResult<Option<Visit>> {
        Ok(self.state()?.visits.get(&visit_id).cloned())
    }

    async fn get_visit_by_dispatch_id(&self, dispatch_id: i64) -> StoreResult<Option<Visit>> {
        Ok(self
            .state()?
            .visits
            .values()
            .find(|v| v.dispatch_id == Some(dispatch_id))
            .cloned())
    }

    async fn create_visit(&self, visit: NewVisit) -> StoreResult<Visit> {
        let mut state = self.state()?;
        #[cfg(any(test, feature = "test-support"))]
        if let Some(racing) = visit
            .dispatch_id
            .and_then(|id| state.armed_races.remove(&id))
        {
            state.insert_visit(racing)?;
        }
        state.insert_visit(visit)
    }

    async fn update_visit_status_and_providers(
        &self,
        update: VisitStatusUpdate,
    ) -> StoreResult<Option<Visit>> {
        let mut state = self.state()?;
        let Some(visit) = state.visits.get_mut(&update.visit_id) else {
            return Ok(None);
        };
        visit.status = Some(update.status);
        visit.status_updated_at = Some(update.updated_at);
        if let Some(providers) = update.provider_user_ids {
            visit.provider_user_ids = providers;
        }
        visit.updated_by_user_id = Some(update.updated_by_user_id);
        visit.updated_at = update.updated_at;
        Ok(Some(visit.clone()))
    }

    async fn update_visit_by_dispatch_id(
        &self,
        update: VisitDispatchUpdate,
    ) -> StoreResult<Option<Visit>> {
        let mut state = self.state()?;
        let Some(visit) = state
            .visits
            .values_mut()
            .find(|v| v.dispatch_id == Some(update.dispatch_id))
        else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            visit.status = Some(status);
        }
        if let Some(at) = update.status_updated_at {
            visit.status_updated_at = Some(at);
        }
        if let Some(window) = update.patient_availability {
            visit.patient_availability = Some(window);
        }
        if let Some(car_id) = update.car_id {
            visit.car_id = Some(car_id);
        }
        if let Some(providers) = update.provider_user_ids {
            visit.provider_user_ids = providers;
        }
        if let Some(user_id) = update.updated_by_user_id {
            visit.updated_by_user_id = Some(user_id);
        }
        visit.updated_at = Utc::now();
        Ok(Some(visit.clone()))
    }

    async fn update_visit_episode(
        &self,
        visit_id: i64,
        episode_id: i64,
    ) -> StoreResult<Option<Visit>> {
        let mut state = self.state()?;
        let Some(visit) = state.visits.get_mut(&visit_id) else {
            return Ok(None);
        };
        visit.episode_id = episode_id;
        visit.updated_at = Utc::now();
        Ok(Some(visit.clone()))
    }

    async fn get_episode(&self, episode_id: i64) -> StoreResult<Option<Episode>> {
        Ok(self.state()?.episodes.get(&episode_id).cloned())
    }

    async fn update_episode(
        &self,
        episode_id: i64,
        update: EpisodeUpdate,
    ) -> StoreResult<Option<Episode>> {
        let mut state = self.state()?;
        let Some(episode) = state.episodes.get_mut(&episode_id) else {
            return Ok(None);
        };
        if let Some(service_line_id) = update.service_line_id {
            episode.service_line_id = service_line_id;
        }
        if let Some(original) = update.original_dispatch_id {
            episode.original_dispatch_id = Some(original);
        }
        Ok(Some(episode.clone()))
    }

    async fn get_episode_by_original_dispatch_id(
        &self,
        dispatch_id: i64,
    ) -> StoreResult<Option<Episode>> {
        Ok(self
            .state()?
            .episodes
            .values()
            .find(|e| e.original_dispatch_id == Some(dispatch_id))
            .cloned())
    }

    async fn list_episode_visits(&self, episode_id: i64) -> StoreResult<Vec<Visit>> {
        let state = self.state()?;
        Ok(state
            .visits
            .values()
            .rev()
            .filter(|v| v.episode_id == episode_id)
            .cloned()
            .collect())
    }

    async fn find_patient_by_medical_record_number(
        &self,
        medical_record_number: &str,
    ) -> StoreResult<Option<Patient>> {
        Ok(self.state()?.patient_by_mrn(medical_record_number).cloned())
    }

    async fn insert_reconciled_visit(
        &self,
        target: EpisodeTarget,
        mut visit: NewVisit,
    ) -> StoreResult<ReconciledVisit> {
        let mut state = self.state()?;

        // Uniqueness is checked before anything is written so a failed insert leaves no
        // orphaned patient or episode behind.
        if let Some(dispatch_id) = visit.dispatch_id {
            if state
                .visits
                .values()
                .any(|v| v.dispatch_id == Some(dispatch_id))
            {
                return Err(StoreError::UniqueViolation { dispatch_id });
            }
        }

        let (episode, patient, patient_created) = match target {
            EpisodeTarget::Existing(episode_id) => {
                if !state.episodes.contains_key(&episode_id) {
                    return Err(StoreError::Backend(format!(
                        "episode {episode_id} does not exist"
                    )));
                }
                visit.episode_id = episode_id;
                (None, None, false)
            }
            EpisodeTarget::NewForPatient {
                patient_id,
                episode,
            } => {
                let patient = state.patients.get(&patient_id).cloned().ok_or_else(|| {
                    StoreError::Backend(format!("patient {patient_id} does not exist"))
                })?;
                let episode = state.insert_episode(patient.id, episode);
                visit.episode_id = episode.id;
                (Some(episode), Some(patient), false)
            }
            EpisodeTarget::New { patient, episode } => {
                let (patient, created) =
                    match state.patient_by_mrn(patient.medical_record_number.as_str()) {
                        Some(existing) => (existing.clone(), false),
                        None => (state.insert_patient(patient), true),
                    };
                let episode = state.insert_episode(patient.id, episode);
                visit.episode_id = episode.id;
                (Some(episode), Some(patient), created)
            }
        };

        let visit = state.insert_visit(visit)?;
        Ok(ReconciledVisit {
            visit,
            episode,
            patient,
            patient_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremanager_types::NonEmptyText;

    fn new_patient(mrn: &str) -> NewPatient {
        NewPatient {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            medical_record_number: NonEmptyText::new("medical_record_number", mrn).unwrap(),
        }
    }

    fn new_episode() -> NewEpisode {
        NewEpisode {
            market_id: 159,
            service_line_id: 9,
            original_dispatch_id: None,
        }
    }

    fn dispatch_visit(episode_id: i64, dispatch_id: i64) -> NewVisit {
        NewVisit {
            episode_id,
            dispatch_id: Some(dispatch_id),
            status: Some("accepted".into()),
            ..NewVisit::default()
        }
    }

    #[tokio::test]
    async fn test_create_visit_enforces_dispatch_uniqueness() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();

        let first = store.create_visit(dispatch_visit(episode.id, 42)).await.unwrap();
        let err = store
            .create_visit(dispatch_visit(episode.id, 42))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation { dispatch_id: 42 });

        let found = store.get_visit_by_dispatch_id(42).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(store.visit_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_visits_without_dispatch_id_are_not_unique_constrained() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();
        for _ in 0..2 {
            store
                .create_visit(NewVisit {
                    episode_id: episode.id,
                    ..NewVisit::default()
                })
                .await
                .unwrap();
        }
        assert_eq!(store.list_episode_visits(episode.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_armed_race_lands_before_insert() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();
        store.arm_concurrent_insert(dispatch_visit(episode.id, 7)).unwrap();

        let err = store.create_visit(dispatch_visit(episode.id, 7)).await.unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation { dispatch_id: 7 });
        assert!(store.get_visit_by_dispatch_id(7).await.unwrap().is_some());

        // One-shot.
        store.create_visit(dispatch_visit(episode.id, 8)).await.unwrap();
        assert_eq!(store.visit_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_status_update_keeps_providers_when_none() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();
        let visit = store
            .create_visit(NewVisit {
                provider_user_ids: vec![5, 6],
                ..dispatch_visit(episode.id, 1)
            })
            .await
            .unwrap();

        let updated = store
            .update_visit_status_and_providers(VisitStatusUpdate {
                visit_id: visit.id,
                status: "on_route".into(),
                provider_user_ids: None,
                updated_by_user_id: 3,
                updated_at: Utc::now(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status.as_deref(), Some("on_route"));
        assert_eq!(updated.provider_user_ids, vec![5, 6]);
        assert_eq!(updated.updated_by_user_id, Some(3));

        let missing = store
            .update_visit_status_and_providers(VisitStatusUpdate {
                visit_id: 999,
                status: "on_route".into(),
                provider_user_ids: None,
                updated_by_user_id: 3,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_by_dispatch_id_keeps_unreported_fields() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();
        store
            .create_visit(NewVisit {
                car_id: Some(4),
                provider_user_ids: vec![5],
                ..dispatch_visit(episode.id, 42)
            })
            .await
            .unwrap();

        let updated = store
            .update_visit_by_dispatch_id(VisitDispatchUpdate {
                dispatch_id: 42,
                status: Some("archived".into()),
                updated_by_user_id: Some(8),
                ..VisitDispatchUpdate::default()
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status.as_deref(), Some("archived"));
        assert_eq!(updated.car_id, Some(4));
        assert_eq!(updated.provider_user_ids, vec![5]);
        assert_eq!(updated.updated_by_user_id, Some(8));

        let missing = store
            .update_visit_by_dispatch_id(VisitDispatchUpdate {
                dispatch_id: 43,
                ..VisitDispatchUpdate::default()
            })
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_episode_service_line() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();
        let updated = store
            .update_episode(
                episode.id,
                EpisodeUpdate {
                    service_line_id: Some(4),
                    original_dispatch_id: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.service_line_id, 4);
        assert_eq!(updated.original_dispatch_id, None);
        assert!(store
            .update_episode(999, EpisodeUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reconciled_insert_reuses_patient_by_mrn() {
        let store = InMemoryStore::new();
        let existing = store.open_episode(new_patient("MRN-9"), new_episode()).unwrap();

        let written = store
            .insert_reconciled_visit(
                EpisodeTarget::New {
                    patient: new_patient("MRN-9"),
                    episode: new_episode(),
                },
                dispatch_visit(0, 55),
            )
            .await
            .unwrap();

        assert!(!written.patient_created);
        let episode = written.episode.unwrap();
        assert_eq!(episode.patient_id, existing.patient_id);
        assert_ne!(episode.id, existing.id);
        assert_eq!(written.visit.episode_id, episode.id);
        assert_eq!(store.patient_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconciled_insert_for_known_patient() {
        let store = InMemoryStore::new();
        let existing = store.open_episode(new_patient("MRN-3"), new_episode()).unwrap();
        let patient = store
            .find_patient_by_medical_record_number("MRN-3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patient.id, existing.patient_id);
        assert!(store
            .find_patient_by_medical_record_number("MRN-404")
            .await
            .unwrap()
            .is_none());

        let written = store
            .insert_reconciled_visit(
                EpisodeTarget::NewForPatient {
                    patient_id: patient.id,
                    episode: new_episode(),
                },
                dispatch_visit(0, 56),
            )
            .await
            .unwrap();
        assert!(!written.patient_created);
        assert_eq!(written.patient.unwrap().id, patient.id);
        assert_eq!(written.visit.episode_id, written.episode.unwrap().id);

        let err = store
            .insert_reconciled_visit(
                EpisodeTarget::NewForPatient {
                    patient_id: 999,
                    episode: new_episode(),
                },
                dispatch_visit(0, 57),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.episode_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reconciled_insert_conflict_writes_nothing() {
        let store = InMemoryStore::new();
        let episode = store.open_episode(new_patient("MRN-1"), new_episode()).unwrap();
        store.create_visit(dispatch_visit(episode.id, 12)).await.unwrap();

        let err = store
            .insert_reconciled_visit(
                EpisodeTarget::New {
                    patient: new_patient("MRN-2"),
                    episode: new_episode(),
                },
                dispatch_visit(0, 12),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation { dispatch_id: 12 });
        assert_eq!(store.episode_count().unwrap(), 1);
        assert_eq!(store.patient_count().unwrap(), 1);
    }
}
