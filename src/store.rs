use crate::error::StoreError;
use crate::record::Record;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

/// Ordered collection of records, newest first.
///
/// Operations on an id that is not present fail with
/// [`StoreError::NotFound`] instead of silently succeeding.
#[allow(async_fn_in_trait)]
pub trait RecordStore<R: Record> {
    async fn list(&self) -> Result<Vec<R>, StoreError>;

    async fn get(&self, id: u64) -> Result<R, StoreError>;

    async fn create(&self, draft: R::Draft) -> Result<R, StoreError>;

    async fn update(&self, id: u64, patch: R::Patch) -> Result<R, StoreError>;

    async fn delete(&self, id: u64) -> Result<(), StoreError>;

    /// Apply `change` only while the record still has status `expected`.
    /// The check and the write land as one step, so of two racing
    /// transitions on the same id only one succeeds; the other fails with
    /// [`StoreError::Conflict`]. `action` names the move, e.g. `approve`.
    async fn transition<F>(
        &self,
        id: u64,
        expected: R::Status,
        action: &str,
        change: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut R);
}

/// In-memory store standing in for the backend. Every write waits a fixed
/// delay before it lands, like a network round trip would.
pub struct MemoryStore<R> {
    records: Mutex<Vec<R>>,
    pub(crate) delay: Duration,
}

impl<R: Record> MemoryStore<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records: Mutex::new(records),
            delay: Duration::from_millis(500),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<R>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn latency(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

impl<R: Record> RecordStore<R> for MemoryStore<R> {
    async fn list(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.lock().clone())
    }

    async fn get(&self, id: u64) -> Result<R, StoreError> {
        self.lock()
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, draft: R::Draft) -> Result<R, StoreError> {
        self.latency().await;

        let mut records = self.lock();
        let id = records.iter().map(|r| r.id()).max().unwrap_or(0) + 1;
        let record = R::from_draft(id, draft, Utc::now());
        records.insert(0, record.clone());
        info!("Created {} record {}", R::COLLECTION, id);
        Ok(record)
    }

    async fn update(&self, id: u64, patch: R::Patch) -> Result<R, StoreError> {
        self.latency().await;

        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        record.apply(patch);
        debug!("Updated {} record {}", R::COLLECTION, id);
        Ok(record.clone())
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.latency().await;

        let mut records = self.lock();
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id));
        }
        info!("Deleted {} record {}", R::COLLECTION, id);
        Ok(())
    }

    async fn transition<F>(
        &self,
        id: u64,
        expected: R::Status,
        action: &str,
        change: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut R),
    {
        self.latency().await;

        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        if record.status() != expected {
            warn!(
                "Cannot {} {} record {}: it is {}, not {}",
                action,
                R::COLLECTION,
                id,
                record.status(),
                expected
            );
            return Err(StoreError::Conflict {
                id,
                expected: expected.to_string(),
            });
        }
        change(record);
        debug!("{} {} record {}, now {}", action, R::COLLECTION, id, record.status());
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        Activity, ActivityDraft, ActivityPatch, ActivityStatus, Reporter, SightingDraft,
        SightingPatch, SightingStatus,
    };
    use crate::seed;

    fn store() -> MemoryStore<Activity> {
        MemoryStore::new(seed::sample_activities()).with_delay(0)
    }

    #[tokio::test]
    async fn test_store_creation() {
        let store = MemoryStore::new(seed::sample_activities());
        assert_eq!(store.delay, Duration::from_millis(500));
        assert_eq!(store.len(), 4);

        let store = store.with_delay(20);
        assert_eq!(store.delay, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_create_assigns_next_id_and_prepends() {
        let store = store();
        let created = store
            .create(ActivityDraft {
                title: "Night walk".to_string(),
                ..ActivityDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id, 5);
        assert_eq!(created.status, ActivityStatus::Active);
        assert!(created.assigned_to.is_empty());
        assert_eq!(store.list().await.unwrap()[0].id, 5);
    }

    #[tokio::test]
    async fn test_create_on_empty_store_starts_at_one() {
        let store: MemoryStore<Activity> = MemoryStore::new(Vec::new()).with_delay(0);
        let created = store.create(ActivityDraft::default()).await.unwrap();
        assert_eq!(created.id, 1);
    }

    #[tokio::test]
    async fn test_create_then_delete_restores_size() {
        let store = store();
        let before = store.len();

        let created = store.create(ActivityDraft::default()).await.unwrap();
        assert_eq!(store.len(), before + 1);

        store.delete(created.id).await.unwrap();
        assert_eq!(store.len(), before);
    }

    #[tokio::test]
    async fn test_missing_ids_are_reported() {
        let store = store();

        let err = store.delete(99).await.unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .update(99, ActivityPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(99)));

        assert!(store.get(99).await.unwrap_err().is_not_found());
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_sighting_draft_and_patch() {
        let store = MemoryStore::new(seed::sample_sightings()).with_delay(0);
        let created = store
            .create(SightingDraft {
                reporter: Reporter {
                    id: 3,
                    username: "maria_torres".to_string(),
                    full_name: "María Torres".to_string(),
                },
                species: "Rupicola peruvianus".to_string(),
                common_name: Some("Gallito de las Rocas".to_string()),
                ..SightingDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, 6);
        assert_eq!(created.verification_status, SightingStatus::Pending);

        let patched = store
            .update(
                6,
                SightingPatch {
                    notes: Some("Seen at dawn".to_string()),
                    ..SightingPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.notes, "Seen at dawn");
        assert_eq!(patched.reporter.id, 3);
        assert_eq!(patched.created_at, created.created_at);
        assert!(patched.verified_at.is_none());
    }

    #[tokio::test]
    async fn test_transition_checks_status_before_writing() {
        let store = store();

        let done = store
            .transition(2, ActivityStatus::Active, "complete", |a| {
                a.status = ActivityStatus::Completed;
            })
            .await
            .unwrap();
        assert_eq!(done.status, ActivityStatus::Completed);

        let err = store
            .transition(2, ActivityStatus::Active, "complete", |a| {
                a.title = "Changed".to_string();
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { id: 2, .. }));
        assert_ne!(store.get(2).await.unwrap().title, "Changed");

        let err = store
            .transition(99, ActivityStatus::Active, "complete", |_| {})
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_racing_transitions_apply_once() {
        let store = MemoryStore::new(seed::sample_sightings()).with_delay(20);

        let (first, second) = tokio::join!(
            store.transition(1, SightingStatus::Pending, "approve", |s| {
                s.verification_status = SightingStatus::Verified;
            }),
            store.transition(1, SightingStatus::Pending, "reject", |s| {
                s.verification_status = SightingStatus::Rejected;
            }),
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert!(store.get(1).await.unwrap().verification_status.is_terminal());
    }

    #[tokio::test]
    async fn test_update_keeps_identity_fields() {
        let store = store();
        let original = store.get(2).await.unwrap();

        let updated = store
            .update(
                2,
                ActivityPatch {
                    title: Some("Renamed".to_string()),
                    ..ActivityPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_by, original.created_by);
        assert_eq!(updated.created_at, original.created_at);
    }
}
