use crate::error::StoreError;
use crate::query;
use crate::record::{Activity, ActivityDraft, ActivityPatch, ActivityStatus};
use crate::review::Outcome;
use crate::store::RecordStore;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

/// Window before the deadline in which an activity counts as due soon.
pub const DUE_SOON_WINDOW_DAYS: i64 = 3;

/// Display flag only. Expiry is derived from the deadline at read time and
/// is never written back to `status`, so the two can disagree.
pub fn is_expired(activity: &Activity, now: DateTime<Utc>) -> bool {
    activity.deadline.is_some_and(|deadline| deadline < now)
}

pub fn is_due_soon(activity: &Activity, now: DateTime<Utc>) -> bool {
    activity.deadline.is_some_and(|deadline| {
        deadline >= now && deadline - now < Duration::days(DUE_SOON_WINDOW_DAYS)
    })
}

/// Teacher-side management of activities and their assignments.
pub struct ActivityManager<S> {
    store: S,
}

impl<S: RecordStore<Activity>> ActivityManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create(&self, draft: ActivityDraft) -> Result<Activity, StoreError> {
        self.store.create(draft).await
    }

    pub async fn update(&self, id: u64, patch: ActivityPatch) -> Result<Activity, StoreError> {
        self.store.update(id, patch).await
    }

    pub async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.store.delete(id).await
    }

    /// Union `user_ids` into the assignees. Assigning someone twice is a no-op.
    pub async fn assign(&self, id: u64, user_ids: &[u64]) -> Result<Outcome, StoreError> {
        let mut added = 0;
        let result = self
            .store
            .transition(id, ActivityStatus::Active, "assign", |activity| {
                let before = activity.assigned_to.len();
                activity.assigned_to.extend(user_ids.iter().copied());
                activity.sync_counts();
                added = activity.assigned_to.len() - before;
            })
            .await;

        match result {
            Ok(activity) => {
                let total = activity.total_assigned;
                info!("Assigned {} new students to activity {} ({} total)", added, id, total);
                Ok(Outcome::ok(format!(
                    "{} students assigned ({} total)",
                    added, total
                )))
            }
            Err(StoreError::Conflict { .. }) => {
                warn!("Refusing to assign students to inactive activity {}", id);
                Ok(Outcome::failed(format!(
                    "Activity {} is no longer active and cannot take new students",
                    id
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Mark `student_id` as done. Once every assignee has completed the
    /// activity it moves to `completed`.
    pub async fn record_completion(&self, id: u64, student_id: u64) -> Result<Outcome, StoreError> {
        let activity = self.store.get(id).await?;
        if activity.status != ActivityStatus::Active {
            return Ok(Outcome::failed(format!(
                "Activity {} is already {}",
                id, activity.status
            )));
        }
        // assignees only ever grow, so this check cannot go stale
        if !activity.assigned_to.contains(&student_id) {
            return Ok(Outcome::failed(format!(
                "Student {} is not assigned to activity {}",
                student_id, id
            )));
        }
        if activity.completed_by.contains(&student_id) {
            return Ok(Outcome::ok(format!(
                "Student {} had already completed activity {}",
                student_id, id
            )));
        }

        let result = self
            .store
            .transition(id, ActivityStatus::Active, "complete", |activity| {
                activity.completed_by.insert(student_id);
                activity.sync_counts();
                if activity.completion_count == activity.total_assigned {
                    activity.status = ActivityStatus::Completed;
                    if activity.completed_at.is_none() {
                        activity.completed_at = Some(Utc::now());
                    }
                }
            })
            .await;

        let activity = match result {
            Ok(activity) => activity,
            Err(StoreError::Conflict { .. }) => {
                return Ok(Outcome::failed(format!("Activity {} is no longer active", id)));
            }
            Err(e) => return Err(e),
        };

        info!("Student {} completed activity {}", student_id, id);
        if activity.status == ActivityStatus::Completed {
            info!("Activity {} completed by every assignee", id);
        }
        Ok(Outcome::ok(format!(
            "Completion recorded. {} points earned.",
            activity.reward_points
        )))
    }

    pub async fn by_status(&self, status: ActivityStatus) -> Result<Vec<Activity>, StoreError> {
        Ok(query::by_status(&self.store.list().await?, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ActivityKind;
    use crate::seed;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    fn manager() -> ActivityManager<MemoryStore<Activity>> {
        ActivityManager::new(MemoryStore::new(seed::sample_activities()).with_delay(0))
    }

    async fn fresh(manager: &ActivityManager<MemoryStore<Activity>>) -> Activity {
        manager
            .create(ActivityDraft {
                title: "Bird count".to_string(),
                kind: ActivityKind::Exploration,
                reward_points: 30,
                created_by: 1,
                ..ActivityDraft::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_assign_is_idempotent_union() {
        let manager = manager();
        let activity = fresh(&manager).await;

        manager.assign(activity.id, &[2, 3]).await.unwrap();
        let outcome = manager.assign(activity.id, &[3, 4]).await.unwrap();
        assert!(outcome.success);

        let stored = manager.store().get(activity.id).await.unwrap();
        assert_eq!(stored.assigned_to, BTreeSet::from([2, 3, 4]));
        assert_eq!(stored.total_assigned, 3);
    }

    #[tokio::test]
    async fn test_assign_missing_activity() {
        let manager = manager();
        assert!(manager.assign(77, &[1]).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_assign_rejected_on_completed_activity() {
        let manager = manager();
        let outcome = manager.assign(4, &[1]).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(manager.store().get(4).await.unwrap().total_assigned, 2);
    }

    #[tokio::test]
    async fn test_completion_by_all_assignees_completes_once() {
        let manager = manager();

        // activity 2 is assigned to 1 and 2, student 1 already done
        let outcome = manager.record_completion(2, 3).await.unwrap();
        assert!(!outcome.success);

        let outcome = manager.record_completion(2, 1).await.unwrap();
        assert!(outcome.success);
        assert_eq!(manager.store().get(2).await.unwrap().completion_count, 1);

        manager.record_completion(2, 2).await.unwrap();
        let done = manager.store().get(2).await.unwrap();
        assert_eq!(done.status, ActivityStatus::Completed);
        assert_eq!(done.completion_count, 2);
        let completed_at = done.completed_at;
        assert!(completed_at.is_some());

        let outcome = manager.record_completion(2, 2).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(manager.store().get(2).await.unwrap().completed_at, completed_at);
    }

    #[tokio::test]
    async fn test_expiry_is_derived_not_stored() {
        let manager = manager();
        let activity = manager.store().get(2).await.unwrap();
        let later = Utc::now() + Duration::days(5);

        assert!(is_expired(&activity, later));
        assert_eq!(activity.status, ActivityStatus::Active);
        assert_eq!(
            manager.by_status(ActivityStatus::Expired).await.unwrap().len(),
            0
        );
    }

    #[test]
    fn test_due_soon_window() {
        let now = Utc::now();
        let mut activity = seed::sample_activities().remove(0);

        activity.deadline = Some(now + Duration::days(2));
        assert!(is_due_soon(&activity, now));
        assert!(!is_expired(&activity, now));

        activity.deadline = Some(now + Duration::days(10));
        assert!(!is_due_soon(&activity, now));

        activity.deadline = Some(now - Duration::hours(1));
        assert!(!is_due_soon(&activity, now));
        assert!(is_expired(&activity, now));

        activity.deadline = None;
        assert!(!is_expired(&activity, now));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let manager = manager();
        let activity = fresh(&manager).await;

        let updated = manager
            .update(
                activity.id,
                ActivityPatch {
                    reward_points: Some(45),
                    ..ActivityPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.reward_points, 45);
        assert_eq!(updated.status, ActivityStatus::Active);

        manager.delete(activity.id).await.unwrap();
        assert!(manager.delete(activity.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_completions_are_all_kept() {
        let store = MemoryStore::new(seed::sample_activities()).with_delay(10);
        let manager = ActivityManager::new(store);
        let activity = fresh(&manager).await;
        manager.assign(activity.id, &[1, 2, 3]).await.unwrap();

        let (a, b, c) = tokio::join!(
            manager.record_completion(activity.id, 1),
            manager.record_completion(activity.id, 2),
            manager.record_completion(activity.id, 3),
        );
        assert!(a.unwrap().success && b.unwrap().success && c.unwrap().success);

        let done = manager.store().get(activity.id).await.unwrap();
        assert_eq!(done.completed_by, BTreeSet::from([1, 2, 3]));
        assert_eq!(done.completion_count, 3);
        assert_eq!(done.status, ActivityStatus::Completed);
    }
}
