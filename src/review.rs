use crate::error::StoreError;
use crate::query;
use crate::record::{Sighting, SightingStatus};
use crate::store::RecordStore;
use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_APPROVAL_COMMENT: &str = "Sighting approved";
pub const REJECTION_COMMENT_REQUIRED: &str = "A comment is required to reject a sighting";
pub const SPECIALTY_REQUIRED: &str = "A specialty is required to flag a sighting for review";

/// Result of a transition the user asked for. Validation failures come back
/// as `success: false` and never touch the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Teacher-side review of submitted sightings.
///
/// `pending --approve--> verified` and `pending --reject--> rejected`; both
/// targets are terminal. Every move goes through
/// [`RecordStore::transition`], so a sighting is resolved at most once.
pub struct SightingReview<S> {
    store: S,
    reviewer_id: u64,
}

impl<S: RecordStore<Sighting>> SightingReview<S> {
    pub fn new(store: S, reviewer_id: u64) -> Self {
        Self { store, reviewer_id }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A sighting that left `pending` while the review was in flight is a
    /// failed outcome, not an error.
    fn settle(result: Result<Sighting, StoreError>, message: String) -> Result<Outcome, StoreError> {
        match result {
            Ok(_) => Ok(Outcome::ok(message)),
            Err(StoreError::Conflict { id, .. }) => {
                warn!("Sighting {} was already reviewed, ignoring review", id);
                Ok(Outcome::failed(format!("Sighting {} was already reviewed", id)))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn approve(&self, id: u64, points: u32, comment: &str) -> Result<Outcome, StoreError> {
        let comment = if comment.trim().is_empty() {
            DEFAULT_APPROVAL_COMMENT
        } else {
            comment
        };
        let reviewer = self.reviewer_id;

        let result = self
            .store
            .transition(id, SightingStatus::Pending, "approve", |sighting| {
                sighting.verification_status = SightingStatus::Verified;
                sighting.verified_at = Some(Utc::now());
                sighting.verified_by = Some(reviewer);
                sighting.verification_comment = Some(comment.to_string());
                sighting.reward_points = Some(points);
            })
            .await;

        if result.is_ok() {
            info!("Approved sighting {} with {} points", id, points);
        }
        Self::settle(result, format!("Sighting approved. {} points awarded.", points))
    }

    pub async fn reject(&self, id: u64, comment: &str) -> Result<Outcome, StoreError> {
        if comment.trim().is_empty() {
            return Ok(Outcome::failed(REJECTION_COMMENT_REQUIRED));
        }
        let reviewer = self.reviewer_id;

        let result = self
            .store
            .transition(id, SightingStatus::Pending, "reject", |sighting| {
                sighting.verification_status = SightingStatus::Rejected;
                sighting.verified_at = Some(Utc::now());
                sighting.verified_by = Some(reviewer);
                sighting.verification_comment = Some(comment.to_string());
            })
            .await;

        if result.is_ok() {
            info!("Rejected sighting {}", id);
        }
        Self::settle(result, "Sighting rejected".to_string())
    }

    /// Hand a pending sighting to a specialist. It stays pending, marked as
    /// needing expert consensus.
    pub async fn flag_for_review(&self, id: u64, specialty: &str, notes: &str) -> Result<Outcome, StoreError> {
        let specialty = specialty.trim();
        if specialty.is_empty() {
            return Ok(Outcome::failed(SPECIALTY_REQUIRED));
        }
        let review_notes = format!("Needs review by a {} expert. {}", specialty, notes.trim())
            .trim_end()
            .to_string();

        let result = self
            .store
            .transition(id, SightingStatus::Pending, "flag", |sighting| {
                sighting.flagged_for_review = true;
                sighting.expert_consensus_needed = true;
                sighting.review_notes = Some(review_notes);
            })
            .await;

        if result.is_ok() {
            info!("Flagged sighting {} for a {} expert", id, specialty);
        }
        Self::settle(result, format!("Flagged for review by a {} expert", specialty))
    }

    /// Approve several sightings, at most `max_concurrent` in flight.
    /// Each id gets its own outcome; a missing id does not stop the batch.
    pub async fn approve_many(
        &self,
        ids: &[u64],
        points: u32,
        comment: &str,
        max_concurrent: usize,
    ) -> Vec<(u64, Outcome)> {
        self.review_many(ids, "Approving sightings", max_concurrent, |id| {
            self.approve(id, points, comment)
        })
        .await
    }

    /// Reject several sightings with one shared reason. A blank reason fails
    /// every id before any sighting is looked at.
    pub async fn reject_many(&self, ids: &[u64], comment: &str, max_concurrent: usize) -> Vec<(u64, Outcome)> {
        if comment.trim().is_empty() {
            warn!("Refusing to reject {} sightings without a comment", ids.len());
            return unique(ids)
                .into_iter()
                .map(|id| (id, Outcome::failed(REJECTION_COMMENT_REQUIRED)))
                .collect();
        }
        self.review_many(ids, "Rejecting sightings", max_concurrent, |id| {
            self.reject(id, comment)
        })
        .await
    }

    async fn review_many<F, Fut>(
        &self,
        ids: &[u64],
        label: &'static str,
        max_concurrent: usize,
        review: F,
    ) -> Vec<(u64, Outcome)>
    where
        F: Fn(u64) -> Fut,
        Fut: Future<Output = Result<Outcome, StoreError>>,
    {
        let ids = unique(ids);
        let progress_bar = ProgressBar::new(ids.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/white} {pos:>4}/{len:4} {msg}")
        {
            progress_bar.set_style(style.progress_chars("##-"));
        }
        progress_bar.set_message(label);

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let pb = Arc::new(progress_bar);
        let mut tasks = Vec::new();

        for &id in &ids {
            let permit = Arc::clone(&semaphore);
            let progress = Arc::clone(&pb);
            let pending = review(id);

            tasks.push(async move {
                let _permit = permit.acquire().await;
                let outcome = match pending.await {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome::failed(e.to_string()),
                };
                progress.inc(1);
                (id, outcome)
            });
        }

        let results = join_all(tasks).await;
        pb.finish_and_clear();

        let done = results.iter().filter(|(_, o)| o.success).count();
        info!("{}: {} out of {} done", label, done, ids.len());
        results
    }

    pub async fn by_status(&self, status: SightingStatus) -> Result<Vec<Sighting>, StoreError> {
        Ok(query::by_status(&self.store.list().await?, status))
    }
}

/// Ids in first-seen order, each once.
fn unique(ids: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
