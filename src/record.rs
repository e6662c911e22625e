use crate::stats::Tally;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Shared behaviour of everything a [`RecordStore`](crate::store::RecordStore) can hold.
///
/// Implementors own their status machine; the store only ever assigns ids,
/// applies patches and swaps whole records.
pub trait Record: Clone + Serialize + DeserializeOwned {
    type Status: Copy + Eq + fmt::Debug + fmt::Display + 'static;
    type Draft: Serialize;
    type Patch: Serialize;

    /// Path segment of the backend collection, e.g. `sightings`.
    const COLLECTION: &'static str;
    const STATUSES: &'static [Self::Status];

    fn id(&self) -> u64;
    fn owner_id(&self) -> u64;
    fn status(&self) -> Self::Status;
    fn from_draft(id: u64, draft: Self::Draft, now: DateTime<Utc>) -> Self;
    /// Merge a patch. Patches carry no id, owner, creation time or status.
    fn apply(&mut self, patch: Self::Patch);
    /// Fields the free-text search looks at.
    fn search_text(&self) -> Vec<&str>;
    fn tally(&self) -> Tally;

    /// Self-reported certainty in `0.0..=1.0`, for records that carry one.
    fn confidence(&self) -> Option<f64> {
        None
    }

    fn is_flagged(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SightingStatus {
    Pending,
    Verified,
    Rejected,
}

impl SightingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SightingStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SightingStatus::Pending => "pending",
            SightingStatus::Verified => "verified",
            SightingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SightingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SightingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SightingStatus::Pending),
            "verified" => Ok(SightingStatus::Verified),
            "rejected" => Ok(SightingStatus::Rejected),
            other => Err(format!("unknown sighting status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Completed,
    Expired,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Completed => "completed",
            ActivityStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(ActivityStatus::Active),
            "completed" => Ok(ActivityStatus::Completed),
            "expired" => Ok(ActivityStatus::Expired),
            other => Err(format!("unknown activity status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[default]
    Quiz,
    Exploration,
    Research,
    Reading,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Quiz => "quiz",
            ActivityKind::Exploration => "exploration",
            ActivityKind::Research => "research",
            ActivityKind::Reading => "reading",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiz" => Ok(ActivityKind::Quiz),
            "exploration" => Ok(ActivityKind::Exploration),
            "research" => Ok(ActivityKind::Research),
            "reading" => Ok(ActivityKind::Reading),
            other => Err(format!("unknown activity kind `{other}`")),
        }
    }
}

/// The student who reported a sighting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reporter {
    pub id: u64,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sighting {
    pub id: u64,
    #[serde(rename = "user")]
    pub reporter: Reporter,
    pub species: String,
    pub common_name: Option<String>,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub photo_url: String,
    pub description: String,
    pub notes: String,
    pub confidence_level: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub verification_status: SightingStatus,
    pub verified_by: Option<u64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verification_comment: Option<String>,
    pub reward_points: Option<u32>,
    /// Set when a reviewer asks a specialist to take a second look.
    #[serde(default)]
    pub flagged_for_review: bool,
    #[serde(default)]
    pub expert_consensus_needed: bool,
    #[serde(default)]
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SightingDraft {
    #[serde(rename = "user")]
    pub reporter: Reporter,
    pub species: String,
    pub common_name: Option<String>,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub photo_url: String,
    pub description: String,
    pub notes: String,
    pub confidence_level: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SightingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Sighting {
    pub fn display_name(&self) -> &str {
        self.common_name.as_deref().unwrap_or(&self.species)
    }
}

impl Record for Sighting {
    type Status = SightingStatus;
    type Draft = SightingDraft;
    type Patch = SightingPatch;

    const COLLECTION: &'static str = "sightings";
    const STATUSES: &'static [SightingStatus] = &[
        SightingStatus::Pending,
        SightingStatus::Verified,
        SightingStatus::Rejected,
    ];

    fn id(&self) -> u64 {
        self.id
    }

    fn owner_id(&self) -> u64 {
        self.reporter.id
    }

    fn status(&self) -> SightingStatus {
        self.verification_status
    }

    fn from_draft(id: u64, draft: SightingDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            reporter: draft.reporter,
            species: draft.species,
            common_name: draft.common_name,
            location: draft.location,
            coordinates: draft.coordinates,
            photo_url: draft.photo_url,
            description: draft.description,
            notes: draft.notes,
            confidence_level: draft.confidence_level,
            created_at: now,
            verification_status: SightingStatus::Pending,
            verified_by: None,
            verified_at: None,
            verification_comment: None,
            reward_points: None,
            flagged_for_review: false,
            expert_consensus_needed: false,
            review_notes: None,
        }
    }

    fn apply(&mut self, patch: SightingPatch) {
        if let Some(common_name) = patch.common_name {
            self.common_name = Some(common_name);
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(coordinates) = patch.coordinates {
            self.coordinates = Some(coordinates);
        }
        if let Some(photo_url) = patch.photo_url {
            self.photo_url = photo_url;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }

    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.species.as_str()];
        if let Some(common_name) = &self.common_name {
            fields.push(common_name);
        }
        fields.push(&self.reporter.full_name);
        fields
    }

    fn tally(&self) -> Tally {
        Tally {
            verified: u64::from(self.verification_status == SightingStatus::Verified),
            rejected: u64::from(self.verification_status == SightingStatus::Rejected),
            flagged: u64::from(self.flagged_for_review),
            needs_consensus: u64::from(self.expert_consensus_needed),
            ..Tally::default()
        }
    }

    fn confidence(&self) -> Option<f64> {
        self.confidence_level
    }

    fn is_flagged(&self) -> bool {
        self.flagged_for_review
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: u64,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub reward_points: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: u64,
    pub created_at: DateTime<Utc>,
    pub assigned_to: BTreeSet<u64>,
    #[serde(default)]
    pub completed_by: BTreeSet<u64>,
    pub completion_count: u32,
    pub total_assigned: u32,
    pub status: ActivityStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityDraft {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub reward_points: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActivityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_points: Option<u32>,
    /// `Some(None)` clears the deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl Activity {
    /// Keep the denormalised counters in step with the id sets.
    pub(crate) fn sync_counts(&mut self) {
        self.total_assigned = self.assigned_to.len() as u32;
        self.completion_count = self.completed_by.len() as u32;
    }
}

impl Record for Activity {
    type Status = ActivityStatus;
    type Draft = ActivityDraft;
    type Patch = ActivityPatch;

    const COLLECTION: &'static str = "activities";
    const STATUSES: &'static [ActivityStatus] = &[
        ActivityStatus::Active,
        ActivityStatus::Completed,
        ActivityStatus::Expired,
    ];

    fn id(&self) -> u64 {
        self.id
    }

    fn owner_id(&self) -> u64 {
        self.created_by
    }

    fn status(&self) -> ActivityStatus {
        self.status
    }

    fn from_draft(id: u64, draft: ActivityDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            kind: draft.kind,
            reward_points: draft.reward_points,
            deadline: draft.deadline,
            created_by: draft.created_by,
            created_at: now,
            assigned_to: BTreeSet::new(),
            completed_by: BTreeSet::new(),
            completion_count: 0,
            total_assigned: 0,
            status: ActivityStatus::Active,
            completed_at: None,
        }
    }

    fn apply(&mut self, patch: ActivityPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(reward_points) = patch.reward_points {
            self.reward_points = reward_points;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
    }

    fn search_text(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }

    fn tally(&self) -> Tally {
        Tally {
            completed: u64::from(self.completion_count),
            assigned: u64::from(self.total_assigned),
            ..Tally::default()
        }
    }
}
