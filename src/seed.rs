//! Sample data backing the in-memory store when no backend is configured.

use crate::record::{
    Activity, ActivityKind, ActivityStatus, Coordinates, Reporter, Sighting, SightingStatus,
};
use chrono::{Duration, Utc};
use std::collections::BTreeSet;

/// Teacher id the sample activities belong to.
pub const SAMPLE_TEACHER_ID: u64 = 1;

fn reporter(id: u64, username: &str, full_name: &str) -> Reporter {
    Reporter {
        id,
        username: username.to_string(),
        full_name: full_name.to_string(),
    }
}

pub fn sample_sightings() -> Vec<Sighting> {
    let now = Utc::now();
    let ana = reporter(1, "ana_garcia", "Ana García");
    let carlos = reporter(2, "carlos_lopez", "Carlos López");
    let maria = reporter(3, "maria_torres", "María Torres");

    vec![
        Sighting {
            id: 1,
            reporter: ana.clone(),
            species: "Morpho peleides".to_string(),
            common_name: Some("Mariposa Morpho Azul".to_string()),
            location: "Parque Nacional Tingo María, Sector Cueva de las Lechuzas".to_string(),
            coordinates: Some(Coordinates { lat: -9.2847, lng: -76.0127 }),
            photo_url: "/api/placeholder/400/300".to_string(),
            description: "Blue butterfly near the cave entrance, wings shining in the sun."
                .to_string(),
            notes: "Flying close to purple flowers".to_string(),
            confidence_level: Some(0.85),
            created_at: now - Duration::hours(1),
            verification_status: SightingStatus::Pending,
            verified_by: None,
            verified_at: None,
            verification_comment: None,
            reward_points: None,
            flagged_for_review: false,
            expert_consensus_needed: false,
            review_notes: None,
        },
        Sighting {
            id: 2,
            reporter: carlos.clone(),
            species: "Ara ararauna".to_string(),
            common_name: Some("Guacamayo Azul y Amarillo".to_string()),
            location: "Río Huallaga, zona de embarcadero".to_string(),
            coordinates: Some(Coordinates { lat: -9.2901, lng: -76.0089 }),
            photo_url: "/api/placeholder/400/300".to_string(),
            description: "A pair of macaws flying over the river before landing on a tree."
                .to_string(),
            notes: "Very loud and colourful".to_string(),
            confidence_level: Some(0.92),
            created_at: now - Duration::hours(2),
            verification_status: SightingStatus::Pending,
            verified_by: None,
            verified_at: None,
            verification_comment: None,
            reward_points: None,
            flagged_for_review: false,
            expert_consensus_needed: false,
            review_notes: None,
        },
        Sighting {
            id: 3,
            reporter: maria,
            species: "Ceiba pentandra".to_string(),
            common_name: Some("Ceiba".to_string()),
            location: "Bosque primario de la reserva".to_string(),
            coordinates: Some(Coordinates { lat: -9.2923, lng: -76.0156 }),
            photo_url: "/api/placeholder/400/300".to_string(),
            description: "Giant tree over 30 metres tall with buttress roots.".to_string(),
            notes: "Large thorns on the trunk".to_string(),
            confidence_level: Some(0.78),
            created_at: now - Duration::days(1),
            verification_status: SightingStatus::Pending,
            verified_by: None,
            verified_at: None,
            verification_comment: None,
            reward_points: None,
            flagged_for_review: false,
            expert_consensus_needed: false,
            review_notes: None,
        },
        Sighting {
            id: 4,
            reporter: ana,
            species: "Boa constrictor".to_string(),
            common_name: Some("Boa Constrictor".to_string()),
            location: "Sendero principal del parque".to_string(),
            coordinates: Some(Coordinates { lat: -9.2867, lng: -76.0134 }),
            photo_url: "/api/placeholder/400/300".to_string(),
            description: "Snake sunbathing on a rock, roughly two metres long.".to_string(),
            notes: "Moved slowly into the bushes".to_string(),
            confidence_level: Some(0.88),
            created_at: now - Duration::days(2),
            verification_status: SightingStatus::Verified,
            verified_by: Some(SAMPLE_TEACHER_ID),
            verified_at: Some(now - Duration::days(1)),
            verification_comment: Some(
                "Great sighting, the identification is correct. Keep your distance from reptiles."
                    .to_string(),
            ),
            reward_points: Some(120),
            flagged_for_review: false,
            expert_consensus_needed: false,
            review_notes: None,
        },
        Sighting {
            id: 5,
            reporter: carlos,
            species: "Panthera onca".to_string(),
            common_name: Some("Jaguar".to_string()),
            location: "Zona restringida del bosque".to_string(),
            coordinates: None,
            photo_url: "/api/placeholder/400/300".to_string(),
            description: "I think I saw a jaguar but the photo came out blurry.".to_string(),
            notes: "It was very far away".to_string(),
            confidence_level: Some(0.35),
            created_at: now - Duration::days(3),
            verification_status: SightingStatus::Rejected,
            verified_by: Some(SAMPLE_TEACHER_ID),
            verified_at: Some(now - Duration::days(2)),
            verification_comment: Some(
                "The image is too blurry to confirm the identification. Please try sharper photos."
                    .to_string(),
            ),
            reward_points: None,
            flagged_for_review: false,
            expert_consensus_needed: false,
            review_notes: None,
        },
    ]
}

#[allow(clippy::too_many_arguments)]
fn activity(
    id: u64,
    title: &str,
    description: &str,
    kind: ActivityKind,
    reward_points: u32,
    deadline_days: Option<i64>,
    created_days_ago: i64,
    assigned_to: &[u64],
    completed_by: &[u64],
    status: ActivityStatus,
) -> Activity {
    let now = Utc::now();
    let mut activity = Activity {
        id,
        title: title.to_string(),
        description: description.to_string(),
        kind,
        reward_points,
        deadline: deadline_days.map(|days| now + Duration::days(days)),
        created_by: SAMPLE_TEACHER_ID,
        created_at: now - Duration::days(created_days_ago),
        assigned_to: assigned_to.iter().copied().collect(),
        completed_by: completed_by.iter().copied().collect::<BTreeSet<_>>(),
        completion_count: 0,
        total_assigned: 0,
        status,
        completed_at: None,
    };
    if status == ActivityStatus::Completed {
        activity.completed_at = Some(now - Duration::days(1));
    }
    activity.sync_counts();
    activity
}

pub fn sample_activities() -> Vec<Activity> {
    vec![
        activity(
            1,
            "Reading: Biodiversity of the Amazon",
            "Read the article on Amazon biodiversity and answer the comprehension questions.",
            ActivityKind::Reading,
            80,
            Some(7),
            3,
            &[1, 2, 3],
            &[1, 2],
            ActivityStatus::Active,
        ),
        activity(
            2,
            "Quiz: Regional Biodiversity",
            "Complete the quiz on endemic species of Tingo María and their ecological role.",
            ActivityKind::Quiz,
            50,
            Some(3),
            5,
            &[1, 2],
            &[1],
            ActivityStatus::Active,
        ),
        activity(
            3,
            "Exploring the Huallaga River",
            "Visit three points along the river and document the aquatic species you observe.",
            ActivityKind::Exploration,
            150,
            Some(14),
            2,
            &[1],
            &[],
            ActivityStatus::Active,
        ),
        activity(
            4,
            "Research: Medicinal Plants",
            "Research three local medicinal plants, covering traditional and scientific uses.",
            ActivityKind::Research,
            200,
            None,
            10,
            &[2, 3],
            &[2, 3],
            ActivityStatus::Completed,
        ),
    ]
}
