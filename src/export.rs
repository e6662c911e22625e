use crate::record::{Activity, Sighting};
use csv::Writer;
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io;

#[derive(Debug, Serialize)]
struct SightingRow<'a> {
    id: u64,
    reporter: &'a str,
    species: &'a str,
    common_name: &'a str,
    location: &'a str,
    status: &'a str,
    created_at: String,
    verified_at: String,
    reward_points: Option<u32>,
    comment: &'a str,
}

#[derive(Debug, Serialize)]
struct ActivityRow<'a> {
    id: u64,
    title: &'a str,
    kind: &'a str,
    status: &'a str,
    reward_points: u32,
    deadline: String,
    assigned: u32,
    completed: u32,
}

pub fn write_sightings<W: io::Write>(records: &[Sighting], out: W) -> Result<(), Box<dyn Error>> {
    let mut writer = Writer::from_writer(out);
    for s in records {
        writer.serialize(SightingRow {
            id: s.id,
            reporter: &s.reporter.full_name,
            species: &s.species,
            common_name: s.common_name.as_deref().unwrap_or(""),
            location: &s.location,
            status: s.verification_status.as_str(),
            created_at: s.created_at.to_rfc3339(),
            verified_at: s.verified_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            reward_points: s.reward_points,
            comment: s.verification_comment.as_deref().unwrap_or(""),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_activities<W: io::Write>(records: &[Activity], out: W) -> Result<(), Box<dyn Error>> {
    let mut writer = Writer::from_writer(out);
    for a in records {
        writer.serialize(ActivityRow {
            id: a.id,
            title: &a.title,
            kind: a.kind.as_str(),
            status: a.status.as_str(),
            reward_points: a.reward_points,
            deadline: a.deadline.map(|t| t.to_rfc3339()).unwrap_or_default(),
            assigned: a.total_assigned,
            completed: a.completion_count,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_sightings(records: &[Sighting], filename: &str) -> Result<(), Box<dyn Error>> {
    write_sightings(records, File::create(filename)?)?;
    info!("{} sightings saved to {}", records.len(), filename);
    Ok(())
}

pub fn save_activities(records: &[Activity], filename: &str) -> Result<(), Box<dyn Error>> {
    write_activities(records, File::create(filename)?)?;
    info!("{} activities saved to {}", records.len(), filename);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn test_sighting_rows() {
        let mut out = Vec::new();
        write_sightings(&seed::sample_sightings(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("id,reporter,species,common_name"));
        assert!(lines[4].contains("verified"));
        assert!(lines[4].contains(",120,"));
    }

    #[test]
    fn test_activity_rows() {
        let mut out = Vec::new();
        write_activities(&seed::sample_activities(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 5);
        assert!(text.lines().last().unwrap().ends_with("completed,200,,2,2"));
    }
}
