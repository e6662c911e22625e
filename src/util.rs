use crate::activity::{is_due_soon, is_expired};
use crate::record::{Activity, Sighting};
use crate::review::Outcome;
use crate::stats::Stats;
use chrono::{DateTime, Utc};
use std::time::Instant;

pub fn print_hms(start: &Instant) {
    let secs = start.elapsed().as_secs();
    println!(
        "Elapsed: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    );
}

pub fn sighting_line(s: &Sighting) -> String {
    let mut line = format!(
        "#{:<3} {:<9} {} ({}) by {}",
        s.id,
        s.verification_status,
        s.display_name(),
        s.species,
        s.reporter.full_name
    );
    if let Some(points) = s.reward_points {
        line.push_str(&format!(", {} pts", points));
    }
    if let Some(comment) = &s.verification_comment {
        line.push_str(&format!(" \"{}\"", comment));
    }
    if s.flagged_for_review && !s.verification_status.is_terminal() {
        line.push_str(" [flagged]");
    }
    line
}

/// One card per activity, with the time-derived flags next to the stored status.
pub fn activity_line(a: &Activity, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "#{:<3} {:<9} [{}] {} - {}/{} done, {} pts",
        a.id,
        a.status,
        a.kind.as_str(),
        a.title,
        a.completion_count,
        a.total_assigned,
        a.reward_points
    );
    match a.deadline {
        Some(deadline) => line.push_str(&format!(", due {}", deadline.format("%Y-%m-%d"))),
        None => line.push_str(", no deadline"),
    }
    if is_expired(a, now) {
        line.push_str(" (overdue)");
    } else if is_due_soon(a, now) {
        line.push_str(" (due soon)");
    }
    line
}

pub fn print_outcome(outcome: &Outcome) {
    if outcome.success {
        println!("{}", outcome.message);
    } else {
        println!("Not done: {}", outcome.message);
    }
}

pub fn print_stats(title: &str, stats: &Stats) {
    println!("\n{}:", title);
    println!("Total: {}", stats.total);
    for (status, count) in &stats.counts_by_status {
        println!("  {}: {}", status, count);
    }
    println!("Average completion: {}%", stats.average_completion_rate);
    println!("Approval rate: {}%", stats.approval_rate);
    if stats.flagged > 0 {
        println!(
            "Flagged for review: {} ({} need expert consensus)",
            stats.flagged, stats.needs_consensus
        );
    }
}

/// Badge names laid out three to a row.
pub fn render_badges(badges: &[String]) -> String {
    if badges.is_empty() {
        return "No badges earned yet. Keep exploring!".to_string();
    }
    badges
        .chunks(3)
        .map(|row| {
            row.iter()
                .map(|badge| format!("[{}]", badge))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
