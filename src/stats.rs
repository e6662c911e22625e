use crate::record::Record;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-record contribution to the aggregate rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub completed: u64,
    pub assigned: u64,
    pub verified: u64,
    pub rejected: u64,
    pub flagged: u64,
    pub needs_consensus: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub counts_by_status: BTreeMap<String, usize>,
    pub average_completion_rate: u32,
    pub approval_rate: u32,
    /// Records waiting on a specialist's second opinion.
    pub flagged: u64,
    pub needs_consensus: u64,
}

#[cfg(test)]
impl Stats {
    pub fn count(&self, status: impl ToString) -> usize {
        self.counts_by_status
            .get(&status.to_string())
            .copied()
            .unwrap_or(0)
    }
}

/// Rounded percentage; an empty denominator reports 0 rather than failing.
pub fn percentage(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (100.0 * numerator as f64 / denominator as f64).round() as u32
}

pub fn stats<R: Record>(records: &[R]) -> Stats {
    let mut counts_by_status: BTreeMap<String, usize> = R::STATUSES
        .iter()
        .map(|status| (status.to_string(), 0))
        .collect();

    let mut sum = Tally::default();
    for record in records {
        *counts_by_status
            .entry(record.status().to_string())
            .or_insert(0) += 1;

        let tally = record.tally();
        sum.completed += tally.completed;
        sum.assigned += tally.assigned;
        sum.verified += tally.verified;
        sum.rejected += tally.rejected;
        sum.flagged += tally.flagged;
        sum.needs_consensus += tally.needs_consensus;
    }

    Stats {
        total: records.len(),
        counts_by_status,
        average_completion_rate: percentage(sum.completed, sum.assigned),
        // pending items never enter the denominator
        approval_rate: percentage(sum.verified, sum.verified + sum.rejected),
        flagged: sum.flagged,
        needs_consensus: sum.needs_consensus,
    }
}
