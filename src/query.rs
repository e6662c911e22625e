use crate::record::Record;
use std::ops::RangeInclusive;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter<S> {
    All,
    Only(S),
}

impl<S: PartialEq> StatusFilter<S> {
    pub fn matches(&self, status: &S) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl<S: FromStr<Err = String>> FromStr for StatusFilter<S> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

/// Search criteria; every unset predicate matches everything.
///
/// The search term is matched literally, surrounding whitespace included.
/// Records without a confidence level pass any confidence range.
#[derive(Debug, Clone)]
pub struct Filter<S> {
    pub search_term: Option<String>,
    pub status: StatusFilter<S>,
    pub owner_id: Option<u64>,
    pub confidence: Option<RangeInclusive<f64>>,
    pub flagged_only: bool,
}

impl<S> Default for Filter<S> {
    fn default() -> Self {
        Self {
            search_term: None,
            status: StatusFilter::All,
            owner_id: None,
            confidence: None,
            flagged_only: false,
        }
    }
}

impl<S: PartialEq> Filter<S> {
    pub fn search(mut self, term: &str) -> Self {
        self.search_term = Some(term.to_string());
        self
    }

    pub fn status(mut self, status: StatusFilter<S>) -> Self {
        self.status = status;
        self
    }

    pub fn owner(mut self, owner_id: u64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn confidence(mut self, min: f64, max: f64) -> Self {
        self.confidence = Some(min..=max);
        self
    }

    pub fn flagged_only(mut self, flagged_only: bool) -> Self {
        self.flagged_only = flagged_only;
        self
    }

    pub fn matches<R: Record<Status = S>>(&self, record: &R) -> bool {
        let matches_search = match self.search_term.as_deref() {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                record
                    .search_text()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
        };
        let matches_status = self.status.matches(&record.status());
        let matches_owner = self.owner_id.is_none_or(|owner| record.owner_id() == owner);
        let matches_confidence = match (&self.confidence, record.confidence()) {
            (Some(range), Some(level)) => range.contains(&level),
            _ => true,
        };
        let matches_flagged = !self.flagged_only || record.is_flagged();

        matches_search && matches_status && matches_owner && matches_confidence && matches_flagged
    }
}

pub fn filter<R: Record>(records: &[R], criteria: &Filter<R::Status>) -> Vec<R> {
    records
        .iter()
        .filter(|record| criteria.matches(*record))
        .cloned()
        .collect()
}

pub fn by_status<R: Record>(records: &[R], status: R::Status) -> Vec<R> {
    filter(records, &Filter::default().status(StatusFilter::Only(status)))
}
