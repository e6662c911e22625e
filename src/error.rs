use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(u64),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("record {id} is no longer {expected}")]
    Conflict { id: u64, expected: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistant returned no choices")]
    EmptyReply,
}
