use crate::chat::{Assistant, ChatMessage};
use crate::error::ApiError;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const FALLBACK_ROLE: &str = "student";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct UserStats {
    role: String,
}

/// Points and badge names of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Metrics {
    pub total_points: i64,
    pub badges: Vec<String>,
}

/// Client for the user-facing backend endpoints: role lookup, gamification
/// metrics and the assistant.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Role of the signed-in user. Any failure falls back to [`FALLBACK_ROLE`].
    pub async fn fetch_role(&self) -> String {
        match self.try_fetch_role().await {
            Ok(role) => role,
            Err(e) => {
                warn!("Could not fetch user role, assuming {}: {}", FALLBACK_ROLE, e);
                FALLBACK_ROLE.to_string()
            }
        }
    }

    async fn try_fetch_role(&self) -> Result<String, ApiError> {
        let stats: UserStats = self
            .get("/user/stats/")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(stats.role)
    }

    /// Points and badges; a failed request shows up as an empty profile.
    pub async fn metrics(&self) -> Metrics {
        self.try_metrics().await.unwrap_or_else(|e| {
            warn!("Could not fetch gamification metrics: {}", e);
            Metrics::default()
        })
    }

    async fn try_metrics(&self) -> Result<Metrics, ApiError> {
        Ok(self
            .get("/gamify/metrics")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

impl Assistant for ApiClient {
    async fn reply(&self, message: &str, role: &str) -> Result<ChatMessage, ApiError> {
        let response: ChatResponse = self
            .client
            .post(format!("{}/ia/chat/", self.base_url))
            .json(&ChatRequest { message, role })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ApiError::EmptyReply)
    }
}
