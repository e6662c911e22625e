use crate::error::StoreError;
use crate::record::Record;
use crate::store::RecordStore;
use log::{error, info, warn};
use rand::Rng;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::sleep;

/// Record store backed by the REST API, one collection per record type:
/// `{base_url}/teacher/{collection}/` and `{base_url}/teacher/{collection}/{id}/`.
pub struct HttpStore<R> {
    client: Client,
    base_url: String,
    token: Option<String>,
    pub(crate) base_delay: Duration,
    pub(crate) max_retries: u32,
    _record: PhantomData<R>,
}

impl<R: Record> HttpStore<R> {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(8))
            .user_agent(concat!("naturein/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            base_delay: Duration::from_millis(500),
            max_retries: 3,
            _record: PhantomData,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.base_delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/teacher/{}/", self.base_url, R::COLLECTION)
    }

    fn record_url(&self, id: u64) -> String {
        format!("{}/teacher/{}/{}/", self.base_url, R::COLLECTION, id)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let jitter = if base > 0 {
            rand::rng().random_range(0..base)
        } else {
            0
        };
        Duration::from_millis(2_u64.pow(attempt) * base + jitter)
    }

    fn action_url(&self, id: u64, action: &str) -> String {
        format!("{}{}/", self.record_url(id), action)
    }

    /// Send a request, retrying rate limits, server errors and transport
    /// failures with exponential backoff. A 404 becomes `NotFound(id)`.
    ///
    /// `POST` is not idempotent: it is only retried on 429, where the
    /// backend has not acted on the request.
    async fn send<F>(&self, method: Method, url: &str, id: u64, build: F) -> Result<Response, StoreError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let idempotent = method != Method::POST;
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                info!(
                    "Retrying {} {} (attempt {}) after {}ms delay",
                    method,
                    url,
                    attempt + 1,
                    delay.as_millis()
                );
                sleep(delay).await;
            }

            let mut request = self.client.request(method.clone(), url);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match build(request).send().await {
                Ok(response) => match response.status() {
                    StatusCode::NOT_FOUND => return Err(StoreError::NotFound(id)),
                    status if status.is_success() => return Ok(response),
                    status
                        if (status == StatusCode::TOO_MANY_REQUESTS
                            || (idempotent && status.is_server_error()))
                            && attempt < self.max_retries =>
                    {
                        warn!("HTTP {} for {} {}, retrying...", status, method, url);
                    }
                    status => {
                        error!("HTTP {} for {} {}, giving up", status, method, url);
                        return Err(StoreError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                },
                Err(e) if idempotent && attempt < self.max_retries => {
                    warn!("Request {} {} failed, retrying...: {}", method, url, e);
                }
                Err(e) => {
                    error!("Request {} {} failed, giving up: {}", method, url, e);
                    return Err(e.into());
                }
            }
            attempt += 1;
        }
    }
}

impl<R: Record> RecordStore<R> for HttpStore<R> {
    async fn list(&self) -> Result<Vec<R>, StoreError> {
        let url = self.collection_url();
        let response = self.send(Method::GET, &url, 0, |r| r).await?;
        Ok(response.json().await?)
    }

    async fn get(&self, id: u64) -> Result<R, StoreError> {
        let url = self.record_url(id);
        let response = self.send(Method::GET, &url, id, |r| r).await?;
        Ok(response.json().await?)
    }

    async fn create(&self, draft: R::Draft) -> Result<R, StoreError> {
        let url = self.collection_url();
        let response = self
            .send(Method::POST, &url, 0, |r| r.json(&draft))
            .await?;
        let record: R = response.json().await?;
        info!("Created {} record {}", R::COLLECTION, record.id());
        Ok(record)
    }

    async fn update(&self, id: u64, patch: R::Patch) -> Result<R, StoreError> {
        let url = self.record_url(id);
        let response = self
            .send(Method::PATCH, &url, id, |r| r.json(&patch))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let url = self.record_url(id);
        self.send(Method::DELETE, &url, id, |r| r).await?;
        info!("Deleted {} record {}", R::COLLECTION, id);
        Ok(())
    }

    /// The backend owns the status check: the changed record is posted to
    /// `{record}/{action}/`, which answers 409 once the record has moved on.
    async fn transition<F>(
        &self,
        id: u64,
        expected: R::Status,
        action: &str,
        change: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut R),
    {
        let conflict = || StoreError::Conflict {
            id,
            expected: expected.to_string(),
        };

        let mut record = self.get(id).await?;
        if record.status() != expected {
            return Err(conflict());
        }
        change(&mut record);

        let url = self.action_url(id, action);
        let response = match self.send(Method::POST, &url, id, |r| r.json(&record)).await {
            Ok(response) => response,
            Err(StoreError::Status { status: 409, .. }) => {
                warn!("Backend refused to {} {} record {}", action, R::COLLECTION, id);
                return Err(conflict());
            }
            Err(e) => return Err(e),
        };
        let record: R = response.json().await?;
        info!("{} {} record {} done", action, R::COLLECTION, id);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Activity, ActivityDraft, ActivityPatch, Sighting, SightingStatus};
    use crate::seed;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Requests as the backend saw them, head and body.
    type Seen = Arc<Mutex<Vec<String>>>;

    /// Answer one connection per canned reply, in order, and keep every
    /// request. Returns the API base url.
    async fn backend(replies: Vec<(u16, String)>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let requests = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                requests.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (base_url, seen)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn store<R: Record>(base_url: &str, retries: u32) -> HttpStore<R> {
        HttpStore::new(base_url)
            .unwrap()
            .with_delay(0)
            .with_max_retries(retries)
    }

    fn sighting_json(index: usize) -> String {
        serde_json::to_string(&seed::sample_sightings()[index]).unwrap()
    }

    #[test]
    fn test_store_configuration() {
        let store: HttpStore<Sighting> = HttpStore::new("http://127.0.0.1:8000/api/")
            .unwrap()
            .with_delay(200)
            .with_max_retries(5)
            .with_token(Some("  ".to_string()));

        assert_eq!(store.base_delay, Duration::from_millis(200));
        assert_eq!(store.max_retries, 5);
        assert!(store.token.is_none());
        assert_eq!(
            store.collection_url(),
            "http://127.0.0.1:8000/api/teacher/sightings/"
        );
        assert_eq!(
            store.record_url(4),
            "http://127.0.0.1:8000/api/teacher/sightings/4/"
        );
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let store: HttpStore<Activity> = HttpStore::new("http://localhost/api")
            .unwrap()
            .with_delay(100);

        let first = store.backoff(1);
        let third = store.backoff(3);
        assert!(first >= Duration::from_millis(200) && first < Duration::from_millis(300));
        assert!(third >= Duration::from_millis(800) && third < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_unreachable_backend_surfaces_http_error() {
        // nothing listens on the discard port
        let store: HttpStore<Activity> = HttpStore::new("http://127.0.0.1:9/api")
            .unwrap()
            .with_delay(0)
            .with_max_retries(0);

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Http(_)));
    }

    #[tokio::test]
    async fn test_missing_record_maps_to_not_found() {
        let (base_url, seen) = backend(vec![(404, "{}".to_string())]).await;
        let store: HttpStore<Sighting> = store(&base_url, 3);

        let err = store.get(7).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(7)));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(seen.lock().unwrap()[0].starts_with("GET /api/teacher/sightings/7/ "));
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_succeeds() {
        let (base_url, seen) =
            backend(vec![(503, String::new()), (200, sighting_json(0))]).await;
        let store: HttpStore<Sighting> = store(&base_url, 3);

        let sighting = store.get(1).await.unwrap();
        assert_eq!(sighting.species, "Morpho peleides");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retries_give_up_with_status() {
        let replies = vec![(500, String::new()); 3];
        let (base_url, seen) = backend(replies).await;
        let store: HttpStore<Activity> = store(&base_url, 2);

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 500, .. }));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_is_not_retried_on_server_error() {
        let (base_url, seen) = backend(vec![(502, String::new()), (200, "{}".to_string())]).await;
        let store: HttpStore<Activity> = store(&base_url, 3);

        let err = store.create(ActivityDraft::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 502, .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_patches_only_given_fields() {
        let mut activity = seed::sample_activities().remove(1);
        activity.title = "Leaf collection".to_string();
        let body = serde_json::to_string(&activity).unwrap();
        let (base_url, seen) = backend(vec![(200, body)]).await;
        let store: HttpStore<Activity> = store(&base_url, 0);

        let patch = ActivityPatch {
            title: Some("Leaf collection".to_string()),
            ..ActivityPatch::default()
        };
        let updated = store.update(2, patch).await.unwrap();
        assert_eq!(updated.id, activity.id);
        assert_eq!(updated.title, "Leaf collection");
        assert_eq!(updated.assigned_to, activity.assigned_to);

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("PATCH /api/teacher/activities/2/ "));
        assert!(request.ends_with("{\"title\":\"Leaf collection\"}"));
    }

    #[tokio::test]
    async fn test_transition_posts_to_action_and_maps_conflict() {
        let (base_url, seen) = backend(vec![
            (200, sighting_json(0)),
            (409, "{}".to_string()),
        ])
        .await;
        let store: HttpStore<Sighting> = store(&base_url, 3);

        let err = store
            .transition(1, SightingStatus::Pending, "approve", |s| {
                s.verification_status = SightingStatus::Verified;
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { id: 1, .. }));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].starts_with("POST /api/teacher/sightings/1/approve/ "));
        assert!(seen[1].contains("\"verification_status\":\"verified\""));
    }

    #[tokio::test]
    async fn test_transition_on_resolved_record_never_posts() {
        let (base_url, seen) = backend(vec![(200, sighting_json(3))]).await;
        let store: HttpStore<Sighting> = store(&base_url, 0);

        let err = store
            .transition(4, SightingStatus::Pending, "reject", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { id: 4, .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
