//! HTTP implementation of the store traits.
//!
//! Talks to the platform's internal data API with bearer-token auth,
//! connection pooling, and retry with backoff.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use campkit_models::{
    CampaignSettings, Deliverable, DeliverableKind, ShortlistedCreator, Submission, SubmissionId,
    SubmissionStatus,
};

use crate::error::{PlatformError, PlatformResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{CampaignStore, DeliverableStore, StatusFilter, SubmissionStore};

/// Platform API client configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the internal API
    pub base_url: String,
    /// Service bearer token
    pub token: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl PlatformConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PlatformResult<Self> {
        let base_url = std::env::var("PLATFORM_API_URL")
            .map_err(|_| PlatformError::config_error("PLATFORM_API_URL not set"))?;
        let token = std::env::var("PLATFORM_API_TOKEN")
            .map_err(|_| PlatformError::config_error("PLATFORM_API_TOKEN not set"))?;

        let connect_timeout_secs: u64 = std::env::var("PLATFORM_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            base_url,
            token,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

/// Client for the platform's internal data API.
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: String,
    token: String,
    retry: RetryConfig,
}

impl PlatformClient {
    /// Create a new client.
    pub fn new(config: PlatformConfig) -> PlatformResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("campkit-platform/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PlatformError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            retry: config.retry,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> PlatformResult<Self> {
        Self::new(PlatformConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success response to an error, extracting Retry-After on 429.
    async fn check(response: Response) -> PlatformResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(PlatformError::RateLimited { retry_after_ms });
        }

        let message = response.text().await.unwrap_or_default();
        Err(PlatformError::request_failed(status.as_u16(), message))
    }

    /// GET a JSON document, mapping 404 to `None`.
    async fn get_opt<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
    ) -> PlatformResult<Option<T>> {
        let result = with_retry(&self.retry, endpoint, || async {
            let response = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let response = Self::check(response).await?;
            Ok(Some(response.json::<T>().await?))
        })
        .await;

        record_request(endpoint, result.is_ok());
        result
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptionUpdate<'a> {
    caption: Option<&'a str>,
    submission_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate {
    expected: SubmissionStatus,
    next: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdateResponse {
    updated: bool,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[async_trait]
impl SubmissionStore for PlatformClient {
    async fn get(&self, id: &SubmissionId) -> PlatformResult<Option<Submission>> {
        let url = self.url(&format!("/internal/submissions/{}", id));
        self.get_opt("submission_get", &url).await
    }

    async fn set_caption_and_date(
        &self,
        id: &SubmissionId,
        caption: Option<&str>,
        submission_date: DateTime<Utc>,
    ) -> PlatformResult<()> {
        let url = self.url(&format!("/internal/submissions/{}", id));
        let body = CaptionUpdate {
            caption,
            submission_date,
        };

        let result = with_retry(&self.retry, "submission_patch", || async {
            let response = self
                .http
                .patch(&url)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await?;
            Self::check(response).await?;
            Ok(())
        })
        .await;

        record_request("submission_patch", result.is_ok());
        result
    }

    async fn update_status_if(
        &self,
        id: &SubmissionId,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        submission_date: Option<DateTime<Utc>>,
    ) -> PlatformResult<bool> {
        let url = self.url(&format!("/internal/submissions/{}/status", id));
        let body = StatusUpdate {
            expected,
            next,
            submission_date,
        };

        let result = with_retry(&self.retry, "submission_status", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await?;
            let response = Self::check(response).await?;
            let parsed: StatusUpdateResponse = response.json().await?;
            Ok(parsed.updated)
        })
        .await;

        record_request("submission_status", result.is_ok());
        debug!(submission = %id, %expected, %next, "Status CAS result: {:?}", result);
        result
    }
}

#[async_trait]
impl DeliverableStore for PlatformClient {
    async fn insert(&self, deliverable: &Deliverable) -> PlatformResult<()> {
        let url = self.url("/internal/deliverables");

        let result = with_retry(&self.retry, "deliverable_insert", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(deliverable)
                .send()
                .await?;
            Self::check(response).await?;
            Ok(())
        })
        .await;

        record_request("deliverable_insert", result.is_ok());
        result
    }

    async fn count(
        &self,
        user_id: &str,
        campaign_id: &str,
        kind: DeliverableKind,
        filter: StatusFilter,
    ) -> PlatformResult<u64> {
        let mut url = format!(
            "{}/internal/deliverables/count?userId={}&campaignId={}&kind={}",
            self.base_url,
            urlencoding::encode(user_id),
            urlencoding::encode(campaign_id),
            kind.as_str(),
        );
        match filter {
            StatusFilter::Any => {}
            StatusFilter::Is(status) => {
                url.push_str(&format!("&status={}", status.as_str()));
            }
            StatusFilter::IsNot(status) => {
                url.push_str(&format!("&statusNot={}", status.as_str()));
            }
        }

        let result = with_retry(&self.retry, "deliverable_count", || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let response = Self::check(response).await?;
            let parsed: CountResponse = response.json().await?;
            Ok(parsed.count)
        })
        .await;

        record_request("deliverable_count", result.is_ok());
        result
    }
}

#[async_trait]
impl CampaignStore for PlatformClient {
    async fn settings(&self, campaign_id: &str) -> PlatformResult<Option<CampaignSettings>> {
        let url = self.url(&format!(
            "/internal/campaigns/{}/settings",
            urlencoding::encode(campaign_id)
        ));
        self.get_opt("campaign_settings", &url).await
    }

    async fn shortlisted(
        &self,
        user_id: &str,
        campaign_id: &str,
    ) -> PlatformResult<Option<ShortlistedCreator>> {
        let url = self.url(&format!(
            "/internal/campaigns/{}/creators/{}",
            urlencoding::encode(campaign_id),
            urlencoding::encode(user_id)
        ));
        self.get_opt("campaign_shortlisted", &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campkit_models::DeliverableStatus;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PlatformClient {
        PlatformClient::new(PlatformConfig {
            base_url: server.uri(),
            token: "test-token".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
        })
        .expect("client")
    }

    #[tokio::test]
    async fn get_submission_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/submissions/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.get(&SubmissionId::from_string("missing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn count_sends_status_not_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/deliverables/count"))
            .and(query_param("userId", "user_1"))
            .and(query_param("kind", "VIDEO"))
            .and(query_param("statusNot", "REVISION_REQUESTED"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 3})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let count = client
            .count(
                "user_1",
                "camp_1",
                DeliverableKind::Video,
                StatusFilter::IsNot(DeliverableStatus::RevisionRequested),
            )
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn update_status_if_reports_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/submissions/sub_1/status"))
            .and(body_partial_json(serde_json::json!({
                "expected": "IN_PROGRESS",
                "next": "PENDING_REVIEW",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"updated": false})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let updated = client
            .update_status_if(
                &SubmissionId::from_string("sub_1"),
                SubmissionStatus::InProgress,
                SubmissionStatus::PendingReview,
                Some(Utc::now()),
            )
            .await
            .unwrap();
        assert!(!updated);
    }
}
