//! HTTP client for the brokerage operations API.
//!
//! Implements [`PageFetcher`] over a paginated REST endpoint, translating
//! HTTP outcomes into the [`ApiError`] taxonomy the sync controller retries
//! against: 429 becomes a rate limit with the server's `Retry-After` hint,
//! 5xx and transport failures are transient, 401/403 are auth failures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};

use tradesync_core::errors::ApiError;
use tradesync_core::RawOperation;

use crate::sync::{AuthRefresher, AuthToken, FetchedPage, PageFetcher};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tokens expiring within this window are treated as stale and refused.
const TOKEN_FRESHNESS_MARGIN: Duration = Duration::from_secs(60);

/// Wire shape of one operations page.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiOperationsPage {
    #[serde(default)]
    operations: Vec<RawOperation>,
    #[serde(default, alias = "nextToken")]
    next_page_token: Option<String>,
    #[serde(default, alias = "total")]
    estimated_total: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the brokerage operations endpoint.
#[derive(Debug, Clone)]
pub struct BrokerHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl BrokerHttpClient {
    /// Create a new client against `base_url` (trailing slash tolerated).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn headers(&self, token: &AuthToken) -> Result<HeaderMap, ApiError> {
        let auth = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|e| ApiError::Unauthorized(format!("Invalid access token format: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        Ok(headers)
    }

    fn operations_url(&self, trading_day: NaiveDate, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/v1/operations?tradingDay={}",
            self.base_url,
            trading_day.format("%Y-%m-%d")
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(token);
        }
        url
    }

    async fn parse_page(&self, response: reqwest::Response) -> Result<FetchedPage, ApiError> {
        let status = response.status();

        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(categorize_failure(status.as_u16(), retry_after, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response: {}", e)))?;

        let page: ApiOperationsPage = serde_json::from_str(&body).map_err(|e| {
            ApiError::Decode(format!(
                "Failed to parse operations page: {} - {}",
                e,
                body.chars().take(200).collect::<String>()
            ))
        })?;

        Ok(FetchedPage {
            operations: page.operations,
            next_page_token: page.next_page_token,
            estimated_total: page.estimated_total,
        })
    }
}

#[async_trait]
impl PageFetcher for BrokerHttpClient {
    async fn fetch_page(
        &self,
        token: &AuthToken,
        trading_day: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<FetchedPage, ApiError> {
        let url = self.operations_url(trading_day, page_token);
        debug!("[BrokerApi] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(|e| ApiError::Network(format!("Request failed: {}", e)))?;

        self.parse_page(response).await
    }
}

/// Map a non-success HTTP status onto the retry taxonomy.
fn categorize_failure(status: u16, retry_after: Option<Duration>, body: &str) -> ApiError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or_else(|| body.chars().take(200).collect::<String>());

    match status {
        401 | 403 => ApiError::Unauthorized(message),
        429 => ApiError::RateLimited { retry_after },
        500..=599 => ApiError::Server { status, message },
        _ => ApiError::BadRequest { status, message },
    }
}

/// Parse a `Retry-After` header expressed in whole seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Token source that hands out a pre-provisioned token, refusing once it
/// is within the freshness margin of expiry.
///
/// Suits deployments where token issuance happens out of band; an expired
/// token surfaces as an auth failure so the session ends before any page
/// is fetched.
#[derive(Debug, Clone)]
pub struct StaticTokenRefresher {
    token: AuthToken,
}

impl StaticTokenRefresher {
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthRefresher for StaticTokenRefresher {
    async fn ensure_valid_token(&self, _current: Option<&AuthToken>) -> Result<AuthToken, ApiError> {
        if !self.token.is_fresh(TOKEN_FRESHNESS_MARGIN) {
            return Err(ApiError::Unauthorized(
                "access token expired or about to expire".to_string(),
            ));
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tradesync_core::ErrorCategory;

    fn client() -> BrokerHttpClient {
        BrokerHttpClient::new("https://api.broker.test/").unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let url = client().operations_url(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), None);
        assert_eq!(
            url,
            "https://api.broker.test/api/v1/operations?tradingDay=2024-03-15"
        );
    }

    #[test]
    fn test_operations_url_with_page_token() {
        let url = client().operations_url(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            Some("abc123"),
        );
        assert!(url.ends_with("tradingDay=2024-03-15&pageToken=abc123"));
    }

    #[test]
    fn test_retry_after_seconds_to_duration() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("45"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_retry_after_absent_or_malformed() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_status_categorization() {
        assert_eq!(
            categorize_failure(401, None, "{}").category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            categorize_failure(429, Some(Duration::from_secs(45)), "{}").category(),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            categorize_failure(503, None, "{}").category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            categorize_failure(422, None, "{}").category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_rate_limit_carries_server_hint() {
        match categorize_failure(429, Some(Duration::from_secs(45)), "") {
            ApiError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(45)));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_error_body_message_preferred() {
        let err = categorize_failure(500, None, r#"{"message":"shard unavailable"}"#);
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "shard unavailable");
            }
            other => panic!("expected Server, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_refresher_rejects_stale_token() {
        let refresher = StaticTokenRefresher::new(AuthToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(5),
        });
        let err = refresher.ensure_valid_token(None).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Auth);
    }

    #[tokio::test]
    async fn test_static_refresher_hands_out_fresh_token() {
        let token = AuthToken {
            access_token: "tok".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let refresher = StaticTokenRefresher::new(token.clone());
        assert_eq!(refresher.ensure_valid_token(None).await.unwrap(), token);
    }
}
