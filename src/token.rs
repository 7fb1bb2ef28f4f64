// OAuth2 client-credentials token acquisition

use crate::config::{Credential, TokenPolicy, TOKEN_PATH};
use crate::error::{ErrorKind, SearchError, SearchStep};
use crate::transport::{HttpRequest, HttpTransport};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

// Refresh this long before the provider-reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_in: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

struct CachedToken {
    token: AccessToken,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() >= self.ttl
    }
}

type TokenSlot = Arc<Mutex<Option<CachedToken>>>;

/// Fetches bearer tokens from the provider's token endpoint.
///
/// With [`TokenPolicy::FreshPerCall`] every call issues one POST. With
/// [`TokenPolicy::Cached`] tokens are reused per (base URL, API key) until
/// shortly before expiry, and concurrent callers share one in-flight fetch.
pub struct TokenProvider {
    transport: Arc<dyn HttpTransport>,
    policy: TokenPolicy,
    slots: DashMap<String, TokenSlot>,
}

impl TokenProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: TokenPolicy) -> Self {
        Self {
            transport,
            policy,
            slots: DashMap::new(),
        }
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    pub async fn access_token(
        &self,
        base_url: &str,
        credential: Option<&Credential>,
        timeout: Option<Duration>,
    ) -> Result<AccessToken, SearchError> {
        let credential = match credential {
            Some(c) if c.is_complete() => c,
            _ => return Err(SearchError::missing_credential()),
        };

        if self.policy == TokenPolicy::FreshPerCall {
            return self.fetch(base_url, credential, timeout).await;
        }

        let key = format!("{}|{}", base_url, credential.api_key);
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone();

        // Holding the slot lock across the fetch makes it single-flight per key
        let mut cached = slot.lock().await;
        if let Some(entry) = cached.as_ref() {
            if !entry.is_expired() {
                debug!("reusing cached access token");
                return Ok(entry.token.clone());
            }
        }

        let token = self.fetch(base_url, credential, timeout).await?;
        *cached = token
            .expires_in
            .map(|expires_in| expires_in.saturating_sub(EXPIRY_MARGIN))
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| CachedToken {
                token: token.clone(),
                fetched_at: Instant::now(),
                ttl,
            });
        Ok(token)
    }

    async fn fetch(
        &self,
        base_url: &str,
        credential: &Credential,
        timeout: Option<Duration>,
    ) -> Result<AccessToken, SearchError> {
        let request = HttpRequest::post(format!("{}{}", base_url, TOKEN_PATH))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form("grant_type", "client_credentials")
            .form("client_id", credential.api_key.as_str())
            .form("client_secret", credential.api_secret.as_str())
            .timeout(timeout);

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(error = %e, "token request failed");
            SearchError::new(
                ErrorKind::Authentication,
                SearchStep::Auth,
                "Amadeus authentication failed",
            )
            .with_details(e.to_string())
        })?;

        if !response.is_success() {
            warn!(status = response.status, "token endpoint rejected credentials");
            return Err(SearchError::new(
                ErrorKind::Authentication,
                SearchStep::Auth,
                "Amadeus authentication failed",
            )
            .with_details(response.error_detail()));
        }

        // Syntax errors and a missing field are reported separately
        let body: serde_json::Value = match serde_json::from_str(&response.body) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "token response is not valid JSON");
                return Err(SearchError::new(
                    ErrorKind::Decode,
                    SearchStep::Auth,
                    format!(
                        "Amadeus authentication failed: could not parse token response: {}",
                        e
                    ),
                )
                .with_details(response.body));
            }
        };
        let parsed = TokenResponse::deserialize(body).ok();

        match parsed {
            Some(TokenResponse {
                access_token: Some(value),
                expires_in,
            }) if !value.is_empty() => Ok(AccessToken {
                value,
                expires_in: expires_in.map(Duration::from_secs),
            }),
            _ => {
                warn!("token response carried no access_token");
                Err(SearchError::new(
                    ErrorKind::MissingToken,
                    SearchStep::Auth,
                    "No access_token in token response",
                )
                .with_details(response.body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TEST_BASE_URL;
    use crate::transport::mock_transport::MockTransport;
    use crate::transport::TransportError;

    fn credential() -> Credential {
        Credential::new("key", "secret")
    }

    #[tokio::test]
    async fn test_posts_client_credentials_form() {
        let mock = Arc::new(MockTransport::new().with_token("tok-1"));
        let provider = TokenProvider::new(mock.clone(), TokenPolicy::FreshPerCall);

        let token = provider
            .access_token(TEST_BASE_URL, Some(&credential()), None)
            .await
            .unwrap();
        assert_eq!(token.value, "tok-1");
        assert_eq!(token.expires_in, Some(Duration::from_secs(1799)));

        let request = mock.last_request_to("oauth2/token").unwrap();
        assert_eq!(request.url, format!("{}{}", TEST_BASE_URL, TOKEN_PATH));
        assert!(request.headers.contains(&(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string()
        )));
        assert_eq!(
            request.form,
            vec![
                ("grant_type".to_string(), "client_credentials".to_string()),
                ("client_id".to_string(), "key".to_string()),
                ("client_secret".to_string(), "secret".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_credential_issues_no_request() {
        let mock = Arc::new(MockTransport::new().with_token("tok"));
        let provider = TokenProvider::new(mock.clone(), TokenPolicy::FreshPerCall);

        let err = provider.access_token(TEST_BASE_URL, None, None).await.unwrap_err();
        assert!(err.is_configuration());

        let blank = Credential::new("key", "");
        let err = provider
            .access_token(TEST_BASE_URL, Some(&blank), None)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_credentials_keep_body() {
        let mock = Arc::new(MockTransport::new().respond(
            "oauth2/token",
            401,
            r#"{"error":"invalid_client"}"#,
        ));
        let provider = TokenProvider::new(mock, TokenPolicy::FreshPerCall);

        let err = provider
            .access_token(TEST_BASE_URL, Some(&credential()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.step, SearchStep::Auth);
        assert_eq!(err.details.as_deref(), Some(r#"{"error":"invalid_client"}"#));
    }

    #[tokio::test]
    async fn test_transport_failure_is_authentication_error() {
        let mock = Arc::new(
            MockTransport::new().fail("oauth2/token", TransportError::Timeout(20_000)),
        );
        let provider = TokenProvider::new(mock, TokenPolicy::FreshPerCall);

        let err = provider
            .access_token(TEST_BASE_URL, Some(&credential()), Some(Duration::from_secs(20)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.details.as_deref(), Some("Request timeout after 20000ms"));
    }

    #[tokio::test]
    async fn test_success_without_token_field_is_distinct_error() {
        let mock = Arc::new(MockTransport::new().respond("oauth2/token", 200, r#"{"state":"ok"}"#));
        let provider = TokenProvider::new(mock, TokenPolicy::FreshPerCall);

        let err = provider
            .access_token(TEST_BASE_URL, Some(&credential()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingToken);
        assert_eq!(err.step, SearchStep::Auth);
        assert_eq!(err.details.as_deref(), Some(r#"{"state":"ok"}"#));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_decode_error() {
        let mock = Arc::new(MockTransport::new().respond(
            "oauth2/token",
            200,
            "<html>gateway</html>",
        ));
        let provider = TokenProvider::new(mock, TokenPolicy::FreshPerCall);

        let err = provider
            .access_token(TEST_BASE_URL, Some(&credential()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert_eq!(err.step, SearchStep::Auth);
        assert!(err.message.starts_with("Amadeus authentication failed"));
        assert_eq!(err.details.as_deref(), Some("<html>gateway</html>"));
    }

    #[tokio::test]
    async fn test_non_object_json_is_missing_token() {
        let mock = Arc::new(MockTransport::new().respond("oauth2/token", 200, "[]"));
        let provider = TokenProvider::new(mock, TokenPolicy::FreshPerCall);

        let err = provider
            .access_token(TEST_BASE_URL, Some(&credential()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingToken);
    }

    #[tokio::test]
    async fn test_fresh_policy_fetches_every_time() {
        let mock = Arc::new(MockTransport::new().with_token("tok"));
        let provider = TokenProvider::new(mock.clone(), TokenPolicy::FreshPerCall);

        for _ in 0..3 {
            provider
                .access_token(TEST_BASE_URL, Some(&credential()), None)
                .await
                .unwrap();
        }
        assert_eq!(mock.calls_to("oauth2/token"), 3);
    }

    #[tokio::test]
    async fn test_cached_policy_reuses_and_single_flights() {
        let mock = Arc::new(MockTransport::new().with_token("tok"));
        let provider = TokenProvider::new(mock.clone(), TokenPolicy::Cached);
        let cred = credential();

        let (a, b) = tokio::join!(
            provider.access_token(TEST_BASE_URL, Some(&cred), None),
            provider.access_token(TEST_BASE_URL, Some(&cred), None),
        );
        let c = provider.access_token(TEST_BASE_URL, Some(&cred), None).await;

        assert_eq!(a.unwrap().value, "tok");
        assert_eq!(b.unwrap().value, "tok");
        assert_eq!(c.unwrap().value, "tok");
        assert_eq!(mock.calls_to("oauth2/token"), 1);
    }

    #[tokio::test]
    async fn test_cached_policy_keys_by_base_url() {
        let mock = Arc::new(MockTransport::new().with_token("tok"));
        let provider = TokenProvider::new(mock.clone(), TokenPolicy::Cached);

        provider
            .access_token("https://test.api.amadeus.com", Some(&credential()), None)
            .await
            .unwrap();
        provider
            .access_token("https://api.amadeus.com", Some(&credential()), None)
            .await
            .unwrap();
        assert_eq!(mock.calls_to("oauth2/token"), 2);
    }

    #[tokio::test]
    async fn test_short_lived_tokens_are_not_cached() {
        let mock = Arc::new(MockTransport::new().respond(
            "oauth2/token",
            200,
            r#"{"access_token":"tok","expires_in":10}"#,
        ));
        let provider = TokenProvider::new(mock.clone(), TokenPolicy::Cached);

        for _ in 0..2 {
            provider
                .access_token(TEST_BASE_URL, Some(&credential()), None)
                .await
                .unwrap();
        }
        assert_eq!(mock.calls_to("oauth2/token"), 2);
    }
}
