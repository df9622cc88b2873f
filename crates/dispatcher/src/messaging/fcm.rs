//! FCM HTTP v1 client.
//!
//! Multicast is emulated the way the Admin SDKs do it: one `messages:send`
//! request per token, issued concurrently, with each token's outcome
//! collected into a [`BatchResponse`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::task::JoinSet;

use bingo_common::config::AppConfig;

use super::auth::{ServiceAccountKey, TokenSource};
use super::{Messaging, MessagingError, validate_multicast};
use crate::message::{BatchResponse, MulticastMessage, SendResponse};

/// Firebase Cloud Messaging client, constructed once at startup.
#[derive(Debug)]
pub struct FcmClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: TokenSource,
}

impl FcmClient {
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        tokens: TokenSource,
        timeout: Duration,
    ) -> Result<Self, MessagingError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            tokens,
        })
    }

    /// Build a client from application config.
    ///
    /// A static `FCM_ACCESS_TOKEN` takes precedence over the service-account
    /// key. Without `FCM_PROJECT_ID` the key's own `project_id` is used.
    pub fn from_config(config: &AppConfig) -> Result<Self, MessagingError> {
        let (tokens, key_project_id) =
            match (&config.fcm_access_token, &config.google_application_credentials) {
                (Some(token), _) => (TokenSource::Static(token.clone()), None),
                (None, Some(path)) => {
                    let key = ServiceAccountKey::from_file(path)?;
                    let project_id = key.project_id.clone();
                    (TokenSource::service_account(key)?, project_id)
                }
                (None, None) => {
                    return Err(MessagingError::Credentials(
                        "no FCM access token or service-account key configured".to_string(),
                    ));
                }
            };

        let project_id = config
            .fcm_project_id
            .clone()
            .or(key_project_id)
            .ok_or_else(|| {
                MessagingError::Credentials(
                    "FCM_PROJECT_ID is unset and the service-account key names no project"
                        .to_string(),
                )
            })?;

        tracing::info!(
            project_id = %project_id,
            endpoint = %config.fcm_endpoint,
            "FCM client configured"
        );

        Self::new(
            &config.fcm_endpoint,
            project_id,
            tokens,
            Duration::from_secs(config.fcm_request_timeout_secs),
        )
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }
}

#[async_trait]
impl Messaging for FcmClient {
    async fn send_each_for_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<BatchResponse, MessagingError> {
        validate_multicast(message)?;

        let access_token = self.tokens.access_token(&self.http).await?;
        let url = self.send_url();

        let mut tasks = JoinSet::new();
        for (index, token) in message.tokens.iter().enumerate() {
            let http = self.http.clone();
            let url = url.clone();
            let access_token = access_token.clone();
            let body = json!({
                "message": {
                    "token": token,
                    "notification": message.notification,
                    "data": message.data,
                }
            });
            tasks.spawn(async move {
                let response = send_one(&http, &url, &access_token, &body).await;
                (index, response)
            });
        }

        let mut responses = vec![SendResponse::failed("not sent"); message.tokens.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, response)) => responses[index] = response,
                Err(e) => tracing::error!(error = %e, "FCM send task aborted"),
            }
        }

        Ok(BatchResponse::from_responses(responses))
    }
}

/// Deliver to a single token. Every failure here is per-token.
async fn send_one(
    http: &reqwest::Client,
    url: &str,
    access_token: &str,
    body: &serde_json::Value,
) -> SendResponse {
    let response = match http.post(url).bearer_auth(access_token).json(body).send().await {
        Ok(response) => response,
        Err(e) => return SendResponse::failed(format!("request failed: {}", e)),
    };

    let status = response.status();
    let payload: serde_json::Value = response.json().await.unwrap_or_default();

    if status.is_success() {
        match payload.get("name").and_then(|v| v.as_str()) {
            Some(name) => SendResponse::delivered(name),
            None => SendResponse::failed("response missing message name"),
        }
    } else {
        let code = error_code(&payload).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        SendResponse::failed(code)
    }
}

/// Pull the most specific error code out of an FCM error body: the
/// `FcmError` detail code (e.g. `UNREGISTERED`) if present, else the
/// canonical status.
fn error_code(payload: &serde_json::Value) -> Option<String> {
    let error = payload.get("error")?;
    let detail_code = error
        .get("details")
        .and_then(|d| d.as_array())
        .and_then(|details| {
            details
                .iter()
                .find_map(|d| d.get("errorCode").and_then(|c| c.as_str()))
        });

    detail_code
        .or_else(|| error.get("status").and_then(|s| s.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_prefers_detail() {
        let payload = json!({
            "error": {
                "code": 404,
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        });
        assert_eq!(error_code(&payload).as_deref(), Some("UNREGISTERED"));
    }

    #[test]
    fn test_error_code_falls_back_to_status() {
        let payload = json!({"error": {"code": 400, "status": "INVALID_ARGUMENT"}});
        assert_eq!(error_code(&payload).as_deref(), Some("INVALID_ARGUMENT"));
        assert_eq!(error_code(&json!({})), None);
    }

    #[test]
    fn test_send_url_trims_trailing_slash() {
        let client = FcmClient::new(
            "http://localhost:9099/",
            "bingo-test",
            TokenSource::Static("t".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.send_url(),
            "http://localhost:9099/v1/projects/bingo-test/messages:send"
        );
    }

    fn config(project_id: Option<&str>, credentials: Option<String>) -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_string(),
            db_max_connections: 1,
            redis_url: "redis://localhost:6379".to_string(),
            fcm_project_id: project_id.map(str::to_string),
            fcm_endpoint: "http://localhost:9099".to_string(),
            google_application_credentials: credentials,
            fcm_access_token: None,
            fcm_request_timeout_secs: 1,
            trigger_queue_key: "notification_queue:created".to_string(),
            trigger_max_attempts: 3,
            api_port: 3000,
        }
    }

    fn write_key(project_id: Option<&str>) -> tempfile::NamedTempFile {
        use std::io::Write;

        let key = json!({
            "client_email": "dispatcher@bingo-test.iam.gserviceaccount.com",
            "private_key": include_str!("../../tests/fixtures/test_service_account.pem"),
            "project_id": project_id,
        });
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", key).unwrap();
        file
    }

    fn path_of(file: &tempfile::NamedTempFile) -> Option<String> {
        Some(file.path().to_string_lossy().into_owned())
    }

    #[test]
    fn test_project_id_falls_back_to_key() {
        let key = write_key(Some("from-key"));

        let client = FcmClient::from_config(&config(None, path_of(&key))).unwrap();
        assert_eq!(client.project_id, "from-key");

        let client = FcmClient::from_config(&config(Some("from-env"), path_of(&key))).unwrap();
        assert_eq!(client.project_id, "from-env");
    }

    #[test]
    fn test_project_id_required_somewhere() {
        let key = write_key(None);

        let err = FcmClient::from_config(&config(None, path_of(&key))).unwrap_err();
        assert!(matches!(err, MessagingError::Credentials(_)));
    }
}
