//! OAuth2 access tokens for the FCM HTTP v1 API.
//!
//! A service-account key signs a short-lived RS256 assertion which the
//! token endpoint exchanges for a bearer token. Tokens are cached until
//! shortly before they expire.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::MessagingError;

/// OAuth scope required to send through FCM.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh cached tokens this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// The subset of a Google service-account JSON key used for signing.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, MessagingError> {
        serde_json::from_str(json).map_err(|e| MessagingError::Credentials(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MessagingError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MessagingError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Signs assertions with a service-account key and caches the exchanged token.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey) -> Result<Self, MessagingError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| MessagingError::Credentials(format!("invalid private key: {}", e)))?;
        Ok(Self {
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    async fn access_token(&self, http: &reqwest::Client) -> Result<String, MessagingError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        let response = http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MessagingError::Auth(format!("malformed token response: {}", e)))?;

        tracing::debug!(
            client_email = %self.key.client_email,
            expires_in = token.expires_in,
            "Obtained FCM access token"
        );

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + Duration::seconds(token.expires_in),
        });

        Ok(token.access_token)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, MessagingError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: FCM_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| MessagingError::Auth(format!("failed to sign assertion: {}", e)))
    }
}

/// Where the FCM client gets its bearer token from.
pub enum TokenSource {
    /// A pre-issued token, used as is (emulators, short-lived jobs).
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl TokenSource {
    pub fn service_account(key: ServiceAccountKey) -> Result<Self, MessagingError> {
        Ok(Self::ServiceAccount(ServiceAccountAuth::new(key)?))
    }

    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, MessagingError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(auth) => auth.access_token(http).await,
        }
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::ServiceAccount(auth) => {
                write!(f, "TokenSource::ServiceAccount({})", auth.key.client_email)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "svc@bingo.iam.gserviceaccount.com", "private_key": "x"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert!(key.project_id.is_none());
    }

    #[test]
    fn test_key_missing_fields() {
        let err = ServiceAccountKey::from_json(r#"{"client_email": "a"}"#).unwrap_err();
        assert!(matches!(err, MessagingError::Credentials(_)));
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "svc@bingo", "private_key": "not a pem"}"#,
        )
        .unwrap();
        assert!(matches!(
            TokenSource::service_account(key),
            Err(MessagingError::Credentials(_))
        ));
    }

    #[test]
    fn test_missing_key_file() {
        let err = ServiceAccountKey::from_file("/nonexistent/key.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/key.json"));
    }

    #[tokio::test]
    async fn test_static_token() {
        let source = TokenSource::Static("abc".to_string());
        let token = source.access_token(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token, "abc");
        assert_eq!(format!("{:?}", source), "TokenSource::Static(..)");
    }
}
