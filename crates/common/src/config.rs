use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Redis connection string
    pub redis_url: String,

    /// Firebase project that owns the FCM sender; falls back to the
    /// service-account key's `project_id`
    pub fcm_project_id: Option<String>,

    /// FCM API base URL (default: https://fcm.googleapis.com)
    pub fcm_endpoint: String,

    /// Path to a Google service-account JSON key
    pub google_application_credentials: Option<String>,

    /// Pre-issued OAuth2 bearer token; takes precedence over the service account
    pub fcm_access_token: Option<String>,

    /// Per-request timeout for FCM HTTP calls, in seconds (default: 10)
    pub fcm_request_timeout_secs: u64,

    /// Redis list the game-state writer pushes creation events onto
    pub trigger_queue_key: String,

    /// Delivery attempts per trigger event before it is dead-lettered (default: 3)
    pub trigger_max_attempts: u32,

    /// HTTP trigger listen port (default: 3000)
    pub api_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            fcm_project_id: std::env::var("FCM_PROJECT_ID").ok(),
            fcm_endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            google_application_credentials: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            fcm_access_token: std::env::var("FCM_ACCESS_TOKEN").ok(),
            fcm_request_timeout_secs: std::env::var("FCM_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FCM_REQUEST_TIMEOUT_SECS must be a valid u64"))?,
            trigger_queue_key: std::env::var("TRIGGER_QUEUE_KEY")
                .unwrap_or_else(|_| "notification_queue:created".to_string()),
            trigger_max_attempts: std::env::var("TRIGGER_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TRIGGER_MAX_ATTEMPTS must be a valid u32"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid port number"))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that single-variable parsing can't express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fcm_access_token.is_none() && self.google_application_credentials.is_none() {
            anyhow::bail!(
                "either FCM_ACCESS_TOKEN or GOOGLE_APPLICATION_CREDENTIALS must be set"
            );
        }
        if self.fcm_access_token.is_some() && self.fcm_project_id.is_none() {
            anyhow::bail!("FCM_PROJECT_ID must be set when FCM_ACCESS_TOKEN is used");
        }
        if self.trigger_max_attempts == 0 {
            anyhow::bail!("TRIGGER_MAX_ATTEMPTS must be at least 1");
        }
        Ok(())
    }
}
