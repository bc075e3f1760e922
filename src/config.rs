use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

fn default_database_path() -> PathBuf {
    PathBuf::from("data").join("knowbest.db")
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    /// OpenAI API key; the assistant gateway is disabled when absent.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub assistant_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: default_database_path(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            assistant_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        if jwt_secret == DEFAULT_JWT_SECRET {
            tracing::warn!("JWT_SECRET is unset; using the insecure built-in default");
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let openai_model = std::env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model);

        let assistant_timeout = std::env::var("ASSISTANT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.assistant_timeout);

        Self {
            port,
            database_path,
            jwt_secret,
            openai_api_key,
            openai_model,
            assistant_timeout,
        }
    }
}
