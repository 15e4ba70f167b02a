use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// Every variable is optional with a safe default: the storage selector and
/// the evaluation service both degrade gracefully, so startup must never
/// fail on configuration alone.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote Postgres connection string. Unset means "skip straight to the
    /// local fallback".
    pub database_url: Option<String>,
    /// Directory holding the SQLite database and the flat-file documents.
    pub data_dir: PathBuf,
    /// AI provider key. Unset or placeholder means deterministic mock mode.
    pub anthropic_api_key: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Config {
            database_url: optional_env("DATABASE_URL"),
            data_dir: optional_env("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Path of the local fallback database file.
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("initium.db")
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
