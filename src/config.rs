#[derive(Clone, Debug)]
pub struct Config {
    pub classifier_base: String,
    pub remote_base: Option<String>,
    pub remote_key: Option<String>,
    pub sqlite_path: String,
    pub key_namespace: String,
    pub http_timeout_secs: u64,
    pub classifier_max_attempts: u32,
    pub sync_max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            classifier_base: std::env::var("CLASSIFIER_BASE").unwrap_or_else(|_| "http://127.0.0.1:8787".to_string()),
            remote_base: std::env::var("REMOTE_BASE").ok(),
            remote_key: std::env::var("REMOTE_KEY").ok(),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./mirror.sqlite".to_string()),
            key_namespace: std::env::var("KEY_NAMESPACE").unwrap_or_else(|_| "eva".to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(15),
            classifier_max_attempts: std::env::var("CLASSIFIER_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(2),
            sync_max_attempts: std::env::var("SYNC_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(3),
            backoff_base_ms: std::env::var("BACKOFF_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(200),
            backoff_max_ms: std::env::var("BACKOFF_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(5000),
        }
    }
}
