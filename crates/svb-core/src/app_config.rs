use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub bind_addr: SocketAddr,
    pub stores_path: PathBuf,
    pub spree_url: String,
    pub spree_images_host: Option<String>,
    pub spree_request_timeout_secs: u64,
    pub spree_user_agent: String,
    pub spree_max_retries: u32,
    pub spree_retry_backoff_base_secs: u64,
    pub es_url: String,
    pub es_index: String,
    pub es_bulk_size: usize,
    pub es_request_timeout_secs: u64,
    pub per_page: u32,
    pub max_pages: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("bind_addr", &self.bind_addr)
            .field("stores_path", &self.stores_path)
            .field("spree_url", &self.spree_url)
            .field("spree_images_host", &self.spree_images_host)
            .field(
                "spree_request_timeout_secs",
                &self.spree_request_timeout_secs,
            )
            .field("spree_user_agent", &self.spree_user_agent)
            .field("spree_max_retries", &self.spree_max_retries)
            .field(
                "spree_retry_backoff_base_secs",
                &self.spree_retry_backoff_base_secs,
            )
            // The ES URL may embed basic-auth credentials.
            .field("es_url", &"[redacted]")
            .field("es_index", &self.es_index)
            .field("es_bulk_size", &self.es_bulk_size)
            .field("es_request_timeout_secs", &self.es_request_timeout_secs)
            .field("per_page", &self.per_page)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}
