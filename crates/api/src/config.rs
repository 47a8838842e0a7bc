//! Process configuration from environment variables.

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP listener binds to (`BIND_ADDR`).
    pub bind_addr: String,

    /// Shared token-signing secret (`JWT_SECRET`). Without it the process
    /// still serves public reads, but login/registration fail with a
    /// signing error and no bearer token verifies.
    pub jwt_secret: Option<String>,

    /// Postgres connection string (`DATABASE_URL`). When absent the
    /// process runs on the in-memory store.
    pub database_url: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        if jwt_secret.is_none() {
            tracing::warn!("JWT_SECRET not set; token issuance and verification will fail");
        }

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:2024".to_string()),
            jwt_secret,
            database_url,
        }
    }
}
