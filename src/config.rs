use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Origin of the dashboard frontend, if served separately
    pub cors_origin: Option<String>,

    // Security
    pub qr_secret: Secret<String>,

    // Pending passes older than this are escalated to the HOD queue
    pub escalation_after_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config.get("base_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            cors_origin: config.get("cors_origin").ok(),

            qr_secret: Secret::new(config.get("qr_secret")?),

            escalation_after_hours: config.get("escalation_after_hours").unwrap_or(24),
        })
    }
}
