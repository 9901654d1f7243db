use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub allowed_origins: Vec<String>,
    pub storage: StorageConfig,
    pub smtp: Option<SmtpConfig>,
    pub google_api_key: Option<String>,
}

/// S3 bucket for uploaded images. `endpoint` points at an S3-compatible
/// service instead of AWS and switches to path-style addressing.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // hours, "720h" is accepted as well
        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(720);

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: optional("SMTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USERNAME")?,
                password: env::var("SMTP_PASSWORD")?,
                from_address: env::var("EMAIL_FROM")?,
            }),
            Err(_) => None,
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "::".to_string()),
            server_port: optional("SERVER_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/".to_string()),
            rate_limit_window_secs: optional("RATE_LIMIT_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: optional("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            allowed_origins: optional("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            storage: StorageConfig {
                bucket: optional("AWS_BUCKET_NAME"),
                region: optional("AWS_REGION"),
                access_key: optional("AWS_ACCESS_KEY"),
                secret_key: optional("AWS_SECRET_KEY"),
                endpoint: optional("STORAGE_ENDPOINT"),
                public_url: optional("STORAGE_PUBLIC_URL"),
            },
            smtp,
            google_api_key: optional("GOOGLE_API_KEY"),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
