use jsonwebtoken::Algorithm;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEV_JWT_SECRET: &str = "f1-data-api-development-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub max_connections: usize,
    pub pool_wait_timeout: Duration,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub jwt_expiry_hours: i64,
    pub cors_origins: Vec<String>,
    pub log_dir: PathBuf,
    pub bootstrap_schema: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/f1.db"));

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        let max_connections = env::var("MAX_CONNECTIONS")
            .unwrap_or_else(|_| "8".to_string())
            .parse()
            .unwrap_or(8);

        let pool_wait_timeout_secs: u64 = env::var("POOL_WAIT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let jwt_algorithm = parse_algorithm(
            &env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
        )?;

        let jwt_expiry_hours = env::var("JWT_EXPIRY_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);

        let cors_origins = parse_list(
            &env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string()),
        );

        let log_dir = env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));

        let bootstrap_schema = env::var("BOOTSTRAP_SCHEMA")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            database_path,
            api_host,
            api_port,
            max_connections,
            pool_wait_timeout: Duration::from_secs(pool_wait_timeout_secs),
            jwt_secret,
            jwt_algorithm,
            jwt_expiry_hours,
            cors_origins,
            log_dir,
            bootstrap_schema,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        addr.parse().map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }
}

/// Only HMAC algorithms are usable with a shared secret
fn parse_algorithm(name: &str) -> anyhow::Result<Algorithm> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => anyhow::bail!("Unsupported JWT_ALGORITHM '{}': expected HS256, HS384 or HS512", other),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
