use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024; // multer-compatible 10MB cap
const DEFAULT_PRESENCE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub presence_ttl_secs: u64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    fn parse_origins(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5002);

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.len() < 16 {
            return Err(crate::error::AppError::Config(
                "JWT_SECRET must be at least 16 bytes".into(),
            ));
        }

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let presence_ttl_secs = env::var("PRESENCE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PRESENCE_TTL_SECS);

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| Self::parse_origins(&v))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            redis_url,
            port,
            jwt_secret,
            upload_dir,
            max_upload_bytes,
            presence_ttl_secs,
            allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_splits_and_trims() {
        let origins = Config::parse_origins("http://localhost:3001, https://app.example.com ,");
        assert_eq!(
            origins,
            vec![
                "http://localhost:3001".to_string(),
                "https://app.example.com".to_string()
            ]
        );
    }

    #[test]
    fn parse_origins_empty_input() {
        assert!(Config::parse_origins("").is_empty());
        assert!(Config::parse_origins(" , ,").is_empty());
    }
}
