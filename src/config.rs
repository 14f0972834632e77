use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret every bearer token and access key is signed with.
    pub secret: String,
    /// Shared admin password a bearer token must carry.
    pub api_pass: String,
    pub access_key_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        region: String,
        public_url: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Absolute base every `_links` href is built from, always ending in `/`.
    pub public_url: String,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        let public_url = std::env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/", port));

        let auth = AuthConfig {
            secret: std::env::var("SECRET_KEY").context("SECRET_KEY")?,
            api_pass: std::env::var("API_PASS").context("API_PASS")?,
            access_key_ttl_minutes: std::env::var("ACCESS_KEY_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };

        let storage = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageConfig::S3 {
                endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT")?,
                bucket: std::env::var("S3_BUCKET").context("S3_BUCKET")?,
                access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY")?,
                secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                public_url: std::env::var("S3_PUBLIC_URL").context("S3_PUBLIC_URL")?,
            },
            Ok("local") | Err(_) => StorageConfig::Local {
                root: std::env::var("UPLOAD_DIR")
                    .unwrap_or_else(|_| "static".into())
                    .into(),
            },
            Ok(other) => anyhow::bail!("unknown STORAGE_BACKEND {other:?}"),
        };

        Ok(Self {
            database_url,
            host,
            port,
            public_url: with_trailing_slash(public_url),
            auth,
            storage,
        })
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
