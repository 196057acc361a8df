//! Configuration module
//!
//! Pipeline configuration is read from the environment (optionally seeded from a
//! `.env` file) and validated once at startup.

use std::env;

use crate::constants::DEFAULT_MANIFEST_KEY;
use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const QUEUE_MAX_WORKERS: usize = 4;
const QUEUE_WAIT_TIME_SECS: i32 = 20;
const QUEUE_VISIBILITY_TIMEOUT_SECS: i32 = 300;
const VIRUS_SCAN_MAX_ATTEMPTS: u32 = 3;
const REPORT_WINDOW_HOURS: i64 = 24;

/// Full pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub environment: String,
    pub log_format: String,
    // Database
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Object storage
    pub storage_backend: StorageBackend,
    pub aws_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, LocalStack, etc.)
    pub local_storage_path: Option<String>,
    pub staging_bucket: String,
    pub permanent_bucket: String,
    pub reports_bucket: String,
    pub manifest_key: String,
    // Ordered queue
    pub metadata_queue_url: String,
    pub queue_max_workers: usize,
    pub queue_wait_time_seconds: i32,
    pub queue_visibility_timeout_seconds: i32,
    /// Receive attempts tolerated for a set whose scan verdict is still absent.
    pub virus_scan_max_attempts: u32,
    // Reports
    pub report_window_hours: i64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn inner(&self) -> &PipelineConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn log_format(&self) -> &str {
        &self.inner().log_format
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn staging_bucket(&self) -> &str {
        &self.inner().staging_bucket
    }

    pub fn permanent_bucket(&self) -> &str {
        &self.inner().permanent_bucket
    }

    pub fn reports_bucket(&self) -> &str {
        &self.inner().reports_bucket
    }

    pub fn manifest_key(&self) -> &str {
        &self.inner().manifest_key
    }

    pub fn metadata_queue_url(&self) -> &str {
        &self.inner().metadata_queue_url
    }

    pub fn queue_max_workers(&self) -> usize {
        self.inner().queue_max_workers
    }

    pub fn queue_wait_time_seconds(&self) -> i32 {
        self.inner().queue_wait_time_seconds
    }

    pub fn queue_visibility_timeout_seconds(&self) -> i32 {
        self.inner().queue_visibility_timeout_seconds
    }

    pub fn virus_scan_max_attempts(&self) -> u32 {
        self.inner().virus_scan_max_attempts
    }

    pub fn report_window_hours(&self) -> i64 {
        self.inner().report_window_hours
    }
}

fn required(name: &str) -> Result<String, anyhow::Error> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} must be set", name))
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => s.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::S3,
        };

        let config = PipelineConfig {
            environment,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase(),
            database_url: required("DATABASE_URL")?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            aws_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            staging_bucket: required("STAGING_BUCKET")?,
            permanent_bucket: required("PERMANENT_BUCKET")?,
            reports_bucket: required("REPORTS_BUCKET")?,
            manifest_key: env::var("METADATA_MANIFEST_KEY")
                .unwrap_or_else(|_| DEFAULT_MANIFEST_KEY.to_string()),
            metadata_queue_url: required("METADATA_QUEUE_URL")?,
            queue_max_workers: env::var("QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(QUEUE_MAX_WORKERS),
            queue_wait_time_seconds: env::var("QUEUE_WAIT_TIME_SECONDS")
                .unwrap_or_else(|_| QUEUE_WAIT_TIME_SECS.to_string())
                .parse()
                .unwrap_or(QUEUE_WAIT_TIME_SECS),
            queue_visibility_timeout_seconds: env::var("QUEUE_VISIBILITY_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| QUEUE_VISIBILITY_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(QUEUE_VISIBILITY_TIMEOUT_SECS),
            virus_scan_max_attempts: env::var("VIRUS_SCAN_MAX_ATTEMPTS")
                .unwrap_or_else(|_| VIRUS_SCAN_MAX_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(VIRUS_SCAN_MAX_ATTEMPTS),
            report_window_hours: env::var("REPORT_WINDOW_HOURS")
                .unwrap_or_else(|_| REPORT_WINDOW_HOURS.to_string())
                .parse()
                .unwrap_or(REPORT_WINDOW_HOURS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.staging_bucket == self.permanent_bucket {
            return Err(anyhow::anyhow!(
                "STAGING_BUCKET and PERMANENT_BUCKET must be different stores"
            ));
        }

        if self.queue_max_workers == 0 {
            return Err(anyhow::anyhow!("QUEUE_MAX_WORKERS must be at least 1"));
        }

        if !(0..=20).contains(&self.queue_wait_time_seconds) {
            return Err(anyhow::anyhow!(
                "QUEUE_WAIT_TIME_SECONDS must be between 0 and 20"
            ));
        }

        if self.virus_scan_max_attempts == 0 {
            return Err(anyhow::anyhow!("VIRUS_SCAN_MAX_ATTEMPTS must be at least 1"));
        }

        if self.report_window_hours <= 0 {
            return Err(anyhow::anyhow!("REPORT_WINDOW_HOURS must be positive"));
        }

        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'pretty' or 'json'"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
