//! Wiring shared by the `casefile` subcommands.

use std::sync::Arc;

use anyhow::Context;
use casefile_core::Config;
use casefile_db::{
    setup_database, DocumentReferenceRepository, UploadReportRepository,
    UploadReportRepositoryTrait,
};
use casefile_storage::{create_storage, Storage};
use casefile_worker::SqsQueue;
use serde::Serialize;

/// Store handles every subcommand needs.
pub struct Pipeline {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub reports: Arc<dyn UploadReportRepositoryTrait>,
    pub documents: Arc<DocumentReferenceRepository>,
}

impl Pipeline {
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;
        let storage = create_storage(&config)
            .await
            .context("Failed to initialize object storage")?;
        Ok(Self {
            reports: Arc::new(UploadReportRepository::new(pool.clone())),
            documents: Arc::new(DocumentReferenceRepository::new(pool)),
            storage,
            config,
        })
    }

    pub async fn queue(&self) -> anyhow::Result<Arc<SqsQueue>> {
        let queue = SqsQueue::new(
            self.config.aws_region().map(String::from),
            self.config.s3_endpoint().map(String::from),
            self.config.metadata_queue_url().to_string(),
        )
        .await
        .context("Failed to initialize queue client")?;
        Ok(Arc::new(queue))
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Report window length; an explicit flag wins over the configured default.
pub fn report_window(hours: Option<i64>, default_hours: i64) -> anyhow::Result<chrono::Duration> {
    let hours = hours.unwrap_or(default_hours);
    if hours <= 0 {
        anyhow::bail!("Report window must be a positive number of hours, got {}", hours);
    }
    Ok(chrono::Duration::hours(hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_window_prefers_flag() {
        assert_eq!(report_window(Some(48), 24).unwrap(), chrono::Duration::hours(48));
        assert_eq!(report_window(None, 24).unwrap(), chrono::Duration::hours(24));
    }

    #[test]
    fn report_window_rejects_non_positive() {
        assert!(report_window(Some(0), 24).is_err());
        assert!(report_window(Some(-6), 24).is_err());
    }
}
