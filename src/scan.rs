//! Account-wide image scan reporting.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::AccessError;
use crate::traits::{ImageDetail, ImageScanSource, ScanFindings};

/// Most recently pushed image; the first one wins a tie.
pub fn latest_image(images: &[ImageDetail]) -> Option<&ImageDetail> {
    images
        .iter()
        .reduce(|best, image| if image.pushed_at > best.pushed_at { image } else { best })
}

async fn latest_findings(
    source: Arc<dyn ImageScanSource>,
    repository: String,
) -> Result<Option<ScanFindings>, AccessError> {
    let images = source.describe_images(&repository).await?;
    let Some(latest) = latest_image(&images) else {
        debug!(event = "ScanFindings", phase = "Empty", repository = %repository);
        return Ok(None);
    };
    let findings = source.image_scan_findings(&repository, &latest.digest).await?;
    Ok(Some(findings))
}

/// Scan findings for the latest image of every repository in the account.
///
/// One task per repository. Every task is joined before any failure is
/// reported; the first failure then fails the whole call. Repositories
/// without images are left out. Results are ordered by repository.
pub async fn scan_findings(
    source: Arc<dyn ImageScanSource>,
) -> Result<Vec<ScanFindings>, AccessError> {
    let repositories = source.list_repositories().await?;
    info!(event = "ScanFindings", phase = "Begin", repositories = repositories.len());

    let mut tasks = JoinSet::new();
    for repository in repositories {
        tasks.spawn(latest_findings(Arc::clone(&source), repository));
    }

    let mut results = Vec::new();
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| AccessError::internal(format!("scan findings task failed: {e}")))
            .and_then(|r| r);
        match outcome {
            Ok(Some(findings)) => results.push(findings),
            Ok(None) => {}
            Err(e) => {
                warn!(event = "ScanFindings", phase = "TaskFailed", error = %e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    results.sort_by(|a, b| a.repository.cmp(&b.repository));
    Ok(results)
}

/// Images a rescan was started for, by repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescanSummary {
    pub repositories: BTreeMap<String, Vec<String>>,
}

impl RescanSummary {
    pub fn count(&self) -> usize {
        self.repositories.values().map(Vec::len).sum()
    }

    pub fn message(&self) -> String {
        match self.count() {
            0 => "All images already scanned recently".to_string(),
            n => format!("Scan initiated for {n} images"),
        }
    }
}

/// Start a new scan of each repository's latest image when its last scan
/// completed more than `max_age` before `now`. Images that were never
/// scanned are left to the registry's scan-on-push. Stops at the first
/// failure.
pub async fn rescan_stale_images(
    source: &dyn ImageScanSource,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<RescanSummary, AccessError> {
    let mut summary = RescanSummary::default();

    for repository in source.list_repositories().await? {
        let images = source.describe_images(&repository).await?;
        let Some(latest) = latest_image(&images) else {
            continue;
        };
        let Some(completed) = latest.scan_completed_at else {
            continue;
        };
        if now - completed <= max_age {
            continue;
        }

        source.start_image_scan(&repository, &latest.digest).await?;
        info!(event = "Rescan", phase = "Started", repository = %repository, digest = %latest.digest);
        summary
            .repositories
            .entry(repository)
            .or_default()
            .push(latest.digest.clone());
    }

    Ok(summary)
}
