//! Capability interfaces onto the remote services this crate drives.
//!
//! Implementations wrap a cloud SDK client (or a test double) and report
//! failures already classified, usually through [`crate::error::classify`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assume_role::AssumeRoleRequest;
use crate::config::WaitConfig;
use crate::error::AccessError;
use crate::types::TemporaryCredential;

/// A customer managed policy as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedPolicy {
    pub arn: String,
    pub name: String,
    pub path: String,
    pub default_version_id: String,
}

/// One stored version of a managed policy. `document` is URL-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub version_id: String,
    pub document: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub arn: String,
    pub name: String,
    pub path: String,
}

/// One image in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub digest: String,
    pub tags: Vec<String>,
    pub pushed_at: DateTime<Utc>,
    pub scan_completed_at: Option<DateTime<Utc>>,
}

/// Scan results for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFindings {
    pub repository: String,
    pub digest: String,
    pub status: String,
    pub severity_counts: BTreeMap<String, u64>,
}

/// Issues temporary credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn assume_role(&self, request: &AssumeRoleRequest)
    -> Result<TemporaryCredential, AccessError>;
}

/// The managed policy and group operations the reconciler needs.
///
/// Lookups of absent entities must fail with `AccessError::NotFound`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_policy_by_name(&self, name: &str, path: &str)
    -> Result<ManagedPolicy, AccessError>;

    async fn get_policy(&self, arn: &str) -> Result<ManagedPolicy, AccessError>;

    async fn create_policy(
        &self,
        name: &str,
        path: &str,
        document: &str,
    ) -> Result<ManagedPolicy, AccessError>;

    async fn get_default_policy_version(
        &self,
        arn: &str,
        version_id: &str,
    ) -> Result<PolicyVersion, AccessError>;

    /// Publish `document` as a new version and make it the default.
    async fn update_policy(&self, arn: &str, document: &str) -> Result<(), AccessError>;

    async fn get_group(&self, name: &str, path: &str) -> Result<GroupInfo, AccessError>;

    async fn create_group(&self, name: &str, path: &str) -> Result<GroupInfo, AccessError>;

    /// ARNs of the managed policies attached to a group.
    async fn list_attached_group_policies(
        &self,
        name: &str,
        path: &str,
    ) -> Result<Vec<String>, AccessError>;

    async fn attach_group_policy(&self, name: &str, policy_arn: &str) -> Result<(), AccessError>;

    /// Poll until the provider reports `arn` as existing.
    ///
    /// `NotFound` answers are retried with the configured backoff; any other
    /// error ends the wait. Running out of attempts is `NotFound`, reported
    /// right after the last lookup.
    async fn wait_for_policy_exists(&self, arn: &str, wait: &WaitConfig) -> Result<(), AccessError> {
        for attempt in 0..wait.max_attempts {
            match self.get_policy(arn).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_not_found() => {
                    if attempt + 1 == wait.max_attempts {
                        break;
                    }
                    let delay = wait.delay_for(attempt);
                    debug!(event = "WaitForPolicy", phase = "Retry", arn, attempt, delay_ms = delay.as_millis() as u64);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(AccessError::not_found(format!(
            "policy {arn} not visible after {} attempts",
            wait.max_attempts
        )))
    }
}

/// Where repository resource policies live.
#[async_trait]
pub trait RepositoryPolicyStore: Send + Sync {
    /// The repository's policy text; an empty string means no policy.
    async fn get_repository_policy(&self, repository: &str) -> Result<String, AccessError>;

    async fn set_repository_policy(&self, repository: &str, policy: &str)
    -> Result<(), AccessError>;
}

/// Read access to repositories, their images and scan results.
#[async_trait]
pub trait ImageScanSource: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<String>, AccessError>;

    async fn describe_images(&self, repository: &str) -> Result<Vec<ImageDetail>, AccessError>;

    async fn image_scan_findings(
        &self,
        repository: &str,
        digest: &str,
    ) -> Result<ScanFindings, AccessError>;

    async fn start_image_scan(&self, repository: &str, digest: &str) -> Result<(), AccessError>;
}
