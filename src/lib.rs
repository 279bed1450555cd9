// src/lib.rs
pub use assume_role::{AssumeRoleRequest, AssumeRoleRequestBuilder, assume_scoped, role_arn, session_name};
pub use broker::SessionBroker;
pub use config::{AccessConfig, TagKeys, WaitConfig, clamp_session_duration, validate_account_id};
pub use equality::{PolicyDiff, diff, policies_equal};
pub use error::{AccessError, ErrorKind, ProviderError, classify};
pub use loader::{decode_provider_document, parse_provider_document};
pub use reconciler::{
    AccountPreparation, AdminPolicyTarget, GroupOutcome, PolicyOutcome, PolicyState, Reconciler,
    admin_group_name, admin_policy_document, admin_policy_name, org_path,
};
pub use repository_access::{RepositoryAccessCodec, apply_repository_access, repository_access};
pub use scan::{RescanSummary, latest_image, rescan_stale_images, scan_findings};
pub use scope::{CredentialScope, Operation};
pub use tags::{SystemTags, normalize_tags, normalize_user_tags};
pub use traits::{
    CredentialProvider, GroupInfo, IdentityProvider, ImageDetail, ImageScanSource, ManagedPolicy,
    PolicyVersion, RepositoryPolicyStore, ScanFindings,
};

pub mod assume_role;
mod broker;
pub mod config;
mod equality;
mod error;
mod loader;
pub mod reconciler;
pub mod repository_access;
mod scan;
pub mod scope;
mod tags;
mod traits;
pub mod types;

#[cfg(test)]
mod tests;
