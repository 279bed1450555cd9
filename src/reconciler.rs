//! Idempotent setup of the per-org registry admin policy and group.
//!
//! The canonical admin policy is built once from configuration and never
//! mutated. Reconciling compares it semantically against the provider's
//! stored default version, so a document that only differs in ordering or
//! encoding does not produce a new version.

use std::sync::Arc;

use serde::Serialize;
use strum_macros::Display;
use tracing::{debug, info, warn};

use crate::config::{TagKeys, WaitConfig};
use crate::equality::diff;
use crate::error::AccessError;
use crate::loader::parse_provider_document;
use crate::traits::IdentityProvider;
use crate::types::{Condition, PolicyDocument, Statement};

pub const ADMIN_POLICY_SID: &str = "AllowActionsOnRepositoriesInSpaceAndOrg";
pub const DOCKER_LOGIN_SID: &str = "AllowDockerLogin";

const ADMIN_ACTIONS: [&str; 16] = [
    "ecr:PutLifecyclePolicy",
    "ecr:PutImageTagMutability",
    "ecr:DescribeImageScanFindings",
    "ecr:GetDownloadUrlForLayer",
    "ecr:GetAuthorizationToken",
    "ecr:UploadLayerPart",
    "ecr:BatchDeleteImage",
    "ecr:ListImages",
    "ecr:DeleteLifecyclePolicy",
    "ecr:PutImage",
    "ecr:BatchGetImage",
    "ecr:CompleteLayerUpload",
    "ecr:DescribeImages",
    "ecr:DeleteRegistryPolicy",
    "ecr:InitiateLayerUpload",
    "ecr:BatchCheckLayerAvailability",
];

pub fn admin_policy_name(org: &str) -> String {
    format!("SpinupECRAdminPolicy-{org}")
}

pub fn admin_group_name(org: &str) -> String {
    format!("SpinupECRAdminGroup-{org}")
}

/// The identity path every org-owned policy, group and user lives under.
pub fn org_path(org: &str) -> String {
    format!("/spinup/{org}/")
}

/// Admin rights on repositories whose org, space and name tags match the
/// principal's, plus registry login.
pub fn admin_policy_document(keys: &TagKeys) -> PolicyDocument {
    let condition = Condition::new()
        .with(
            "StringEquals",
            format!("aws:ResourceTag/{}", keys.org),
            format!("${{aws:PrincipalTag/{}}}", keys.org),
        )
        .with(
            "StringEquals",
            format!("aws:ResourceTag/{}", keys.space),
            format!("${{aws:PrincipalTag/{}}}", keys.space),
        )
        .with(
            "StringEquals",
            format!("aws:ResourceTag/{}", keys.name),
            format!("${{aws:PrincipalTag/{}}}", keys.resource_name),
        );

    PolicyDocument::new(vec![
        Statement::allow(ADMIN_ACTIONS)
            .with_sid(ADMIN_POLICY_SID)
            .with_resource("*")
            .with_condition(condition),
        Statement::allow("ecr:GetAuthorizationToken")
            .with_sid(DOCKER_LOGIN_SID)
            .with_resource("*"),
    ])
}

/// What the reconciler converges an account to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPolicyTarget {
    pub policy_name: String,
    pub group_name: String,
    pub path: String,
    pub document: PolicyDocument,
}

impl AdminPolicyTarget {
    pub fn for_org(org: &str, keys: &TagKeys) -> Self {
        AdminPolicyTarget {
            policy_name: admin_policy_name(org),
            group_name: admin_group_name(org),
            path: org_path(org),
            document: admin_policy_document(keys),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum PolicyState {
    Created,
    Unchanged,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyOutcome {
    pub arn: String,
    pub state: PolicyState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub name: String,
    pub created: bool,
    pub attached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountPreparation {
    pub policy: PolicyOutcome,
    pub group: GroupOutcome,
}

/// Converges one account towards an [`AdminPolicyTarget`].
#[derive(Clone)]
pub struct Reconciler {
    identity: Arc<dyn IdentityProvider>,
    target: Arc<AdminPolicyTarget>,
    wait: WaitConfig,
}

impl Reconciler {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        target: Arc<AdminPolicyTarget>,
        wait: WaitConfig,
    ) -> Self {
        Reconciler {
            identity,
            target,
            wait,
        }
    }

    pub fn target(&self) -> &AdminPolicyTarget {
        &self.target
    }

    /// Make sure the admin policy exists with the canonical document.
    ///
    /// A new policy is only reported once the provider confirms it exists.
    /// A stored document that cannot be decoded or parsed counts as drift.
    pub async fn ensure_policy(&self) -> Result<PolicyOutcome, AccessError> {
        let target = &self.target;
        info!(
            event = "Reconcile",
            phase = "Policy",
            name = %target.policy_name,
            path = %target.path
        );

        let policy = match self
            .identity
            .get_policy_by_name(&target.policy_name, &target.path)
            .await
        {
            Ok(policy) => policy,
            Err(e) if e.is_not_found() => return self.create_policy().await,
            Err(e) => return Err(e),
        };

        let version = self
            .identity
            .get_default_policy_version(&policy.arn, &policy.default_version_id)
            .await?;

        let drifted = match parse_provider_document(&version.document) {
            Ok(stored) => match diff(&stored, &target.document) {
                None => false,
                Some(difference) => {
                    warn!(event = "Reconcile", phase = "Drift", arn = %policy.arn, diff = %difference);
                    true
                }
            },
            Err(e) => {
                warn!(event = "Reconcile", phase = "Drift", arn = %policy.arn, error = %e, "stored document unreadable");
                true
            }
        };

        if !drifted {
            debug!(event = "Reconcile", phase = "Unchanged", arn = %policy.arn);
            return Ok(PolicyOutcome {
                arn: policy.arn,
                state: PolicyState::Unchanged,
            });
        }

        // TODO: delete the oldest non-default version before publishing once
        // the provider's five-version cap is reached.
        let text = target.document.to_json()?;
        self.identity.update_policy(&policy.arn, &text).await?;
        info!(event = "Reconcile", phase = "Updated", arn = %policy.arn);

        Ok(PolicyOutcome {
            arn: policy.arn,
            state: PolicyState::Updated,
        })
    }

    async fn create_policy(&self) -> Result<PolicyOutcome, AccessError> {
        let target = &self.target;
        let text = target.document.to_json()?;
        let created = self
            .identity
            .create_policy(&target.policy_name, &target.path, &text)
            .await?;
        info!(event = "Reconcile", phase = "Created", arn = %created.arn);

        self.identity
            .wait_for_policy_exists(&created.arn, &self.wait)
            .await?;

        Ok(PolicyOutcome {
            arn: created.arn,
            state: PolicyState::Created,
        })
    }

    /// Make sure the admin group exists and has `policy_arn` attached.
    /// Never detaches anything and never attaches twice.
    pub async fn ensure_group(&self, policy_arn: &str) -> Result<GroupOutcome, AccessError> {
        let target = &self.target;
        info!(
            event = "Reconcile",
            phase = "Group",
            name = %target.group_name,
            path = %target.path,
            policy_arn
        );

        let created = match self
            .identity
            .get_group(&target.group_name, &target.path)
            .await
        {
            Ok(_) => false,
            Err(e) if e.is_not_found() => {
                self.identity
                    .create_group(&target.group_name, &target.path)
                    .await?;
                info!(event = "Reconcile", phase = "GroupCreated", name = %target.group_name);
                true
            }
            Err(e) => return Err(e),
        };

        let attached = self
            .identity
            .list_attached_group_policies(&target.group_name, &target.path)
            .await?;
        if attached.iter().any(|arn| arn == policy_arn) {
            debug!(event = "Reconcile", phase = "AlreadyAttached", policy_arn);
            return Ok(GroupOutcome {
                name: target.group_name.clone(),
                created,
                attached: false,
            });
        }

        self.identity
            .attach_group_policy(&target.group_name, policy_arn)
            .await?;
        info!(event = "Reconcile", phase = "Attached", name = %target.group_name, policy_arn);

        Ok(GroupOutcome {
            name: target.group_name.clone(),
            created,
            attached: true,
        })
    }

    /// Ensure the admin policy, then the admin group with the policy attached.
    pub async fn prepare_account(&self) -> Result<AccountPreparation, AccessError> {
        let policy = self.ensure_policy().await?;
        let group = self.ensure_group(&policy.arn).await?;
        Ok(AccountPreparation { policy, group })
    }
}
