//! Least-privilege credential scopes, one per operation.
//!
//! A scope narrows the cross-account role for the duration of one session:
//! managed policies bound the service surface and an inline session policy
//! bounds the tenant. Registry operations that can evaluate resource tags
//! are held to the caller's org with an org-tag condition. The identity
//! service has no resource tags, so user operations are held to the org's
//! path instead.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::assume_role::AssumeRoleRequestBuilder;
use crate::config::AccessConfig;
use crate::error::AccessError;
use crate::reconciler::admin_group_name;
use crate::types::{Condition, PolicyDocument, Statement};

pub const ECR_FULL_ACCESS_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryFullAccess";
pub const ECR_READ_ONLY_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly";
pub const TAG_EDITOR_READ_ONLY_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/ResourceGroupsandTagEditorReadOnlyAccess";

/// Every operation that needs credentials in a tenant account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    RepositoryCreate,
    RepositoryList,
    RepositoryShow,
    RepositoryUpdate,
    RepositoryDelete,
    ImageList,
    ScanRepositories,
    ScanFindings,
    UserCreate,
    UserList,
    UserShow,
    UserUpdate,
    UserDelete,
}

/// What a session for one operation may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    pub operation: Operation,
    pub managed_policy_arns: Vec<&'static str>,
    pub inline_policy: Option<PolicyDocument>,
}

impl CredentialScope {
    pub fn for_operation(operation: Operation, config: &AccessConfig) -> Self {
        let org = config.org.as_str();
        let org_tag_key = config.tag_keys.org.as_str();

        let (managed_policy_arns, inline_policy) = match operation {
            Operation::RepositoryCreate | Operation::ScanRepositories => {
                (vec![ECR_FULL_ACCESS_POLICY_ARN], None)
            }
            Operation::RepositoryList => (
                vec![ECR_READ_ONLY_POLICY_ARN, TAG_EDITOR_READ_ONLY_POLICY_ARN],
                None,
            ),
            Operation::ScanFindings => (vec![ECR_READ_ONLY_POLICY_ARN], None),
            Operation::RepositoryShow | Operation::ImageList => (
                vec![ECR_READ_ONLY_POLICY_ARN],
                Some(org_tag_access_policy(org_tag_key, org)),
            ),
            Operation::RepositoryUpdate => (
                vec![ECR_FULL_ACCESS_POLICY_ARN],
                Some(org_tag_access_policy(org_tag_key, org)),
            ),
            Operation::RepositoryDelete => (
                vec![ECR_FULL_ACCESS_POLICY_ARN],
                Some(repository_delete_policy(org_tag_key, org)),
            ),
            Operation::UserCreate => (Vec::new(), Some(user_create_policy(org))),
            Operation::UserList | Operation::UserShow => (Vec::new(), Some(user_read_policy(org))),
            Operation::UserUpdate => (Vec::new(), Some(user_update_policy(org))),
            Operation::UserDelete => (Vec::new(), Some(user_delete_policy(org))),
        };

        CredentialScope {
            operation,
            managed_policy_arns,
            inline_policy,
        }
    }

    /// Apply the scope to an assume-role request.
    pub fn apply(&self, builder: AssumeRoleRequestBuilder) -> Result<AssumeRoleRequestBuilder, AccessError> {
        let builder = builder.managed_policy_arns(self.managed_policy_arns.iter().copied());
        match &self.inline_policy {
            Some(policy) => Ok(builder.inline_policy(policy.to_json()?)),
            None => Ok(builder),
        }
    }
}

fn org_tag_statement(org_tag_key: &str, org: &str) -> Statement {
    Statement::allow("*").with_resource("*").with_condition(Condition::new().with(
        "StringEquals",
        format!("aws:ResourceTag/{org_tag_key}"),
        org,
    ))
}

/// Allow everything on resources tagged with `org`.
pub fn org_tag_access_policy(org_tag_key: &str, org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![org_tag_statement(org_tag_key, org)])
}

fn user_resource(org: &str) -> String {
    format!("arn:aws:iam::*:user/spinup/{org}/*")
}

fn admin_group_resource(org: &str) -> String {
    format!(
        "arn:aws:iam::*:group/spinup/{org}/{}",
        admin_group_name(org)
    )
}

/// Repository users, their admin group and policy, all under the org path.
pub fn user_create_policy(org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow([
            "iam:CreatePolicy",
            "iam:UntagUser",
            "iam:GetPolicyVersion",
            "iam:AddUserToGroup",
            "iam:GetPolicy",
            "iam:ListAttachedGroupPolicies",
            "iam:ListGroupPolicies",
            "iam:AttachGroupPolicy",
            "iam:GetUser",
            "iam:CreatePolicyVersion",
            "iam:CreateUser",
            "iam:GetGroup",
            "iam:CreateGroup",
            "iam:TagUser",
        ])
        .with_sid("CreateRepositoryUser")
        .with_resource([
            format!("arn:aws:iam::*:group/spinup/{org}/*"),
            format!("arn:aws:iam::*:policy/spinup/{org}/*"),
            user_resource(org),
        ]),
        Statement::allow("iam:ListPolicies")
            .with_sid("ListRepositoryUserPolicies")
            .with_resource("*"),
    ])
}

pub fn user_read_policy(org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow([
            "iam:GetUser",
            "iam:ListAccessKeys",
            "iam:ListGroupsForUser",
            "iam:ListUsers",
        ])
        .with_sid("ReadRepositoryUser")
        .with_resource(user_resource(org).as_str()),
    ])
}

pub fn user_update_policy(org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow([
            "iam:UntagUser",
            "iam:DeleteAccessKey",
            "iam:RemoveUserFromGroup",
            "iam:TagUser",
            "iam:CreateAccessKey",
            "iam:ListAccessKeys",
        ])
        .with_sid("UpdateRepositoryUser")
        .with_resource([user_resource(org), admin_group_resource(org)]),
    ])
}

fn user_delete_statement(org: &str) -> Statement {
    Statement::allow([
        "iam:DeleteAccessKey",
        "iam:RemoveUserFromGroup",
        "iam:ListAccessKeys",
        "iam:ListGroupsForUser",
        "iam:DeleteUser",
        "iam:GetUser",
    ])
    .with_sid("DeleteRepositoryUser")
    .with_resource([user_resource(org), admin_group_resource(org)])
}

pub fn user_delete_policy(org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![user_delete_statement(org)])
}

/// Deleting a repository also deletes its users.
pub fn repository_delete_policy(org_tag_key: &str, org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        org_tag_statement(org_tag_key, org).with_sid("DeleteRepositoryInOrg"),
        user_delete_statement(org),
        Statement::allow("iam:ListUsers")
            .with_sid("ListRepositoryUsers")
            .with_resource("*"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assume_role::AssumeRoleRequest;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn config() -> AccessConfig {
        AccessConfig::new("testOrg", "SpinupCrossAccount")
    }

    #[test]
    fn test_org_tag_access_policy_wire_form() {
        let json = org_tag_access_policy("spinup:org", "testOrg").to_json().unwrap();
        insta::assert_snapshot!(
            json,
            @r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*","Resource":"*","Condition":{"StringEquals":{"aws:ResourceTag/spinup:org":"testOrg"}}}]}"#
        );
    }

    #[test]
    fn test_user_delete_policy_wire_form() {
        let json = user_delete_policy("testOrg").to_json().unwrap();
        insta::assert_snapshot!(
            json,
            @r#"{"Version":"2012-10-17","Statement":[{"Sid":"DeleteRepositoryUser","Effect":"Allow","Action":["iam:DeleteAccessKey","iam:DeleteUser","iam:GetUser","iam:ListAccessKeys","iam:ListGroupsForUser","iam:RemoveUserFromGroup"],"Resource":["arn:aws:iam::*:group/spinup/testOrg/SpinupECRAdminGroup-testOrg","arn:aws:iam::*:user/spinup/testOrg/*"]}]}"#
        );
    }

    #[test]
    fn test_user_create_policy_is_path_scoped() {
        let policy = user_create_policy("testOrg");
        let create = policy.statement("CreateRepositoryUser").unwrap();
        let resources = create.resource.as_ref().unwrap();
        assert_eq!(resources.len(), 3);
        assert!(resources.iter().all(|r| r.contains("/spinup/testOrg/")));
        assert!(policy.statement("ListRepositoryUserPolicies").is_some());
    }

    #[test]
    fn test_every_operation_is_narrowed() {
        let config = config();
        for operation in Operation::iter() {
            let scope = CredentialScope::for_operation(operation, &config);
            assert!(
                !scope.managed_policy_arns.is_empty() || scope.inline_policy.is_some(),
                "{operation} runs with the full role"
            );
        }
    }

    #[test]
    fn test_read_operations_never_get_full_access() {
        let config = config();
        for operation in [
            Operation::RepositoryList,
            Operation::RepositoryShow,
            Operation::ImageList,
            Operation::ScanFindings,
        ] {
            let scope = CredentialScope::for_operation(operation, &config);
            assert!(!scope.managed_policy_arns.contains(&ECR_FULL_ACCESS_POLICY_ARN));
        }
    }

    #[test]
    fn test_user_operations_have_no_managed_policies() {
        let config = config();
        for operation in [
            Operation::UserCreate,
            Operation::UserList,
            Operation::UserShow,
            Operation::UserUpdate,
            Operation::UserDelete,
        ] {
            let scope = CredentialScope::for_operation(operation, &config);
            assert!(scope.managed_policy_arns.is_empty());
            assert!(scope.inline_policy.is_some());
        }
    }

    #[test]
    fn test_apply_sets_policy_and_arns() {
        let config = config();
        let scope = CredentialScope::for_operation(Operation::RepositoryUpdate, &config);
        let builder = AssumeRoleRequest::for_account(&config, "123456789012").unwrap();
        let request = scope.apply(builder).unwrap().build().unwrap();

        assert_eq!(request.policy_arns, vec![ECR_FULL_ACCESS_POLICY_ARN]);
        let inline = PolicyDocument::from_json(request.policy.as_deref().unwrap()).unwrap();
        assert_eq!(inline, org_tag_access_policy("spinup:org", "testOrg"));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::ScanFindings.to_string(), "scan_findings");
        assert_eq!(Operation::from_str("user_delete").unwrap(), Operation::UserDelete);
        assert_eq!(
            serde_json::to_string(&Operation::RepositoryList).unwrap(),
            r#""repository_list""#
        );
    }
}
