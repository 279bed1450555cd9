//! Scoped assume-role requests.
//!
//! A request is built fresh for every operation, handed to a
//! [`CredentialProvider`] once and dropped. The role ARN is always templated
//! from a validated account id and the configured role name, never taken as
//! free text.

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{AccessConfig, clamp_session_duration, validate_account_id};
use crate::error::AccessError;
use crate::traits::CredentialProvider;
use crate::types::{ScopedSession, Tag};

/// Longest role session name the provider accepts.
pub const MAX_SESSION_NAME_LEN: usize = 64;

const DEFAULT_ORG_TAG_KEY: &str = "spinup:org";
const DEFAULT_SESSION_NAME_PREFIX: &str = "spinup";

/// `arn:aws:iam::{account}:role/{role_name}` for a 12 digit account.
pub fn role_arn(account: &str, role_name: &str) -> Result<String, AccessError> {
    validate_account_id(account)?;
    if role_name.is_empty() {
        return Err(AccessError::invalid_input("role name is empty".to_string()));
    }
    Ok(format!("arn:aws:iam::{account}:role/{role_name}"))
}

/// A fresh `{prefix}-{org}-ecr-api-{uuid}` session name.
///
/// Names longer than the provider limit, counted in bytes, lose the tail
/// of the `{prefix}-{org}` part at a character boundary; the random suffix
/// is always kept whole.
pub fn session_name(prefix: &str, org: &str) -> String {
    let suffix = Uuid::new_v4().to_string();
    let mut head = format!("{prefix}-{org}-ecr-api-");
    let mut end = head.len().min(MAX_SESSION_NAME_LEN - suffix.len());
    while !head.is_char_boundary(end) {
        end -= 1;
    }
    head.truncate(end);
    head.push_str(&suffix);
    head
}

/// Input for one assume-role call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub external_id: Option<String>,
    /// Inline session policy, passed through verbatim.
    pub policy: Option<String>,
    pub policy_arns: Vec<String>,
    pub duration_seconds: u32,
    pub tags: Vec<Tag>,
}

impl AssumeRoleRequest {
    pub fn builder(org: impl Into<String>, role_arn: impl Into<String>) -> AssumeRoleRequestBuilder {
        AssumeRoleRequestBuilder {
            org: org.into(),
            role_arn: role_arn.into(),
            org_tag_key: DEFAULT_ORG_TAG_KEY.to_string(),
            session_name_prefix: DEFAULT_SESSION_NAME_PREFIX.to_string(),
            external_id: None,
            inline_policy: None,
            managed_policy_arns: Vec::new(),
            duration_seconds: None,
            tags: Vec::new(),
        }
    }

    /// A builder for `account` prefilled from the deployment configuration.
    pub fn for_account(
        config: &AccessConfig,
        account: &str,
    ) -> Result<AssumeRoleRequestBuilder, AccessError> {
        let arn = role_arn(account, &config.role_name)?;
        let mut builder = AssumeRoleRequest::builder(&config.org, arn)
            .org_tag_key(&config.tag_keys.org)
            .session_name_prefix(&config.session_name_prefix)
            .duration_seconds(config.session_duration());
        if let Some(external_id) = config.external_id() {
            builder = builder.external_id(external_id);
        }
        Ok(builder)
    }

    /// The tenant org carried in the session tags.
    pub fn org_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AssumeRoleRequestBuilder {
    org: String,
    role_arn: String,
    org_tag_key: String,
    session_name_prefix: String,
    external_id: Option<String>,
    inline_policy: Option<String>,
    managed_policy_arns: Vec<String>,
    duration_seconds: Option<u32>,
    tags: Vec<Tag>,
}

impl AssumeRoleRequestBuilder {
    pub fn org_tag_key(mut self, key: impl Into<String>) -> Self {
        self.org_tag_key = key.into();
        self
    }

    pub fn session_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_name_prefix = prefix.into();
        self
    }

    /// Bind an external id. An empty id is the same as none.
    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Attach an inline session policy. An empty policy is the same as none.
    pub fn inline_policy(mut self, policy: impl Into<String>) -> Self {
        self.inline_policy = Some(policy.into());
        self
    }

    pub fn managed_policy_arns<I, S>(mut self, arns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.managed_policy_arns.extend(arns.into_iter().map(Into::into));
        self
    }

    /// Requested duration; clamped into the allowed window on build.
    pub fn duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Extra session tags. A tag using the org key is dropped.
    pub fn tags<I: IntoIterator<Item = Tag>>(mut self, tags: I) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn build(self) -> Result<AssumeRoleRequest, AccessError> {
        if self.org.is_empty() {
            return Err(AccessError::invalid_input("tenant org is empty".to_string()));
        }
        if self.role_arn.is_empty() {
            return Err(AccessError::invalid_input("role ARN is empty".to_string()));
        }

        let org_tag_key = self.org_tag_key;
        let mut tags: Vec<Tag> = self
            .tags
            .into_iter()
            .filter(|t| t.key != org_tag_key)
            .collect();
        tags.push(Tag::new(org_tag_key, self.org.as_str()));

        Ok(AssumeRoleRequest {
            role_arn: self.role_arn,
            role_session_name: session_name(&self.session_name_prefix, &self.org),
            external_id: self.external_id.filter(|id| !id.is_empty()),
            policy: self.inline_policy.filter(|p| !p.is_empty()),
            policy_arns: self.managed_policy_arns.into_iter().unique().collect(),
            duration_seconds: clamp_session_duration(self.duration_seconds),
            tags,
        })
    }
}

/// Assume the role described by `request` and wrap the credential for one
/// downstream client. Failures are propagated as classified by the provider;
/// nothing is retried here.
pub async fn assume_scoped(
    provider: &dyn CredentialProvider,
    request: &AssumeRoleRequest,
    region: &str,
) -> Result<ScopedSession, AccessError> {
    info!(event = "AssumeRole", phase = "Begin", role_arn = %request.role_arn);
    debug!(
        event = "AssumeRole",
        phase = "Request",
        session_name = %request.role_session_name,
        policy_arns = ?request.policy_arns,
        has_inline_policy = request.policy.is_some(),
        has_external_id = request.external_id.is_some(),
        duration_seconds = request.duration_seconds,
    );

    let credential = provider.assume_role(request).await?;

    info!(
        event = "AssumeRole",
        phase = "Granted",
        access_key_id = %credential.access_key_id,
        expiration = %credential.expiration,
    );

    Ok(ScopedSession {
        credential,
        region: region.to_string(),
        role_arn: request.role_arn.clone(),
        session_name: request.role_session_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use yare::parameterized;

    const ROLE: &str = "arn:aws:iam::123456789012:role/SpinupCrossAccount";

    #[test]
    fn test_role_arn() {
        assert_eq!(role_arn("123456789012", "SpinupCrossAccount").unwrap(), ROLE);
    }

    #[parameterized(
        empty_account = { "", "r" },
        short_account = { "1234", "r" },
        arn_injection = { "123456789012:role/x", "r" },
        empty_role = { "123456789012", "" },
    )]
    fn test_role_arn_rejects(account: &str, role: &str) {
        assert_eq!(role_arn(account, role).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_session_name_shape() {
        let name = session_name("spinup", "acme");
        assert!(name.starts_with("spinup-acme-ecr-api-"));
        assert_eq!(name.len(), "spinup-acme-ecr-api-".len() + 36);
        assert_ne!(name, session_name("spinup", "acme"));
    }

    #[test]
    fn test_session_name_truncates_long_org() {
        let org = "a".repeat(80);
        let name = session_name("spinup", &org);
        assert_eq!(name.len(), MAX_SESSION_NAME_LEN);
        assert!(name.starts_with("spinup-aaaa"));
        let suffix = &name[MAX_SESSION_NAME_LEN - 36..];
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn test_session_name_truncates_multibyte_org_by_bytes() {
        let org = "ø".repeat(40);
        let name = session_name("spinup", &org);
        assert!(name.len() <= MAX_SESSION_NAME_LEN);
        assert!(name.starts_with("spinup-ø"));
        let suffix = &name[name.len() - 36..];
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn test_build_minimal_request() {
        let request = AssumeRoleRequest::builder("acme", ROLE).build().unwrap();
        assert_eq!(request.role_arn, ROLE);
        assert_eq!(request.external_id, None);
        assert_eq!(request.policy, None);
        assert!(request.policy_arns.is_empty());
        assert_eq!(request.duration_seconds, 900);
        assert_eq!(request.tags, vec![Tag::new("spinup:org", "acme")]);
    }

    #[test]
    fn test_empty_external_id_and_policy_are_omitted() {
        let request = AssumeRoleRequest::builder("acme", ROLE)
            .external_id("")
            .inline_policy("")
            .build()
            .unwrap();
        assert_eq!(request.external_id, None);
        assert_eq!(request.policy, None);
    }

    #[test]
    fn test_inline_policy_is_verbatim() {
        let policy = r#"{"Version":"2012-10-17","Statement":[]}"#;
        let request = AssumeRoleRequest::builder("acme", ROLE)
            .external_id("ext-1")
            .inline_policy(policy)
            .build()
            .unwrap();
        assert_eq!(request.policy.as_deref(), Some(policy));
        assert_eq!(request.external_id.as_deref(), Some("ext-1"));
    }

    #[test]
    fn test_caller_tags_cannot_override_org() {
        let request = AssumeRoleRequest::builder("acme", ROLE)
            .tags(vec![
                Tag::new("spinup:org", "evil"),
                Tag::new("spinup:spaceid", "space-1"),
            ])
            .build()
            .unwrap();
        assert_eq!(
            request.tags,
            vec![Tag::new("spinup:spaceid", "space-1"), Tag::new("spinup:org", "acme")]
        );
        assert_eq!(request.org_tag("spinup:org"), Some("acme"));
    }

    #[test]
    fn test_managed_policy_arns_are_deduplicated() {
        let request = AssumeRoleRequest::builder("acme", ROLE)
            .managed_policy_arns(["arn:a", "arn:b", "arn:a"])
            .build()
            .unwrap();
        assert_eq!(request.policy_arns, vec!["arn:a", "arn:b"]);
    }

    #[parameterized(
        below = { 60, 900 },
        inside = { 1200, 1200 },
        above = { 43200, 3600 },
    )]
    fn test_duration_is_clamped(requested: u32, expected: u32) {
        let request = AssumeRoleRequest::builder("acme", ROLE)
            .duration_seconds(requested)
            .build()
            .unwrap();
        assert_eq!(request.duration_seconds, expected);
    }

    #[test]
    fn test_empty_org_is_invalid() {
        let err = AssumeRoleRequest::builder("", ROLE).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_for_account_uses_config() {
        let config = AccessConfig::new("acme", "SpinupCrossAccount").with_external_id("ext-9");
        let request = AssumeRoleRequest::for_account(&config, "123456789012")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.role_arn, ROLE);
        assert_eq!(request.external_id.as_deref(), Some("ext-9"));
        assert!(request.role_session_name.starts_with("spinup-acme-ecr-api-"));

        let err = AssumeRoleRequest::for_account(&config, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
