//! Repository pull policies.
//!
//! Every repository carries one resource policy statement that lets
//! principals of the same org pull when their space tag is the
//! repository's own space or one of an explicit list of other spaces. The
//! own space is written as a condition variable, so it never has to be
//! spelled out. Reading the policy back yields that list of other spaces.

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TagKeys;
use crate::error::AccessError;
use crate::traits::RepositoryPolicyStore;
use crate::types::{Condition, PolicyDocument, Principal, Statement, ValueSet};

pub const REPOSITORY_POLICY_SID: &str = "AllowPullImagesFromSpaceAndOrg";
pub const REPOSITORY_POLICY_OPERATOR: &str = "StringEqualsIgnoreCase";
pub const PULL_ACTIONS: [&str; 4] = [
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

/// Builds and reads repository pull policies for one set of tag keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryAccessCodec {
    org_key: String,
    space_key: String,
}

impl Default for RepositoryAccessCodec {
    fn default() -> Self {
        RepositoryAccessCodec::new(&TagKeys::default())
    }
}

impl RepositoryAccessCodec {
    pub fn new(keys: &TagKeys) -> Self {
        RepositoryAccessCodec {
            org_key: keys.org.clone(),
            space_key: keys.space.clone(),
        }
    }

    /// The condition variable standing for the repository's own space.
    pub fn placeholder(&self) -> String {
        format!("${{aws:ResourceTag/{}}}", self.space_key)
    }

    fn principal_space_key(&self) -> String {
        format!("aws:PrincipalTag/{}", self.space_key)
    }

    /// A pull policy for the repository's own space plus `extra_spaces`.
    /// Duplicates are harmless.
    pub fn synthesize<S: AsRef<str>>(&self, extra_spaces: &[S]) -> PolicyDocument {
        let mut spaces = ValueSet::single(self.placeholder());
        for space in extra_spaces {
            spaces.insert(space.as_ref());
        }

        let condition = Condition::new()
            .with(
                REPOSITORY_POLICY_OPERATOR,
                format!("aws:PrincipalTag/{}", self.org_key),
                format!("${{aws:ResourceTag/{}}}", self.org_key),
            )
            .with(REPOSITORY_POLICY_OPERATOR, self.principal_space_key(), spaces);

        PolicyDocument::new(vec![
            Statement::allow(PULL_ACTIONS)
                .with_sid(REPOSITORY_POLICY_SID)
                .with_principal(Principal::Any)
                .with_condition(condition),
        ])
    }

    /// The extra spaces granted by a stored policy, sorted and deduplicated.
    ///
    /// An empty text, a missing statement or an unexpected shape all mean no
    /// extra spaces. Only text that is not JSON at all is an error.
    ///
    /// Works on the raw JSON rather than [`PolicyDocument`]: a stored policy
    /// with a boolean or nested space entry would fail the typed model
    /// outright, here only that entry is skipped.
    pub fn parse(&self, policy: &str) -> Result<Vec<String>, AccessError> {
        if policy.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: Value = serde_json::from_str(policy)?;
        let statements: Vec<&Value> = match document.get("Statement") {
            Some(Value::Array(statements)) => statements.iter().collect(),
            Some(statement @ Value::Object(_)) => vec![statement],
            _ => Vec::new(),
        };

        let placeholder = self.placeholder();
        let space_key = self.principal_space_key();
        let mut spaces = Vec::new();

        for statement in statements {
            if statement.get("Sid").and_then(Value::as_str) != Some(REPOSITORY_POLICY_SID) {
                continue;
            }
            let Some(values) = statement
                .get("Condition")
                .and_then(|c| c.get(REPOSITORY_POLICY_OPERATOR))
                .and_then(|o| o.get(&space_key))
            else {
                debug!(event = "RepositoryPolicy", phase = "Parse", "no space condition");
                continue;
            };

            let entries: Vec<&Value> = match values {
                Value::Array(entries) => entries.iter().collect(),
                scalar => vec![scalar],
            };
            for entry in entries {
                match entry {
                    Value::String(s) => spaces.push(s.clone()),
                    Value::Number(n) => spaces.push(n.to_string()),
                    other => {
                        warn!(event = "RepositoryPolicy", phase = "Parse", value = %other, "space value is not a string");
                    }
                }
            }
        }

        Ok(spaces
            .into_iter()
            .filter(|s| *s != placeholder)
            .sorted()
            .dedup()
            .collect())
    }
}

/// Replace a repository's pull policy wholesale.
pub async fn apply_repository_access<S: AsRef<str>>(
    store: &dyn RepositoryPolicyStore,
    codec: &RepositoryAccessCodec,
    repository: &str,
    extra_spaces: &[S],
) -> Result<PolicyDocument, AccessError> {
    let document = codec.synthesize(extra_spaces);
    let text = document.to_json()?;
    store.set_repository_policy(repository, &text).await?;
    info!(
        event = "RepositoryPolicy",
        phase = "Applied",
        repository,
        extra_spaces = extra_spaces.len()
    );
    Ok(document)
}

/// The extra spaces a repository grants. A repository without a policy
/// grants none.
pub async fn repository_access(
    store: &dyn RepositoryPolicyStore,
    codec: &RepositoryAccessCodec,
    repository: &str,
) -> Result<Vec<String>, AccessError> {
    let text = match store.get_repository_policy(repository).await {
        Ok(text) => text,
        Err(e) if e.is_not_found() => {
            debug!(event = "RepositoryPolicy", phase = "Read", repository, "no policy");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };
    codec.parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use yare::parameterized;

    fn codec() -> RepositoryAccessCodec {
        RepositoryAccessCodec::default()
    }

    #[test]
    fn test_synthesize_wire_form() {
        let json = codec().synthesize(&["foo", "bar"]).to_json().unwrap();
        insta::assert_snapshot!(
            json,
            @r#"{"Version":"2012-10-17","Statement":[{"Sid":"AllowPullImagesFromSpaceAndOrg","Effect":"Allow","Principal":"*","Action":["ecr:BatchCheckLayerAvailability","ecr:BatchGetImage","ecr:GetAuthorizationToken","ecr:GetDownloadUrlForLayer"],"Condition":{"StringEqualsIgnoreCase":{"aws:PrincipalTag/spinup:org":"${aws:ResourceTag/spinup:org}","aws:PrincipalTag/spinup:spaceid":["${aws:ResourceTag/spinup:spaceid}","bar","foo"]}}}]}"#
        );
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(codec().placeholder(), "${aws:ResourceTag/spinup:spaceid}");
    }

    #[parameterized(
        none = { &[], &[] },
        one = { &["foo"], &["foo"] },
        three = { &["foo", "bar", "baz"], &["bar", "baz", "foo"] },
        duplicates = { &["foo", "foo"], &["foo"] },
    )]
    fn test_round_trip(extra: &[&str], expected: &[&str]) {
        let codec = codec();
        let text = codec.synthesize(extra).to_json().unwrap();
        assert_eq!(codec.parse(&text).unwrap(), expected);
    }

    #[parameterized(
        empty_text = { "" },
        whitespace = { "  \n" },
        no_statement = { r#"{"Version":"2012-10-17"}"# },
        other_sid = { r#"{"Version":"2012-10-17","Statement":[{"Sid":"Other","Effect":"Allow","Condition":{"StringEqualsIgnoreCase":{"aws:PrincipalTag/spinup:spaceid":["x"]}}}]}"# },
        no_condition = { r#"{"Version":"2012-10-17","Statement":[{"Sid":"AllowPullImagesFromSpaceAndOrg","Effect":"Allow"}]}"# },
        other_operator = { r#"{"Version":"2012-10-17","Statement":[{"Sid":"AllowPullImagesFromSpaceAndOrg","Condition":{"StringEquals":{"aws:PrincipalTag/spinup:spaceid":["x"]}}}]}"# },
        placeholder_scalar = { r#"{"Version":"2012-10-17","Statement":[{"Sid":"AllowPullImagesFromSpaceAndOrg","Condition":{"StringEqualsIgnoreCase":{"aws:PrincipalTag/spinup:spaceid":"${aws:ResourceTag/spinup:spaceid}"}}}]}"# },
        non_string_entries = { r#"{"Version":"2012-10-17","Statement":[{"Sid":"AllowPullImagesFromSpaceAndOrg","Condition":{"StringEqualsIgnoreCase":{"aws:PrincipalTag/spinup:spaceid":[true,null,{"a":1}]}}}]}"# },
        statement_not_a_list = { r#"{"Version":"2012-10-17","Statement":"nope"}"# },
    )]
    fn test_parse_degrades_to_empty(text: &str) {
        assert!(codec().parse(text).unwrap().is_empty());
    }

    #[test]
    fn test_parse_skips_bad_entries_and_coerces_numbers() {
        let text = r#"{"Version":"2012-10-17","Statement":{"Sid":"AllowPullImagesFromSpaceAndOrg","Condition":{"StringEqualsIgnoreCase":{"aws:PrincipalTag/spinup:spaceid":["${aws:ResourceTag/spinup:spaceid}","b",false,42,"a"]}}}}"#;
        assert_eq!(codec().parse(text).unwrap(), vec!["42", "a", "b"]);
    }

    #[test]
    fn test_parse_malformed_json_is_an_error() {
        let err = codec().parse("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    }

    #[test]
    fn test_custom_tag_keys() {
        let keys = TagKeys {
            org: "tenant:org".to_string(),
            space: "tenant:space".to_string(),
            ..TagKeys::default()
        };
        let codec = RepositoryAccessCodec::new(&keys);
        let doc = codec.synthesize(&["s2"]);
        let statement = doc.statement(REPOSITORY_POLICY_SID).unwrap();
        assert!(
            statement
                .condition
                .values_of(REPOSITORY_POLICY_OPERATOR, "aws:PrincipalTag/tenant:space")
                .unwrap()
                .contains("${aws:ResourceTag/tenant:space}")
        );
        assert_eq!(codec.parse(&doc.to_json().unwrap()).unwrap(), vec!["s2"]);
    }
}
