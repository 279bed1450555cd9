//! Semantic equality of policy documents.
//!
//! Two documents are equal when their versions match byte for byte and their
//! statements pair up one-to-one by sid with every field set-equal at every
//! nesting level. Statement order, value order and the scalar/list spelling
//! of one-element values never matter.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use tracing::debug;

use crate::types::{PolicyDocument, Statement, StatementField};

/// The first reason two documents are not equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDiff {
    VersionMismatch { left: String, right: String },
    StatementCountMismatch { left: usize, right: usize },
    /// No statement on the other side carries this sid (or not as many do).
    MissingStatement { sid: String },
    /// The only statements carrying this sid differ in `field`.
    StatementMismatch { sid: String, field: StatementField },
    /// Several statements share this sid and they cannot be paired up.
    NoEquivalentStatement { sid: String },
}

impl Display for PolicyDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PolicyDiff::VersionMismatch { left, right } => {
                write!(f, "version {left} != {right}")
            }
            PolicyDiff::StatementCountMismatch { left, right } => {
                write!(f, "{left} statements != {right} statements")
            }
            PolicyDiff::MissingStatement { sid } => write!(f, "no counterpart for sid '{sid}'"),
            PolicyDiff::StatementMismatch { sid, field } => {
                write!(f, "sid '{sid}' differs in {field}")
            }
            PolicyDiff::NoEquivalentStatement { sid } => {
                write!(f, "statements sharing sid '{sid}' cannot be paired")
            }
        }
    }
}

/// Compare two documents and report the first difference found.
///
/// Statements are grouped by sid (a missing sid groups with the empty sid).
/// Groups must have the same size on both sides. Within a group each
/// statement on the left is paired with the first unused equal statement on
/// the right. Statement equality is an equivalence relation, so this pairing
/// succeeds exactly when a perfect pairing exists and the answer does not
/// depend on argument or statement order.
pub fn diff(left: &PolicyDocument, right: &PolicyDocument) -> Option<PolicyDiff> {
    if left.version != right.version {
        return Some(PolicyDiff::VersionMismatch {
            left: left.version.clone(),
            right: right.version.clone(),
        });
    }

    if left.statements.len() != right.statements.len() {
        return Some(PolicyDiff::StatementCountMismatch {
            left: left.statements.len(),
            right: right.statements.len(),
        });
    }

    let left_groups = group_by_sid(&left.statements);
    let right_groups = group_by_sid(&right.statements);

    for (sid, lefts) in &left_groups {
        let Some(rights) = right_groups.get(sid) else {
            return Some(PolicyDiff::MissingStatement {
                sid: sid.to_string(),
            });
        };
        if lefts.len() != rights.len() {
            return Some(PolicyDiff::MissingStatement {
                sid: sid.to_string(),
            });
        }

        if let ([l], [r]) = (lefts.as_slice(), rights.as_slice()) {
            if let Some(field) = l.first_difference(r) {
                return Some(PolicyDiff::StatementMismatch {
                    sid: sid.to_string(),
                    field,
                });
            }
            continue;
        }

        if !pair_up(lefts, rights) {
            return Some(PolicyDiff::NoEquivalentStatement {
                sid: sid.to_string(),
            });
        }
    }

    None
}

/// `true` when `left` and `right` are semantically the same document.
pub fn policies_equal(left: &PolicyDocument, right: &PolicyDocument) -> bool {
    match diff(left, right) {
        None => true,
        Some(difference) => {
            debug!(event = "PolicyCompare", phase = "Different", diff = %difference);
            false
        }
    }
}

fn group_by_sid(statements: &[Statement]) -> BTreeMap<&str, Vec<&Statement>> {
    let mut groups: BTreeMap<&str, Vec<&Statement>> = BTreeMap::new();
    for statement in statements {
        groups.entry(statement.sid_key()).or_default().push(statement);
    }
    groups
}

fn pair_up(lefts: &[&Statement], rights: &[&Statement]) -> bool {
    let mut used = vec![false; rights.len()];
    lefts.iter().all(|l| {
        let found = rights
            .iter()
            .enumerate()
            .find(|(i, r)| !used[*i] && l.semantically_eq(r))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Condition, Effect, Principal, ValueSet};
    use proptest::prelude::*;
    use yare::parameterized;

    fn doc(json: &str) -> PolicyDocument {
        PolicyDocument::from_json(json).unwrap()
    }

    const BASE: &str = r#"{
        "Version": "2012-10-17",
        "Statement": [
            {"Sid": "A", "Effect": "Allow", "Action": ["ecr:ListImages", "ecr:BatchGetImage"], "Resource": "*",
             "Condition": {"StringEquals": {"aws:ResourceTag/spinup:spaceid": ["a", "b"]}}},
            {"Sid": "B", "Effect": "Allow", "Action": "ecr:GetAuthorizationToken", "Resource": "*"}
        ]
    }"#;

    #[parameterized(
        statement_order = { r#"{
            "Version": "2012-10-17",
            "Statement": [
                {"Sid": "B", "Effect": "Allow", "Action": "ecr:GetAuthorizationToken", "Resource": "*"},
                {"Sid": "A", "Effect": "Allow", "Action": ["ecr:ListImages", "ecr:BatchGetImage"], "Resource": "*",
                 "Condition": {"StringEquals": {"aws:ResourceTag/spinup:spaceid": ["a", "b"]}}}
            ]
        }"# },
        condition_value_order = { r#"{
            "Version": "2012-10-17",
            "Statement": [
                {"Sid": "A", "Effect": "Allow", "Action": ["ecr:ListImages", "ecr:BatchGetImage"], "Resource": "*",
                 "Condition": {"StringEquals": {"aws:ResourceTag/spinup:spaceid": ["b", "a"]}}},
                {"Sid": "B", "Effect": "Allow", "Action": "ecr:GetAuthorizationToken", "Resource": "*"}
            ]
        }"# },
        scalar_and_list_spelling = { r#"{
            "Version": "2012-10-17",
            "Statement": [
                {"Sid": "A", "Effect": "Allow", "Action": ["ecr:BatchGetImage", "ecr:ListImages"], "Resource": ["*"],
                 "Condition": {"StringEquals": {"aws:ResourceTag/spinup:spaceid": ["a", "b"]}}},
                {"Sid": "B", "Effect": "Allow", "Action": ["ecr:GetAuthorizationToken"], "Resource": "*"}
            ]
        }"# },
    )]
    fn test_equal_documents(other: &str) {
        assert!(policies_equal(&doc(BASE), &doc(other)));
        assert!(policies_equal(&doc(other), &doc(BASE)));
    }

    #[test]
    fn test_extra_statement_is_not_equal() {
        let mut other = doc(BASE);
        other
            .statements
            .push(Statement::allow("ecr:DescribeImages").with_sid("C"));
        assert_eq!(
            diff(&doc(BASE), &other),
            Some(PolicyDiff::StatementCountMismatch { left: 2, right: 3 })
        );
        assert!(!policies_equal(&other, &doc(BASE)));
    }

    #[test]
    fn test_renamed_sid_is_missing() {
        let mut other = doc(BASE);
        other.statements[1].sid = Some("Renamed".to_string());
        assert_eq!(
            diff(&doc(BASE), &other),
            Some(PolicyDiff::MissingStatement {
                sid: "B".to_string()
            })
        );
    }

    #[test]
    fn test_effect_drift_is_reported() {
        let mut other = doc(BASE);
        other.statements[0].effect = Effect::Deny;
        assert_eq!(
            diff(&doc(BASE), &other),
            Some(PolicyDiff::StatementMismatch {
                sid: "A".to_string(),
                field: StatementField::Effect
            })
        );
    }

    #[test]
    fn test_version_mismatch() {
        let mut other = doc(BASE);
        other.version = "2008-10-17".to_string();
        assert!(matches!(
            diff(&doc(BASE), &other),
            Some(PolicyDiff::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_condition_key_sets_must_match() {
        let mut other = doc(BASE);
        other.statements[0].condition = Condition::new()
            .with("StringEquals", "aws:ResourceTag/spinup:spaceid", ["a", "b"])
            .with("StringEquals", "aws:ResourceTag/spinup:org", "acme");
        assert_eq!(
            diff(&doc(BASE), &other),
            Some(PolicyDiff::StatementMismatch {
                sid: "A".to_string(),
                field: StatementField::Condition
            })
        );
    }

    #[test]
    fn test_blank_sids_pair_by_content() {
        let read = Statement::allow("ecr:BatchGetImage");
        let list = Statement::allow("ecr:ListImages");
        let left = PolicyDocument::new(vec![read.clone(), list.clone()]);
        let right = PolicyDocument::new(vec![list.clone(), read.clone()]);
        assert!(policies_equal(&left, &right));

        let skewed = PolicyDocument::new(vec![read.clone(), read]);
        assert_eq!(
            diff(&left, &skewed),
            Some(PolicyDiff::NoEquivalentStatement { sid: String::new() })
        );
        assert!(!policies_equal(&skewed, &left));
    }

    #[test]
    fn test_wildcard_principal_spellings_are_equal() {
        let any = PolicyDocument::new(vec![
            Statement::allow("ecr:BatchGetImage")
                .with_sid("Pull")
                .with_principal(Principal::Any),
        ]);
        let aws_star = PolicyDocument::new(vec![
            Statement::allow("ecr:BatchGetImage")
                .with_sid("Pull")
                .with_principal(Principal::typed("AWS", "*")),
        ]);
        assert!(policies_equal(&any, &aws_star));
    }

    fn arb_statement() -> impl Strategy<Value = Statement> {
        (
            prop::option::of(prop::sample::select(vec!["A", "B", "C", ""])),
            prop::bool::ANY,
            prop::collection::btree_set("ecr:[A-C]", 1..3),
            prop::option::of(prop::collection::btree_set("[a-c*]", 0..3)),
            prop::collection::btree_set("[a-c]", 0..3),
        )
            .prop_map(|(sid, allow, actions, resources, spaces)| {
                let effect = if allow { Effect::Allow } else { Effect::Deny };
                let mut statement = Statement::new(effect, actions.into_iter().collect::<ValueSet>());
                statement.sid = sid.map(str::to_string);
                statement.resource = resources.map(|r| r.into_iter().collect());
                if !spaces.is_empty() {
                    statement.condition = Condition::new().with(
                        "StringEquals",
                        "aws:PrincipalTag/spinup:spaceid",
                        spaces.into_iter().collect::<ValueSet>(),
                    );
                }
                statement
            })
    }

    fn arb_document() -> impl Strategy<Value = PolicyDocument> {
        prop::collection::vec(arb_statement(), 0..5).prop_map(PolicyDocument::new)
    }

    proptest! {
        #[test]
        fn prop_equality_is_reflexive(a in arb_document()) {
            prop_assert!(policies_equal(&a, &a));
        }

        #[test]
        fn prop_equality_is_symmetric(a in arb_document(), b in arb_document()) {
            prop_assert_eq!(policies_equal(&a, &b), policies_equal(&b, &a));
        }

        #[test]
        fn prop_statement_order_is_irrelevant(
            (a, shuffled) in arb_document().prop_flat_map(|a| {
                let statements = a.statements.clone();
                (Just(a), Just(statements).prop_shuffle())
            })
        ) {
            prop_assert!(policies_equal(&a, &PolicyDocument::new(shuffled)));
        }

        #[test]
        fn prop_wire_round_trip_is_equal(a in arb_document()) {
            let reparsed = PolicyDocument::from_json(&a.to_json().unwrap()).unwrap();
            prop_assert!(policies_equal(&a, &reparsed));
        }
    }
}
