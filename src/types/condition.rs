//! Statement conditions: operator → condition key → values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value_set::ValueSet;

/// The keys and values tested by one condition operator (e.g. `StringEquals`).
pub type ConditionBlock = BTreeMap<String, ValueSet>;

/// A statement condition, keyed by operator then by condition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(BTreeMap<String, ConditionBlock>);

impl Condition {
    pub fn new() -> Self {
        Condition(BTreeMap::new())
    }

    /// Add (or replace) `key` under `operator`.
    pub fn with(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        values: impl Into<ValueSet>,
    ) -> Self {
        self.0
            .entry(operator.into())
            .or_default()
            .insert(key.into(), values.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn operator(&self, operator: &str) -> Option<&ConditionBlock> {
        self.0.get(operator)
    }

    /// The values tested for `key` under `operator`.
    pub fn values_of(&self, operator: &str, key: &str) -> Option<&ValueSet> {
        self.0.get(operator).and_then(|block| block.get(key))
    }

    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_builder_and_lookup() {
        let condition = Condition::new()
            .with("StringEquals", "aws:ResourceTag/spinup:org", "acme")
            .with("StringEquals", "aws:ResourceTag/spinup:spaceid", ["s1", "s2"]);

        assert_eq!(condition.operators().collect::<Vec<_>>(), vec!["StringEquals"]);
        assert_eq!(condition.operator("StringEquals").unwrap().len(), 2);
        assert!(
            condition
                .values_of("StringEquals", "aws:ResourceTag/spinup:spaceid")
                .unwrap()
                .contains("s2")
        );
        assert!(condition.values_of("StringLike", "aws:ResourceTag/spinup:org").is_none());
    }

    #[test]
    fn test_condition_value_order_is_irrelevant() {
        let a: Condition =
            serde_json::from_str(r#"{"StringEquals": {"k": ["a", "b"], "j": "x"}}"#).unwrap();
        let b: Condition =
            serde_json::from_str(r#"{"StringEquals": {"j": ["x"], "k": ["b", "a"]}}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_condition_rejects_boolean_values() {
        let parsed = serde_json::from_str::<Condition>(r#"{"Bool": {"aws:SecureTransport": true}}"#);
        assert!(parsed.is_err());
    }
}
