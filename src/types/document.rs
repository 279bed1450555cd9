//! Identity and resource policy documents.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AccessError;

use super::statement::Statement;

/// Current policy language version; use this for every new document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Legacy policy language version, still returned for old documents.
pub const LEGACY_POLICY_VERSION: &str = "2008-10-17";

/// A policy document as exchanged with the identity provider and the registry.
///
/// Statement order is preserved on the wire but carries no meaning; see
/// [`crate::equality`] for the semantic comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Statement", deserialize_with = "one_or_many")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        PolicyDocument {
            version: POLICY_VERSION.to_string(),
            id: None,
            statements,
        }
    }

    /// Parse a JSON document. Any shape error is a `MalformedDocument`.
    pub fn from_json(text: &str) -> Result<Self, AccessError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, AccessError> {
        serde_json::to_string(self).map_err(|e| AccessError::internal(e.to_string()))
    }

    pub fn is_recognized_version(&self) -> bool {
        self.version == POLICY_VERSION || self.version == LEGACY_POLICY_VERSION
    }

    /// The first statement carrying `sid`.
    pub fn statement(&self, sid: &str) -> Option<&Statement> {
        self.statements.iter().find(|s| s.sid_key() == sid)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Box<Statement>),
    Many(Vec<Statement>),
}

/// `Statement` may be a single object rather than a list.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Statement>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(statement) => vec![*statement],
        OneOrMany::Many(statements) => statements,
    })
}
