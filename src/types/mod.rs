//! Policy document model and the small value types around it.
//!
//! Wire forms follow the identity provider's JSON schema:
//! - Document: `{"Version": "2012-10-17", "Statement": [...]}`
//! - Statement: `Sid`, `Effect`, `Principal`, `Action`, `Resource`, `Condition`
//!   and their `Not*` twins
//! - Values: `"x"` and `["x"]` are the same one-element set
//! - Principal: `"*"` or `{"AWS": [...], "Service": [...]}`

mod condition;
mod credential;
mod document;
mod effect;
mod principal;
mod statement;
mod tag;
mod value_set;

pub use condition::{Condition, ConditionBlock};
pub use credential::{ScopedSession, TemporaryCredential};
pub use document::{LEGACY_POLICY_VERSION, POLICY_VERSION, PolicyDocument};
pub use effect::Effect;
pub use principal::{AWS_PRINCIPAL_TYPE, Principal};
pub use statement::{Statement, StatementField, ValueField};
pub use tag::Tag;
pub use value_set::ValueSet;
