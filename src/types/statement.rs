//! Policy statements.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumIter};

use super::condition::Condition;
use super::effect::Effect;
use super::principal::Principal;
use super::value_set::ValueSet;

/// One entry of a policy document's `Statement` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "ValueSet::is_empty")]
    pub action: ValueSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<ValueSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ValueSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<ValueSet>,
    #[serde(default, skip_serializing_if = "Condition::is_empty")]
    pub condition: Condition,
}

/// The string-set valued fields of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter)]
pub enum ValueField {
    Action,
    NotAction,
    Resource,
    NotResource,
}

/// Every compared field of a statement, used to report where two statements differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
pub enum StatementField {
    Effect,
    Principal,
    NotPrincipal,
    Action,
    NotAction,
    Resource,
    NotResource,
    Condition,
}

impl Statement {
    pub fn new(effect: Effect, action: impl Into<ValueSet>) -> Self {
        Statement {
            sid: None,
            effect,
            principal: None,
            not_principal: None,
            action: action.into(),
            not_action: None,
            resource: None,
            not_resource: None,
            condition: Condition::new(),
        }
    }

    pub fn allow(action: impl Into<ValueSet>) -> Self {
        Statement::new(Effect::Allow, action)
    }

    pub fn deny(action: impl Into<ValueSet>) -> Self {
        Statement::new(Effect::Deny, action)
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<ValueSet>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// The correlation key; a missing sid and an empty sid are the same key.
    pub fn sid_key(&self) -> &str {
        self.sid.as_deref().unwrap_or("")
    }

    /// Canonical accessor for a string-set field. `None` means the field is
    /// absent, which is different from present-but-empty.
    pub fn values_of(&self, field: ValueField) -> Option<&ValueSet> {
        match field {
            ValueField::Action => Some(&self.action),
            ValueField::NotAction => self.not_action.as_ref(),
            ValueField::Resource => self.resource.as_ref(),
            ValueField::NotResource => self.not_resource.as_ref(),
        }
    }

    /// The first field in which `self` and `other` differ semantically.
    pub fn first_difference(&self, other: &Statement) -> Option<StatementField> {
        if self.effect != other.effect {
            return Some(StatementField::Effect);
        }
        if !principals_eq(self.principal.as_ref(), other.principal.as_ref()) {
            return Some(StatementField::Principal);
        }
        if !principals_eq(self.not_principal.as_ref(), other.not_principal.as_ref()) {
            return Some(StatementField::NotPrincipal);
        }
        if self.action != other.action {
            return Some(StatementField::Action);
        }
        if self.not_action != other.not_action {
            return Some(StatementField::NotAction);
        }
        if self.resource != other.resource {
            return Some(StatementField::Resource);
        }
        if self.not_resource != other.not_resource {
            return Some(StatementField::NotResource);
        }
        if self.condition != other.condition {
            return Some(StatementField::Condition);
        }
        None
    }

    pub fn semantically_eq(&self, other: &Statement) -> bool {
        self.first_difference(other).is_none()
    }
}

fn principals_eq(left: Option<&Principal>, right: Option<&Principal>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => l.semantically_eq(r),
        _ => false,
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}({}) {}", self.effect, self.sid_key(), self.action)
    }
}
