//! Statement principals.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter, Result as FmtResult};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::value_set::ValueSet;

/// The principal type used for account and role principals.
pub const AWS_PRINCIPAL_TYPE: &str = "AWS";

/// A statement principal: either the wildcard `"*"` or a map from principal
/// type (`AWS`, `Service`, `Federated`, ...) to a set of identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    Any,
    Typed(BTreeMap<String, ValueSet>),
}

impl Principal {
    pub fn typed<K: Into<String>>(kind: K, ids: impl Into<ValueSet>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(kind.into(), ids.into());
        Principal::Typed(map)
    }

    /// `"*"` and `{"AWS": "*"}` both mean every principal.
    pub fn is_wildcard(&self) -> bool {
        match self {
            Principal::Any => true,
            Principal::Typed(map) => {
                map.len() == 1
                    && map
                        .get(AWS_PRINCIPAL_TYPE)
                        .is_some_and(|ids| ids.len() == 1 && ids.contains("*"))
            }
        }
    }

    /// Identifiers for one principal type, if present.
    pub fn values_of(&self, kind: &str) -> Option<&ValueSet> {
        match self {
            Principal::Any => None,
            Principal::Typed(map) => map.get(kind),
        }
    }

    /// Set equality at every level, with the two wildcard spellings equal.
    pub fn semantically_eq(&self, other: &Principal) -> bool {
        if self.is_wildcard() || other.is_wildcard() {
            return self.is_wildcard() && other.is_wildcard();
        }
        self == other
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Principal::Any => write!(f, "*"),
            Principal::Typed(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Principal::Any => serializer.serialize_str("*"),
            Principal::Typed(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (kind, ids) in entries {
                    map.serialize_entry(kind, ids)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PrincipalVisitor)
    }
}

struct PrincipalVisitor;

impl<'de> Visitor<'de> for PrincipalVisitor {
    type Value = Principal;

    fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(r#""*" or a map of principal type to identifiers"#)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Principal, E> {
        if v == "*" {
            Ok(Principal::Any)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Principal, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((kind, ids)) = access.next_entry::<String, ValueSet>()? {
            map.insert(kind, ids);
        }
        Ok(Principal::Typed(map))
    }
}
