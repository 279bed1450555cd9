//! Policy values: a set of strings that may be a bare scalar on the wire.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter, Result as FmtResult};

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A policy value such as `Action`, `Resource` or a single condition value.
///
/// The wire format encodes a one-element set either as `"x"` or as `["x"]`;
/// both deserialize to the same set. Numbers are coerced through their
/// default string form. Booleans, null, objects and nested lists are
/// rejected.
///
/// A one-element set serializes as a bare string, anything else as a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueSet(BTreeSet<String>);

impl ValueSet {
    pub fn new() -> Self {
        ValueSet(BTreeSet::new())
    }

    pub fn single(value: impl Into<String>) -> Self {
        let mut set = BTreeSet::new();
        set.insert(value.into());
        ValueSet(set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.0.insert(value.into())
    }

    /// Iterate the values in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_set(&self) -> &BTreeSet<String> {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for ValueSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ValueSet(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ValueSet {
    fn from(value: &str) -> Self {
        ValueSet::single(value)
    }
}

impl From<String> for ValueSet {
    fn from(value: String) -> Self {
        ValueSet::single(value)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for ValueSet {
    fn from(values: [S; N]) -> Self {
        values.into_iter().collect()
    }
}

impl From<Vec<String>> for ValueSet {
    fn from(values: Vec<String>) -> Self {
        values.into_iter().collect()
    }
}

impl IntoIterator for ValueSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for ValueSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let values: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", values.join(", "))
    }
}

impl Serialize for ValueSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            if let Some(only) = self.0.iter().next() {
                return serializer.serialize_str(only);
            }
        }
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for value in &self.0 {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ValueSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueSetVisitor)
    }
}

struct ValueSetVisitor;

impl<'de> Visitor<'de> for ValueSetVisitor {
    type Value = ValueSet;

    fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("a string, a number, or a list of strings and numbers")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ValueSet, E> {
        Ok(ValueSet::single(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ValueSet, E> {
        Ok(ValueSet::single(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ValueSet, E> {
        Ok(ValueSet::single(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ValueSet, E> {
        Ok(ValueSet::single(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ValueSet, E> {
        Ok(ValueSet::single(v.to_string()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ValueSet, A::Error> {
        let mut values = BTreeSet::new();
        while let Some(Scalar(value)) = seq.next_element::<Scalar>()? {
            values.insert(value);
        }
        Ok(ValueSet(values))
    }
}

/// One element of a value list: a string or a number, nothing else.
struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("a string or a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
        Ok(Scalar(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
        Ok(Scalar(v.to_string()))
    }
}
