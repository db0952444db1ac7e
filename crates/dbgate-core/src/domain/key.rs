//! Primary-key values.
//!
//! An entity key is an ordered list of [`KeyValue`]s, one per key field in
//! declaration order. Most entities have a single integer or ULID key; composite
//! keys are built from tuples.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Runtime type of a key value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Text,
    Ulid,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Int => "int",
            ValueType::Text => "text",
            ValueType::Ulid => "ulid",
        };
        f.write_str(s)
    }
}

/// A single key field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KeyValue {
    Int(i64),
    Text(String),
    Ulid(Ulid),
}

impl KeyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            KeyValue::Int(_) => ValueType::Int,
            KeyValue::Text(_) => ValueType::Text,
            KeyValue::Ulid(_) => ValueType::Ulid,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ulid(&self) -> Option<Ulid> {
        match self {
            KeyValue::Ulid(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Text(v) => f.write_str(v),
            KeyValue::Ulid(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(i64::from(v))
    }
}

impl From<u32> for KeyValue {
    fn from(v: u32) -> Self {
        KeyValue::Int(i64::from(v))
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<Ulid> for KeyValue {
    fn from(v: Ulid) -> Self {
        KeyValue::Ulid(v)
    }
}

/// Full primary key of one entity (ordered like the key fields).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Vec<KeyValue>);

impl Key {
    pub fn new(values: Vec<KeyValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{single}"),
            values => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<KeyValue> for Key {
    fn from(v: KeyValue) -> Self {
        Key(vec![v])
    }
}

impl From<Vec<KeyValue>> for Key {
    fn from(values: Vec<KeyValue>) -> Self {
        Key(values)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key(vec![v.into()])
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key(vec![v.into()])
    }
}

impl From<u32> for Key {
    fn from(v: u32) -> Self {
        Key(vec![v.into()])
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key(vec![v.into()])
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key(vec![v.into()])
    }
}

impl From<Ulid> for Key {
    fn from(v: Ulid) -> Self {
        Key(vec![v.into()])
    }
}

impl<A, B> From<(A, B)> for Key
where
    A: Into<KeyValue>,
    B: Into<KeyValue>,
{
    fn from((a, b): (A, B)) -> Self {
        Key(vec![a.into(), b.into()])
    }
}

impl<A, B, C> From<(A, B, C)> for Key
where
    A: Into<KeyValue>,
    B: Into<KeyValue>,
    C: Into<KeyValue>,
{
    fn from((a, b, c): (A, B, C)) -> Self {
        Key(vec![a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_displays_bare_value() {
        assert_eq!(Key::from(7).to_string(), "7");
        assert_eq!(Key::from("abc").to_string(), "abc");
    }

    #[test]
    fn composite_key_displays_as_tuple() {
        let key = Key::from((7, "line-2"));
        assert_eq!(key.values().len(), 2);
        assert_eq!(key.to_string(), "(7, line-2)");
    }

    #[test]
    fn value_types_follow_variants() {
        assert_eq!(KeyValue::from(1).value_type(), ValueType::Int);
        assert_eq!(KeyValue::from("x").value_type(), ValueType::Text);
        assert_eq!(KeyValue::from(Ulid::nil()).value_type(), ValueType::Ulid);
    }

    #[test]
    fn accessors_match_only_their_variant() {
        let ulid = Ulid::from_parts(1_700_000_000_000, 7);
        assert_eq!(KeyValue::from("abc").as_text(), Some("abc"));
        assert_eq!(KeyValue::from(3).as_text(), None);
        assert_eq!(KeyValue::from(ulid).as_ulid(), Some(ulid));
        assert_eq!(KeyValue::from("abc").as_ulid(), None);
        assert_eq!(KeyValue::from(ulid).as_int(), None);
    }

    #[test]
    fn key_value_is_tagged_when_serialized() {
        let v = serde_json::to_value(KeyValue::Int(5)).unwrap();
        assert_eq!(v["type"], "int");
        assert_eq!(v["value"], 5);
    }
}
