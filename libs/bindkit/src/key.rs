//! Key codec: converts loosely typed raw values (route segments, source
//! fields) into strongly typed entity keys.
//!
//! Every key type has a defined "absent" sentinel used when a nullable source
//! holds no value:
//! - [`Uuid`]: the nil uuid
//! - integers: `0`
//! - [`String`]: the empty string

use std::fmt;
use std::hash::Hash;

use uuid::Uuid;

/// A raw, loosely typed value as found in a route segment or a source field.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    /// Arrays and objects met where a single key was expected (JSON sources).
    Structured(String),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Name of the raw type, used in format errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "i64",
            RawValue::UInt(_) => "u64",
            RawValue::Float(_) => "f64",
            RawValue::Text(_) => "String",
            RawValue::Uuid(_) => "Uuid",
            RawValue::Structured(_) => "structured value",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("null"),
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Int(i) => write!(f, "{i}"),
            RawValue::UInt(u) => write!(f, "{u}"),
            RawValue::Float(x) => write!(f, "{x}"),
            RawValue::Text(s) => f.write_str(s),
            RawValue::Uuid(u) => write!(f, "{u}"),
            RawValue::Structured(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<Uuid> for RawValue {
    fn from(value: Uuid) -> Self {
        RawValue::Uuid(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Int(value.into())
    }
}

impl From<u64> for RawValue {
    fn from(value: u64) -> Self {
        RawValue::UInt(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

/// Type-erased typed key, the currency of the resolution pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Uuid(Uuid),
    Int(i64),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Uuid(u) => write!(f, "{u}"),
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

/// A raw value could not be converted into the requested key type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a {expected} key but got {actual} '{raw}'")]
pub struct KeyFormatError {
    pub expected: &'static str,
    pub actual: &'static str,
    pub raw: String,
}

impl KeyFormatError {
    fn new<K: EntityKey>(raw: &RawValue) -> Self {
        Self {
            expected: K::KIND,
            actual: raw.type_name(),
            raw: raw.to_string(),
        }
    }
}

/// A strongly typed entity key.
pub trait EntityKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Key type name used in messages.
    const KIND: &'static str;

    /// OpenAPI schema type of the key when it travels as a path parameter.
    const SCHEMA_TYPE: &'static str = "string";

    fn convert(raw: &RawValue) -> Result<Self, KeyFormatError>;

    fn default_for_absent() -> Self;

    fn into_key_value(self) -> KeyValue;

    fn from_key_value(value: &KeyValue) -> Option<Self>;
}

impl EntityKey for Uuid {
    const KIND: &'static str = "Uuid";

    fn convert(raw: &RawValue) -> Result<Self, KeyFormatError> {
        match raw {
            RawValue::Uuid(u) => Ok(*u),
            RawValue::Text(s) => {
                Uuid::parse_str(s.trim()).map_err(|_| KeyFormatError::new::<Self>(raw))
            }
            _ => Err(KeyFormatError::new::<Self>(raw)),
        }
    }

    fn default_for_absent() -> Self {
        Uuid::nil()
    }

    fn into_key_value(self) -> KeyValue {
        KeyValue::Uuid(self)
    }

    fn from_key_value(value: &KeyValue) -> Option<Self> {
        match value {
            KeyValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

// i64::MAX is not representable as f64; 2^63 is the first value out of range.
const I64_UPPER_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;

fn integer_from_raw(raw: &RawValue) -> Option<i64> {
    match raw {
        RawValue::Int(i) => Some(*i),
        RawValue::UInt(u) => i64::try_from(*u).ok(),
        RawValue::Float(x) => {
            let whole = x.is_finite() && x.fract() == 0.0;
            (whole && *x >= i64::MIN as f64 && *x < I64_UPPER_EXCLUSIVE).then_some(*x as i64)
        }
        RawValue::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

impl EntityKey for i64 {
    const KIND: &'static str = "i64";
    const SCHEMA_TYPE: &'static str = "integer";

    fn convert(raw: &RawValue) -> Result<Self, KeyFormatError> {
        integer_from_raw(raw).ok_or_else(|| KeyFormatError::new::<Self>(raw))
    }

    fn default_for_absent() -> Self {
        0
    }

    fn into_key_value(self) -> KeyValue {
        KeyValue::Int(self)
    }

    fn from_key_value(value: &KeyValue) -> Option<Self> {
        match value {
            KeyValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl EntityKey for i32 {
    const KIND: &'static str = "i32";
    const SCHEMA_TYPE: &'static str = "integer";

    fn convert(raw: &RawValue) -> Result<Self, KeyFormatError> {
        integer_from_raw(raw)
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| KeyFormatError::new::<Self>(raw))
    }

    fn default_for_absent() -> Self {
        0
    }

    fn into_key_value(self) -> KeyValue {
        KeyValue::Int(self.into())
    }

    fn from_key_value(value: &KeyValue) -> Option<Self> {
        match value {
            KeyValue::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl EntityKey for String {
    const KIND: &'static str = "String";

    fn convert(raw: &RawValue) -> Result<Self, KeyFormatError> {
        match raw {
            RawValue::Text(s) => Ok(s.clone()),
            RawValue::Uuid(u) => Ok(u.hyphenated().to_string()),
            _ => Err(KeyFormatError::new::<Self>(raw)),
        }
    }

    fn default_for_absent() -> Self {
        String::new()
    }

    fn into_key_value(self) -> KeyValue {
        KeyValue::Text(self)
    }

    fn from_key_value(value: &KeyValue) -> Option<Self> {
        match value {
            KeyValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Conversion of a source field element into a [`RawValue`].
///
/// `NULLABLE` is a static property of the element type: only `Option<_>`
/// elements may legitimately hold null.
pub trait RawKey {
    const NULLABLE: bool = false;

    fn to_raw(&self) -> RawValue;
}

impl RawKey for Uuid {
    fn to_raw(&self) -> RawValue {
        RawValue::Uuid(*self)
    }
}

impl RawKey for String {
    fn to_raw(&self) -> RawValue {
        RawValue::Text(self.clone())
    }
}

impl RawKey for &str {
    fn to_raw(&self) -> RawValue {
        RawValue::Text((*self).to_string())
    }
}

impl RawKey for bool {
    fn to_raw(&self) -> RawValue {
        RawValue::Bool(*self)
    }
}

macro_rules! raw_key_signed {
    ($($t:ty),*) => {$(
        impl RawKey for $t {
            fn to_raw(&self) -> RawValue {
                RawValue::Int(i64::from(*self))
            }
        }
    )*};
}

macro_rules! raw_key_unsigned {
    ($($t:ty),*) => {$(
        impl RawKey for $t {
            fn to_raw(&self) -> RawValue {
                RawValue::UInt(u64::from(*self))
            }
        }
    )*};
}

raw_key_signed!(i8, i16, i32, i64);
raw_key_unsigned!(u8, u16, u32, u64);

impl RawKey for f32 {
    fn to_raw(&self) -> RawValue {
        RawValue::Float(f64::from(*self))
    }
}

impl RawKey for f64 {
    fn to_raw(&self) -> RawValue {
        RawValue::Float(*self)
    }
}

impl RawKey for serde_json::Value {
    fn to_raw(&self) -> RawValue {
        use serde_json::Value;
        match self {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    RawValue::UInt(u)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => RawValue::Text(s.clone()),
            other => RawValue::Structured(other.to_string()),
        }
    }
}

impl<T: RawKey> RawKey for Option<T> {
    const NULLABLE: bool = true;

    fn to_raw(&self) -> RawValue {
        match self {
            Some(v) => v.to_raw(),
            None => RawValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_text_round_trips() {
        for _ in 0..16 {
            let id = Uuid::new_v4();
            let parsed = Uuid::convert(&RawValue::from(id.to_string())).unwrap();
            assert_eq!(parsed, id);
            let braced = Uuid::convert(&RawValue::from(format!("{{{id}}}"))).unwrap();
            assert_eq!(braced, id);
        }
    }

    #[test]
    fn uuid_rejects_garbage_and_numbers() {
        let err = Uuid::convert(&RawValue::from("not-a-guid")).unwrap_err();
        assert_eq!(err.expected, "Uuid");
        assert_eq!(err.actual, "String");
        assert_eq!(err.raw, "not-a-guid");

        assert!(Uuid::convert(&RawValue::Int(7)).is_err());
        assert!(Uuid::convert(&RawValue::Null).is_err());
    }

    #[test]
    fn integers_accept_whole_values_only() {
        assert_eq!(i64::convert(&RawValue::Int(-3)).unwrap(), -3);
        assert_eq!(i64::convert(&RawValue::UInt(42)).unwrap(), 42);
        assert_eq!(i64::convert(&RawValue::Float(12.0)).unwrap(), 12);
        assert_eq!(i64::convert(&RawValue::from(" 15 ")).unwrap(), 15);

        assert!(i64::convert(&RawValue::Float(1.5)).is_err());
        assert!(i64::convert(&RawValue::Float(f64::INFINITY)).is_err());
        assert!(i64::convert(&RawValue::Float(1e30)).is_err());
        assert!(i64::convert(&RawValue::UInt(u64::MAX)).is_err());
        assert!(i64::convert(&RawValue::from("twelve")).is_err());
        assert!(i64::convert(&RawValue::Bool(true)).is_err());
    }

    #[test]
    fn narrow_integers_check_range() {
        assert_eq!(i32::convert(&RawValue::Int(7)).unwrap(), 7);
        let err = i32::convert(&RawValue::Int(i64::from(i32::MAX) + 1)).unwrap_err();
        assert_eq!(err.expected, "i32");
        assert_eq!(i32::from_key_value(&KeyValue::Int(i64::MAX)), None);
    }

    #[test]
    fn text_accepts_uuids_in_canonical_form() {
        let id = Uuid::new_v4();
        assert_eq!(String::convert(&RawValue::Uuid(id)).unwrap(), id.to_string());
        assert_eq!(String::convert(&RawValue::from("abc")).unwrap(), "abc");
        assert!(String::convert(&RawValue::Int(1)).is_err());
    }

    #[test]
    fn absent_defaults() {
        assert_eq!(Uuid::default_for_absent(), Uuid::nil());
        assert_eq!(i64::default_for_absent(), 0);
        assert_eq!(i32::default_for_absent(), 0);
        assert_eq!(String::default_for_absent(), "");
    }

    #[test]
    fn key_values_convert_back_only_to_their_own_type() {
        let id = Uuid::new_v4();
        let kv = id.into_key_value();
        assert_eq!(Uuid::from_key_value(&kv), Some(id));
        assert_eq!(i64::from_key_value(&kv), None);
        assert_eq!(String::from_key_value(&kv), None);
        assert_eq!(kv.to_string(), id.to_string());
    }

    #[test]
    fn json_sources_map_to_raw_values() {
        use serde_json::json;
        assert_eq!(json!(null).to_raw(), RawValue::Null);
        assert_eq!(json!(5).to_raw(), RawValue::Int(5));
        assert_eq!(json!(2.5).to_raw(), RawValue::Float(2.5));
        assert_eq!(json!("x").to_raw(), RawValue::Text("x".into()));
        assert!(matches!(json!([1]).to_raw(), RawValue::Structured(_)));
        assert!(!<serde_json::Value as RawKey>::NULLABLE);
        assert!(<Option<Uuid> as RawKey>::NULLABLE);
    }
}
