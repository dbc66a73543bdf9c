//! Core types for document marshaling: attribute kinds, attribute values,
//! query parameters and pipeline options.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version advertised in the `jsonapi` member of every document.
pub const JSONAPI_VERSION: &str = "1.0";

/// Member names a resource object reserves for itself.
pub const RESERVED_MEMBERS: &[&str] = &["id", "type"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Supported attribute kinds.
///
/// This is a closed set: a type description naming anything else is
/// rejected when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Bool,
    Time,
}

impl AttrKind {
    /// Parse a kind from its name.
    ///
    /// Returns `None` for unknown kinds (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "string" => AttrKind::String,
            "int" => AttrKind::Int,
            "int8" => AttrKind::Int8,
            "int16" => AttrKind::Int16,
            "int32" => AttrKind::Int32,
            "int64" => AttrKind::Int64,
            "uint" => AttrKind::Uint,
            "uint8" => AttrKind::Uint8,
            "uint16" => AttrKind::Uint16,
            "uint32" => AttrKind::Uint32,
            "uint64" => AttrKind::Uint64,
            "bool" => AttrKind::Bool,
            "time" => AttrKind::Time,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttrKind::String => "string",
            AttrKind::Int => "int",
            AttrKind::Int8 => "int8",
            AttrKind::Int16 => "int16",
            AttrKind::Int32 => "int32",
            AttrKind::Int64 => "int64",
            AttrKind::Uint => "uint",
            AttrKind::Uint8 => "uint8",
            AttrKind::Uint16 => "uint16",
            AttrKind::Uint32 => "uint32",
            AttrKind::Uint64 => "uint64",
            AttrKind::Bool => "bool",
            AttrKind::Time => "time",
        }
    }

    /// The value a freshly created resource holds for a non-nullable attribute.
    pub fn zero(&self) -> AttrValue {
        match self {
            AttrKind::String => AttrValue::String(String::new()),
            AttrKind::Int | AttrKind::Int8 | AttrKind::Int16 | AttrKind::Int32 | AttrKind::Int64 => {
                AttrValue::Int(0)
            }
            AttrKind::Uint
            | AttrKind::Uint8
            | AttrKind::Uint16
            | AttrKind::Uint32
            | AttrKind::Uint64 => AttrValue::Uint(0),
            AttrKind::Bool => AttrValue::Bool(false),
            AttrKind::Time => AttrValue::Time(DateTime::<Utc>::default()),
        }
    }

    /// Inclusive bounds of an integer kind, `None` for non-integer kinds.
    fn bounds(&self) -> Option<(i128, i128)> {
        let bounds = match self {
            AttrKind::Int | AttrKind::Int64 => (i64::MIN as i128, i64::MAX as i128),
            AttrKind::Int8 => (i8::MIN as i128, i8::MAX as i128),
            AttrKind::Int16 => (i16::MIN as i128, i16::MAX as i128),
            AttrKind::Int32 => (i32::MIN as i128, i32::MAX as i128),
            AttrKind::Uint | AttrKind::Uint64 => (0, u64::MAX as i128),
            AttrKind::Uint8 => (0, u8::MAX as i128),
            AttrKind::Uint16 => (0, u16::MAX as i128),
            AttrKind::Uint32 => (0, u32::MAX as i128),
            _ => return None,
        };
        Some(bounds)
    }

    fn is_unsigned(&self) -> bool {
        matches!(
            self,
            AttrKind::Uint | AttrKind::Uint8 | AttrKind::Uint16 | AttrKind::Uint32 | AttrKind::Uint64
        )
    }

    /// Normalize `value` to this kind.
    ///
    /// Integers are accepted across signedness as long as they fit the
    /// declared width, and are stored as `Int` or `Uint` to match the kind.
    pub fn coerce(&self, value: AttrValue, nullable: bool) -> Result<AttrValue, KindMismatch> {
        if value.is_null() {
            return if nullable {
                Ok(AttrValue::Null)
            } else {
                Err(KindMismatch::NotNullable)
            };
        }

        if let Some((min, max)) = self.bounds() {
            let n: i128 = match value {
                AttrValue::Int(n) => n as i128,
                AttrValue::Uint(n) => n as i128,
                other => {
                    return Err(KindMismatch::Kind {
                        actual: other.kind_name(),
                    })
                }
            };
            if n < min || n > max {
                return Err(KindMismatch::OutOfRange { value: n.to_string() });
            }
            // Bounds were checked above, so the narrowing casts are lossless.
            return Ok(if self.is_unsigned() {
                AttrValue::Uint(n as u64)
            } else {
                AttrValue::Int(n as i64)
            });
        }

        match (self, value) {
            (AttrKind::String, v @ AttrValue::String(_)) => Ok(v),
            (AttrKind::Bool, v @ AttrValue::Bool(_)) => Ok(v),
            (AttrKind::Time, v @ AttrValue::Time(_)) => Ok(v),
            (_, other) => Err(KindMismatch::Kind {
                actual: other.kind_name(),
            }),
        }
    }

    /// Decode a JSON attribute value into this kind.
    pub fn decode(&self, value: &Value, nullable: bool) -> Result<AttrValue, KindMismatch> {
        let decoded = match (self, value) {
            (_, Value::Null) => AttrValue::Null,
            (AttrKind::String, Value::String(s)) => AttrValue::String(s.clone()),
            (AttrKind::Bool, Value::Bool(b)) => AttrValue::Bool(*b),
            (AttrKind::Time, Value::String(s)) => {
                let parsed = DateTime::parse_from_rfc3339(s)
                    .map_err(|_| KindMismatch::BadTimestamp { value: s.clone() })?;
                AttrValue::Time(parsed.with_timezone(&Utc))
            }
            (kind, Value::Number(n)) if kind.bounds().is_some() => {
                if let Some(u) = n.as_u64() {
                    AttrValue::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    AttrValue::Int(i)
                } else {
                    return Err(KindMismatch::OutOfRange {
                        value: n.to_string(),
                    });
                }
            }
            (_, other) => {
                return Err(KindMismatch::Kind {
                    actual: json_type_name(other),
                })
            }
        };
        self.coerce(decoded, nullable)
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a value does not fit an attribute kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindMismatch {
    Kind { actual: &'static str },
    OutOfRange { value: String },
    NotNullable,
    BadTimestamp { value: String },
}

impl fmt::Display for KindMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindMismatch::Kind { actual } => write!(f, "got {}", actual),
            KindMismatch::OutOfRange { value } => write!(f, "{} is out of range", value),
            KindMismatch::NotNullable => f.write_str("null is not allowed"),
            KindMismatch::BadTimestamp { value } => {
                write!(f, "\"{}\" is not an RFC 3339 timestamp", value)
            }
        }
    }
}

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Null,
    String(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Returns the value kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::String(_) => "string",
            AttrValue::Int(_) => "int",
            AttrValue::Uint(_) => "uint",
            AttrValue::Bool(_) => "bool",
            AttrValue::Time(_) => "time",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Encode as JSON. Timestamps use RFC 3339 in UTC.
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::String(s) => Value::String(s.clone()),
            AttrValue::Int(n) => Value::from(*n),
            AttrValue::Uint(n) => Value::from(*n),
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Time(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<i32> for AttrValue {
    fn from(n: i32) -> Self {
        AttrValue::Int(n as i64)
    }
}

impl From<u64> for AttrValue {
    fn from(n: u64) -> Self {
        AttrValue::Uint(n)
    }
}

impl From<u32> for AttrValue {
    fn from(n: u32) -> Self {
        AttrValue::Uint(n as u64)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(t: DateTime<Utc>) -> Self {
        AttrValue::Time(t)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttrValue::Null)
    }
}

impl TryFrom<AttrValue> for String {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        match value {
            AttrValue::String(s) => Ok(s),
            other => Err(KindMismatch::Kind {
                actual: other.kind_name(),
            }),
        }
    }
}

impl TryFrom<AttrValue> for i64 {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        match value {
            AttrValue::Int(n) => Ok(n),
            AttrValue::Uint(n) => i64::try_from(n).map_err(|_| out_of_range(n)),
            other => Err(KindMismatch::Kind {
                actual: other.kind_name(),
            }),
        }
    }
}

impl TryFrom<AttrValue> for i32 {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        let n = i64::try_from(value)?;
        i32::try_from(n).map_err(|_| out_of_range(n))
    }
}

impl TryFrom<AttrValue> for u64 {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        match value {
            AttrValue::Uint(n) => Ok(n),
            AttrValue::Int(n) => u64::try_from(n).map_err(|_| out_of_range(n)),
            other => Err(KindMismatch::Kind {
                actual: other.kind_name(),
            }),
        }
    }
}

impl TryFrom<AttrValue> for u32 {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        let n = u64::try_from(value)?;
        u32::try_from(n).map_err(|_| out_of_range(n))
    }
}

impl TryFrom<AttrValue> for bool {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        match value {
            AttrValue::Bool(b) => Ok(b),
            other => Err(KindMismatch::Kind {
                actual: other.kind_name(),
            }),
        }
    }
}

impl TryFrom<AttrValue> for DateTime<Utc> {
    type Error = KindMismatch;

    fn try_from(value: AttrValue) -> Result<Self, Self::Error> {
        match value {
            AttrValue::Time(t) => Ok(t),
            other => Err(KindMismatch::Kind {
                actual: other.kind_name(),
            }),
        }
    }
}

fn out_of_range(n: impl fmt::Display) -> KindMismatch {
    KindMismatch::OutOfRange {
        value: n.to_string(),
    }
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// Parse a cardinality value from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one" => Some(Cardinality::One),
            "many" => Some(Cardinality::Many),
            _ => None,
        }
    }
}

/// Parsed query parameters that drive field selection.
///
/// Tokenizing the request URL is the caller's job; this only carries the
/// result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Sparse fieldsets: type name to the fields that may be emitted.
    pub fields: HashMap<String, Vec<String>>,
    /// Relationships whose linkage `data` is embedded, per type name.
    /// Relationships not listed here are emitted with links only.
    pub relationship_data: HashMap<String, BTreeSet<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `type_name` to the given fields.
    pub fn fields<I, S>(mut self, type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(type_name.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Embed linkage data for relationship `rel` of `type_name`.
    pub fn include_data(mut self, type_name: impl Into<String>, rel: impl Into<String>) -> Self {
        self.relationship_data
            .entry(type_name.into())
            .or_default()
            .insert(rel.into());
        self
    }

    /// Returns true if `field` of `type_name` should be emitted.
    pub fn is_selected(&self, type_name: &str, field: &str) -> bool {
        match self.fields.get(type_name) {
            Some(allowed) => allowed.iter().any(|f| f == field),
            None => true,
        }
    }

    /// Returns true if relationship `rel` of `type_name` carries its data.
    pub fn wants_data(&self, type_name: &str, rel: &str) -> bool {
        self.relationship_data
            .get(type_name)
            .map(|rels| rels.contains(rel))
            .unwrap_or(false)
    }
}

/// Options for marshaling a document.
#[derive(Debug, Clone, Default)]
pub struct MarshalOptions {
    /// Prefix for every generated link (e.g. `https://api.example.org`).
    pub base_url: String,
    /// Path of the request, emitted as `links.self` when set.
    pub self_link: Option<String>,
    /// Field selection and relationship data policy.
    pub params: QueryParams,
    /// Pretty-print the output.
    pub pretty: bool,
}

impl MarshalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn self_link(mut self, path: impl Into<String>) -> Self {
        self.self_link = Some(path.into());
        self
    }

    pub fn params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Options for unmarshaling a payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmarshalOptions {
    /// When true, attribute or relationship members the type does not
    /// declare fail the call, as do duplicate entries in `included`.
    /// Defaults to false: unknown members are ignored.
    pub strict: bool,
}

impl UnmarshalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn attr_kind_parse_valid() {
        assert_eq!(AttrKind::parse("string"), Some(AttrKind::String));
        assert_eq!(AttrKind::parse("uint16"), Some(AttrKind::Uint16));
        assert_eq!(AttrKind::parse("time"), Some(AttrKind::Time));
    }

    #[test]
    fn attr_kind_parse_invalid() {
        assert_eq!(AttrKind::parse("float64"), None);
        assert_eq!(AttrKind::parse("String"), None);
        assert_eq!(AttrKind::parse(""), None);
    }

    #[test]
    fn coerce_checks_integer_width() {
        assert_eq!(
            AttrKind::Int8.coerce(AttrValue::Int(-128), false),
            Ok(AttrValue::Int(-128))
        );
        assert!(matches!(
            AttrKind::Int8.coerce(AttrValue::Int(128), false),
            Err(KindMismatch::OutOfRange { .. })
        ));
        assert!(matches!(
            AttrKind::Uint.coerce(AttrValue::Int(-1), false),
            Err(KindMismatch::OutOfRange { .. })
        ));
        // Signedness follows the kind, not the input.
        assert_eq!(
            AttrKind::Uint32.coerce(AttrValue::Int(7), false),
            Ok(AttrValue::Uint(7))
        );
    }

    #[test]
    fn coerce_null_requires_nullable() {
        assert_eq!(
            AttrKind::String.coerce(AttrValue::Null, true),
            Ok(AttrValue::Null)
        );
        assert_eq!(
            AttrKind::String.coerce(AttrValue::Null, false),
            Err(KindMismatch::NotNullable)
        );
    }

    #[test]
    fn coerce_rejects_other_kinds() {
        assert_eq!(
            AttrKind::Bool.coerce(AttrValue::from("yes"), false),
            Err(KindMismatch::Kind { actual: "string" })
        );
        assert_eq!(
            AttrKind::Int.coerce(AttrValue::Bool(true), false),
            Err(KindMismatch::Kind { actual: "bool" })
        );
    }

    #[test]
    fn decode_timestamp() {
        let value = AttrKind::Time
            .decode(&json!("2017-01-02T03:04:05+01:00"), false)
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2017, 1, 2, 2, 4, 5).unwrap();
        assert_eq!(value, AttrValue::Time(expected));
        assert_eq!(value.to_json(), json!("2017-01-02T02:04:05Z"));
    }

    #[test]
    fn decode_rejects_float_for_int() {
        assert!(matches!(
            AttrKind::Int.decode(&json!(1.5), false),
            Err(KindMismatch::OutOfRange { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_timestamp() {
        assert!(matches!(
            AttrKind::Time.decode(&json!("yesterday"), false),
            Err(KindMismatch::BadTimestamp { .. })
        ));
    }

    #[test]
    fn native_conversions() {
        assert_eq!(String::try_from(AttrValue::from("a")), Ok("a".to_string()));
        assert_eq!(i64::try_from(AttrValue::Uint(7)), Ok(7));
        assert_eq!(u32::try_from(AttrValue::Int(7)), Ok(7));
        assert_eq!(bool::try_from(AttrValue::Bool(true)), Ok(true));

        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(DateTime::<Utc>::try_from(AttrValue::Time(t)), Ok(t));

        assert_eq!(
            String::try_from(AttrValue::Int(1)),
            Err(KindMismatch::Kind { actual: "int" })
        );
        assert!(matches!(
            u64::try_from(AttrValue::Int(-1)),
            Err(KindMismatch::OutOfRange { .. })
        ));
        assert!(matches!(
            i32::try_from(AttrValue::Int(i64::MAX)),
            Err(KindMismatch::OutOfRange { .. })
        ));
    }

    #[test]
    fn query_params_selection() {
        let params = QueryParams::new()
            .fields("articles", ["title"])
            .include_data("articles", "author");

        assert!(params.is_selected("articles", "title"));
        assert!(!params.is_selected("articles", "body"));
        assert!(params.is_selected("people", "name"));
        assert!(params.wants_data("articles", "author"));
        assert!(!params.wants_data("articles", "comments"));
        assert!(!params.wants_data("people", "author"));
    }

    #[test]
    fn marshal_options_trim_base_url() {
        let opts = MarshalOptions::new().base_url("https://example.org/");
        assert_eq!(opts.base_url, "https://example.org");
    }
}
