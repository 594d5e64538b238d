//! The dynamically typed value tree exchanged with the InSales API.
//!
//! Each XML element decodes to exactly one [`Value`] variant, chosen from the
//! element's `type`/`nil` attributes. Composing goes the other way: the variant
//! decides which attribute is written.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use indexmap::IndexMap;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// An ordered mapping from element name to value.
///
/// Document order is preserved. Re-inserting a key replaces its value in place.
pub type Record = IndexMap<String, Value>;

/// A decoded (or to-be-encoded) InSales XML value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `nil="true"`, or an untyped element with no content.
    #[default]
    Null,
    /// Untyped text content.
    String(String),
    /// `type="integer"`, arbitrary precision.
    Integer(BigInt),
    /// `type="decimal"`, exact base-10 with arbitrary precision.
    Decimal(BigDecimal),
    /// `type="boolean"`.
    Boolean(bool),
    /// `type="date"`.
    Date(NaiveDate),
    /// `type="dateTime"` or `type="timestamp"`.
    DateTime(DateTime<FixedOffset>),
    /// `type="array"`.
    Array(Vec<Value>),
    /// Untyped element with nested child elements.
    Record(Record),
    /// Untyped text that contained unescaped nested markup, re-serialized as text.
    RawMarkup(String),
}

impl Value {
    /// Build a [`Value::Record`] from key/value pairs, keeping their order.
    pub fn record<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text of a [`Value::String`] or [`Value::RawMarkup`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::RawMarkup(s) => Some(s),
            _ => None,
        }
    }

    /// The integer value, if this is a [`Value::Integer`].
    #[must_use]
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Self::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// The integer value, if it is one and fits in an `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|i| i64::try_from(i).ok())
    }

    /// The decimal value, if this is a [`Value::Decimal`].
    #[must_use]
    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            Self::Decimal(d) => Some(d),
            _ => None,
        }
    }

    /// The boolean value, if this is a [`Value::Boolean`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The calendar date, if this is a [`Value::Date`].
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// The instant, if this is a [`Value::DateTime`].
    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// The items, if this is a [`Value::Array`].
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The fields, if this is a [`Value::Record`].
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Look up a field of a record. Returns `None` for non-records.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(key))
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::DateTime(_) => "dateTime",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
            Self::RawMarkup(_) => "raw markup",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::String(s) | Self::RawMarkup(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => f.write_str(&d.to_plain_string()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%:z")),
            Self::Array(items) => write!(f, "[{} items]", items.len()),
            Self::Record(r) => write!(f, "{{{} fields}}", r.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(i: $ty) -> Self {
                    Self::Integer(BigInt::from(i))
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize);

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Self::Integer(i)
    }
}

impl From<BigDecimal> for Value {
    fn from(d: BigDecimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::Array(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// JSON view
// ---------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::String(s) | Self::RawMarkup(s) => serializer.serialize_str(s),
            Self::Integer(i) => match i64::try_from(i) {
                Ok(n) => serializer.serialize_i64(n),
                Err(_) => serializer.serialize_str(&i.to_string()),
            },
            Self::Decimal(d) => serializer.serialize_str(&d.to_plain_string()),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Date(_) | Self::DateTime(_) => serializer.collect_str(self),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.len()))?;
                for (k, v) in r {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
