//! Query string construction for admin API paths.

use chrono::{DateTime, FixedOffset, Utc};

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Sent as-is.
    Text(String),
    /// Sent as repeated `key[]=item` pairs.
    List(Vec<String>),
    /// Sent as ISO 8601 with second precision.
    DateTime(DateTime<FixedOffset>),
}

impl QueryValue {
    fn append_to(&self, key: &str, serializer: &mut form_urlencoded::Serializer<'_, String>) {
        match self {
            Self::Text(text) => {
                serializer.append_pair(key, text);
            }
            Self::List(items) => {
                let key = format!("{key}[]");
                for item in items {
                    serializer.append_pair(&key, item);
                }
            }
            Self::DateTime(dt) => {
                serializer.append_pair(key, &dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string());
            }
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(n: $ty) -> Self {
                    Self::Text(n.to_string())
                }
            }
        )+
    };
}

impl_from_number!(i32, i64, u32, u64, usize);

impl From<DateTime<FixedOffset>> for QueryValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }
}

impl<T: ToString> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.iter().map(ToString::to_string).collect())
    }
}

/// Ordered query parameters supplied by the caller.
///
/// # Examples
///
/// ```
/// use insales_http::{Query, format_path};
///
/// let query = Query::new().param("per_page", 25).param("page", 2);
/// assert_eq!(
///     format_path("/admin/orders.xml", &query),
///     "/admin/orders.xml?per_page=25&page=2"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, QueryValue)>,
}

impl Query {
    /// Create an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, builder style.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Add a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.params.push((key.into(), value.into()));
    }

    /// Whether no parameters were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether a parameter already present in a path is replaced by this query.
    fn overrides(&self, existing_key: &str) -> bool {
        let bare = existing_key.strip_suffix("[]").unwrap_or(existing_key);
        self.params.iter().any(|(key, _)| key == bare)
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (key, value) in iter {
            query.push(key, value);
        }
        query
    }
}

/// Merge `query` into the query string already present in `path`.
///
/// Parameters of `path` that the caller also supplies are replaced; the rest
/// keep their order and come first.
#[must_use]
pub fn format_path(path: &str, query: &Query) -> String {
    let (base, existing) = path.split_once('?').unwrap_or((path, ""));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(existing.as_bytes()) {
        if !query.overrides(&key) {
            serializer.append_pair(&key, &value);
        }
    }
    for (key, value) in &query.params {
        value.append_to(key, &mut serializer);
    }

    let encoded = serializer.finish();
    if encoded.is_empty() {
        base.to_owned()
    } else {
        format!("{base}?{encoded}")
    }
}
