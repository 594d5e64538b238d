//! Decoding InSales XML response bodies into [`Value`] trees.
//!
//! Decoding is a single streaming pass over quick-xml events. Every open
//! element pushes a frame chosen from its `nil`/`type` attributes; every
//! close pops the frame, finishes it into a [`Value`] and hands that value to
//! the parent frame. No intermediate DOM is built.
//!
//! Untyped elements carry two compatibility quirks of the InSales encoder:
//!
//! - text that follows a child element is dropped (nested HTML is not wrapped
//!   in CDATA, so there is no way to recover it as-is);
//! - an element that starts with text and then contains markup is re-serialized
//!   into a single string and returned as [`Value::RawMarkup`].

use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::error::XmlError;
use crate::value::{Record, Value};

/// Decode an InSales XML document from a byte slice.
///
/// The document's outer element is treated as a wrapper: the result is the
/// decoded value of that element itself, or `None` if the document has no
/// element at all (e.g. an empty response body).
///
/// # Examples
///
/// ```
/// use insales_xml::from_xml;
///
/// let xml = br#"<product><id type="integer">7</id><title>Tea</title></product>"#;
/// let product = from_xml(xml).unwrap().unwrap();
/// assert_eq!(product.get("id").and_then(|v| v.as_i64()), Some(7));
/// assert_eq!(product.get("title").and_then(|v| v.as_str()), Some("Tea"));
/// ```
pub fn from_xml(xml: &[u8]) -> Result<Option<Value>, XmlError> {
    from_reader(xml)
}

/// Decode an InSales XML document from any buffered reader.
pub fn from_reader<R: BufRead>(source: R) -> Result<Option<Value>, XmlError> {
    let mut reader = Reader::from_reader(source);
    let mut decoder = Decoder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => decoder.open(&e)?,
            Event::Empty(e) => {
                decoder.open(&e)?;
                decoder.close()?;
            }
            Event::End(_) => decoder.close()?,
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                decoder.content(&unescaped)?;
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                decoder.content(text)?;
            }
            Event::GeneralRef(e) => {
                let name = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let reference = format!("&{name};");
                let resolved = quick_xml::escape::unescape(&reference)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                decoder.content(&resolved)?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, doctype.
            other => trace!(event = ?other, "skipping XML event"),
        }
        buf.clear();
    }

    decoder.finish()
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Per-element decoding state.
#[derive(Debug)]
enum Frame {
    /// No `type` attribute: text, record, or nothing.
    Untyped(Untyped),
    /// Nested markup inside untyped text, captured verbatim.
    Markup(String),
    /// `nil="true"`.
    Nil,
    /// `type="array"`.
    Array(Vec<Value>),
    /// Typed scalar leaf; text is parsed on close.
    Scalar { kind: ScalarKind, text: String },
}

#[derive(Debug, Default)]
struct Untyped {
    text: String,
    fields: Record,
    mixed: bool,
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    frame: Frame,
}

#[derive(Debug)]
struct Decoder {
    root: Frame,
    stack: Vec<OpenElement>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            root: Frame::Untyped(Untyped::default()),
            stack: Vec::new(),
        }
    }
}

impl Decoder {
    fn top(&mut self) -> &mut Frame {
        match self.stack.last_mut() {
            Some(open) => &mut open.frame,
            None => &mut self.root,
        }
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), XmlError> {
        let name = element_name(e)?;
        let attrs = attributes(e)?;

        let frame = match self.top() {
            Frame::Untyped(parent) if !parent.text.is_empty() => {
                parent.mixed = true;
                parent.text.push_str(&open_tag(&name, &attrs));
                Frame::Markup(String::new())
            }
            Frame::Untyped(_) | Frame::Array(_) => frame_for(&attrs),
            Frame::Markup(text) => {
                text.push_str(&open_tag(&name, &attrs));
                Frame::Markup(String::new())
            }
            Frame::Nil => {
                return Err(XmlError::UnexpectedElement {
                    parent: "nil=true".to_owned(),
                    name,
                });
            }
            Frame::Scalar { kind, .. } => {
                return Err(XmlError::UnexpectedElement {
                    parent: format!("type={}", kind.as_str()),
                    name,
                });
            }
        };

        self.stack.push(OpenElement { name, frame });
        Ok(())
    }

    fn close(&mut self) -> Result<(), XmlError> {
        let Some(OpenElement { name, frame }) = self.stack.pop() else {
            return Err(XmlError::ParseError("unmatched closing tag".to_owned()));
        };

        // Children of text-mode elements are always opened as `Markup`.
        match (self.top(), frame) {
            (Frame::Untyped(parent), Frame::Markup(inner)) if !parent.text.is_empty() => {
                parent.text.push_str(&inner);
                parent.text.push_str(&format!("</{name}>"));
            }
            (Frame::Markup(text), Frame::Markup(inner)) => {
                text.push_str(&inner);
                text.push_str(&format!("</{name}>"));
            }
            (Frame::Untyped(parent), frame) => {
                parent.fields.insert(name, frame.finish()?);
            }
            (Frame::Array(items), frame) => items.push(frame.finish()?),
            // Leaves reject children in `open`.
            (Frame::Nil | Frame::Scalar { .. } | Frame::Markup(_), _) => {}
        }

        Ok(())
    }

    fn content(&mut self, content: &str) -> Result<(), XmlError> {
        match self.top() {
            Frame::Untyped(u) => {
                if !u.fields.is_empty() {
                    return Ok(());
                }
                if u.text.is_empty() && content.trim().is_empty() {
                    return Ok(());
                }
                u.text.push_str(content);
            }
            Frame::Markup(text) => text.push_str(content.trim()),
            Frame::Scalar { text, .. } => text.push_str(content),
            Frame::Nil => reject_content("nil=true", content)?,
            Frame::Array(_) => reject_content("type=array", content)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<Option<Value>, XmlError> {
        if let Some(open) = self.stack.last() {
            return Err(XmlError::UnexpectedEof(open.name.clone()));
        }
        let Frame::Untyped(root) = self.root else {
            return Ok(None);
        };
        Ok(root.fields.into_iter().next().map(|(_, value)| value))
    }
}

impl Frame {
    fn finish(self) -> Result<Value, XmlError> {
        match self {
            Self::Untyped(u) => Ok(u.finish()),
            Self::Markup(text) => Ok(Value::String(text)),
            Self::Nil => Ok(Value::Null),
            Self::Array(items) => Ok(Value::Array(items)),
            Self::Scalar { kind, text } => kind.parse(text.trim()),
        }
    }
}

impl Untyped {
    fn finish(self) -> Value {
        if !self.fields.is_empty() {
            return Value::Record(self.fields);
        }
        if self.text.is_empty() {
            return Value::Null;
        }
        let collapsed = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.mixed {
            Value::RawMarkup(collapsed)
        } else {
            Value::String(collapsed)
        }
    }
}

fn reject_content(parent: &str, content: &str) -> Result<(), XmlError> {
    if content.trim().is_empty() {
        Ok(())
    } else {
        Err(XmlError::UnexpectedContent {
            parent: parent.to_owned(),
            content: content.to_owned(),
        })
    }
}

/// Pick the frame for a new element. `nil="true"` wins over any `type`.
fn frame_for(attrs: &[(String, String)]) -> Frame {
    if attribute(attrs, "nil") == Some("true") {
        return Frame::Nil;
    }
    match attribute(attrs, "type") {
        Some("array") => Frame::Array(Vec::new()),
        Some(type_name) => match ScalarKind::from_type(type_name) {
            Some(kind) => Frame::Scalar {
                kind,
                text: String::new(),
            },
            None => Frame::Untyped(Untyped::default()),
        },
        None => Frame::Untyped(Untyped::default()),
    }
}

fn attribute<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn element_name(e: &BytesStart<'_>) -> Result<String, XmlError> {
    let name = e.name();
    std::str::from_utf8(name.as_ref())
        .map(ToOwned::to_owned)
        .map_err(|err| XmlError::ParseError(err.to_string()))
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, XmlError> {
    e.attributes()
        .map(|attr| {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|err| XmlError::ParseError(err.to_string()))?;
            let raw = std::str::from_utf8(&attr.value)
                .map_err(|err| XmlError::ParseError(err.to_string()))?;
            let value = quick_xml::escape::unescape(raw)
                .map_err(|err| XmlError::ParseError(err.to_string()))?;
            Ok((key.to_owned(), value.into_owned()))
        })
        .collect()
}

/// Re-synthesize an opening tag for raw markup capture.
fn open_tag(name: &str, attrs: &[(String, String)]) -> String {
    let mut tag = format!("<{name}");
    for (key, value) in attrs {
        tag.push_str(&format!(" {key}=\"{value}\""));
    }
    tag.push('>');
    tag
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Timestamp,
}

impl ScalarKind {
    fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            "integer" => Some(Self::Integer),
            "decimal" => Some(Self::Decimal),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "dateTime" => Some(Self::DateTime),
            "timestamp" => Some(Self::Timestamp),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Timestamp => "timestamp",
        }
    }

    /// Parse trimmed element text. Empty text yields the type's default.
    fn parse(self, text: &str) -> Result<Value, XmlError> {
        if text.is_empty() {
            return Ok(match self {
                Self::Integer => Value::Integer(BigInt::default()),
                Self::Decimal => Value::Decimal(BigDecimal::from(0)),
                Self::Boolean => Value::Boolean(false),
                Self::Date | Self::DateTime | Self::Timestamp => Value::Null,
            });
        }

        match self {
            Self::Integer => BigInt::from_str(text)
                .map(Value::Integer)
                .map_err(|e| XmlError::ParseError(format!("invalid integer '{text}': {e}"))),
            Self::Decimal => parse_decimal(text).map(Value::Decimal),
            Self::Boolean => Ok(Value::Boolean(text == "true")),
            Self::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| XmlError::ParseError(format!("invalid date '{text}': {e}"))),
            Self::DateTime => parse_datetime(text).map(Value::DateTime),
            Self::Timestamp => parse_datetime(&normalize_legacy_offset(text)).map(Value::DateTime),
        }
    }
}

/// Parse an exact decimal. Scientific notation is accepted; nothing is rounded.
fn parse_decimal(s: &str) -> Result<BigDecimal, XmlError> {
    BigDecimal::from_str(s)
        .map_err(|e| XmlError::ParseError(format!("invalid decimal '{s}': {e}")))
}

/// Parse an ISO 8601 date-time. A missing offset means UTC, a missing time
/// means midnight.
fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>, XmlError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ndt.and_utc().fixed_offset());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }
    Err(XmlError::ParseError(format!("invalid date-time '{s}'")))
}

/// Turn `2010-08-16 18:39:58 +0400` into `2010-08-16 18:39:58+04:00`.
fn normalize_legacy_offset(s: &str) -> Cow<'_, str> {
    let Some((head, offset)) = s.rsplit_once(char::is_whitespace) else {
        return Cow::Borrowed(s);
    };
    let bytes = offset.as_bytes();
    let is_offset = bytes.len() == 5
        && matches!(bytes[0], b'+' | b'-')
        && bytes[1..].iter().all(u8::is_ascii_digit);
    if is_offset {
        Cow::Owned(format!("{}{}:{}", head.trim_end(), &offset[..3], &offset[3..]))
    } else {
        Cow::Borrowed(s)
    }
}
