//! Composing InSales XML request bodies from [`Value`] trees.
//!
//! The element type is derived from the [`Value`] variant alone:
//!
//! | Variant | Output |
//! |---------|--------|
//! | `String` / `RawMarkup` | `<name>text</name>` |
//! | `Integer` | `<name type="integer">42</name>` |
//! | `Decimal` | `<name type="decimal">10.50</name>` |
//! | `Boolean` | `<name type="boolean">true</name>` |
//! | `Date` | `<name type="date">2010-08-16</name>` |
//! | `DateTime` | `<name type="dateTime">2010-08-16T18:39:58+04:00</name>` |
//! | `Null` | `<name nil="true"/>` |
//! | `Array` | `<names type="array"><name>..</name>..</names>` |
//! | `Record` | `<name><key>..</key>..</name>` |

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};

use crate::arrays::ArrayNames;
use crate::error::XmlError;
use crate::value::Value;

/// Compose `value` into a complete XML document with `root` as the outer element.
///
/// Array item names are resolved through `arrays`; an array whose element name
/// has no entry fails with [`XmlError::MissingArrayName`].
///
/// # Examples
///
/// ```
/// use insales_xml::{ArrayNames, Value, to_xml};
///
/// let page = Value::record([("title", Value::from("About")), ("position", Value::from(3))]);
/// let xml = to_xml("page", &page, &ArrayNames::insales()).unwrap();
/// let xml = String::from_utf8(xml).unwrap();
/// let expected = r#"<page><title>About</title><position type="integer">3</position></page>"#;
/// assert!(xml.ends_with(expected));
/// ```
pub fn to_xml(root: &str, value: &Value, arrays: &ArrayNames) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root, value, arrays)?;

    Ok(buf)
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &Value,
    arrays: &ArrayNames,
) -> Result<(), XmlError> {
    validate_name(name)?;
    let mut start = BytesStart::new(name);

    match value {
        Value::Null => {
            start.push_attribute(("nil", "true"));
            writer.write_event(Event::Empty(start))?;
        }
        Value::String(s) | Value::RawMarkup(s) => write_text(writer, &start, s)?,
        Value::Integer(i) => {
            start.push_attribute(("type", "integer"));
            write_text(writer, &start, &i.to_string())?;
        }
        Value::Decimal(d) => {
            start.push_attribute(("type", "decimal"));
            write_text(writer, &start, &d.to_plain_string())?;
        }
        Value::Boolean(b) => {
            start.push_attribute(("type", "boolean"));
            write_text(writer, &start, if *b { "true" } else { "false" })?;
        }
        Value::Date(d) => {
            start.push_attribute(("type", "date"));
            write_text(writer, &start, &d.format("%Y-%m-%d").to_string())?;
        }
        Value::DateTime(dt) => {
            start.push_attribute(("type", "dateTime"));
            // %S drops the fraction, so sub-second precision is truncated.
            write_text(writer, &start, &dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string())?;
        }
        Value::Array(items) => {
            let singular = arrays
                .get(name)
                .ok_or_else(|| XmlError::MissingArrayName(name.to_owned()))?;
            start.push_attribute(("type", "array"));
            writer.write_event(Event::Start(start.borrow()))?;
            for item in items {
                write_element(writer, singular, item, arrays)?;
            }
            writer.write_event(Event::End(start.to_end()))?;
        }
        Value::Record(fields) => {
            writer.write_event(Event::Start(start.borrow()))?;
            for (key, field) in fields {
                write_element(writer, key, field, arrays)?;
            }
            writer.write_event(Event::End(start.to_end()))?;
        }
    }

    Ok(())
}

/// Write `<tag ...>text</tag>`.
fn write_text<W: Write>(
    writer: &mut Writer<W>,
    start: &BytesStart<'_>,
    text: &str,
) -> io::Result<()> {
    writer.write_event(Event::Start(start.borrow()))?;
    if !text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    writer.write_event(Event::End(start.to_end()))
}

/// Reject names that would produce a malformed document.
fn validate_name(name: &str) -> Result<(), XmlError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(XmlError::InvalidElementName(name.to_owned()))
    }
}
