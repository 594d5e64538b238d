//! Error types for composing and parsing InSales XML.

use std::io;

/// Errors that can occur while composing or parsing InSales XML.
///
/// Every variant is a protocol violation: none of them is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An I/O error during XML writing or reading.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library (malformed document).
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// An error from quick-xml attribute handling.
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// An array element has no singular name in the [`ArrayNames`](crate::ArrayNames) table.
    #[error("no singular element name registered for array `{0}`")]
    MissingArrayName(String),

    /// A root name, record key, or singular name is not a valid XML element name.
    #[error("invalid XML element name: {0:?}")]
    InvalidElementName(String),

    /// A nested element was found under a leaf that cannot have children.
    #[error("elements with {parent} are not expected to have nested elements, found <{name}>")]
    UnexpectedElement {
        /// Description of the leaf, e.g. `type=integer` or `nil=true`.
        parent: String,
        /// Name of the offending nested element.
        name: String,
    },

    /// Non-whitespace text was found under a `nil="true"` or array element.
    #[error("elements with {parent} are not expected to have content, found {content:?}")]
    UnexpectedContent {
        /// Description of the element, e.g. `nil=true` or `type=array`.
        parent: String,
        /// The offending text.
        content: String,
    },

    /// Failed to parse a scalar value from element text.
    #[error("failed to parse value: {0}")]
    ParseError(String),

    /// The document ended while elements were still open.
    #[error("unexpected end of document inside <{0}>")]
    UnexpectedEof(String),
}
