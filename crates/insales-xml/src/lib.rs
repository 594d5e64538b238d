//! Typed XML layer for the InSales admin API.
//!
//! The InSales REST API speaks a small XML dialect in which every element may
//! carry a `type` attribute (`integer`, `decimal`, `boolean`, `date`,
//! `dateTime`, `timestamp`, `array`) or `nil="true"`. This crate converts
//! between that dialect and the dynamically typed [`Value`] tree.
//!
//! # Key components
//!
//! - [`Value`] and [`Record`], the in-memory model of a request/response payload
//! - [`to_xml`] for composing a request body from a [`Value`]
//! - [`from_xml`] / [`from_reader`] for decoding a response body with a
//!   streaming, stack-based state machine
//! - [`ArrayNames`], the plural→singular element table used for arrays
//!
//! # Wire conventions
//!
//! - Booleans: lowercase `true`/`false`
//! - Dates: `YYYY-MM-DD`
//! - Date-times: ISO 8601 with second precision (`2010-08-16T18:39:58+04:00`)
//! - Legacy timestamps: `2010-08-16 18:39:58 +0400`
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

pub mod arrays;
pub mod deserialize;
pub mod error;
pub mod serialize;
pub mod value;

pub use arrays::ArrayNames;
pub use deserialize::{from_reader, from_xml};
pub use error::XmlError;
pub use serialize::to_xml;
pub use value::{Record, Value};
