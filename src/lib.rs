#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(clippy::all)]

#[macro_use]
mod object;
pub use crate::object::{Dictionary, Object, ObjectId, Stream, StringFormat};

mod cursor;
pub use crate::cursor::Cursor;
mod datetime;
mod document;
pub use crate::document::Document;
mod error;
pub use crate::error::{Error, FilterError, Result, XrefError};
pub mod filters;
mod object_stream;
pub use crate::object_stream::ObjectStream;
mod parser;
mod reader;
pub mod xref;
