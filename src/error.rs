use crate::ObjectId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The `%PDF-` header or the `%%EOF` marker is absent or unusable.
    #[error("invalid PDF file: {0}")]
    InvalidPdf(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The byte source ended while more input was required.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),
    #[error("cross-reference error: {0}")]
    Xref(#[from] XrefError),
    #[error("object {0:?} not found")]
    ObjectNotFound(ObjectId),
    #[error("object header does not match its cross-reference entry")]
    ObjectIdMismatch,
    #[error("syntax error at offset {offset}")]
    Parse { offset: usize },
    #[error("expected object type {expected}, found {found}")]
    ObjectType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected dictionary of type {expected}, found {found}")]
    DictType { expected: &'static str, found: String },
    #[error("missing dictionary key: /{0}")]
    DictKey(String),
    #[error("invalid file offset {0}")]
    Offset(usize),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, Error)]
pub enum XrefError {
    #[error("cross-reference section not found")]
    Start,
    #[error("invalid start of a previous cross-reference section")]
    PrevStart,
    #[error("/Prev chain revisits offset {0}")]
    PrevCycle(usize),
    #[error("malformed cross-reference section")]
    Parse,
    #[error("malformed cross-reference stream")]
    Stream,
    #[error("unknown cross-reference entry type {0}")]
    UnknownType(u32),
    #[error("malformed object stream")]
    ObjectStream,
}

#[derive(Debug, Error)]
pub enum FilterError {
    /// The filter name is recognized or plausible, but this reader does not
    /// decode it.
    #[error("filter /{0} is not supported")]
    Unsupported(String),
    #[error("FlateDecode: {0}")]
    Flate(String),
    #[error("LZWDecode: {0}")]
    Lzw(String),
    #[error("ASCII85Decode: {0}")]
    Ascii85(&'static str),
    #[error("ASCIIHexDecode: {0}")]
    AsciiHex(&'static str),
    #[error("RunLengthDecode: {0}")]
    RunLength(&'static str),
    #[error("predictor: {0}")]
    Predictor(&'static str),
}
