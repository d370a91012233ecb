use crate::cursor::Cursor;
use crate::error::XrefError;
use crate::{Dictionary, Error, Object, Result, Stream};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Xref {
    /// Entries for indirect objects.
    pub entries: BTreeMap<u32, XrefEntry>,

    /// Total number of entries (including free entries), equal to the
    /// highest object number plus 1.
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrefEntry {
    /// Member of the free list. Never resolvable, but preserved.
    Free { next_free: u32, generation: u16 },
    /// Object body located at an absolute byte offset.
    Normal { offset: u32, generation: u16 },
    /// Object packed into the object stream `container` at the given slot.
    Compressed { container: u32, index: u16 },
}

impl Xref {
    pub fn new(size: u32) -> Xref {
        Xref {
            entries: BTreeMap::new(),
            size,
        }
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    /// Merge an older section into this one. Existing entries win: sections
    /// are absorbed newest first, and only holes may be filled by history.
    pub fn extend(&mut self, xref: Xref) {
        for (id, entry) in xref.entries {
            self.entries.entry(id).or_insert(entry);
        }
    }

    pub fn max_id(&self) -> u32 {
        match self.entries.keys().max() {
            Some(&id) => id,
            None => 0,
        }
    }
}

use self::XrefEntry::*;
impl XrefEntry {
    pub fn is_normal(&self) -> bool {
        matches!(self, Normal { .. })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Compressed { .. })
    }
}

/// Decode a cross-reference stream (`/Type /XRef`) into its table and
/// trailer dictionary.
///
/// `/W` gives the width of the three record columns; a width of zero means
/// the column takes its default (type 1, then 0). Subranges come from
/// `/Index`, defaulting to `[0 /Size]`.
pub fn decode_xref_stream(stream: &Stream) -> Result<(Xref, Dictionary)> {
    let content = stream.decoded_content()?;
    let dict = stream.dict.clone();

    let size = dict
        .get(b"Size")
        .and_then(Object::as_i64)
        .map_err(|_| Error::Xref(XrefError::Parse))?;
    let mut xref = Xref::new(size as u32);

    let section_indice = dict
        .get(b"Index")
        .and_then(parse_integer_array)
        .unwrap_or_else(|_| vec![0, size]);
    let field_widths = dict
        .get(b"W")
        .and_then(parse_integer_array)
        .map_err(|_| Error::Xref(XrefError::Parse))?;

    if field_widths.len() != 3 || field_widths.iter().any(|width| width.is_negative()) {
        return Err(Error::Xref(XrefError::Parse));
    }
    let widths: Vec<usize> = field_widths.iter().map(|&w| w as usize).collect();

    let mut reader = Cursor::new(&content);
    for chunk in section_indice.chunks(2) {
        let (start, count) = match *chunk {
            [start, count] => (start, count),
            _ => break,
        };
        for j in 0..count {
            // column 0 defaults to "in use" when absent
            let entry_type = read_big_endian_integer(&mut reader, widths[0], 1)?;
            let field_1 = read_big_endian_integer(&mut reader, widths[1], 0)?;
            let field_2 = read_big_endian_integer(&mut reader, widths[2], 0)?;

            let entry = match entry_type {
                0 => XrefEntry::Free {
                    next_free: field_1,
                    generation: field_2 as u16,
                },
                1 => XrefEntry::Normal {
                    offset: field_1,
                    generation: field_2 as u16,
                },
                2 => XrefEntry::Compressed {
                    container: field_1,
                    index: field_2 as u16,
                },
                other => return Err(Error::Xref(XrefError::UnknownType(other))),
            };
            xref.insert((start + j) as u32, entry);
        }
    }

    Ok((xref, dict))
}

fn read_big_endian_integer(reader: &mut Cursor, width: usize, default: u32) -> Result<u32> {
    if width == 0 {
        return Ok(default);
    }
    let bytes = reader.read(width).map_err(|_| Error::Xref(XrefError::Stream))?;
    let mut value: u64 = 0;
    for &byte in bytes {
        value = (value << 8) | u64::from(byte);
    }
    u32::try_from(value).map_err(|_| Error::Xref(XrefError::Stream))
}

fn parse_integer_array(array: &Object) -> Result<Vec<i64>> {
    let array = array.as_array()?;
    let mut out = Vec::with_capacity(array.len());

    for n in array {
        out.push(n.as_i64()?);
    }

    Ok(out)
}
