use log::warn;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, SeekFrom};
use std::path::Path;
use std::str::{self, FromStr};

use crate::cursor::Cursor;
use crate::error::XrefError;
use crate::object_stream::ObjectStream;
use crate::parser;
use crate::xref::{decode_xref_stream, Xref, XrefEntry};
use crate::{Dictionary, Document, Error, Object, ObjectId, Result, Stream};

impl Document {
    /// Load a PDF document from a specified file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Document> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::with_capacity(file.metadata()?.len() as usize);
        file.read_to_end(&mut buffer)?;
        Document::from_buffer(buffer)
    }

    /// Load a PDF document from an arbitrary byte source.
    pub fn load_from<R: Read>(mut source: R) -> Result<Document> {
        let mut buffer = Vec::new();
        source.read_to_end(&mut buffer)?;
        Document::from_buffer(buffer)
    }

    /// Load a PDF document from memory.
    pub fn load_mem<B: Into<Vec<u8>>>(buffer: B) -> Result<Document> {
        Document::from_buffer(buffer.into())
    }

    fn from_buffer(buffer: Vec<u8>) -> Result<Document> {
        let (version, xref, trailer) = {
            let mut cursor = Cursor::new(&buffer);
            let version = read_header(&mut cursor)?;
            let start = locate_xref_start(&mut cursor)?;
            let (xref, trailer) = read_xref_chain(&buffer, start)?;
            (version, xref, trailer)
        };

        Ok(Document {
            buffer,
            version,
            trailer,
            xref,
            cache: BTreeMap::new(),
        })
    }

    /// Materialize an object into the cache, resolving through the fused
    /// cross-reference table. `seen` breaks reference cycles met while
    /// settling stream lengths.
    pub(crate) fn fetch(&mut self, id: ObjectId, seen: &mut HashSet<ObjectId>) -> Result<()> {
        if self.cache.contains_key(&id) {
            return Ok(());
        }
        if !seen.insert(id) {
            return Err(Error::ObjectNotFound(id));
        }

        let entry = self.xref.get(id.0).cloned().ok_or(Error::ObjectNotFound(id))?;
        let object = match entry {
            XrefEntry::Normal { offset, generation } if generation == id.1 => {
                self.read_indirect(offset as usize, id, seen)?
            }
            XrefEntry::Compressed { container, index } if id.1 == 0 => {
                self.read_compressed(id, container, index, seen)?
            }
            _ => return Err(Error::ObjectNotFound(id)),
        };

        self.cache.insert(id, object);
        Ok(())
    }

    fn read_indirect(&mut self, offset: usize, id: ObjectId, seen: &mut HashSet<ObjectId>) -> Result<Object> {
        if offset > self.buffer.len() {
            return Err(Error::Offset(offset));
        }
        let (_, mut object) = parser::indirect_object(&self.buffer, offset, Some(id))?;
        if let Object::Stream(ref mut stream) = object {
            if stream.start_position.is_some() {
                self.fill_stream(stream, seen);
            }
        }
        Ok(object)
    }

    /// Settle the body of a stream whose `/Length` was not a direct
    /// integer: resolve the reference, or fall back to scanning for
    /// `endstream`. A stream with no usable framing degrades to an empty
    /// body with its dictionary intact.
    fn fill_stream(&mut self, stream: &mut Stream, seen: &mut HashSet<ObjectId>) {
        let start = match stream.start_position {
            Some(start) => start,
            None => return,
        };

        let content = match self.stream_length(&stream.dict, seen) {
            Some(length) if start + length <= self.buffer.len() => Some(self.buffer[start..start + length].to_vec()),
            _ => scan_stream_body(&self.buffer, start),
        };

        match content {
            Some(content) => stream.set_content(content),
            None => {
                warn!("stream at offset {start} has no usable framing, keeping the dictionary only");
                stream.set_content(Vec::new());
            }
        }
    }

    fn stream_length(&mut self, dict: &Dictionary, seen: &mut HashSet<ObjectId>) -> Option<usize> {
        let value = dict.get(b"Length").ok()?;
        let length = match value {
            Object::Reference(id) => {
                let id = *id;
                self.fetch(id, seen).ok()?;
                self.cache.get(&id)?.as_i64().ok()?
            }
            other => other.as_i64().ok()?,
        };
        usize::try_from(length).ok()
    }

    fn read_compressed(
        &mut self, id: ObjectId, container: u32, index: u16, seen: &mut HashSet<ObjectId>,
    ) -> Result<Object> {
        self.fetch((container, 0), seen)?;
        let stream = self
            .cache
            .get(&(container, 0))
            .ok_or(Error::ObjectNotFound(id))?
            .as_stream()?;
        if !stream.dict.has_type(b"ObjStm") {
            return Err(Error::Xref(XrefError::ObjectStream));
        }

        let container_stream = ObjectStream::new(stream)?;
        let (slot_id, object) = container_stream.get(index as usize)?;
        if slot_id != id {
            return Err(Error::Xref(XrefError::ObjectStream));
        }
        Ok(object)
    }
}

fn read_header(cursor: &mut Cursor) -> Result<f64> {
    let magic = cursor.read(5).map_err(|_| Error::InvalidPdf("missing %PDF- header"))?;
    if magic != b"%PDF-" {
        return Err(Error::InvalidPdf("missing %PDF- header"));
    }
    let version = cursor.read_until_space(false);
    str::from_utf8(version)
        .ok()
        .and_then(|v| f64::from_str(v).ok())
        .ok_or(Error::InvalidPdf("unparsable version number"))
}

/// Find the offset of the first (newest) cross-reference section: reverse
/// scan for `%%EOF`, then for `startxref`, whose following line holds the
/// offset.
fn locate_xref_start(cursor: &mut Cursor) -> Result<usize> {
    cursor.seek(SeekFrom::End(0));
    cursor
        .read_until(b"%%EOF", true)
        .ok_or(Error::InvalidPdf("missing %%EOF marker"))?;
    cursor
        .read_until(b"startxref", true)
        .ok_or(Error::Xref(XrefError::Start))?;
    cursor.seek(SeekFrom::Current(9));

    let offset = cursor.read_until_space(false);
    str::from_utf8(offset)
        .ok()
        .and_then(|o| usize::from_str(o).ok())
        .ok_or(Error::Xref(XrefError::Start))
}

/// Walk the whole `/Prev` chain, newest section first. Entries and trailer
/// keys are fused first-seen-wins; a revisited offset means the chain
/// loops.
fn read_xref_chain(buffer: &[u8], start: usize) -> Result<(Xref, Dictionary)> {
    let mut xref = Xref::new(0);
    let mut trailer = Dictionary::new();
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next {
        if offset >= buffer.len() {
            return Err(Error::Xref(if visited.is_empty() {
                XrefError::Start
            } else {
                XrefError::PrevStart
            }));
        }
        if !visited.insert(offset) {
            return Err(Error::Xref(XrefError::PrevCycle(offset)));
        }

        let (section, section_trailer) = read_xref_section(buffer, offset)?;
        xref.extend(section);
        for (key, value) in &section_trailer {
            if !trailer.has(key) {
                trailer.set(key.clone(), value.clone());
            }
        }

        next = match section_trailer.get(b"Prev").and_then(Object::as_i64) {
            Ok(prev) => Some(usize::try_from(prev).map_err(|_| Error::Xref(XrefError::PrevStart))?),
            Err(_) => None,
        };
    }

    let count = xref.max_id() + 1;
    xref.size = match trailer.get(b"Size").and_then(Object::as_i64) {
        Ok(size) => size as u32,
        Err(_) => {
            warn!("trailer has no /Size entry, using {count}");
            count
        }
    };
    if xref.size != count {
        warn!("Size entry of trailer dictionary is {}, correct value is {}.", xref.size, count);
        xref.size = count;
    }

    Ok((xref, trailer))
}

fn read_xref_section(buffer: &[u8], offset: usize) -> Result<(Xref, Dictionary)> {
    let mut cursor = Cursor::new(buffer);
    cursor.seek(SeekFrom::Start(offset as u64));
    cursor.read_until_char().map_err(|_| Error::Xref(XrefError::Parse))?;

    if buffer[cursor.tell()..].starts_with(b"xref") {
        return parser::xref_and_trailer(&buffer[cursor.tell()..]);
    }

    if cursor.peek_byte().is_some_and(|c| c.is_ascii_digit()) {
        // a 1.5+ cross-reference stream is an ordinary indirect stream object
        let (_, object) = parser::indirect_object(buffer, offset, None)?;
        let mut stream = match object {
            Object::Stream(stream) => stream,
            _ => return Err(Error::Xref(XrefError::Parse)),
        };
        if !stream.dict.has_type(b"XRef") {
            return Err(Error::Xref(XrefError::Stream));
        }
        if let Some(start) = stream.start_position {
            // no table exists yet, so an indirect /Length cannot be resolved
            let content = scan_stream_body(buffer, start).ok_or(Error::Xref(XrefError::Stream))?;
            stream.set_content(content);
        }
        return decode_xref_stream(&stream);
    }

    Err(Error::Xref(XrefError::Parse))
}

/// Recover a stream body without a usable `/Length`: everything up to
/// `endstream`, minus at most one trailing end-of-line.
fn scan_stream_body(buffer: &[u8], start: usize) -> Option<Vec<u8>> {
    let mut cursor = Cursor::new(buffer);
    cursor.seek(SeekFrom::Start(start as u64));
    let content = cursor.read_until(b"endstream", false)?;
    Some(strip_one_eol(content).to_vec())
}

fn strip_one_eol(content: &[u8]) -> &[u8] {
    content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .or_else(|| content.strip_suffix(b"\r"))
        .unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_version_is_a_real_number() {
        let mut cursor = Cursor::new(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n");
        assert_eq!(read_header(&mut cursor).unwrap(), 1.7);

        let mut cursor = Cursor::new(b"PK\x03\x04 not a pdf");
        assert!(matches!(read_header(&mut cursor), Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn xref_start_is_found_from_the_end() {
        let data = b"%PDF-1.4\njunk\nstartxref\n1234\n%%EOF\n";
        let mut cursor = Cursor::new(data);
        assert_eq!(locate_xref_start(&mut cursor).unwrap(), 1234);
    }

    #[test]
    fn missing_eof_marker_is_invalid() {
        let data = b"%PDF-1.4\nstartxref\n5\n";
        let mut cursor = Cursor::new(data);
        assert!(matches!(
            locate_xref_start(&mut cursor),
            Err(Error::InvalidPdf("missing %%EOF marker"))
        ));
    }

    #[test]
    fn one_trailing_eol_is_stripped() {
        assert_eq!(strip_one_eol(b"data\r\n"), b"data");
        assert_eq!(strip_one_eol(b"data\n"), b"data");
        assert_eq!(strip_one_eol(b"data\n\n"), b"data\n");
        assert_eq!(strip_one_eol(b"data"), b"data");
    }
}
