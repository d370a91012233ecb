use crate::cursor::Cursor;
use crate::error::XrefError;
use crate::{parser, Error, Object, ObjectId, Result, Stream};
use std::str::{self, FromStr};

/// A decoded `/Type /ObjStm` container.
///
/// The payload starts with `/N` pairs of `<id> <offset>`, and the packed
/// object bodies begin `/First` bytes in. Bodies carry no `obj`/`endobj`
/// framing; compressed cross-reference entries address them by slot.
#[derive(Debug)]
pub struct ObjectStream {
    content: Vec<u8>,
    first: usize,
    offsets: Vec<(u32, usize)>,
}

impl ObjectStream {
    pub fn new(stream: &Stream) -> Result<ObjectStream> {
        let content = stream.decoded_content()?;
        let count = stream
            .dict
            .get(b"N")
            .and_then(Object::as_i64)
            .map_err(|_| Error::Xref(XrefError::ObjectStream))?;
        let first = stream
            .dict
            .get(b"First")
            .and_then(Object::as_i64)
            .ok()
            .and_then(|first| usize::try_from(first).ok())
            .ok_or(Error::Xref(XrefError::ObjectStream))?;
        if count < 0 || first > content.len() {
            return Err(Error::Xref(XrefError::ObjectStream));
        }

        let mut pairs = Cursor::new(&content[..first]);
        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id: u32 = parse_ascii_int(pairs.read_until_space(false))?;
            let offset: usize = parse_ascii_int(pairs.read_until_space(false))?;
            offsets.push((id, offset));
        }

        Ok(ObjectStream {
            content,
            first,
            offsets,
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Parse the object stored in the given slot.
    pub fn get(&self, index: usize) -> Result<(ObjectId, Object)> {
        let &(id, offset) = self
            .offsets
            .get(index)
            .ok_or(Error::Xref(XrefError::ObjectStream))?;
        let start = self.first + offset;
        let body = self
            .content
            .get(start..)
            .ok_or(Error::Xref(XrefError::ObjectStream))?;
        let object = parser::direct_object(body).ok_or(Error::Parse { offset: start })?;
        // objects inside a stream always have generation 0
        Ok(((id, 0), object))
    }
}

fn parse_ascii_int<I: FromStr>(bytes: &[u8]) -> Result<I> {
    str::from_utf8(bytes)
        .ok()
        .and_then(|s| I::from_str(s).ok())
        .ok_or(Error::Xref(XrefError::ObjectStream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn container() -> Stream {
        let pairs = "11 0 12 8 10 17 ";
        let bodies = "(first) (second) << /Kind /Target >>";
        let mut content = pairs.as_bytes().to_vec();
        content.extend_from_slice(bodies.as_bytes());
        Stream::new(
            dictionary! {
                "Type" => "ObjStm",
                "N" => 3,
                "First" => pairs.len() as i64,
            },
            content,
        )
    }

    #[test]
    fn slots_resolve_to_their_bodies() {
        let stream = ObjectStream::new(&container()).unwrap();
        assert_eq!(stream.len(), 3);

        let ((id, generation), object) = stream.get(2).unwrap();
        assert_eq!((id, generation), (10, 0));
        assert_eq!(object.as_dict().unwrap().get(b"Kind").unwrap().as_name().unwrap(), b"Target");

        let (id, object) = stream.get(0).unwrap();
        assert_eq!(id, (11, 0));
        assert_eq!(object.as_str().unwrap(), b"first");
    }

    #[test]
    fn slot_beyond_the_declared_count_is_an_error() {
        let stream = ObjectStream::new(&container()).unwrap();
        assert!(matches!(
            stream.get(3),
            Err(Error::Xref(XrefError::ObjectStream))
        ));
    }

    #[test]
    fn short_pair_table_is_an_error() {
        let short = Stream::new(
            dictionary! {"Type" => "ObjStm", "N" => 4, "First" => 6},
            b"11 0\nrest".to_vec(),
        );
        assert!(matches!(
            ObjectStream::new(&short),
            Err(Error::Xref(XrefError::ObjectStream))
        ));
    }
}
