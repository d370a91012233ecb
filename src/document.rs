use crate::xref::Xref;
use crate::{Dictionary, Error, Object, ObjectId, Result};
use log::warn;
use std::collections::{BTreeMap, HashSet};

/// An opened PDF document.
///
/// The reader owns the raw bytes and resolves indirect objects lazily: an
/// object is parsed on its first access and then served from the cache for
/// the rest of the session. The cache only grows; accessors therefore take
/// `&mut self`, and sharing a document across threads needs an outer lock.
pub struct Document {
    pub(crate) buffer: Vec<u8>,
    pub(crate) version: f64,
    pub(crate) trailer: Dictionary,
    pub(crate) xref: Xref,
    pub(crate) cache: BTreeMap<ObjectId, Object>,
}

impl Document {
    /// The version from the `%PDF-` header line.
    pub fn version(&self) -> f64 {
        self.version
    }

    /// The trailer dictionary, fused over all revisions with the newest
    /// value winning per key.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// The fused cross-reference table.
    pub fn xref(&self) -> &Xref {
        &self.xref
    }

    /// Whether the trailer carries an `/Encrypt` dictionary. Encrypted
    /// payloads are not decrypted by this reader.
    pub fn is_encrypted(&self) -> bool {
        self.trailer.has(b"Encrypt")
    }

    /// Resolve an indirect object, parsing and caching it on first access.
    pub fn get_object(&mut self, id: ObjectId) -> Result<&Object> {
        let mut seen = HashSet::new();
        self.fetch(id, &mut seen)?;
        self.cache.get(&id).ok_or(Error::ObjectNotFound(id))
    }

    /// Follow a reference to its object; other values pass through.
    pub fn dereference<'a>(&'a mut self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(id) => {
                let id = *id;
                self.get_object(id)
            }
            _ => Ok(object),
        }
    }

    /// Decode a stream object's payload and keep the plain bytes for the
    /// rest of the session.
    pub fn get_stream_content(&mut self, id: ObjectId) -> Result<&[u8]> {
        self.get_object(id)?;
        let stream = self
            .cache
            .get_mut(&id)
            .ok_or(Error::ObjectNotFound(id))?
            .as_stream_mut()?;
        if stream.is_compressed() {
            stream.decompress()?;
        }
        Ok(&stream.content)
    }

    /// The document information dictionary (`/Info`), or `None` when it is
    /// absent or unreadable.
    pub fn metadata(&mut self) -> Option<&Dictionary> {
        let info = self.trailer.get(b"Info").ok()?;
        if let Ok(id) = info.as_reference() {
            return self.get_object(id).ok()?.as_dict().ok();
        }
        self.trailer.get(b"Info").ok()?.as_dict().ok()
    }

    /// The document catalog behind `/Root`.
    pub fn catalog(&mut self) -> Result<&Dictionary> {
        let root = self.trailer.get(b"Root").and_then(Object::as_reference)?;
        let catalog = self.get_object(root)?.as_dict()?;
        if !catalog.has_type(b"Catalog") {
            return Err(Error::DictType {
                expected: "Catalog",
                found: String::from_utf8_lossy(catalog.get_type().unwrap_or(b"None")).to_string(),
            });
        }
        Ok(catalog)
    }

    /// Number of leaf pages, counted by walking the `/Pages` tree.
    pub fn page_count(&mut self) -> Result<u32> {
        let pages = self.catalog()?.get(b"Pages").and_then(Object::as_reference)?;
        let mut visited = HashSet::new();
        self.count_pages(pages, &mut visited)
    }

    fn count_pages(&mut self, id: ObjectId, visited: &mut HashSet<ObjectId>) -> Result<u32> {
        if !visited.insert(id) {
            warn!("page tree revisits object {id:?}");
            return Ok(0);
        }
        let node = self.get_object(id)?.as_dict()?;
        if node.has_type(b"Pages") {
            let kids: Vec<ObjectId> = node
                .get(b"Kids")?
                .as_array()?
                .iter()
                .filter_map(|kid| kid.as_reference().ok())
                .collect();
            let mut count = 0;
            for kid in kids {
                count += self.count_pages(kid, visited)?;
            }
            Ok(count)
        } else if node.has_type(b"Page") {
            Ok(1)
        } else {
            Err(Error::DictType {
                expected: "Pages or Page",
                found: String::from_utf8_lossy(node.get_type().unwrap_or(b"None")).to_string(),
            })
        }
    }

    /// The catalog's `/PageLayout` name, if set.
    pub fn page_layout(&mut self) -> Result<Option<Vec<u8>>> {
        self.catalog_name_entry(b"PageLayout")
    }

    /// The catalog's `/PageMode` name, if set.
    pub fn page_mode(&mut self) -> Result<Option<Vec<u8>>> {
        self.catalog_name_entry(b"PageMode")
    }

    fn catalog_name_entry(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let catalog = self.catalog()?;
        match catalog.get(key) {
            Ok(value) => Ok(Some(value.as_name()?.to_vec())),
            Err(_) => Ok(None),
        }
    }
}
