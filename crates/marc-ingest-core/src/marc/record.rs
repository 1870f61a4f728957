use std::cell::OnceCell;

use crate::error::MarcError;
use crate::marc::reader::extract_id;

/// An opaque MARC record byte sequence, its derived identifier, and the
/// label identifying where it was sourced from.
///
/// Once placed on the worker channel a `MarcRecord` is exclusively owned by
/// the consuming worker - nothing here needs to be `Sync`.
#[derive(Debug, Clone)]
pub struct MarcRecord {
    raw: Vec<u8>,
    id: OnceCell<String>,
    pub source: String,
}

impl MarcRecord {
    pub fn new(raw: Vec<u8>, source: String) -> Self {
        Self {
            raw,
            id: OnceCell::new(),
            source,
        }
    }

    /// Constructs a record whose id has already been extracted (the loader
    /// typically knows it already, having used it to decide whether to
    /// coalesce a following fragment).
    pub fn with_id(raw: Vec<u8>, source: String, id: String) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(id);
        Self { raw, id: cell, source }
    }

    /// The record identifier, extracting and caching it on first access.
    pub fn id(&self) -> Result<&str, MarcError> {
        if let Some(id) = self.id.get() {
            return Ok(id);
        }
        let id = extract_id(&self.raw)?;
        Ok(self.id.get_or_init(|| id))
    }

    /// The full raw byte sequence, header and terminators included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marc::reader::tests::build_record;

    #[test]
    fn id_is_extracted_and_cached() {
        let record = MarcRecord::new(build_record("u123"), "test".into());
        assert_eq!(record.id().unwrap(), "u123");
        // second call hits the cache; same value
        assert_eq!(record.id().unwrap(), "u123");
    }

    #[test]
    fn with_id_skips_extraction() {
        let record = MarcRecord::with_id(build_record("u123"), "test".into(), "u123".into());
        assert_eq!(record.id().unwrap(), "u123");
    }
}
