//! A restartable cursor over the records in a single scratch file.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::MarcError;
use crate::marc::reader::{extract_id, read_raw};
use crate::marc::record::MarcRecord;

/// Cursor over one file's worth of MARC records.
///
/// `validate`/`first`/`next` all route through [`RecordLoader::next`], so
/// id extraction (and therefore `BadRecordId`) is exercised during
/// validation exactly as it is during normal streaming - a notification
/// whose records fail the `'u'`-prefix sanity check is poisoned at
/// validation time, never partway through a later stream.
pub struct RecordLoader {
    path: PathBuf,
    source: String,
    file: Option<File>,
}

impl RecordLoader {
    pub fn open(path: impl Into<PathBuf>, source: impl Into<String>) -> std::io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            source: source.into(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> Result<&mut File, MarcError> {
        self.file.as_mut().ok_or(MarcError::FileNotOpen)
    }

    /// Reads every record from position 0 to EOF. `Ok(())` iff every record
    /// parses successfully. Leaves the cursor at an indeterminate position;
    /// callers must call [`RecordLoader::first`] afterwards.
    pub fn validate(&mut self) -> Result<(), MarcError> {
        self.file_mut()?
            .seek(SeekFrom::Start(0))
            .map_err(MarcError::Io)?;

        loop {
            match self.read_one(false) {
                Ok(_) => continue,
                Err(MarcError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Seeks to byte 0 and returns the first record.
    pub fn first(&mut self, read_ahead: bool) -> Result<MarcRecord, MarcError> {
        self.file_mut()?
            .seek(SeekFrom::Start(0))
            .map_err(MarcError::Io)?;
        self.next(read_ahead)
    }

    /// Reads the next record, applying the read-ahead coalescing rule when
    /// `read_ahead` is set: after reading record `R` with id `i`, peek one
    /// more record. If it parses and its id equals `i`, append its raw
    /// bytes to `R`'s and repeat; otherwise rewind to the peek position and
    /// return `R`. A peek that fails to parse is swallowed - `R` is
    /// returned without error, and the bad bytes are re-encountered (and
    /// will then error) on the next call.
    pub fn next(&mut self, read_ahead: bool) -> Result<MarcRecord, MarcError> {
        self.read_one(read_ahead)
    }

    fn read_one(&mut self, read_ahead: bool) -> Result<MarcRecord, MarcError> {
        let mut raw = read_raw(self.file_mut()?)?;
        let id = extract_id(&raw)?;

        if read_ahead {
            loop {
                let checkpoint = self.file_mut()?.stream_position().map_err(MarcError::Io)?;

                let next_raw = match read_raw(self.file_mut()?) {
                    Ok(next_raw) => next_raw,
                    Err(_) => {
                        self.rewind_to(checkpoint)?;
                        break;
                    }
                };

                let matches = match extract_id(&next_raw) {
                    Ok(next_id) => next_id == id,
                    Err(_) => false,
                };

                if !matches {
                    self.rewind_to(checkpoint)?;
                    break;
                }

                tracing::warn!(id = %id, "coalescing additional marc record fragment");
                raw.extend_from_slice(&next_raw);
            }
        }

        Ok(MarcRecord::with_id(raw, self.source.clone(), id))
    }

    fn rewind_to(&mut self, pos: u64) -> Result<(), MarcError> {
        self.file_mut()?
            .seek(SeekFrom::Start(pos))
            .map_err(MarcError::Io)?;
        Ok(())
    }

    /// Releases the underlying file handle. Idempotent.
    pub fn done(&mut self) {
        self.file = None;
    }
}

impl Drop for RecordLoader {
    fn drop(&mut self) {
        self.done();
    }
}
