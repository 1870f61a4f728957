//! Stream parsing of the ISO 2709 container.
//!
//! Layout: a 5-byte ASCII decimal length prefix, a field directory
//! starting at byte 24 whose end offset is stored (ASCII decimal) at
//! bytes 12..17, and a record terminated by `0x1e` (field) / `0x1d`
//! (record) in its final two bytes.

use std::io::Read;

use crate::error::MarcError;

pub const HEADER_SIZE: usize = 5;
pub const DIRECTORY_START: usize = 24;
pub const DIRECTORY_ENTRY_SIZE: usize = 12;
pub const FIELD_TERMINATOR: u8 = 0x1e;
pub const RECORD_TERMINATOR: u8 = 0x1d;

const PRIMARY_ID_TAG: &str = "001";
const FALLBACK_ID_TAG: &str = "035";

/// Reads exactly `buf.len()` bytes, treating any short read (including a
/// read of zero bytes, i.e. a clean end of file) as [`MarcError::Eof`].
///
/// No distinction is drawn between "no more records" and "a trailing
/// record was cut short" - both propagate as EOF to the caller, which is
/// exactly what this helper does by not reporting how many bytes it
/// managed to read before running out.
fn fill_exact<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<(), MarcError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(MarcError::Eof);
        }
        filled += n;
    }
    Ok(())
}

fn parse_ascii_number(bytes: &[u8]) -> Option<usize> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

/// Reads one raw MARC record (header included) from `src`.
pub fn read_raw<R: Read>(src: &mut R) -> Result<Vec<u8>, MarcError> {
    let mut header = [0u8; HEADER_SIZE];
    fill_exact(src, &mut header)?;

    let length = parse_ascii_number(&header).ok_or_else(|| {
        MarcError::BadRecord(format!(
            "invalid length prefix {:?}",
            String::from_utf8_lossy(&header)
        ))
    })?;

    if length <= HEADER_SIZE {
        return Err(MarcError::BadRecord(format!(
            "record length {length} is not larger than the header"
        )));
    }

    let mut record = Vec::with_capacity(length);
    record.extend_from_slice(&header);
    record.resize(length, 0);
    fill_exact(src, &mut record[HEADER_SIZE..])?;

    if record[length - 2] != FIELD_TERMINATOR || record[length - 1] != RECORD_TERMINATOR {
        return Err(MarcError::BadRecord(format!(
            "unexpected terminator bytes {:#x} {:#x}",
            record[length - 2],
            record[length - 1]
        )));
    }

    Ok(record)
}

/// Extracts the record identifier from a fully-read raw record.
///
/// Prefers tag `001`, falling back to `035` when absent or unparseable.
/// The extracted id must start with `u` (domain sanity rule); anything
/// else is [`MarcError::BadRecordId`].
pub fn extract_id(raw: &[u8]) -> Result<String, MarcError> {
    let end_of_dir_bytes = raw
        .get(12..17)
        .ok_or_else(|| MarcError::BadRecord("record too short for a directory offset".into()))?;
    let end_of_dir = parse_ascii_number(end_of_dir_bytes)
        .ok_or_else(|| MarcError::BadRecord("invalid end-of-directory offset".into()))?;

    if end_of_dir == 99999 || raw.get(end_of_dir.wrapping_sub(1)).copied() != Some(FIELD_TERMINATOR)
    {
        tracing::debug!(end_of_dir, "marc record directory terminator at unexpected offset");
    }

    let id = find_field(raw, end_of_dir, PRIMARY_ID_TAG)
        .or_else(|| find_field(raw, end_of_dir, FALLBACK_ID_TAG))
        .ok_or_else(|| {
            MarcError::BadRecord(format!(
                "neither tag {PRIMARY_ID_TAG} nor {FALLBACK_ID_TAG} present"
            ))
        })?;

    if !id.starts_with('u') {
        return Err(MarcError::BadRecordId(id));
    }

    Ok(id)
}

fn find_field(raw: &[u8], end_of_dir: usize, tag: &str) -> Option<String> {
    let mut offset = DIRECTORY_START;
    while offset + DIRECTORY_ENTRY_SIZE <= end_of_dir {
        let entry = raw.get(offset..offset + DIRECTORY_ENTRY_SIZE)?;
        let entry_tag = std::str::from_utf8(&entry[0..3]).ok()?;

        if entry_tag == tag {
            let length = parse_ascii_number(&entry[3..7])?;
            let field_offset = parse_ascii_number(&entry[7..12])?;
            let start = end_of_dir + field_offset;
            let end = start + length.checked_sub(1)?;
            let body = raw.get(start..end)?;
            return std::str::from_utf8(body).ok().map(str::to_string);
        }

        offset += DIRECTORY_ENTRY_SIZE;
    }
    None
}
