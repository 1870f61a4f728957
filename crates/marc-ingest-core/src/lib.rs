//! marc-ingest-core - pure ISO 2709 (MARC) parsing logic.
//!
//! No I/O beyond `std::io::Read`/`Seek` over an already-open file, no
//! async, no queue or blob store dependency. Everything in this crate is
//! the "essence" of the ingest pipeline: turning a stream of bytes into
//! addressable records and their identifiers.

pub mod error;
pub mod marc;

pub use error::MarcError;
pub use marc::{MarcRecord, RecordLoader};
