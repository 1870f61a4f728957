//! Queue and blob-store abstractions consumed by the ingest pipeline.
//!
//! This crate holds the capability sets the core pipeline needs from
//! external SDKs, expressed as small traits rather than concrete client
//! types, so the orchestrator and worker pool are testable against
//! in-memory fakes. Production implementations of [`client::QueueClient`]
//! and [`client::BlobStore`] live in the binary crate.

pub mod client;
pub mod error;
pub mod message;
pub mod notification;

pub use client::{BlobStore, QueueClient, MAX_BATCH};
pub use error::QueueError;
pub use message::{build_message, Attribute, OutboundMessage};
pub use notification::{decode_blob_refs, receive_notification, BlobRef, ReceiptToken};
