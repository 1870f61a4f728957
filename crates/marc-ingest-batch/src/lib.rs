//! Worker pool and batcher: accumulates records handed off by the
//! orchestrator into protocol-sized batches and publishes them to the
//! outbound queue (and, optionally, a cache queue) with bounded retry.

pub mod worker;

pub use worker::{run_worker, spawn_workers, WorkerConfig, FLUSH_TIMEOUT};
