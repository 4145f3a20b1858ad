//! Job queue seam for asynchronous package copies.
//!
//! The engine only validates and enqueues; a separately scheduled worker
//! consumes the queue and owns retries.

use crate::error::Result;
use crate::types::{CopyJobRequest, JobHandle};

pub trait JobQueue: Send + Sync {
    /// Enqueues all requests atomically: either every job is created or none.
    fn enqueue(&self, requests: &[CopyJobRequest]) -> Result<Vec<JobHandle>>;
}
