//! Point-Query Batching
//!
//! The caller-facing half of the crate: [`ProbeResult`] handles owned by
//! callers, and the [`ProbeManager`] that batches every query registered
//! during one host frame into a single copy pass + pooled transfer
//! resource, then resolves them in strict submission order.

mod frame;
mod manager;
mod queue;
mod result;

pub use manager::{ProbeManager, ProbeSettings, ProbeStats};
pub use result::ProbeResult;
