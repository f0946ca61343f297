//! Rendering Backend Contract
//!
//! The probe subsystem never talks to a graphics API directly; it drives an
//! opaque collaborator through [`ProbeBackend`]. The contract mirrors what
//! the hardware layer actually offers:
//!
//! - transfer resources (readbacks) that complete asynchronously and are
//!   only observable by non-blocking polling,
//! - a minimal full-screen copy pipeline whose compilation may itself be
//!   asynchronous,
//! - a two-phase copy pass: the pass is declared first, and per-entry pixel
//!   reads are scheduled from a continuation invoked once the pass output
//!   target is known.
//!
//! [`WgpuProbeBackend`] implements the contract over `wgpu`. Tests drive the
//! manager with an instrumented mock instead.

mod wgpu_backend;

pub use wgpu_backend::{CopyPipeline, ReadbackBuffer, WgpuProbeBackend};

use crate::errors::Result;

/// Hardware abstraction the [`ProbeManager`](crate::ProbeManager) drives.
///
/// All methods take `&self`; implementations that need to accumulate GPU
/// commands between calls (e.g. a shared command encoder) use interior
/// mutability. The scheduling model is single-threaded cooperative, so no
/// method may block waiting for the device.
pub trait ProbeBackend {
    /// Transfer resource receiving scheduled pixel reads.
    type Readback;
    /// The full-screen copy pipeline (program + state).
    type Pipeline;
    /// Point-sampling, clamp-addressing sampler used by the copy pass.
    type Sampler;
    /// The source surface a caller wants probed (e.g. a resolved depth view).
    type SourceTexture;
    /// The single-channel target the copy pass produces and reads come from.
    type CopyTarget;

    /// Create a transfer resource of `byte_len` bytes.
    fn create_readback(&self, byte_len: u64) -> Self::Readback;

    /// Kick off construction of the full-screen copy pipeline.
    ///
    /// Construction need not complete synchronously; readiness is observed
    /// through [`pipeline_ready`](Self::pipeline_ready).
    fn create_copy_pipeline(&self) -> Self::Pipeline;

    /// Whether the copy pipeline has finished (possibly asynchronous)
    /// compilation and can be bound.
    fn pipeline_ready(&self, pipeline: &Self::Pipeline) -> bool;

    /// Create a nearest-filter, clamp-addressing sampler.
    fn create_point_sampler(&self) -> Self::Sampler;

    /// Declare and execute the full-screen copy pass.
    ///
    /// The pass samples `source` with a synthetic 3-vertex draw and writes a
    /// `width` × `height` single-channel integer target. Once the output
    /// target is resolved, `schedule_reads` is invoked with it; the
    /// continuation is expected to schedule per-entry pixel reads (via
    /// [`read_pixel`](Self::read_pixel)) and commit them (via
    /// [`submit_readback`](Self::submit_readback)).
    fn run_copy_pass(
        &self,
        pipeline: &Self::Pipeline,
        sampler: &Self::Sampler,
        source: &Self::SourceTexture,
        width: u32,
        height: u32,
        schedule_reads: &mut dyn FnMut(&Self::CopyTarget),
    );

    /// Schedule an asynchronous one-pixel read from `target` at `(x, y)`
    /// into slot `index` of `readback`.
    ///
    /// Only valid between the start of the `schedule_reads` continuation and
    /// the matching [`submit_readback`](Self::submit_readback) call.
    fn read_pixel(
        &self,
        readback: &Self::Readback,
        index: usize,
        target: &Self::CopyTarget,
        x: u32,
        y: u32,
    );

    /// Commit all reads scheduled on `readback` to the device.
    fn submit_readback(&self, readback: &Self::Readback);

    /// Non-blocking completion probe.
    ///
    /// Returns `Ok(true)` once the device has finished the transfer, with
    /// the raw values copied into `dst` (one `u32` per scheduled slot).
    /// Returns `Ok(false)` while still in flight, or when `readback` has no
    /// submitted transfer at all.
    fn try_complete_readback(&self, readback: &Self::Readback, dst: &mut [u32]) -> Result<bool>;

    /// Release a transfer resource.
    fn destroy_readback(&self, readback: Self::Readback);

    /// Release the copy pipeline.
    fn destroy_pipeline(&self, pipeline: Self::Pipeline);

    /// Release the sampler.
    fn destroy_sampler(&self, sampler: Self::Sampler);
}
