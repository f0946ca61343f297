#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Asynchronous batched point-query readback for wgpu render pipelines.
//!
//! Many independent callers want to know the depth (or any single-channel
//! value) a render pipeline produced at one screen-space coordinate —
//! without ever stalling the pipeline to wait for the GPU. This crate
//! batches all point queries registered during one host frame into a single
//! full-surface copy pass plus one pooled transfer resource, submits the
//! readback asynchronously, and delivers values a few frames later through
//! non-blocking polling.
//!
//! # Architecture
//!
//! ```text
//! caller ──► ProbeManager::begin_frame
//!        ──► ProbeManager::request (×N, per ProbeResult handle)
//!        ──► ProbeManager::submit_frame ──► copy pass + scheduled reads
//!                                       ──► InFlightQueue (bounded FIFO)
//!        ──► ProbeManager::poll_completions ──► values written back,
//!                                               frame recycled to FramePool
//! ```
//!
//! The GPU side is reached through the [`ProbeBackend`] trait; a wgpu
//! implementation is provided as [`WgpuProbeBackend`]. Everything is
//! single-threaded cooperative: the manager issues asynchronous hardware
//! work but never blocks on it.

pub mod backend;
pub mod errors;
pub mod probe;

pub use backend::{ProbeBackend, WgpuProbeBackend};
pub use errors::{ProbeError, Result};
pub use probe::{ProbeManager, ProbeResult, ProbeSettings, ProbeStats};
