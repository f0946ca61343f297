//! Probe Manager
//!
//! Orchestrates the whole query lifecycle: one active frame accumulating
//! requests, a bounded FIFO of in-flight frames, a pool of reusable frame
//! objects, and the shared copy pipeline + point sampler.
//!
//! # Frame lifecycle
//!
//! ```text
//! FramePool ──begin_frame──► active ──submit_frame──► InFlightQueue
//!     ▲                        │                          │
//!     │                        │ (pipeline pending /      │
//!     │                        │  queue full / empty)     │
//!     └────────◄───────────────┴───────◄──poll_completions┘
//! ```
//!
//! # Failure semantics
//!
//! Capacity limits (`max_entries_per_frame`, `max_in_flight`) are
//! admission control: the affected query or frame silently never
//! resolves, and the host retries on a later frame if it still cares.
//! Calling [`begin_frame`](ProbeManager::begin_frame) while a frame is
//! already accumulating, or [`request`](ProbeManager::request) /
//! [`submit_frame`](ProbeManager::submit_frame) with no active frame, is
//! a caller bug and panics.

use crate::backend::ProbeBackend;
use crate::errors::Result;
use crate::probe::frame::{FramePool, ProbeFrame};
use crate::probe::queue::InFlightQueue;
use crate::probe::result::ProbeResult;

/// Admission limits for a [`ProbeManager`].
#[derive(Clone, Copy, Debug)]
pub struct ProbeSettings {
    /// Maximum queries batched into one frame; also the slot count of every
    /// pooled transfer resource.
    pub max_entries_per_frame: usize,
    /// Maximum frames submitted but not yet confirmed complete.
    pub max_in_flight: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_entries_per_frame: 50,
            max_in_flight: 10,
        }
    }
}

/// Counters for work the manager accepted, discarded, or resolved.
///
/// Discards are silent by design (a discarded frame's queries simply never
/// resolve); the counters make that visible without adding a failure
/// surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeStats {
    /// Frames that reached the in-flight queue.
    pub frames_submitted: u64,
    /// Frames whose entries received values.
    pub frames_resolved: u64,
    /// Frames discarded because the copy pipeline was still compiling.
    pub frames_discarded_pipeline_pending: u64,
    /// Frames discarded because the in-flight queue was at capacity.
    pub frames_discarded_queue_full: u64,
    /// Frames discarded because no query was registered.
    pub frames_discarded_empty: u64,
    /// Requests answered without hardware work (coordinate out of range).
    pub requests_trivially_rejected: u64,
    /// Requests refused because the active frame was full.
    pub requests_frame_full: u64,
}

/// Batches point queries into pooled, bounded, asynchronously-resolved
/// readback frames.
///
/// Driven once per host frame, single-threaded: `begin_frame`, zero or
/// more `request`s, `submit_frame`, and `poll_completions` somewhere in
/// the loop. The manager issues asynchronous hardware work but never
/// blocks on it.
pub struct ProbeManager<B: ProbeBackend> {
    settings: ProbeSettings,
    pool: FramePool<B>,
    in_flight: InFlightQueue<B>,
    current: Option<ProbeFrame<B>>,
    /// Receives raw completion data; reused safely because at most one
    /// frame is drained per poll, synchronously.
    scratch: Vec<u32>,
    copy_pipeline: Option<B::Pipeline>,
    point_sampler: Option<B::Sampler>,
    stats: ProbeStats,
}

impl<B: ProbeBackend> ProbeManager<B> {
    #[must_use]
    pub fn new(settings: ProbeSettings) -> Self {
        debug_assert!(settings.max_entries_per_frame > 0);
        debug_assert!(settings.max_in_flight > 0);

        Self {
            scratch: vec![0; settings.max_entries_per_frame],
            pool: FramePool::new(),
            in_flight: InFlightQueue::new(settings.max_in_flight),
            current: None,
            copy_pipeline: None,
            point_sampler: None,
            stats: ProbeStats::default(),
            settings,
        }
    }

    /// Check out a frame for this host frame's queries.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already accumulating.
    pub fn begin_frame(&mut self, backend: &B) {
        assert!(
            self.current.is_none(),
            "begin_frame called while a frame is still accumulating"
        );
        self.current = Some(
            self.pool
                .acquire(backend, self.settings.max_entries_per_frame),
        );
    }

    /// Register a point query at normalized coordinate `(x, y)` against the
    /// active frame.
    ///
    /// Coordinates outside `[-1, 1]` are trivially rejected: the handle is
    /// final immediately, no hardware work happens, and the call still
    /// succeeds. Returns `false` only when the active frame is full — the
    /// caller drops or defers the query, this is not an error.
    ///
    /// # Panics
    ///
    /// Panics if no frame is active.
    pub fn request(&mut self, dst: &ProbeResult, x: f32, y: f32) -> bool {
        let frame = self
            .current
            .as_mut()
            .expect("request called with no active frame");

        dst.begin_request(x, y);

        if !(-1.0..=1.0).contains(&x) || !(-1.0..=1.0).contains(&y) {
            dst.mark_trivially_rejected();
            self.stats.requests_trivially_rejected += 1;
            return true;
        }

        if frame.entries().len() >= self.settings.max_entries_per_frame {
            self.stats.requests_frame_full += 1;
            return false;
        }

        frame.push_entry(dst.clone());
        true
    }

    /// Close the active frame and, when possible, submit its batched reads.
    ///
    /// `source` is the surface to probe (a resolved depth view for the wgpu
    /// backend); `width`/`height` its pixel size. The frame is discarded
    /// straight back to the pool — no hardware work, its queries never
    /// resolve — when the copy pipeline is still compiling, the in-flight
    /// queue is at capacity, or no query was registered. Either way the
    /// manager returns to the idle state.
    ///
    /// # Panics
    ///
    /// Panics if no frame is active.
    pub fn submit_frame(&mut self, backend: &B, source: &B::SourceTexture, width: u32, height: u32) {
        let frame = self
            .current
            .take()
            .expect("submit_frame called with no active frame");

        // Kick off the shared resources on first use so a later frame finds
        // them ready even if compilation is asynchronous.
        if self.copy_pipeline.is_none() {
            self.copy_pipeline = Some(backend.create_copy_pipeline());
            self.point_sampler = Some(backend.create_point_sampler());
        }

        let ready = self
            .copy_pipeline
            .as_ref()
            .is_some_and(|p| backend.pipeline_ready(p));
        if !ready {
            log::debug!("probe frame discarded: copy pipeline still compiling");
            self.stats.frames_discarded_pipeline_pending += 1;
            self.pool.recycle(frame);
            return;
        }

        if self.in_flight.is_full() {
            log::debug!(
                "probe frame discarded: {} frames already in flight",
                self.in_flight.len()
            );
            self.stats.frames_discarded_queue_full += 1;
            self.pool.recycle(frame);
            return;
        }

        if frame.entries().is_empty() {
            self.stats.frames_discarded_empty += 1;
            self.pool.recycle(frame);
            return;
        }

        let pipeline = self
            .copy_pipeline
            .as_ref()
            .expect("copy pipeline constructed above");
        let sampler = self
            .point_sampler
            .as_ref()
            .expect("point sampler constructed above");

        backend.run_copy_pass(pipeline, sampler, source, width, height, &mut |target| {
            for (index, entry) in frame.entries().iter().enumerate() {
                let (nx, ny) = entry.normalized();
                let px = normalized_to_pixel(nx, width);
                let py = normalized_to_pixel(ny, height);
                entry.set_resolved_pixel(px, py);
                backend.read_pixel(frame.readback(), index, target, px, py);
            }
            backend.submit_readback(frame.readback());
        });

        self.stats.frames_submitted += 1;
        self.in_flight.push(frame);
    }

    /// Resolve the oldest in-flight frame if its transfer completed.
    ///
    /// Strictly FIFO and head-only: at most one frame resolves per call,
    /// and a younger frame that finished early still waits behind the
    /// head. Calling with an empty queue is a no-op.
    ///
    /// On a device-side readback failure the head frame is recycled with
    /// its queries left unresolved — the same outcome callers already
    /// handle for discarded frames — and the error is returned for
    /// observability.
    pub fn poll_completions(&mut self, backend: &B) -> Result<()> {
        let Some(head) = self.in_flight.head() else {
            return Ok(());
        };

        match backend.try_complete_readback(head.readback(), &mut self.scratch) {
            Ok(true) => {
                let frame = self.in_flight.pop_head().expect("head checked above");
                for (index, entry) in frame.entries().iter().enumerate() {
                    entry.resolve(self.scratch[index]);
                }
                self.stats.frames_resolved += 1;
                self.pool.recycle(frame);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                log::warn!("probe readback failed: {err}");
                let frame = self.in_flight.pop_head().expect("head checked above");
                self.pool.recycle(frame);
                Err(err)
            }
        }
    }

    /// Release every frame (active, in-flight, pooled) and the shared
    /// pipeline and sampler. Safe to call when nothing was ever created.
    pub fn destroy(&mut self, backend: &B) {
        if let Some(frame) = self.current.take() {
            frame.destroy(backend);
        }
        while let Some(frame) = self.in_flight.pop_head() {
            frame.destroy(backend);
        }
        self.pool.destroy(backend);
        if let Some(pipeline) = self.copy_pipeline.take() {
            backend.destroy_pipeline(pipeline);
        }
        if let Some(sampler) = self.point_sampler.take() {
            backend.destroy_sampler(sampler);
        }
    }

    /// Whether a frame is currently accumulating requests.
    #[must_use]
    pub fn is_accumulating(&self) -> bool {
        self.current.is_some()
    }

    /// Number of submitted frames not yet confirmed complete.
    #[must_use]
    pub fn in_flight_frames(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of frames sitting in the free pool.
    #[must_use]
    pub fn pooled_frames(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    #[must_use]
    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }
}

impl<B: ProbeBackend> Default for ProbeManager<B> {
    fn default() -> Self {
        Self::new(ProbeSettings::default())
    }
}

/// Map a normalized coordinate in `[-1, 1]` into the target's pixel space:
/// `round(((n * 0.5) + 0.5) * dimension)`, landing in `[0, dimension]`.
fn normalized_to_pixel(n: f32, dimension: u32) -> u32 {
    (n.mul_add(0.5, 0.5) * dimension as f32).round() as u32
}
