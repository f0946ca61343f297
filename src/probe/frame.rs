//! Query Frames and the Frame Pool
//!
//! A [`ProbeFrame`] bundles every query registered during one host frame
//! with the one transfer resource that services them. The resource is
//! allocated once, sized for the manager's maximum entry count, and reused
//! for the frame object's entire pooled lifetime.
//!
//! [`FramePool`] is a plain free list: frames are checked out, returned
//! with their entries cleared, and never destroyed except at teardown.

use crate::backend::ProbeBackend;
use crate::probe::result::ProbeResult;

/// Bytes per entry slot in the transfer resource (one `u32`).
pub(crate) const BYTES_PER_ENTRY: usize = 4;

pub(crate) struct ProbeFrame<B: ProbeBackend> {
    entries: Vec<ProbeResult>,
    readback: B::Readback,
}

impl<B: ProbeBackend> ProbeFrame<B> {
    pub(crate) fn new(backend: &B, max_entries: usize) -> Self {
        let byte_len = (max_entries * BYTES_PER_ENTRY) as u64;
        Self {
            entries: Vec::with_capacity(max_entries),
            readback: backend.create_readback(byte_len),
        }
    }

    pub(crate) fn entries(&self) -> &[ProbeResult] {
        &self.entries
    }

    pub(crate) fn push_entry(&mut self, entry: ProbeResult) {
        self.entries.push(entry);
    }

    pub(crate) fn readback(&self) -> &B::Readback {
        &self.readback
    }

    pub(crate) fn clear_entries(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn destroy(self, backend: &B) {
        backend.destroy_readback(self.readback);
    }
}

/// Free list of pre-sized frames.
pub(crate) struct FramePool<B: ProbeBackend> {
    free: Vec<ProbeFrame<B>>,
}

impl<B: ProbeBackend> FramePool<B> {
    pub(crate) fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Pop a pooled frame, or construct a new one with a freshly allocated
    /// transfer resource if the pool is empty.
    pub(crate) fn acquire(&mut self, backend: &B, max_entries: usize) -> ProbeFrame<B> {
        self.free
            .pop()
            .unwrap_or_else(|| ProbeFrame::new(backend, max_entries))
    }

    /// Return a frame to the pool, dropping its entry handles.
    pub(crate) fn recycle(&mut self, mut frame: ProbeFrame<B>) {
        frame.clear_entries();
        self.free.push(frame);
    }

    pub(crate) fn len(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn destroy(&mut self, backend: &B) {
        for frame in self.free.drain(..) {
            frame.destroy(backend);
        }
    }
}
