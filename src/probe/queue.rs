//! Bounded In-Flight Queue
//!
//! Frames that have been submitted to hardware but not yet confirmed
//! complete. The capacity bound is the crate's backpressure mechanism:
//! when the queue is full, new frames are discarded instead of growing
//! the set of live transfer resources.
//!
//! Resolution is strictly FIFO and head-only — a younger frame whose
//! transfer happens to finish early still waits behind the queue head, so
//! entries are never answered out of submission order.

use std::collections::VecDeque;

use crate::backend::ProbeBackend;
use crate::probe::frame::ProbeFrame;

pub(crate) struct InFlightQueue<B: ProbeBackend> {
    frames: VecDeque<ProbeFrame<B>>,
    capacity: usize,
}

impl<B: ProbeBackend> InFlightQueue<B> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    /// Push a submitted frame onto the tail.
    ///
    /// Admission control happens in the manager; pushing past capacity is
    /// a logic error there, not a runtime condition.
    pub(crate) fn push(&mut self, frame: ProbeFrame<B>) {
        debug_assert!(!self.is_full(), "in-flight queue pushed past capacity");
        self.frames.push_back(frame);
    }

    /// The oldest in-flight frame, if any.
    pub(crate) fn head(&self) -> Option<&ProbeFrame<B>> {
        self.frames.front()
    }

    pub(crate) fn pop_head(&mut self) -> Option<ProbeFrame<B>> {
        self.frames.pop_front()
    }
}
