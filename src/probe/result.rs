//! Caller-Owned Query Results

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct ResultState {
    normalized_x: f32,
    normalized_y: f32,
    resolved_x: u32,
    resolved_y: u32,
    trivially_rejected: bool,
    value: Option<f32>,
}

/// One pending or answered point query.
///
/// A `ProbeResult` is a cheap-to-clone shared handle: the caller keeps one
/// clone, and while the query is registered the owning frame keeps another
/// so resolution can write back later. There is no explicit cancellation —
/// dropping every clone simply leaves the query harmlessly pending until
/// its frame resolves or is torn down.
///
/// A handle may be re-registered on a later frame; registration resets any
/// previous outcome. Within one registration, [`value`](Self::value) is set
/// at most once, and only after the owning frame's transfer completed. A
/// trivially rejected query is final immediately and never gets a value.
#[derive(Clone, Debug, Default)]
pub struct ProbeResult {
    state: Rc<RefCell<ResultState>>,
}

impl ProbeResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved value in `[0, 1]`, or `None` while pending (or when the
    /// query's frame was discarded, or the query was trivially rejected).
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        self.state.borrow().value
    }

    /// Whether the coordinate fell outside `[-1, 1]` and the query was
    /// answered without any hardware work.
    #[must_use]
    pub fn is_trivially_rejected(&self) -> bool {
        self.state.borrow().trivially_rejected
    }

    /// Whether this query reached a terminal state (value delivered, or
    /// trivially rejected).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        let state = self.state.borrow();
        state.value.is_some() || state.trivially_rejected
    }

    /// The caller-supplied normalized coordinate.
    #[must_use]
    pub fn normalized(&self) -> (f32, f32) {
        let state = self.state.borrow();
        (state.normalized_x, state.normalized_y)
    }

    /// The pixel coordinate in the copy target, computed at submission.
    #[must_use]
    pub fn resolved_pixel(&self) -> (u32, u32) {
        let state = self.state.borrow();
        (state.resolved_x, state.resolved_y)
    }

    /// Reset the handle for a new registration.
    pub(crate) fn begin_request(&self, x: f32, y: f32) {
        let mut state = self.state.borrow_mut();
        state.normalized_x = x;
        state.normalized_y = y;
        state.trivially_rejected = false;
        state.value = None;
    }

    pub(crate) fn mark_trivially_rejected(&self) {
        self.state.borrow_mut().trivially_rejected = true;
    }

    pub(crate) fn set_resolved_pixel(&self, x: u32, y: u32) {
        let mut state = self.state.borrow_mut();
        state.resolved_x = x;
        state.resolved_y = y;
    }

    /// Deliver the raw device value, normalized from the full unsigned
    /// 32-bit range to `[0, 1]`.
    pub(crate) fn resolve(&self, raw: u32) {
        let normalized = (f64::from(raw) / f64::from(u32::MAX)) as f32;
        self.state.borrow_mut().value = Some(normalized);
    }
}
