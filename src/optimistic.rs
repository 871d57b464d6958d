//! Client-side contract for optimistic like/follow toggles.
//!
//! A toggle flips its displayed state and counter immediately, issues the
//! mutation, and reverts to the pre-toggle snapshot when the mutation
//! fails. While a request is in flight, further toggles on the same
//! resource are suppressed so interleaved requests cannot corrupt the
//! displayed counts. Pure state machine, no I/O.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Idle,
    Pending,
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct OptimisticToggle {
    state: ToggleState,
    active: bool,
    count: i64,
    snapshot: Option<(bool, i64)>,
}

impl OptimisticToggle {
    pub fn new(active: bool, count: i64) -> Self {
        Self {
            state: ToggleState::Idle,
            active,
            count,
            snapshot: None,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    /// Whether the resource is currently shown as liked/followed.
    pub fn active(&self) -> bool {
        self.active
    }

    /// The displayed counter (like count, follower count).
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Apply the toggle locally and enter Pending. Returns false when a
    /// request is already in flight; the caller must not issue another
    /// mutation in that case.
    pub fn begin(&mut self) -> bool {
        if self.state == ToggleState::Pending {
            return false;
        }
        self.snapshot = Some((self.active, self.count));
        self.active = !self.active;
        self.count += if self.active { 1 } else { -1 };
        self.state = ToggleState::Pending;
        true
    }

    /// The mutation succeeded; the optimistic state becomes the real one.
    pub fn commit(&mut self) {
        self.snapshot = None;
        self.state = ToggleState::Idle;
    }

    /// The mutation failed; restore the pre-toggle snapshot.
    pub fn rollback(&mut self) {
        if let Some((active, count)) = self.snapshot.take() {
            self.active = active;
            self.count = count;
        }
        self.state = ToggleState::RolledBack;
    }
}

/// One toggle per resource id, so concurrent toggles on different posts
/// proceed independently while repeats on the same post are serialized.
#[derive(Debug, Default)]
pub struct ToggleRegistry {
    toggles: HashMap<String, OptimisticToggle>,
}

impl ToggleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a toggle for `resource_id`, seeding from the given server
    /// state on first touch. Returns false when suppressed.
    pub fn begin(&mut self, resource_id: &str, active: bool, count: i64) -> bool {
        self.toggles
            .entry(resource_id.to_string())
            .or_insert_with(|| OptimisticToggle::new(active, count))
            .begin()
    }

    pub fn commit(&mut self, resource_id: &str) {
        if let Some(toggle) = self.toggles.get_mut(resource_id) {
            toggle.commit();
        }
    }

    pub fn rollback(&mut self, resource_id: &str) {
        if let Some(toggle) = self.toggles.get_mut(resource_id) {
            toggle.rollback();
        }
    }

    pub fn get(&self, resource_id: &str) -> Option<&OptimisticToggle> {
        self.toggles.get(resource_id)
    }
}
