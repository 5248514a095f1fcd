//! Connectivity and visibility tracking.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{ConnectivityState, Visibility};

/// Tracks host-reported connectivity and page visibility.
///
/// Setters return whether the change calls for an immediate flush: a
/// transition to online, or to visible while online. Re-asserting the
/// current state is not a transition and never triggers anything.
/// Starts online and visible.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: Mutex<MonitorState>,
}

#[derive(Debug, Clone, Copy)]
struct MonitorState {
    connectivity: ConnectivityState,
    visibility: Visibility,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                connectivity: ConnectivityState::Online,
                visibility: Visibility::Visible,
            }),
        }
    }

    /// Record an online signal. True when this was an offline-to-online
    /// transition, i.e. a flush is due.
    pub fn set_online(&self) -> bool {
        let mut state = self.lock();
        let was_offline = state.connectivity == ConnectivityState::Offline;
        state.connectivity = ConnectivityState::Online;
        was_offline
    }

    /// Record an offline signal. True when the state actually changed.
    /// Going offline never triggers a flush.
    pub fn set_offline(&self) -> bool {
        let mut state = self.lock();
        let was_online = state.connectivity == ConnectivityState::Online;
        state.connectivity = ConnectivityState::Offline;
        was_online
    }

    /// Record a visibility signal. True when the page just became visible
    /// while online, i.e. a flush is due.
    pub fn set_visibility(&self, visibility: Visibility) -> bool {
        let mut state = self.lock();
        let was_hidden = state.visibility == Visibility::Hidden;
        state.visibility = visibility;
        visibility == Visibility::Visible
            && was_hidden
            && state.connectivity == ConnectivityState::Online
    }

    pub fn is_online(&self) -> bool {
        self.lock().connectivity == ConnectivityState::Online
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.lock().connectivity
    }

    pub fn visibility(&self) -> Visibility {
        self.lock().visibility
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
