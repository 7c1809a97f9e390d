//! Set of tracked windows
//!
//! Window handles are unique keys. Lookups are linear scans: the compositor
//! tracks tens of windows, and insertion order doubles as the per-frame
//! processing order.

use crate::window::{TrackedWindow, WindowId};

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: Vec<TrackedWindow>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a window. A window whose handle is already registered is handed
    /// back untouched so its surface can be released by the caller.
    pub fn insert(&mut self, window: TrackedWindow) -> Result<(), TrackedWindow> {
        if self.contains(window.id()) {
            return Err(window);
        }
        self.windows.push(window);
        Ok(())
    }

    pub fn remove(&mut self, id: WindowId) -> Option<TrackedWindow> {
        let index = self.windows.iter().position(|w| w.id() == id)?;
        Some(self.windows.remove(index))
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.iter().any(|w| w.id() == id)
    }

    pub fn get(&self, id: WindowId) -> Option<&TrackedWindow> {
        self.windows.iter().find(|w| w.id() == id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut TrackedWindow> {
        self.windows.iter_mut().find(|w| w.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedWindow> {
        self.windows.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedWindow> {
        self.windows.iter_mut()
    }

    /// Windows the host has reported as gone and that nobody removed yet
    pub fn stale(&self) -> impl Iterator<Item = &TrackedWindow> {
        self.windows.iter().filter(|w| w.stale)
    }

    /// Remove every window, newest first
    pub fn drain(&mut self) -> impl Iterator<Item = TrackedWindow> + '_ {
        self.windows.drain(..).rev()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
