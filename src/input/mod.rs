//! Pointer drag handling
//!
//! Dragging suspends drift: while a window is held its velocity is pinned at
//! zero and the integrator is skipped. Releasing the window "tosses" it with a
//! fresh random velocity, independent of how it was moving before the grab.

use log::debug;
use rand::Rng;

use crate::physics::TOSS_SPEED;
use crate::window::{Point, TrackedWindow};

/// Pointer events delivered by the window host, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    /// Primary button pressed inside the window
    Begin { pointer: Point },
    /// Pointer moved while the button is held
    Move { pointer: Point },
    /// Primary button released
    End,
}

/// Start dragging. `top_left` is the window's current screen origin.
pub fn begin_drag(window: &mut TrackedWindow, pointer: Point, top_left: Point) {
    window.drag.is_dragging = true;
    window.drag.offset = pointer - top_left;
    window.drift.velocity_x = 0.0;
    window.drift.velocity_y = 0.0;
    debug!(
        "window {} grabbed at offset ({}, {})",
        window.id(),
        window.drag.offset.x,
        window.drag.offset.y
    );
}

/// Where the window's top-left corner should be for the given pointer, or
/// `None` when the window is not being dragged.
pub fn update_drag(window: &TrackedWindow, pointer: Point) -> Option<Point> {
    window.drag.is_dragging.then(|| pointer - window.drag.offset)
}

/// Release the window and toss it with a random velocity.
pub fn end_drag(window: &mut TrackedWindow) {
    if !window.drag.is_dragging {
        return;
    }
    window.drag.is_dragging = false;
    let vx = window.rng().gen_range(-TOSS_SPEED..=TOSS_SPEED);
    let vy = window.rng().gen_range(-TOSS_SPEED..=TOSS_SPEED);
    window.drift.velocity_x = vx;
    window.drift.velocity_y = vy;
    debug!("window {} tossed at ({:.1}, {:.1})", window.id(), vx, vy);
}
