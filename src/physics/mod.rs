//! Autonomous window drift
//!
//! Each frame every window that is not being dragged is advanced by a small,
//! frame-rate independent integrator:
//!
//! 1. gravity adds `acceleration * dt` to the vertical velocity
//! 2. wander adds an independent uniform impulse in `[-1, 1] * wander_strength * dt`
//!    to each axis, drawn from the window's own RNG
//! 3. the speed is capped at `target_velocity`, preserving direction
//! 4. exponential drag scales both components by `drag`
//! 5. the window is moved by `velocity * dt` (truncated to whole pixels) and
//!    bounced off the virtual screen edges, losing energy on each bounce
//!
//! `dt` is clamped to 16 ms so a frame hitch cannot fling a window across the
//! screen, and steps shorter than 1 ms are skipped entirely.

use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::HostError;
use crate::host::WindowHost;
use crate::window::{DriftState, Point, Size, TrackedWindow};

/// Longest step the integrator will take (~60 Hz)
pub const MAX_STEP: Duration = Duration::from_millis(16);

/// Steps shorter than this are treated as jitter and ignored
pub const MIN_STEP: Duration = Duration::from_millis(1);

/// Per-axis range of the random velocity given at registration (px/s)
pub const INITIAL_SPEED: f32 = 50.0;

/// Per-axis range of the random velocity given when a drag is released (px/s)
pub const TOSS_SPEED: f32 = 100.0;

/// Per-axis range of the random perturbation added after a bounce (px/s)
pub const BOUNCE_JITTER: f32 = 30.0;

/// Tunables of the drift integrator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    /// Gravity (px/s²) added to the vertical velocity
    pub acceleration: f32,

    /// Per-step velocity damping factor, in (0, 1]
    pub drag: f32,

    /// Fraction of the normal velocity kept after hitting an edge
    pub bounce_energy: f32,

    /// Scale of the random wander impulse (px/s²)
    pub wander_strength: f32,

    /// Speed cap (px/s)
    pub target_velocity: f32,

    pub enable_gravity: bool,

    pub enable_wander: bool,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            acceleration: 50.0,
            drag: 0.98,
            bounce_energy: 0.8,
            wander_strength: 2000.0,
            target_velocity: 100.0,
            enable_gravity: true,
            enable_wander: true,
        }
    }
}

/// Which axes hit an edge during bound resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BounceAxes {
    pub x: bool,
    pub y: bool,
}

impl BounceAxes {
    pub fn any(&self) -> bool {
        self.x || self.y
    }
}

/// Result of one [`advance_drift`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftOutcome {
    /// The window is being dragged; nothing was touched
    Frozen,
    /// Less than [`MIN_STEP`] elapsed since the last update
    TooSoon,
    /// Velocity advanced but the window stays on the same pixel
    Settled { bounced: bool },
    /// The host was asked to move the window
    Moved { to: Point, bounced: bool },
}

impl DriftState {
    /// Consume the time elapsed since the last update. Returns the clamped
    /// step in seconds, or `None` when the step is too short to integrate.
    pub fn take_step(&mut self, now: Instant) -> Option<f32> {
        let elapsed = now.saturating_duration_since(self.last_update);
        self.last_update = now;

        let dt = elapsed.min(MAX_STEP);
        if dt < MIN_STEP {
            return None;
        }
        Some(dt.as_secs_f32())
    }

    /// Advance the velocity by one step of `dt` seconds.
    pub fn integrate<R: Rng + ?Sized>(&mut self, params: &DriftParams, rng: &mut R, dt: f32) {
        if params.enable_gravity {
            self.velocity_y += params.acceleration * dt;
        }

        if params.enable_wander {
            self.velocity_x += rng.gen_range(-1.0f32..=1.0) * params.wander_strength * dt;
            self.velocity_y += rng.gen_range(-1.0f32..=1.0) * params.wander_strength * dt;
        }

        let speed = self.speed();
        if speed > params.target_velocity {
            let scale = params.target_velocity / speed;
            self.velocity_x *= scale;
            self.velocity_y *= scale;
        }

        self.velocity_x *= params.drag;
        self.velocity_y *= params.drag;
    }

    /// Reflect the velocity on the axes that hit an edge and add a small
    /// random perturbation to both axes so bounces never settle into a
    /// periodic orbit.
    pub fn bounce<R: Rng + ?Sized>(&mut self, axes: BounceAxes, params: &DriftParams, rng: &mut R) {
        if !axes.any() {
            return;
        }
        if axes.x {
            self.velocity_x = -self.velocity_x * params.bounce_energy;
        }
        if axes.y {
            self.velocity_y = -self.velocity_y * params.bounce_energy;
        }
        self.velocity_x += rng.gen_range(-BOUNCE_JITTER..=BOUNCE_JITTER);
        self.velocity_y += rng.gen_range(-BOUNCE_JITTER..=BOUNCE_JITTER);
    }

    /// Position after travelling at the current velocity for `dt` seconds,
    /// truncated to whole pixels.
    pub fn displace(&self, from: Point, dt: f32) -> Point {
        Point::new(
            from.x + (self.velocity_x * dt) as i32,
            from.y + (self.velocity_y * dt) as i32,
        )
    }
}

/// Clamp a candidate top-left so a window of `size` stays inside
/// `(0,0)-(screen.width, screen.height)`.
pub fn resolve_bounds(candidate: Point, size: Size, screen: Size) -> (Point, BounceAxes) {
    let mut resolved = candidate;
    let mut axes = BounceAxes::default();

    let max_x = screen.width as i32 - size.width as i32;
    let max_y = screen.height as i32 - size.height as i32;

    if candidate.x < 0 {
        resolved.x = 0;
        axes.x = true;
    } else if candidate.x > max_x {
        resolved.x = max_x;
        axes.x = true;
    }

    if candidate.y < 0 {
        resolved.y = 0;
        axes.y = true;
    } else if candidate.y > max_y {
        resolved.y = max_y;
        axes.y = true;
    }

    (resolved, axes)
}

/// Advance one window's drift and move it on screen.
///
/// A host failure (the native window vanished) is returned untouched so the
/// caller can skip this window for the frame; the velocity is not modified in
/// that case.
pub fn advance_drift<H: WindowHost + ?Sized>(
    window: &mut TrackedWindow,
    host: &mut H,
    screen: Size,
    now: Instant,
) -> Result<DriftOutcome, HostError> {
    if window.drag.is_dragging {
        return Ok(DriftOutcome::Frozen);
    }

    let Some(dt) = window.drift.take_step(now) else {
        return Ok(DriftOutcome::TooSoon);
    };

    let id = window.id();
    let current = host.screen_rect(id)?.origin();
    let size = host.client_size(id)?;

    let params = window.params;
    let mut drift = window.drift;
    drift.integrate(&params, window.rng(), dt);

    let candidate = drift.displace(current, dt);
    let (target, axes) = resolve_bounds(candidate, size, screen);
    drift.bounce(axes, &params, window.rng());

    if axes.any() {
        trace!(
            "window {} bounced (x={}, y={}) -> v=({:.1}, {:.1})",
            id,
            axes.x,
            axes.y,
            drift.velocity_x,
            drift.velocity_y
        );
    }

    if target == current {
        window.drift = drift;
        return Ok(DriftOutcome::Settled {
            bounced: axes.any(),
        });
    }

    host.move_window(id, target)?;
    window.drift = drift;
    debug!("window {} drifted to ({}, {})", id, target.x, target.y);
    Ok(DriftOutcome::Moved {
        to: target,
        bounced: axes.any(),
    })
}
