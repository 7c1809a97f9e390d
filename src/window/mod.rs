//! Tracked window state
//!
//! A [`TrackedWindow`] is the compositor's view of one native window: the
//! identity it observes (but does not own), the drawable surface it owns
//! until teardown, the last observed geometry, the viewport into the shared
//! scene, and the drift/drag state that moves it around.
//!
//! Every window carries its own seeded RNG so trajectories never fall into
//! lockstep, even when windows are registered within the same frame.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::physics::{DriftParams, INITIAL_SPEED};
use crate::viewport::Viewport;

/// Identity of a native window. The host owns the window's lifetime; the
/// compositor only observes and moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a drawable surface, used by hosts to look up the native
/// resource behind a [`SurfaceHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exclusive ownership of an acquired drawable surface.
///
/// Deliberately neither `Clone` nor `Copy`: the only way to give it up is
/// [`WindowHost::release_surface`](crate::host::WindowHost::release_surface),
/// which consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SurfaceHandle {
    id: SurfaceId,
}

impl SurfaceHandle {
    /// Wrap a freshly acquired surface. Only hosts should call this.
    pub fn acquired(id: SurfaceId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }
}

/// Integer screen point (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Pixel extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Absolute window rectangle on the virtual screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin_and_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Velocity integrator state (pixels/second)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftState {
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub last_update: Instant,
}

impl DriftState {
    pub fn at_rest(now: Instant) -> Self {
        Self {
            velocity_x: 0.0,
            velocity_y: 0.0,
            last_update: now,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity_x.hypot(self.velocity_y)
    }
}

/// Pointer drag state. While `is_dragging` the integrator is frozen and the
/// velocity stays pinned at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DragState {
    pub is_dragging: bool,
    /// Pointer position relative to the window's top-left corner
    pub offset: Point,
}

/// One registered native window
#[derive(Debug)]
pub struct TrackedWindow {
    id: WindowId,
    surface: SurfaceHandle,

    /// Last observed absolute rectangle
    pub screen_rect: ScreenRect,
    /// Last observed client (drawable) size
    pub client_size: Size,
    /// Region of the scene this window displays, normalized to [0,1]
    pub viewport: Viewport,
    /// Rectangle the viewport was last computed from
    pub last_screen_rect: Option<ScreenRect>,
    /// A blit is owed because the viewport changed
    pub dirty: bool,
    /// Set while the host reports the native window as gone
    pub stale: bool,

    pub drift: DriftState,
    pub params: DriftParams,
    pub drag: DragState,

    rng: StdRng,
}

impl TrackedWindow {
    /// Track a window with a generator seeded from the monotonic clock.
    pub fn new(id: WindowId, surface: SurfaceHandle, params: DriftParams, now: Instant) -> Self {
        Self::with_seed(id, surface, params, now, clock_seed(id))
    }

    /// Track a window with an explicit seed. Reproducible trajectories for
    /// tests and benchmarks.
    pub fn with_seed(
        id: WindowId,
        surface: SurfaceHandle,
        params: DriftParams,
        now: Instant,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut drift = DriftState::at_rest(now);
        drift.velocity_x = rng.gen_range(-INITIAL_SPEED..=INITIAL_SPEED);
        drift.velocity_y = rng.gen_range(-INITIAL_SPEED..=INITIAL_SPEED);

        Self {
            id,
            surface,
            screen_rect: ScreenRect::default(),
            client_size: Size::default(),
            viewport: Viewport::default(),
            last_screen_rect: None,
            dirty: true,
            stale: false,
            drift,
            params,
            drag: DragState::default(),
            rng,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Give up the window, handing back the surface so the caller can
    /// release it exactly once.
    pub fn into_surface(self) -> SurfaceHandle {
        self.surface
    }
}

/// Seed sampled from the high-resolution clock, mixed with the window
/// identity so two windows registered in the same clock tick still diverge.
///
/// The wall clock gives an absolute sample that differs between launches;
/// thread-local entropy covers clocks too coarse to tell runs apart.
pub fn clock_seed(id: WindowId) -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    let monotonic = epoch.elapsed().as_nanos() as u64;
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_nanos() as u64);

    let sample = wall ^ monotonic.rotate_left(32) ^ rand::random::<u64>();
    sample ^ id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
