//! # Shatter
//!
//! One scene, many windows. Shatter renders a single fixed-resolution scene
//! off-screen and shows each native window the part of the scene that lies
//! behind it on the desktop, as if the windows were holes cut into one big
//! picture. The windows drift around the screen on their own, bounce off its
//! edges and can be grabbed and tossed with the mouse.
//!
//! ## Architecture
//!
//! - `window`: identities, geometry and per-window state
//! - `physics`: the drift integrator and edge bouncing
//! - `input`: pointer drag and toss
//! - `viewport`: screen rectangle to scene viewport mapping
//! - `registry`: the set of tracked windows
//! - `host`: traits for the window host and the scene backend
//! - `compositor`: the per-frame pipeline tying everything together
//! - `renderer`: wgpu scene renderer, CPU readback and blit, frame pacing
//! - `platform`: winit/softbuffer and in-memory window hosts
//! - `config`: TOML configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use shatter::{FrameCompositor, HeadlessHost, SceneImage, SceneRenderer, ShatterConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ShatterConfig::default();
//!     let scene = config.scene.size();
//!     let mut renderer = SceneRenderer::new(
//!         scene,
//!         wgpu::Backends::all(),
//!         config.scene.clear_color,
//!         &SceneImage::placeholder(),
//!     )?;
//!     let mut host = HeadlessHost::new(scene);
//!     let mut compositor = FrameCompositor::new(scene, scene, config.drift);
//!
//!     let (id, surface) = host.spawn_window("Shard 1", config.layout.window_rect(0));
//!     compositor.register(&mut host, id, surface, Instant::now())?;
//!
//!     let report = compositor.render_frame(&mut host, &mut renderer, Instant::now());
//!     println!("{:?}", report);
//!
//!     compositor.teardown(&mut host);
//!     Ok(())
//! }
//! ```

pub mod compositor;
pub mod config;
pub mod error;
pub mod host;
pub mod input;
pub mod physics;
pub mod platform;
pub mod registry;
pub mod renderer;
pub mod viewport;
pub mod window;

// Re-export main types for easy access
pub use compositor::{FrameCompositor, FrameReport};
pub use config::ShatterConfig;
pub use error::{HostError, ShatterError};
pub use host::{RegionView, SceneBackend, StagingView, WindowHost};
pub use input::DragEvent;
pub use physics::DriftParams;
pub use platform::{HeadlessHost, WinitHost};
pub use renderer::{FramePacer, PixelBuffer, SceneImage, SceneRenderer};
pub use viewport::{SceneRegion, Viewport};
pub use window::{Point, ScreenRect, Size, SurfaceHandle, SurfaceId, TrackedWindow, WindowId};

/// Version information for Shatter
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
