//! Frame compositor
//!
//! Owns the window registry and the CPU copy of the scene and drives one
//! frame end to end, strictly in this order:
//!
//! 1. advance drift, then recompute the viewport, for every window
//! 2. render the scene at its fixed resolution
//! 3. copy the scene target into the staging copy
//! 4. map the staging copy into the CPU pixel buffer
//! 5. blit every dirty window's sub-region onto its surface
//!
//! Physics must settle a window's position before its viewport is computed,
//! otherwise the blit shows last frame's geometry. Nothing that goes wrong
//! inside a frame is fatal: failing windows are skipped, a failed readback
//! skips the blit pass, and everything is retried on the next frame.

use log::{debug, info, warn};
use std::time::Instant;

use crate::error::{HostError, ShatterError};
use crate::host::{SceneBackend, StagingView, WindowHost};
use crate::input::{self, DragEvent};
use crate::physics::{self, DriftOutcome, DriftParams};
use crate::registry::WindowRegistry;
use crate::renderer::blit::PixelBuffer;
use crate::viewport;
use crate::window::{Point, Size, SurfaceHandle, TrackedWindow, WindowId};

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Windows whose velocity was integrated
    pub advanced: usize,
    /// Windows the host was asked to move
    pub moved: usize,
    /// Windows that hit a screen edge
    pub bounced: usize,
    /// Windows skipped because the host no longer knows them
    pub stale: usize,
    /// Viewports recomputed after a geometry change
    pub recomputed: usize,
    /// Successful blits
    pub blitted: usize,
    /// Blits the host refused
    pub blit_failures: usize,
    /// The scene could not be read back; no window was blitted
    pub blit_pass_skipped: bool,
}

/// Drives physics, viewport mapping and blitting for every tracked window
pub struct FrameCompositor {
    registry: WindowRegistry,
    pixels: PixelBuffer,
    screen: Size,
    scene: Size,
    default_params: DriftParams,
    frames: u64,
}

impl FrameCompositor {
    /// `screen` is the virtual desktop size windows drift within, `scene`
    /// the fixed resolution of the shared scene.
    pub fn new(screen: Size, scene: Size, default_params: DriftParams) -> Self {
        info!(
            "🧩 Compositor ready: screen {}x{}, scene {}x{}",
            screen.width, screen.height, scene.width, scene.height
        );
        Self {
            registry: WindowRegistry::new(),
            pixels: PixelBuffer::new(scene),
            screen,
            scene,
            default_params,
            frames: 0,
        }
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn window(&self, id: WindowId) -> Option<&TrackedWindow> {
        self.registry.get(id)
    }

    pub fn screen(&self) -> Size {
        self.screen
    }

    pub fn scene(&self) -> Size {
        self.scene
    }

    /// CPU copy of the last scene readback
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Start tracking a native window and take ownership of its surface.
    ///
    /// A handle that is already registered is refused; the duplicate surface
    /// is released right away so it cannot leak.
    pub fn register<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        id: WindowId,
        surface: SurfaceHandle,
        now: Instant,
    ) -> Result<(), ShatterError> {
        let window = TrackedWindow::new(id, surface, self.default_params, now);
        self.insert(host, window)
    }

    /// Register an already constructed window (e.g. with a fixed seed)
    pub fn insert<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        window: TrackedWindow,
    ) -> Result<(), ShatterError> {
        let id = window.id();
        match self.registry.insert(window) {
            Ok(()) => {
                debug!("➕ Registered window {} ({} tracked)", id, self.registry.len());
                Ok(())
            }
            Err(rejected) => {
                host.release_surface(rejected.into_surface());
                Err(ShatterError::DuplicateWindow(id))
            }
        }
    }

    /// Stop tracking a window and release its surface. Returns whether the
    /// window was tracked.
    pub fn unregister<H: WindowHost + ?Sized>(&mut self, host: &mut H, id: WindowId) -> bool {
        match self.registry.remove(id) {
            Some(window) => {
                host.release_surface(window.into_surface());
                debug!("➖ Unregistered window {} ({} tracked)", id, self.registry.len());
                true
            }
            None => false,
        }
    }

    /// Replace one window's drift parameters
    pub fn set_drift_params(&mut self, id: WindowId, params: DriftParams) -> bool {
        match self.registry.get_mut(id) {
            Some(window) => {
                window.params = params;
                true
            }
            None => false,
        }
    }

    /// Owe a window a fresh blit even though its geometry did not change,
    /// e.g. after the host reports its contents were damaged.
    pub fn invalidate(&mut self, id: WindowId) -> bool {
        match self.registry.get_mut(id) {
            Some(window) => {
                window.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Route a pointer drag event to a window
    pub fn handle_drag<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        id: WindowId,
        event: DragEvent,
    ) -> Result<(), HostError> {
        match event {
            DragEvent::Begin { pointer } => self.begin_drag(host, id, pointer),
            DragEvent::Move { pointer } => self.update_drag(host, id, pointer),
            DragEvent::End => {
                self.end_drag(id);
                Ok(())
            }
        }
    }

    pub fn begin_drag<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        id: WindowId,
        pointer: Point,
    ) -> Result<(), HostError> {
        let Some(window) = self.registry.get_mut(id) else {
            return Ok(());
        };
        let top_left = host.screen_rect(id)?.origin();
        input::begin_drag(window, pointer, top_left);
        Ok(())
    }

    pub fn update_drag<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        id: WindowId,
        pointer: Point,
    ) -> Result<(), HostError> {
        let target = self
            .registry
            .get(id)
            .and_then(|window| input::update_drag(window, pointer));
        match target {
            Some(to) => host.move_window(id, to),
            None => Ok(()),
        }
    }

    pub fn end_drag(&mut self, id: WindowId) {
        if let Some(window) = self.registry.get_mut(id) {
            input::end_drag(window);
        }
    }

    /// Run one complete frame.
    pub fn render_frame<H, B>(&mut self, host: &mut H, backend: &mut B, now: Instant) -> FrameReport
    where
        H: WindowHost + ?Sized,
        B: SceneBackend + ?Sized,
    {
        self.frames += 1;
        let mut report = FrameReport::default();

        self.update_windows(host, now, &mut report);

        if let Err(e) = backend.render_scene() {
            warn!("⚠️ Scene render failed: {}", e);
            report.blit_pass_skipped = true;
            return report;
        }
        if let Err(e) = backend.copy_to_staging() {
            warn!("⚠️ Staging copy failed: {}", e);
            report.blit_pass_skipped = true;
            return report;
        }

        let pixels = &mut self.pixels;
        let mut copied = Ok(());
        let mapped = backend.read_staging(&mut |view: &StagingView<'_>| {
            copied = pixels.copy_from_staging(view);
        });
        if let Err(e) = mapped.and(copied) {
            debug!("Skipping blit pass for frame {}: {}", self.frames, e);
            report.blit_pass_skipped = true;
            return report;
        }

        self.blit_dirty(host, &mut report);

        debug!("frame {}: {:?}", self.frames, report);
        report
    }

    fn update_windows<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: Instant,
        report: &mut FrameReport,
    ) {
        let (screen, scene) = (self.screen, self.scene);

        for window in self.registry.iter_mut() {
            let drifted = physics::advance_drift(window, host, screen, now).and_then(|outcome| {
                match outcome {
                    DriftOutcome::Frozen | DriftOutcome::TooSoon => {}
                    DriftOutcome::Settled { bounced } => {
                        report.advanced += 1;
                        report.bounced += bounced as usize;
                    }
                    DriftOutcome::Moved { bounced, .. } => {
                        report.advanced += 1;
                        report.moved += 1;
                        report.bounced += bounced as usize;
                    }
                }
                viewport::recompute_viewport(window, host, screen, scene)
            });

            match drifted {
                Ok(changed) => {
                    if window.stale {
                        info!("Window {} is reachable again", window.id());
                        window.stale = false;
                    }
                    report.recomputed += changed as usize;
                }
                Err(e) => {
                    if !window.stale {
                        warn!("⚠️ Skipping window {}: {}", window.id(), e);
                        window.stale = true;
                    }
                    report.stale += 1;
                }
            }
        }
    }

    fn blit_dirty<H: WindowHost + ?Sized>(&mut self, host: &mut H, report: &mut FrameReport) {
        for window in self.registry.iter_mut().filter(|w| w.dirty && !w.stale) {
            let Some(region) = window.viewport.scene_region(self.scene) else {
                // Nothing of the scene lies behind this window
                window.dirty = false;
                continue;
            };
            let Some(view) = self.pixels.region(region) else {
                window.dirty = false;
                continue;
            };

            match host.blit(window.surface(), &view, window.client_size) {
                Ok(()) => {
                    window.dirty = false;
                    report.blitted += 1;
                }
                Err(e) => {
                    debug!("Blit to window {} failed: {}", window.id(), e);
                    report.blit_failures += 1;
                }
            }
        }
    }

    /// Release every surface, newest window first. Must run before the
    /// scene backend (and the GPU device behind it) is dropped.
    pub fn teardown<H: WindowHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let mut released = 0;
        for window in self.registry.drain() {
            host.release_surface(window.into_surface());
            released += 1;
        }
        info!("🧹 Released {} window surfaces", released);
        released
    }
}

impl Drop for FrameCompositor {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!(
                "Compositor dropped with {} windows still registered; their surfaces were never released",
                self.registry.len()
            );
        }
    }
}
