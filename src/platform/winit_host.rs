//! Native window host: winit windows with softbuffer surfaces
//!
//! Every shard is a fixed-size winit window whose client
//! area is a CPU surface. Scene regions are scaled straight into the surface
//! buffer as `0x00RRGGBB` and presented.
//!
//! Windows are sized by their client area: a layout rect of 400x300 yields a
//! 400x300 drawable surface, and the window manager's frame is added around
//! it. `WindowBuilder` has no outer-size setter, so the outer rect reported by
//! [`WindowHost::screen_rect`] is larger than the layout cell by the
//! decorations. Drift bounds and viewports pair the outer origin with the
//! client size, so a frame may overhang the screen edge by its border width.
//!
//! Absolute window positions are not available on every platform (Wayland
//! refuses them); there every geometry query reports
//! [`HostError::Unsupported`] and the compositor skips the window. The binary
//! forces X11 on Linux and refuses to start when positions are still hidden.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::rc::Rc;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::EventLoopWindowTarget;
use winit::window::{Window, WindowBuilder};

use crate::error::HostError;
use crate::host::{RegionView, WindowHost};
use crate::renderer::blit::stretch_to_xrgb;
use crate::window::{Point, ScreenRect, Size, SurfaceHandle, SurfaceId, WindowId};

type NativeId = winit::window::WindowId;

struct NativeSurface {
    window: WindowId,
    // The context must outlive the surface created from it
    surface: softbuffer::Surface<Rc<Window>, Rc<Window>>,
    _context: softbuffer::Context<Rc<Window>>,
    size: Option<Size>,
}

pub struct WinitHost {
    windows: HashMap<WindowId, Rc<Window>>,
    native: HashMap<NativeId, WindowId>,
    surfaces: HashMap<SurfaceId, NativeSurface>,
    cursors: HashMap<WindowId, PhysicalPosition<f64>>,
    next_id: u64,
}

impl Default for WinitHost {
    fn default() -> Self {
        Self::new()
    }
}

impl WinitHost {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            native: HashMap::new(),
            surfaces: HashMap::new(),
            cursors: HashMap::new(),
            next_id: 1,
        }
    }

    /// Size of the primary monitor, which is the area shards drift within
    pub fn virtual_screen<T>(elwt: &EventLoopWindowTarget<T>) -> Option<Size> {
        let monitor = elwt
            .primary_monitor()
            .or_else(|| elwt.available_monitors().next())?;
        let size = monitor.size();
        info!(
            "🖥️ Virtual screen {}x{} ({})",
            size.width,
            size.height,
            monitor.name().unwrap_or_else(|| "unnamed monitor".to_string())
        );
        Some(Size::new(size.width, size.height))
    }

    /// Open a window at `rect` and acquire its drawable surface. `rect` is
    /// the client area; the frame sits outside it.
    pub fn spawn_window<T>(
        &mut self,
        elwt: &EventLoopWindowTarget<T>,
        title: &str,
        rect: ScreenRect,
    ) -> Result<(WindowId, SurfaceHandle), HostError> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(rect.width, rect.height))
            .with_position(PhysicalPosition::new(rect.x, rect.y))
            .with_resizable(false)
            .build(elwt)
            .map_err(|e| HostError::Surface(format!("failed to create window: {}", e)))?;
        let window = Rc::new(window);

        let context = softbuffer::Context::new(window.clone())
            .map_err(|e| HostError::Surface(format!("softbuffer context: {}", e)))?;
        let surface = softbuffer::Surface::new(&context, window.clone())
            .map_err(|e| HostError::Surface(format!("softbuffer surface: {}", e)))?;

        let id = WindowId(self.next_id);
        let surface_id = SurfaceId(self.next_id);
        self.next_id += 1;

        self.native.insert(window.id(), id);
        self.windows.insert(id, window);
        self.surfaces.insert(
            surface_id,
            NativeSurface {
                window: id,
                surface,
                _context: context,
                size: None,
            },
        );

        debug!("🪟 Opened window {} '{}' at {:?}", id, title, rect);
        Ok((id, SurfaceHandle::acquired(surface_id)))
    }

    /// Compositor handle of a native window
    pub fn lookup(&self, native: NativeId) -> Option<WindowId> {
        self.native.get(&native).copied()
    }

    /// Forget a window the user closed. The native window is destroyed once
    /// its surface is released too.
    pub fn forget_window(&mut self, native: NativeId) -> Option<WindowId> {
        let id = self.native.remove(&native)?;
        self.windows.remove(&id);
        self.cursors.remove(&id);
        Some(id)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Record the pointer position (client coordinates) and return it in
    /// screen coordinates.
    pub fn cursor_moved(&mut self, id: WindowId, position: PhysicalPosition<f64>) -> Option<Point> {
        self.cursors.insert(id, position);
        self.cursor_on_screen(id)
    }

    /// Last known pointer position over `id`, in screen coordinates
    pub fn cursor_on_screen(&self, id: WindowId) -> Option<Point> {
        let cursor = self.cursors.get(&id)?;
        let inner = self.windows.get(&id)?.inner_position().ok()?;
        Some(Point::new(
            inner.x + cursor.x.floor() as i32,
            inner.y + cursor.y.floor() as i32,
        ))
    }

    fn window(&self, id: WindowId) -> Result<&Rc<Window>, HostError> {
        self.windows.get(&id).ok_or(HostError::StaleWindow(id))
    }
}

impl WindowHost for WinitHost {
    fn screen_rect(&self, window: WindowId) -> Result<ScreenRect, HostError> {
        let w = self.window(window)?;
        let origin = w
            .outer_position()
            .map_err(|_| HostError::Unsupported("absolute window positions"))?;
        let size = w.outer_size();
        Ok(ScreenRect::new(origin.x, origin.y, size.width, size.height))
    }

    fn client_size(&self, window: WindowId) -> Result<Size, HostError> {
        let size = self.window(window)?.inner_size();
        Ok(Size::new(size.width, size.height))
    }

    fn move_window(&mut self, window: WindowId, to: Point) -> Result<(), HostError> {
        self.window(window)?
            .set_outer_position(PhysicalPosition::new(to.x, to.y));
        Ok(())
    }

    fn blit(
        &mut self,
        surface: &SurfaceHandle,
        source: &RegionView<'_>,
        dest: Size,
    ) -> Result<(), HostError> {
        let native = self
            .surfaces
            .get_mut(&surface.id())
            .ok_or(HostError::UnknownSurface(surface.id()))?;
        if !self.windows.contains_key(&native.window) {
            return Err(HostError::StaleWindow(native.window));
        }

        if native.size != Some(dest) {
            let (Some(width), Some(height)) =
                (NonZeroU32::new(dest.width), NonZeroU32::new(dest.height))
            else {
                return Err(HostError::Surface(format!(
                    "cannot present to a {}x{} surface",
                    dest.width, dest.height
                )));
            };
            native
                .surface
                .resize(width, height)
                .map_err(|e| HostError::Surface(e.to_string()))?;
            native.size = Some(dest);
        }

        let mut buffer = native
            .surface
            .buffer_mut()
            .map_err(|e| HostError::Surface(e.to_string()))?;
        stretch_to_xrgb(source, dest, &mut buffer);
        buffer
            .present()
            .map_err(|e| HostError::Surface(e.to_string()))?;
        Ok(())
    }

    fn release_surface(&mut self, surface: SurfaceHandle) {
        match self.surfaces.remove(&surface.id()) {
            Some(native) => debug!("Released surface {} of window {}", surface.id(), native.window),
            None => warn!("Released surface {} that was never acquired", surface.id()),
        }
    }
}
