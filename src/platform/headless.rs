//! In-memory window host
//!
//! Windows are plain rectangles on a virtual screen and surfaces are XRGB
//! framebuffers. Used for `--headless` runs and by the integration tests,
//! which inspect what each window ended up showing.

use log::{debug, warn};
use std::collections::HashMap;

use crate::error::HostError;
use crate::host::{RegionView, WindowHost};
use crate::renderer::blit::stretch_to_xrgb;
use crate::window::{Point, ScreenRect, Size, SurfaceHandle, SurfaceId, WindowId};

#[derive(Debug)]
struct HeadlessWindow {
    title: String,
    rect: ScreenRect,
    surface: SurfaceId,
}

#[derive(Debug)]
struct Framebuffer {
    window: WindowId,
    size: Size,
    pixels: Vec<u32>,
    presents: u64,
}

#[derive(Debug)]
pub struct HeadlessHost {
    screen: Size,
    windows: HashMap<WindowId, HeadlessWindow>,
    surfaces: HashMap<SurfaceId, Framebuffer>,
    next_id: u64,
    released: Vec<SurfaceId>,
    moves: u64,
}

impl HeadlessHost {
    pub fn new(screen: Size) -> Self {
        Self {
            screen,
            windows: HashMap::new(),
            surfaces: HashMap::new(),
            next_id: 1,
            released: Vec::new(),
            moves: 0,
        }
    }

    /// Size of the virtual screen windows live on
    pub fn screen(&self) -> Size {
        self.screen
    }

    /// Create a window and acquire its drawable surface.
    pub fn spawn_window(&mut self, title: &str, rect: ScreenRect) -> (WindowId, SurfaceHandle) {
        let id = WindowId(self.next_id);
        let surface = SurfaceId(self.next_id);
        self.next_id += 1;

        self.windows.insert(
            id,
            HeadlessWindow {
                title: title.to_string(),
                rect,
                surface,
            },
        );
        self.surfaces.insert(
            surface,
            Framebuffer {
                window: id,
                size: rect.size(),
                pixels: vec![0; rect.width as usize * rect.height as usize],
                presents: 0,
            },
        );
        debug!("🪟 Spawned headless window {} '{}' at {:?}", id, title, rect);
        (id, SurfaceHandle::acquired(surface))
    }

    /// Destroy the native window. Its surface stays allocated until released.
    pub fn destroy_window(&mut self, id: WindowId) -> bool {
        self.windows.remove(&id).is_some()
    }

    /// Resize a window in place, as a user dragging its border would
    pub fn resize_window(&mut self, id: WindowId, size: Size) -> bool {
        match self.windows.get_mut(&id) {
            Some(window) => {
                window.rect.width = size.width;
                window.rect.height = size.height;
                true
            }
            None => false,
        }
    }

    pub fn title(&self, id: WindowId) -> Option<&str> {
        self.windows.get(&id).map(|w| w.title.as_str())
    }

    pub fn surface_of(&self, id: WindowId) -> Option<SurfaceId> {
        self.windows.get(&id).map(|w| w.surface)
    }

    /// Current content of a surface, `0x00RRGGBB` per pixel
    pub fn framebuffer(&self, surface: SurfaceId) -> Option<(Size, &[u32])> {
        self.surfaces
            .get(&surface)
            .map(|fb| (fb.size, fb.pixels.as_slice()))
    }

    /// How many times a surface was presented to
    pub fn present_count(&self, surface: SurfaceId) -> u64 {
        self.surfaces.get(&surface).map_or(0, |fb| fb.presents)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Surfaces acquired and not released yet
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Surfaces released so far, in release order
    pub fn released(&self) -> &[SurfaceId] {
        &self.released
    }

    pub fn move_count(&self) -> u64 {
        self.moves
    }

    fn window(&self, id: WindowId) -> Result<&HeadlessWindow, HostError> {
        self.windows.get(&id).ok_or(HostError::StaleWindow(id))
    }
}

impl WindowHost for HeadlessHost {
    fn screen_rect(&self, window: WindowId) -> Result<ScreenRect, HostError> {
        Ok(self.window(window)?.rect)
    }

    fn client_size(&self, window: WindowId) -> Result<Size, HostError> {
        Ok(self.window(window)?.rect.size())
    }

    fn move_window(&mut self, window: WindowId, to: Point) -> Result<(), HostError> {
        let w = self
            .windows
            .get_mut(&window)
            .ok_or(HostError::StaleWindow(window))?;
        w.rect.x = to.x;
        w.rect.y = to.y;
        self.moves += 1;
        Ok(())
    }

    fn blit(
        &mut self,
        surface: &SurfaceHandle,
        source: &RegionView<'_>,
        dest: Size,
    ) -> Result<(), HostError> {
        let fb = self
            .surfaces
            .get_mut(&surface.id())
            .ok_or(HostError::UnknownSurface(surface.id()))?;
        if !self.windows.contains_key(&fb.window) {
            return Err(HostError::StaleWindow(fb.window));
        }
        if dest.is_empty() {
            return Err(HostError::Surface(format!(
                "cannot present to a {}x{} surface",
                dest.width, dest.height
            )));
        }

        if fb.size != dest {
            fb.size = dest;
            fb.pixels = vec![0; dest.width as usize * dest.height as usize];
        }
        stretch_to_xrgb(source, dest, &mut fb.pixels);
        fb.presents += 1;
        Ok(())
    }

    fn release_surface(&mut self, surface: SurfaceHandle) {
        let id = surface.id();
        if self.surfaces.remove(&id).is_none() {
            warn!("Released surface {} that was never acquired", id);
            return;
        }
        self.released.push(id);
    }
}
