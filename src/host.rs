//! Contracts with the collaborators the compositor does not own
//!
//! - [`WindowHost`] creates native windows, reports their geometry, moves
//!   them, and presents pixels on their drawable surfaces.
//! - [`SceneBackend`] renders the shared scene at a fixed resolution and
//!   makes a CPU-readable copy of it available.
//!
//! Both are called from the single compositing thread only.

use crate::error::{HostError, ShatterError};
use crate::window::{Point, ScreenRect, Size, SurfaceHandle, WindowId};

/// Native window operations needed by the compositor
pub trait WindowHost {
    /// Absolute rectangle of the window on the virtual screen
    fn screen_rect(&self, window: WindowId) -> Result<ScreenRect, HostError>;

    /// Drawable (client) area size
    fn client_size(&self, window: WindowId) -> Result<Size, HostError>;

    /// Move the window's top-left corner without resizing it, changing its
    /// z-order or taking focus.
    fn move_window(&mut self, window: WindowId, to: Point) -> Result<(), HostError>;

    /// Present `source` on the surface, scaled to `dest` pixels.
    fn blit(
        &mut self,
        surface: &SurfaceHandle,
        source: &RegionView<'_>,
        dest: Size,
    ) -> Result<(), HostError>;

    /// Give the surface back. Consumes the handle, so a surface can only be
    /// released once.
    fn release_surface(&mut self, surface: SurfaceHandle);
}

/// Fixed-resolution scene renderer with a CPU readback path
pub trait SceneBackend {
    /// Resolution of the scene target
    fn scene_size(&self) -> Size;

    /// Draw the scene into the GPU-resident target.
    fn render_scene(&mut self) -> Result<(), ShatterError>;

    /// Copy the scene target into the CPU-readable staging copy.
    fn copy_to_staging(&mut self) -> Result<(), ShatterError>;

    /// Map the staging copy, hand it to `sink`, and unmap it again. Rows in
    /// the view may be padded beyond `width * 4` bytes.
    fn read_staging(&mut self, sink: &mut dyn FnMut(&StagingView<'_>)) -> Result<(), ShatterError>;
}

/// Mapped staging memory. RGBA8, `stride` bytes per row.
#[derive(Debug, Clone, Copy)]
pub struct StagingView<'a> {
    pub bytes: &'a [u8],
    pub stride: usize,
    pub width: u32,
    pub height: u32,
}

impl<'a> StagingView<'a> {
    /// Tightly packed bytes of one row
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.bytes.get(start..start + self.width as usize * 4)
    }
}

/// Borrowed RGBA8 sub-rectangle of a larger pixel buffer
#[derive(Debug, Clone, Copy)]
pub struct RegionView<'a> {
    pub pixels: &'a [u8],
    /// Bytes per row of the underlying buffer
    pub stride: usize,
    /// Byte offset of the region's first pixel
    pub offset: usize,
    pub width: u32,
    pub height: u32,
}

impl<'a> RegionView<'a> {
    /// RGBA of the pixel at (x, y) within the region
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset + y as usize * self.stride + x as usize * 4;
        match self.pixels.get(i..i + 4) {
            Some(p) => [p[0], p[1], p[2], p[3]],
            None => [0, 0, 0, 0],
        }
    }

    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = self.offset + y as usize * self.stride;
        self.pixels.get(start..start + self.width as usize * 4)
    }
}
