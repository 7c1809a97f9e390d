//! CPU side of the per-window blit
//!
//! The scene readback lands in a tightly packed [`PixelBuffer`]; each dirty
//! window then gets a [`RegionView`] into it, which hosts scale onto their
//! native surface with [`stretch_to_xrgb`].

use crate::error::ShatterError;
use crate::host::{RegionView, StagingView};
use crate::viewport::SceneRegion;
use crate::window::Size;

/// Tightly packed RGBA8 copy of the scene
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    size: Size,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            data: vec![0; size.width as usize * size.height as usize * 4],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn stride(&self) -> usize {
        self.size.width as usize * 4
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the mapped staging memory scanline by scanline, honoring its
    /// row stride.
    pub fn copy_from_staging(&mut self, view: &StagingView<'_>) -> Result<(), ShatterError> {
        if view.width != self.size.width || view.height != self.size.height {
            return Err(ShatterError::SceneSize {
                expected: (self.size.width, self.size.height),
                actual: (view.width, view.height),
            });
        }

        let row_bytes = self.stride();
        for y in 0..self.size.height {
            let src = view.row(y).ok_or_else(|| {
                ShatterError::StagingMap(format!(
                    "row {} out of range (stride {}, {} bytes mapped)",
                    y,
                    view.stride,
                    view.bytes.len()
                ))
            })?;
            let start = y as usize * row_bytes;
            self.data[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    /// Borrow a sub-rectangle; `None` if it does not fit.
    pub fn region(&self, region: SceneRegion) -> Option<RegionView<'_>> {
        if region.width == 0
            || region.height == 0
            || region.x + region.width > self.size.width
            || region.y + region.height > self.size.height
        {
            return None;
        }
        Some(RegionView {
            pixels: &self.data,
            stride: self.stride(),
            offset: region.y as usize * self.stride() + region.x as usize * 4,
            width: region.width,
            height: region.height,
        })
    }
}

/// Pack an RGBA pixel as `0x00RRGGBB`
#[inline]
pub fn xrgb([r, g, b, _]: [u8; 4]) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Nearest-neighbour scale `source` into a `dest`-sized XRGB buffer.
pub fn stretch_to_xrgb(source: &RegionView<'_>, dest: Size, out: &mut [u32]) {
    if source.width == 0 || source.height == 0 || dest.is_empty() {
        return;
    }
    let dw = dest.width as usize;
    let dh = dest.height as usize;
    let sw = source.width as usize;
    let sh = source.height as usize;

    for (dy, line) in out.chunks_exact_mut(dw).take(dh).enumerate() {
        let sy = (dy * sh / dh) as u32;
        let Some(row) = source.row(sy) else {
            continue;
        };
        for (dx, px) in line.iter_mut().enumerate() {
            let sx = dx * sw / dw * 4;
            *px = xrgb([row[sx], row[sx + 1], row[sx + 2], row[sx + 3]]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(size: Size, stride: usize) -> Vec<u8> {
        let mut bytes = vec![0xAB; stride * size.height as usize];
        for y in 0..size.height as usize {
            for x in 0..size.width as usize {
                let i = y * stride + x * 4;
                bytes[i..i + 4].copy_from_slice(&[x as u8, y as u8, 7, 255]);
            }
        }
        bytes
    }

    #[test]
    fn test_copy_from_padded_staging() {
        let size = Size::new(3, 2);
        let bytes = gradient(size, 256);
        let view = StagingView {
            bytes: &bytes,
            stride: 256,
            width: 3,
            height: 2,
        };
        let mut buffer = PixelBuffer::new(size);
        buffer.copy_from_staging(&view).unwrap();

        assert_eq!(buffer.as_bytes().len(), 24);
        assert_eq!(&buffer.as_bytes()[12..16], &[0, 1, 7, 255]);
        assert!(!buffer.as_bytes().contains(&0xAB));
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let bytes = gradient(Size::new(2, 2), 8);
        let view = StagingView {
            bytes: &bytes,
            stride: 8,
            width: 2,
            height: 2,
        };
        let mut buffer = PixelBuffer::new(Size::new(3, 2));
        assert!(matches!(
            buffer.copy_from_staging(&view),
            Err(ShatterError::SceneSize { .. })
        ));
    }

    #[test]
    fn test_truncated_staging_is_an_error() {
        let bytes = vec![0u8; 20];
        let view = StagingView {
            bytes: &bytes,
            stride: 12,
            width: 3,
            height: 2,
        };
        let mut buffer = PixelBuffer::new(Size::new(3, 2));
        assert!(matches!(
            buffer.copy_from_staging(&view),
            Err(ShatterError::StagingMap(_))
        ));
    }

    #[test]
    fn test_region_bounds() {
        let buffer = PixelBuffer::new(Size::new(4, 4));
        let inside = SceneRegion { x: 1, y: 1, width: 3, height: 3 };
        let outside = SceneRegion { x: 2, y: 2, width: 3, height: 1 };
        assert!(buffer.region(inside).is_some());
        assert!(buffer.region(outside).is_none());
    }

    #[test]
    fn test_stretch_doubles_pixels() {
        let size = Size::new(2, 1);
        let bytes = vec![255, 0, 0, 255, 0, 0, 255, 255];
        let view = RegionView {
            pixels: &bytes,
            stride: 8,
            offset: 0,
            width: size.width,
            height: size.height,
        };
        let mut out = vec![0u32; 8];
        stretch_to_xrgb(&view, Size::new(4, 2), &mut out);
        assert_eq!(
            out,
            vec![
                0xFF0000, 0xFF0000, 0x0000FF, 0x0000FF, //
                0xFF0000, 0xFF0000, 0x0000FF, 0x0000FF,
            ]
        );
    }

    #[test]
    fn test_stretch_shrinks_region() {
        let size = Size::new(4, 4);
        let bytes = gradient(size, 16);
        let view = RegionView {
            pixels: &bytes,
            stride: 16,
            offset: 0,
            width: 4,
            height: 4,
        };
        let mut out = vec![0u32; 4];
        stretch_to_xrgb(&view, Size::new(2, 2), &mut out);
        assert_eq!(out[0], xrgb([0, 0, 7, 255]));
        assert_eq!(out[3], xrgb([2, 2, 7, 255]));
    }
}
