//! Scene image: decoded PNG or procedural placeholder
//!
//! The renderer samples one RGBA8 image stretched across the whole scene. A
//! missing or undecodable file is not an error for the application: it falls
//! back to a generated test pattern.

use log::{info, warn};
use std::fs::File;
use std::path::Path;

use crate::error::{Result, ShatterError};

/// Side length of the generated placeholder
pub const PLACEHOLDER_SIZE: u32 = 512;

const CHECKER_CELL: u32 = 32;
const CHECKER_BOOST: u8 = 50;
const DISC_COUNT: u32 = 5;
const DISC_RADIUS: f32 = 30.0;

/// Tightly packed RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl SceneImage {
    /// Decode a PNG file into RGBA8. Palette, low bit depth and 16-bit
    /// images are normalized; gray and RGB images get an opaque alpha.
    pub fn load_png(path: &Path) -> Result<Self> {
        let mut decoder = png::Decoder::new(File::open(path)?);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        buf.truncate(info.buffer_size());

        if info.bit_depth != png::BitDepth::Eight {
            return Err(ShatterError::UnsupportedImage(format!(
                "{:?} bit depth",
                info.bit_depth
            )));
        }

        let rgba = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            other => {
                return Err(ShatterError::UnsupportedImage(format!(
                    "{:?} color type",
                    other
                )))
            }
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            rgba,
        })
    }

    /// Generated test pattern: a color gradient with a brightened checker
    /// overlay and a few solid discs.
    pub fn placeholder() -> Self {
        let (w, h) = (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);

        for y in 0..h {
            for x in 0..w {
                let fx = x as f32 / w as f32;
                let fy = y as f32 / h as f32;
                let mut r = (fx * 255.0) as u8;
                let mut g = (fy * 255.0) as u8;
                let mut b = ((1.0 - fx) * 255.0) as u8;

                if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
                    r = r.saturating_add(CHECKER_BOOST);
                    g = g.saturating_add(CHECKER_BOOST);
                    b = b.saturating_add(CHECKER_BOOST);
                }

                for i in 0..DISC_COUNT {
                    let cx = (i % 3) as f32 * w as f32 / 3.0 + w as f32 / 6.0;
                    let cy = (i / 3) as f32 * h as f32 / 3.0 + h as f32 / 6.0;
                    if (x as f32 - cx).hypot(y as f32 - cy) < DISC_RADIUS {
                        r = (i * 50 % 256) as u8;
                        g = (i * 80 % 256) as u8;
                        b = (i * 120 % 256) as u8;
                    }
                }

                rgba.extend_from_slice(&[r, g, b, 255]);
            }
        }

        Self {
            width: w,
            height: h,
            rgba,
        }
    }

    /// Load `path` if given, falling back to the placeholder on any failure.
    pub fn load_or_placeholder(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("🎨 No scene image configured, using placeholder");
            return Self::placeholder();
        };
        match Self::load_png(path) {
            Ok(image) => {
                info!(
                    "🖼️ Loaded scene image {} ({}x{})",
                    path.display(),
                    image.width,
                    image.height
                );
                image
            }
            Err(e) => {
                warn!(
                    "⚠️ Could not load scene image {}: {}; using placeholder",
                    path.display(),
                    e
                );
                Self::placeholder()
            }
        }
    }

    /// RGBA of one texel, or `None` outside the image
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let texel = self.rgba.get(i..i + 4)?;
        Some([texel[0], texel[1], texel[2], texel[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufWriter;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, color: png::ColorType, data: &[u8]) {
        let file = BufWriter::new(File::create(path).unwrap());
        let mut encoder = png::Encoder::new(file, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(data).unwrap();
    }

    #[test]
    fn test_placeholder_pattern() {
        let image = SceneImage::placeholder();
        assert_eq!((image.width, image.height), (512, 512));
        assert_eq!(image.rgba.len(), 512 * 512 * 4);

        // (0,0) sits in a boosted checker cell
        assert_eq!(image.pixel(0, 0), Some([50, 50, 255, 255]));
        // (32,0) does not
        assert_eq!(image.pixel(32, 0), Some([15, 0, 239, 255]));
        // Disc 0 is centered on (85.33, 85.33) and is black
        assert_eq!(image.pixel(85, 85), Some([0, 0, 0, 255]));
        // Disc 4 is centered on (256, 256)
        assert_eq!(image.pixel(256, 256), Some([200, 64, 224, 255]));
        // Off the edge
        assert_eq!(image.pixel(512, 0), None);
        assert_eq!(image.pixel(0, 512), None);
    }

    #[test]
    fn test_load_rgb_png_adds_alpha() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.png");
        write_png(&path, 2, 1, png::ColorType::Rgb, &[10, 20, 30, 40, 50, 60]);

        let image = SceneImage::load_png(&path).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_load_grayscale_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gray.png");
        write_png(&path, 1, 2, png::ColorType::Grayscale, &[7, 9]);

        let image = SceneImage::load_png(&path).unwrap();
        assert_eq!(image.rgba, vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = SceneImage::load_png(&dir.path().join("nope.png"));
        assert!(matches!(result, Err(ShatterError::Io(_))));
    }

    #[test]
    fn test_garbage_falls_back_to_placeholder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(matches!(
            SceneImage::load_png(&path),
            Err(ShatterError::ImageDecode(_))
        ));
        let image = SceneImage::load_or_placeholder(Some(&path));
        assert_eq!(image, SceneImage::placeholder());
    }
}
