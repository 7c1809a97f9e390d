//! Screen rectangle → scene viewport mapping
//!
//! Every window displays the part of the shared scene that lies "behind" it
//! on the virtual screen. The window rectangle is normalized by the virtual
//! screen size and then snapped outward to scene-pixel boundaries: the origin
//! is floored and the far edge is ceiled, so the sampled region always covers
//! the requested area and adjacent windows never show a one-pixel seam.
//!
//! Snapping is done in integer scene-pixel arithmetic; the normalized floats
//! are derived from exact pixel counts and convert back without drift.

use log::trace;

use crate::error::HostError;
use crate::host::WindowHost;
use crate::window::{Point, ScreenRect, Size, TrackedWindow};

/// Normalized rectangle inside the scene, always within `[0,1]×[0,1]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Integer sub-rectangle of the scene buffer (scene pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Map a window at `origin` with `extent` on a virtual screen of size
    /// `screen` to a pixel-snapped viewport into a scene of size `scene`.
    pub fn map(origin: Point, extent: Size, screen: Size, scene: Size) -> Self {
        let (x, width) = snap_axis(origin.x, extent.width, screen.width, scene.width);
        let (y, height) = snap_axis(origin.y, extent.height, screen.height, scene.height);

        let x = normalize(x, scene.width);
        let y = normalize(y, scene.height);
        // The pixel counts already fit; this only absorbs float rounding.
        let width = normalize(width, scene.width).min(1.0 - x);
        let height = normalize(height, scene.height).min(1.0 - y);

        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert back to integer scene pixels for a blit. The origin is clamped
    /// inside the scene and the extent trimmed to fit; `None` when nothing of
    /// the scene is left to show.
    pub fn scene_region(&self, scene: Size) -> Option<SceneRegion> {
        if scene.is_empty() {
            return None;
        }
        let sw = scene.width as i64;
        let sh = scene.height as i64;

        let x = ((self.x * sw as f64).round() as i64).clamp(0, sw - 1);
        let y = ((self.y * sh as f64).round() as i64).clamp(0, sh - 1);
        let width = ((self.width * sw as f64).round() as i64).min(sw - x);
        let height = ((self.height * sh as f64).round() as i64).min(sh - y);

        if width <= 0 || height <= 0 {
            return None;
        }

        Some(SceneRegion {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
        })
    }

    /// Whether the viewport lies within the unit square
    pub fn is_contained(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= 1.0
            && self.y + self.height <= 1.0
    }
}

/// Snap one axis. Returns `(origin, extent)` in scene pixels, clamped so
/// `0 <= origin <= scene` and `origin + extent <= scene`.
fn snap_axis(origin: i32, extent: u32, screen: u32, scene: u32) -> (i64, i64) {
    if screen == 0 || scene == 0 {
        return (0, 0);
    }
    let screen = screen as i64;
    let scene = scene as i64;
    let start = origin as i64;
    let end = start + extent as i64;

    // floor(start * scene / screen) and ceil(end * scene / screen)
    let lo = (start * scene).div_euclid(screen);
    let hi = -((-end * scene).div_euclid(screen));

    let lo_clamped = lo.clamp(0, scene);
    let size = (hi - lo).clamp(0, scene - lo_clamped);
    (lo_clamped, size)
}

fn normalize(pixels: i64, scene: u32) -> f64 {
    if scene == 0 {
        0.0
    } else {
        pixels as f64 / scene as f64
    }
}

/// Bring a window's viewport in line with its live screen rectangle.
///
/// Returns `Ok(true)` when the rectangle changed and the window was marked
/// dirty, `Ok(false)` when nothing moved.
pub fn recompute_viewport<H: WindowHost + ?Sized>(
    window: &mut TrackedWindow,
    host: &H,
    screen: Size,
    scene: Size,
) -> Result<bool, HostError> {
    let rect = host.screen_rect(window.id())?;
    if window.last_screen_rect == Some(rect) {
        return Ok(false);
    }

    let client = host.client_size(window.id())?;
    window.last_screen_rect = Some(rect);
    window.screen_rect = rect;
    window.client_size = client;
    window.dirty = true;
    window.viewport = Viewport::map(rect.origin(), client, screen, scene);

    trace!(
        "window {} viewport -> ({:.4}, {:.4}) {:.4}x{:.4}",
        window.id(),
        window.viewport.x,
        window.viewport.y,
        window.viewport.width,
        window.viewport.height
    );
    Ok(true)
}

/// Convenience for callers holding a full rectangle
pub fn map_rect(rect: ScreenRect, screen: Size, scene: Size) -> Viewport {
    Viewport::map(rect.origin(), rect.size(), screen, scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HD: Size = Size::new(1920, 1080);

    #[test]
    fn test_window_at_origin_matches_pixel_quantum() {
        let vp = Viewport::map(Point::new(0, 0), Size::new(400, 300), HD, HD);
        assert_eq!(vp.x, 0.0);
        assert_eq!(vp.y, 0.0);
        assert_eq!(vp.width, 400.0 / 1920.0);
        assert_eq!(vp.height, 300.0 / 1080.0);
    }

    #[test]
    fn test_snapping_rounds_outward_on_smaller_scene() {
        // Screen 1920 wide, scene 1000 wide: x=1 maps to 0.52 scene px.
        let vp = Viewport::map(
            Point::new(1, 0),
            Size::new(2, 10),
            Size::new(1920, 1080),
            Size::new(1000, 500),
        );
        let region = vp.scene_region(Size::new(1000, 500)).unwrap();
        assert_eq!(region.x, 0);
        // end = 3 * 1000 / 1920 = 1.56 -> 2
        assert_eq!(region.width, 2);
    }

    #[test]
    fn test_off_screen_left_clamps_origin() {
        let vp = Viewport::map(Point::new(-100, 50), Size::new(400, 300), HD, HD);
        assert_eq!(vp.x, 0.0);
        assert!(vp.is_contained());
    }

    #[test]
    fn test_far_off_screen_yields_empty_region() {
        let vp = Viewport::map(Point::new(5000, 5000), Size::new(400, 300), HD, HD);
        assert!(vp.is_contained());
        assert_eq!(vp.width, 0.0);
        assert_eq!(vp.height, 0.0);
        assert!(vp.scene_region(HD).is_none());
    }

    #[test]
    fn test_partially_off_right_edge_is_trimmed() {
        let vp = Viewport::map(Point::new(1800, 0), Size::new(400, 300), HD, HD);
        assert!(vp.is_contained());
        let region = vp.scene_region(HD).unwrap();
        assert_eq!(region.x, 1800);
        assert_eq!(region.width, 120);
    }

    #[test]
    fn test_scene_region_round_trips_pixels() {
        let vp = Viewport::map(Point::new(450, 350), Size::new(400, 300), HD, HD);
        let region = vp.scene_region(HD).unwrap();
        assert_eq!(
            region,
            SceneRegion {
                x: 450,
                y: 350,
                width: 400,
                height: 300
            }
        );
    }

    #[test]
    fn test_degenerate_sizes_do_not_panic() {
        let vp = Viewport::map(Point::new(10, 10), Size::new(10, 10), Size::new(0, 0), HD);
        assert_eq!(vp, Viewport::default());
        assert!(vp.scene_region(Size::new(0, 0)).is_none());
    }

    proptest! {
        #[test]
        fn viewport_is_always_contained(
            x in -5000i32..5000,
            y in -5000i32..5000,
            w in 0u32..3000,
            h in 0u32..3000,
            sw in 1u32..4000,
            sh in 1u32..4000,
            scw in 1u32..4000,
            sch in 1u32..4000,
        ) {
            let vp = Viewport::map(Point::new(x, y), Size::new(w, h), Size::new(sw, sh), Size::new(scw, sch));
            prop_assert!(vp.is_contained(), "{:?}", vp);
        }

        #[test]
        fn snapped_region_covers_requested_region(
            sw in 1u32..4000,
            sh in 1u32..4000,
            scw in 1u32..4000,
            sch in 1u32..4000,
            fx in 0.0f64..1.0,
            fy in 0.0f64..1.0,
            fw in 0.0f64..1.0,
            fh in 0.0f64..1.0,
        ) {
            // Window fully on screen
            let x = (fx * sw as f64) as u32;
            let y = (fy * sh as f64) as u32;
            let w = ((sw - x) as f64 * fw) as u32;
            let h = ((sh - y) as f64 * fh) as u32;

            let vp = Viewport::map(Point::new(x as i32, y as i32), Size::new(w, h), Size::new(sw, sh), Size::new(scw, sch));

            // Compare in exact integer scene-pixel units: lo/scene <= x/screen
            let lo_x = (vp.x * scw as f64).round() as u64;
            let hi_x = ((vp.x + vp.width) * scw as f64).round() as u64;
            let lo_y = (vp.y * sch as f64).round() as u64;
            let hi_y = ((vp.y + vp.height) * sch as f64).round() as u64;

            prop_assert!(lo_x * sw as u64 <= x as u64 * scw as u64);
            prop_assert!(hi_x * sw as u64 >= (x + w) as u64 * scw as u64);
            prop_assert!(lo_y * sh as u64 <= y as u64 * sch as u64);
            prop_assert!(hi_y * sh as u64 >= (y + h) as u64 * sch as u64);
        }
    }
}
