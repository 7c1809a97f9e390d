//! Integration tests for Shatter
//!
//! These tests drive the full frame pipeline (drift, viewport mapping,
//! readback, blit) against in-memory windows and a CPU scene backend, then
//! inspect what every window ended up showing.

use proptest::prelude::*;
use std::time::{Duration, Instant};

use shatter::error::ShatterError;
use shatter::{
    DragEvent, DriftParams, FrameCompositor, HeadlessHost, Point, SceneBackend, ScreenRect, Size,
    StagingView, SurfaceHandle, TrackedWindow, WindowHost, WindowId,
};

const FRAME: Duration = Duration::from_millis(16);

/// Scene whose pixels encode their own coordinates, served with padded rows
/// the way a GPU readback is.
struct GradientScene {
    size: Size,
    stride: usize,
    bytes: Vec<u8>,
    fail_reads: u32,
    renders: u32,
}

impl GradientScene {
    fn new(size: Size) -> Self {
        let stride = (size.width as usize * 4).next_multiple_of(256);
        let mut bytes = vec![0xEE; stride * size.height as usize];
        for y in 0..size.height {
            for x in 0..size.width {
                let i = y as usize * stride + x as usize * 4;
                bytes[i..i + 4].copy_from_slice(&scene_pixel(x, y));
            }
        }
        Self {
            size,
            stride,
            bytes,
            fail_reads: 0,
            renders: 0,
        }
    }
}

fn scene_pixel(x: u32, y: u32) -> [u8; 4] {
    [x as u8, y as u8, ((x >> 8) | (y >> 8) << 4) as u8, 255]
}

fn expected_xrgb(x: u32, y: u32) -> u32 {
    let [r, g, b, _] = scene_pixel(x, y);
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

impl SceneBackend for GradientScene {
    fn scene_size(&self) -> Size {
        self.size
    }

    fn render_scene(&mut self) -> Result<(), ShatterError> {
        self.renders += 1;
        Ok(())
    }

    fn copy_to_staging(&mut self) -> Result<(), ShatterError> {
        Ok(())
    }

    fn read_staging(&mut self, sink: &mut dyn FnMut(&StagingView<'_>)) -> Result<(), ShatterError> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(ShatterError::StagingMap("buffer map timed out".into()));
        }
        sink(&StagingView {
            bytes: &self.bytes,
            stride: self.stride,
            width: self.size.width,
            height: self.size.height,
        });
        Ok(())
    }
}

fn still() -> DriftParams {
    DriftParams {
        enable_gravity: false,
        enable_wander: false,
        ..DriftParams::default()
    }
}

/// Spawn and register windows that start at rest
fn spawn_still(
    compositor: &mut FrameCompositor,
    host: &mut HeadlessHost,
    rects: &[ScreenRect],
    now: Instant,
) -> Vec<WindowId> {
    rects
        .iter()
        .enumerate()
        .map(|(i, rect)| {
            let (id, surface) = host.spawn_window(&format!("Shard {}", i + 1), *rect);
            let mut window = TrackedWindow::with_seed(id, surface, still(), now, i as u64);
            window.drift.velocity_x = 0.0;
            window.drift.velocity_y = 0.0;
            compositor.insert(host, window).unwrap();
            id
        })
        .collect()
}

fn framebuffer_of(host: &HeadlessHost, id: WindowId) -> (Size, Vec<u32>) {
    let surface = host.surface_of(id).unwrap();
    let (size, pixels) = host.framebuffer(surface).unwrap();
    (size, pixels.to_vec())
}

#[test]
fn test_windows_show_the_scene_behind_them() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());

    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[
            ScreenRect::new(100, 100, 400, 300),
            ScreenRect::new(550, 450, 400, 300),
        ],
        now,
    );

    let report = compositor.render_frame(&mut host, &mut scene, now + FRAME);
    assert_eq!(report.blitted, 2);
    assert_eq!(report.moved, 0);

    let (size, pixels) = framebuffer_of(&host, ids[0]);
    assert_eq!(size, Size::new(400, 300));
    assert_eq!(pixels[0], expected_xrgb(100, 100));
    assert_eq!(pixels[399], expected_xrgb(499, 100));
    assert_eq!(pixels[299 * 400], expected_xrgb(100, 399));

    let (_, pixels) = framebuffer_of(&host, ids[1]);
    assert_eq!(pixels[0], expected_xrgb(550, 450));
    assert_eq!(pixels[10 * 400 + 20], expected_xrgb(570, 460));

    compositor.teardown(&mut host);
}

#[test]
fn test_scene_is_scaled_to_a_larger_screen() {
    let screen = Size::new(3840, 2160);
    let scene_size = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(scene_size);
    let mut compositor = FrameCompositor::new(screen, scene_size, still());

    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[ScreenRect::new(200, 200, 400, 300)],
        now,
    );
    compositor.render_frame(&mut host, &mut scene, now + FRAME);

    let window = compositor.window(ids[0]).unwrap();
    let region = window.viewport.scene_region(scene_size).unwrap();
    assert_eq!((region.x, region.y, region.width, region.height), (100, 100, 200, 150));

    // Every scene pixel is doubled on screen
    let (_, pixels) = framebuffer_of(&host, ids[0]);
    assert_eq!(pixels[0], expected_xrgb(100, 100));
    assert_eq!(pixels[1], expected_xrgb(100, 100));
    assert_eq!(pixels[2 * 400 + 2], expected_xrgb(101, 101));

    compositor.teardown(&mut host);
}

#[test]
fn test_resting_windows_are_presented_once() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());
    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[ScreenRect::new(0, 0, 200, 200), ScreenRect::new(600, 600, 200, 200)],
        now,
    );

    for frame in 1..=10 {
        compositor.render_frame(&mut host, &mut scene, now + FRAME * frame);
    }

    assert_eq!(scene.renders, 10);
    for id in ids {
        assert_eq!(host.present_count(host.surface_of(id).unwrap()), 1);
    }
    compositor.teardown(&mut host);
}

#[test]
fn test_damaged_window_is_repainted_once() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());
    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[ScreenRect::new(0, 0, 200, 200), ScreenRect::new(600, 600, 200, 200)],
        now,
    );
    compositor.render_frame(&mut host, &mut scene, now + FRAME);

    assert!(compositor.invalidate(ids[0]));
    for frame in 2..=5 {
        compositor.render_frame(&mut host, &mut scene, now + FRAME * frame);
    }

    assert_eq!(host.present_count(host.surface_of(ids[0]).unwrap()), 2);
    assert_eq!(host.present_count(host.surface_of(ids[1]).unwrap()), 1);
    let (_, pixels) = framebuffer_of(&host, ids[0]);
    assert_eq!(pixels[0], expected_xrgb(0, 0));
    compositor.teardown(&mut host);
}

#[test]
fn test_offscreen_window_is_pulled_back_inside() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());
    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[ScreenRect::new(1900, 100, 400, 300)],
        now,
    );

    let report = compositor.render_frame(&mut host, &mut scene, now + FRAME);

    assert_eq!(report.bounced, 1);
    assert_eq!(host.screen_rect(ids[0]).unwrap().x, 1520);
    let (_, pixels) = framebuffer_of(&host, ids[0]);
    assert_eq!(pixels[0], expected_xrgb(1520, 100));
    compositor.teardown(&mut host);
}

#[test]
fn test_drifting_windows_stay_on_screen() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, DriftParams::default());

    let layout = shatter::config::LayoutConfig::default();
    let mut ids = Vec::new();
    for index in 0..4 {
        let (id, surface) = host.spawn_window(&layout.window_title(index), layout.window_rect(index));
        let window =
            TrackedWindow::with_seed(id, surface, DriftParams::default(), now, 7 + index as u64);
        compositor.insert(&mut host, window).unwrap();
        ids.push(id);
    }

    let mut moved = 0;
    for frame in 1..=600 {
        let report = compositor.render_frame(&mut host, &mut scene, now + FRAME * frame);
        moved += report.moved;
        assert_eq!(report.stale, 0);

        for &id in &ids {
            let rect = host.screen_rect(id).unwrap();
            assert!(rect.x >= 0 && rect.y >= 0, "{:?}", rect);
            assert!(rect.x + rect.width as i32 <= screen.width as i32, "{:?}", rect);
            assert!(rect.y + rect.height as i32 <= screen.height as i32, "{:?}", rect);

            let window = compositor.window(id).unwrap();
            assert!(window.viewport.is_contained(), "{:?}", window.viewport);
            assert!(window.drift.speed() <= DriftParams::default().target_velocity + 60.0);
        }
    }
    assert!(moved > 0);
    compositor.teardown(&mut host);
}

#[test]
fn test_destroyed_window_goes_stale_and_is_released_once() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());
    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[
            ScreenRect::new(0, 0, 100, 100),
            ScreenRect::new(200, 0, 100, 100),
            ScreenRect::new(400, 0, 100, 100),
        ],
        now,
    );

    compositor.render_frame(&mut host, &mut scene, now + FRAME);
    assert!(host.destroy_window(ids[1]));
    host.move_window(ids[0], Point::new(50, 50)).unwrap();

    let report = compositor.render_frame(&mut host, &mut scene, now + FRAME * 2);
    assert_eq!(report.stale, 1);
    assert_eq!(report.blitted, 1);
    assert!(compositor.window(ids[1]).unwrap().stale);
    assert_eq!(compositor.registry().stale().count(), 1);

    // Still tracked until the owner removes it
    assert_eq!(compositor.registry().len(), 3);
    assert_eq!(host.live_surfaces(), 3);

    assert_eq!(compositor.teardown(&mut host), 3);
    assert_eq!(host.live_surfaces(), 0);
    let mut released = host.released().to_vec();
    released.sort();
    released.dedup();
    assert_eq!(released.len(), 3);
}

#[test]
fn test_readback_failure_recovers_next_frame() {
    let screen = Size::new(640, 480);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    scene.fail_reads = 2;
    let mut compositor = FrameCompositor::new(screen, screen, still());
    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[ScreenRect::new(10, 20, 100, 100)],
        now,
    );

    for frame in 1..=2 {
        let report = compositor.render_frame(&mut host, &mut scene, now + FRAME * frame);
        assert!(report.blit_pass_skipped);
        assert!(compositor.window(ids[0]).unwrap().dirty);
    }

    let report = compositor.render_frame(&mut host, &mut scene, now + FRAME * 3);
    assert!(!report.blit_pass_skipped);
    assert_eq!(report.blitted, 1);
    let (_, pixels) = framebuffer_of(&host, ids[0]);
    assert_eq!(pixels[0], expected_xrgb(10, 20));
    compositor.teardown(&mut host);
}

#[test]
fn test_resized_window_gets_a_matching_surface() {
    let screen = Size::new(1920, 1080);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut scene = GradientScene::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());
    let ids = spawn_still(
        &mut compositor,
        &mut host,
        &[ScreenRect::new(100, 100, 400, 300)],
        now,
    );

    compositor.render_frame(&mut host, &mut scene, now + FRAME);
    assert!(host.resize_window(ids[0], Size::new(200, 100)));
    let report = compositor.render_frame(&mut host, &mut scene, now + FRAME * 2);

    assert_eq!(report.recomputed, 1);
    let (size, pixels) = framebuffer_of(&host, ids[0]);
    assert_eq!(size, Size::new(200, 100));
    assert_eq!(pixels[199], expected_xrgb(299, 100));
    compositor.teardown(&mut host);
}

#[test]
fn test_duplicate_surface_is_not_leaked() {
    let screen = Size::new(800, 600);
    let now = Instant::now();
    let mut host = HeadlessHost::new(screen);
    let mut compositor = FrameCompositor::new(screen, screen, still());

    let (id, surface) = host.spawn_window("Shard 1", ScreenRect::new(0, 0, 100, 100));
    compositor.register(&mut host, id, surface, now).unwrap();

    let (_, extra) = host.spawn_window("Shard 2", ScreenRect::new(0, 0, 100, 100));
    let extra_id = extra.id();
    let result = compositor.register(&mut host, id, extra, now);

    assert!(matches!(result, Err(ShatterError::DuplicateWindow(dup)) if dup == id));
    assert_eq!(host.released(), &[extra_id]);
    assert_eq!(compositor.teardown(&mut host), 1);
    assert_eq!(host.live_surfaces(), 0);
}

fn pointer_path() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((-500i32..2500, -500i32..1500), 1..20)
}

proptest! {
    #[test]
    fn test_held_window_follows_pointer_and_never_drifts(
        grab in (0i32..400, 0i32..300),
        path in pointer_path(),
    ) {
        let screen = Size::new(1920, 1080);
        let now = Instant::now();
        let mut host = HeadlessHost::new(screen);
        let mut scene = GradientScene::new(Size::new(64, 64));
        let mut compositor = FrameCompositor::new(screen, Size::new(64, 64), DriftParams::default());

        let (id, surface) = host.spawn_window("Shard 1", ScreenRect::new(500, 400, 400, 300));
        compositor.register(&mut host, id, surface, now).unwrap();

        let pointer = Point::new(500 + grab.0, 400 + grab.1);
        compositor.handle_drag(&mut host, id, DragEvent::Begin { pointer }).unwrap();

        for (step, (x, y)) in path.into_iter().enumerate() {
            compositor
                .handle_drag(&mut host, id, DragEvent::Move { pointer: Point::new(x, y) })
                .unwrap();
            prop_assert_eq!(
                host.screen_rect(id).unwrap().origin(),
                Point::new(x - grab.0, y - grab.1)
            );

            let report = compositor.render_frame(&mut host, &mut scene, now + FRAME * (step as u32 + 1));
            prop_assert_eq!(report.moved, 0);
            let window = compositor.window(id).unwrap();
            prop_assert_eq!((window.drift.velocity_x, window.drift.velocity_y), (0.0, 0.0));
        }

        compositor.handle_drag(&mut host, id, DragEvent::End).unwrap();
        let window = compositor.window(id).unwrap();
        prop_assert!(!window.drag.is_dragging);
        prop_assert!(window.drift.velocity_x.abs() <= 100.0);
        prop_assert!(window.drift.velocity_y.abs() <= 100.0);

        compositor.teardown(&mut host);
    }
}

#[test]
fn test_release_consumes_handle() {
    let mut host = HeadlessHost::new(Size::new(100, 100));
    let (_, surface) = host.spawn_window("Shard 1", ScreenRect::new(0, 0, 10, 10));
    let id = surface.id();
    host.release_surface(surface);
    assert_eq!(host.released(), &[id]);

    // An unknown handle is ignored with a warning rather than recorded twice
    host.release_surface(SurfaceHandle::acquired(id));
    assert_eq!(host.released(), &[id]);
}
