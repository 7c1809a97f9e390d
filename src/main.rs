//! # Shatter
//!
//! Opens a grid of shard windows, each showing the part of one shared scene
//! that lies behind it, and lets them drift around the desktop.
//!
//! `--headless` runs the same pipeline against in-memory windows for a fixed
//! number of frames, which is handy on machines without a desktop.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Instant;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

use shatter::config::expand_home;
use shatter::{
    DragEvent, FrameCompositor, FramePacer, FrameReport, HeadlessHost, HostError, SceneImage,
    SceneRenderer, ShatterConfig, WindowHost, WindowId, WinitHost,
};

/// Frames between two pacing summaries in the log
const STATS_INTERVAL: u64 = 600;

#[derive(Parser, Debug)]
#[command(name = "shatter")]
#[command(about = "Tear one shared scene into drifting, draggable window shards")]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SHATTER_GIT_COMMIT"),
    ", built ",
    env!("SHATTER_BUILD_DATE"),
    ")"
))]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/shatter/shatter.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Number of shard windows to open
    #[arg(short = 'n', long)]
    windows: Option<u32>,

    /// PNG image to show in the scene
    #[arg(long)]
    image: Option<PathBuf>,

    /// Select GPU backend: auto, vulkan, gl, metal, dx12
    #[arg(long)]
    backend: Option<String>,

    /// Disable gravity
    #[arg(long)]
    no_gravity: bool,

    /// Disable random wandering
    #[arg(long)]
    no_wander: bool,

    /// Run against in-memory windows instead of opening real ones
    #[arg(long)]
    headless: bool,

    /// Frames to render in headless mode
    #[arg(long, default_value_t = 120)]
    frames: u32,
}

impl Cli {
    /// Override configuration values given on the command line
    fn apply(&self, config: &mut ShatterConfig) -> Result<()> {
        if self.debug {
            config.general.debug = true;
        }
        if let Some(count) = self.windows {
            config.layout.window_count = count;
        }
        if let Some(image) = &self.image {
            config.scene.image = Some(image.clone());
        }
        if let Some(backend) = &self.backend {
            config.general.backend = backend.clone();
        }
        if self.no_gravity {
            config.drift.enable_gravity = false;
        }
        if self.no_wander {
            config.drift.enable_wander = false;
        }
        if let Some(image) = config.scene.image.take() {
            config.scene.image = Some(expand_home(&image)?);
        }
        if !self.headless && config.layout.window_count == 0 {
            bail!("At least one window is needed outside --headless, or nothing could close the app");
        }
        config
            .validate()
            .context("Invalid configuration after command-line overrides")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loaded before logging is up so `general.debug` can pick the level
    let loaded = ShatterConfig::load(&cli.config);
    let debug = cli.debug || loaded.as_ref().map_or(false, |c| c.general.debug);
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    info!("🚀 Starting Shatter {}", shatter::VERSION);

    let mut config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            ShatterConfig::default()
        }
    };
    cli.apply(&mut config)?;

    if cli.headless {
        run_headless(&config, cli.frames)
    } else {
        run_windowed(config)
    }
}

fn create_renderer(config: &ShatterConfig) -> Result<SceneRenderer> {
    let backends = config
        .general
        .backends()
        .with_context(|| format!("Unknown backend '{}'", config.general.backend))?;
    info!("🎛️ WGPU backend selection: {}", config.general.backend);

    let image = SceneImage::load_or_placeholder(config.scene.image.as_deref());
    SceneRenderer::new(config.scene.size(), backends, config.scene.clear_color, &image)
        .context("Failed to create scene renderer")
}

/// Render a fixed number of frames against in-memory windows. Time advances
/// by exactly one target frame per frame, so runs are reproducible in length.
fn run_headless(config: &ShatterConfig, frames: u32) -> Result<()> {
    info!("🖥️ Headless mode: {} frames, no windows will be shown", frames);

    let scene = config.scene.size();
    let mut renderer = create_renderer(config)?;
    let mut host = HeadlessHost::new(scene);
    let mut compositor = FrameCompositor::new(host.screen(), scene, config.drift);

    let start = Instant::now();
    for index in 0..config.layout.window_count {
        let (id, surface) = host.spawn_window(
            &config.layout.window_title(index),
            config.layout.window_rect(index),
        );
        compositor.register(&mut host, id, surface, start)?;
    }

    let mut pacer = FramePacer::new(config.general.target_fps);
    let mut totals = FrameReport::default();
    for frame in 1..=frames {
        let now = start + pacer.target_frame_time() * frame;
        pacer.begin_frame(Instant::now());
        let report = compositor.render_frame(&mut host, &mut renderer, now);
        pacer.end_frame(Instant::now());

        debug!("frame {}: {:?}", frame, report);
        totals.moved += report.moved;
        totals.bounced += report.bounced;
        totals.blitted += report.blitted;
        totals.blit_failures += report.blit_failures;
        totals.blit_pass_skipped |= report.blit_pass_skipped;
    }

    info!(
        "📊 {} windows: {} moves, {} bounces, {} blits, {} failed blits",
        compositor.registry().len(),
        totals.moved,
        totals.bounced,
        totals.blitted,
        totals.blit_failures
    );
    info!("⏱️ {}", pacer.summary());

    compositor.teardown(&mut host);
    drop(renderer);
    info!("👋 Shatter finished");
    Ok(())
}

/// Wayland never reveals absolute window positions, so on Linux the shards
/// always go through X11 (natively or via XWayland).
#[cfg(target_os = "linux")]
fn build_event_loop() -> Result<EventLoop<()>> {
    use winit::event_loop::EventLoopBuilder;
    use winit::platform::x11::EventLoopBuilderExtX11;

    let mut builder = EventLoopBuilder::new();
    builder.with_x11();
    builder
        .build()
        .context("Failed to create X11 event loop (is an X server or XWayland running?)")
}

#[cfg(not(target_os = "linux"))]
fn build_event_loop() -> Result<EventLoop<()>> {
    EventLoop::new().context("Failed to create event loop")
}

/// Refuse to run when the window system hides where windows are: every shard
/// would be skipped and the app would show blank, motionless windows.
fn ensure_absolute_positions<H: WindowHost + ?Sized>(host: &H, id: WindowId) -> Result<()> {
    match host.screen_rect(id) {
        Err(HostError::Unsupported(what)) => bail!(
            "This window system does not support {}; run under X11 or use --headless",
            what
        ),
        _ => Ok(()),
    }
}

fn run_windowed(config: ShatterConfig) -> Result<()> {
    let event_loop = build_event_loop()?;
    let scene = config.scene.size();
    let screen = WinitHost::virtual_screen(&*event_loop).unwrap_or_else(|| {
        warn!("⚠️ No monitor reported, assuming a screen the size of the scene");
        scene
    });

    let mut renderer = create_renderer(&config)?;
    let mut host = WinitHost::new();
    let mut compositor = FrameCompositor::new(screen, scene, config.drift);

    let start = Instant::now();
    for index in 0..config.layout.window_count {
        let title = config.layout.window_title(index);
        let (id, surface) = host
            .spawn_window(&*event_loop, &title, config.layout.window_rect(index))
            .with_context(|| format!("Failed to open window '{}'", title))?;
        compositor.register(&mut host, id, surface, start)?;
    }
    info!("🪟 Opened {} shard windows", compositor.registry().len());

    let first = compositor.registry().iter().next().map(|w| w.id());
    if let Some(first) = first {
        if let Err(e) = ensure_absolute_positions(&host, first) {
            compositor.teardown(&mut host);
            return Err(e);
        }
    }

    let quit_on_close = config.general.quit_on_close;
    let mut pacer = FramePacer::new(config.general.target_fps);
    let mut dragging: Option<WindowId> = None;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } => {
                let Some(id) = host.lookup(window_id) else {
                    return;
                };
                match event {
                    WindowEvent::CloseRequested => {
                        if quit_on_close {
                            info!("Window {} closed, quitting", id);
                            elwt.exit();
                            return;
                        }
                        if dragging == Some(id) {
                            dragging = None;
                        }
                        host.forget_window(window_id);
                        compositor.unregister(&mut host, id);
                        if compositor.registry().is_empty() {
                            info!("Last window closed, quitting");
                            elwt.exit();
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        // Exposed or overdrawn by another window
                        compositor.invalidate(id);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let pointer = host.cursor_moved(id, position);
                        if let (Some(held), Some(pointer)) = (dragging, pointer) {
                            if held == id {
                                let moved =
                                    compositor.handle_drag(&mut host, id, DragEvent::Move { pointer });
                                if let Err(e) = moved {
                                    debug!("Drag move for window {} failed: {}", id, e);
                                }
                            }
                        }
                    }
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => match state {
                        ElementState::Pressed => {
                            let Some(pointer) = host.cursor_on_screen(id) else {
                                return;
                            };
                            match compositor.handle_drag(&mut host, id, DragEvent::Begin { pointer }) {
                                Ok(()) => dragging = Some(id),
                                Err(e) => warn!("⚠️ Cannot drag window {}: {}", id, e),
                            }
                        }
                        ElementState::Released => {
                            if let Some(held) = dragging.take() {
                                let _ = compositor.handle_drag(&mut host, held, DragEvent::End);
                            }
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if pacer.should_render(now) {
                    pacer.begin_frame(now);
                    let report = compositor.render_frame(&mut host, &mut renderer, now);
                    pacer.end_frame(Instant::now());
                    if report.blit_pass_skipped {
                        debug!("Frame {} skipped its blit pass", compositor.frame_count());
                    }
                    if compositor.frame_count() % STATS_INTERVAL == 0 {
                        info!("⏱️ {}", pacer.summary());
                    }
                }
                if let Some(deadline) = pacer.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
            }
            Event::LoopExiting => {
                // Surfaces go back before the renderer is dropped with this closure
                compositor.teardown(&mut host);
                info!("👋 Shatter finished");
            }
            _ => {}
        })
        .context("Event loop terminated with an error")
}
