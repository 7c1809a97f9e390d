//! Configuration management for Shatter
//!
//! Settings are loaded from a TOML file. Every section falls back to its
//! defaults when omitted, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::physics::DriftParams;
use crate::renderer::parse_backends;
use crate::window::{Point, ScreenRect, Size};

/// Backend names accepted in `general.backend`
pub const BACKEND_NAMES: [&str; 5] = ["auto", "vulkan", "gl", "metal", "dx12"];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShatterConfig {
    /// The shared scene
    #[serde(default)]
    pub scene: SceneConfig,

    /// Default drift parameters for every window
    #[serde(default)]
    pub drift: DriftParams,

    /// Where the shard windows are opened
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Fixed scene resolution, independent of any window
    pub width: u32,
    pub height: u32,

    /// PNG shown in the scene; a generated pattern is used when unset or
    /// unreadable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,

    /// RGBA, each component in [0, 1]
    pub clear_color: [f64; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub window_count: u32,

    /// Windows per row
    pub columns: u32,

    pub window_width: u32,
    pub window_height: u32,

    /// Top-left of the first window
    pub origin_x: i32,
    pub origin_y: i32,

    /// Distance between the top-left corners of neighbouring windows
    pub spacing_x: i32,
    pub spacing_y: i32,

    pub title_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    pub target_fps: u32,

    pub debug: bool,

    /// GPU backend: "auto", "vulkan", "gl", "metal" or "dx12"
    pub backend: String,

    /// Closing any shard quits; otherwise only that shard goes away
    pub quit_on_close: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            image: None,
            clear_color: [0.1, 0.1, 0.2, 1.0],
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            window_count: 10,
            columns: 5,
            window_width: 400,
            window_height: 300,
            origin_x: 100,
            origin_y: 100,
            spacing_x: 450,
            spacing_y: 350,
            title_prefix: "Shard".to_string(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            debug: false,
            backend: "auto".to_string(),
            quit_on_close: true,
        }
    }
}

impl SceneConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl LayoutConfig {
    /// Top-left corner of window `index` (0-based), filling rows left to right
    pub fn window_origin(&self, index: u32) -> Point {
        let columns = self.columns.max(1);
        let col = (index % columns) as i32;
        let row = (index / columns) as i32;
        Point::new(
            self.origin_x + col * self.spacing_x,
            self.origin_y + row * self.spacing_y,
        )
    }

    pub fn window_rect(&self, index: u32) -> ScreenRect {
        ScreenRect::from_origin_and_size(
            self.window_origin(index),
            Size::new(self.window_width, self.window_height),
        )
    }

    /// Title of window `index` (0-based), numbered from 1
    pub fn window_title(&self, index: u32) -> String {
        format!("{} {}", self.title_prefix, index + 1)
    }
}

impl GeneralConfig {
    pub fn backends(&self) -> Option<wgpu::Backends> {
        parse_backends(&self.backend)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

impl ShatterConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: ShatterConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.scene.width == 0 || self.scene.height == 0 {
            anyhow::bail!(
                "Invalid scene size {}x{}: both dimensions must be positive",
                self.scene.width,
                self.scene.height
            );
        }
        if self
            .scene
            .clear_color
            .iter()
            .any(|c| !(0.0..=1.0).contains(c))
        {
            anyhow::bail!("Invalid clear_color: components must be between 0.0 and 1.0");
        }

        let drift = &self.drift;
        if !(drift.drag > 0.0 && drift.drag <= 1.0) {
            anyhow::bail!("Invalid drag {}: must be in (0.0, 1.0]", drift.drag);
        }
        if !(0.0..=1.0).contains(&drift.bounce_energy) {
            anyhow::bail!(
                "Invalid bounce_energy {}: must be between 0.0 and 1.0",
                drift.bounce_energy
            );
        }
        if !(drift.wander_strength >= 0.0 && drift.wander_strength.is_finite()) {
            anyhow::bail!(
                "Invalid wander_strength {}: must be a non-negative number",
                drift.wander_strength
            );
        }
        if !drift.acceleration.is_finite() {
            anyhow::bail!("Invalid acceleration: must be finite");
        }
        if !(drift.target_velocity > 0.0 && drift.target_velocity.is_finite()) {
            anyhow::bail!(
                "Invalid target_velocity {}: must be positive",
                drift.target_velocity
            );
        }

        if self.layout.columns == 0 {
            anyhow::bail!("Invalid layout: columns must be at least 1");
        }
        if self.layout.window_width == 0 || self.layout.window_height == 0 {
            anyhow::bail!(
                "Invalid window size {}x{}: both dimensions must be positive",
                self.layout.window_width,
                self.layout.window_height
            );
        }

        if !(1..=240).contains(&self.general.target_fps) {
            anyhow::bail!(
                "Invalid target_fps {}: must be between 1 and 240",
                self.general.target_fps
            );
        }
        if self.general.backends().is_none() {
            anyhow::bail!(
                "Invalid backend '{}': expected one of {}",
                self.general.backend,
                BACKEND_NAMES.join(", ")
            );
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}
