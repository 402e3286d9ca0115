use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::layout::{DEFAULT_BACKDROP, DEFAULT_PLACEHOLDER, FrameStyle, LayoutPreset, PhotoPools};
use crate::processing::color::parse_hex_color;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Wall backdrop image; its natural size defines the world extents.
    pub backdrop: PathBuf,
    /// Shown in slots whose orientation pool has no photo.
    pub placeholder: PathBuf,
    /// Ordered landscape photo sources.
    pub landscape_photos: Vec<PathBuf>,
    /// Ordered portrait photo sources.
    pub portrait_photos: Vec<PathBuf>,
    /// Frame arrangement to hang.
    pub layout: LayoutPreset,
    /// When false only the wall is shown.
    pub show_photos: bool,
    pub frame_style: FrameStyle,
    pub animation: AnimationOptions,
    pub viewport: ViewportOptions,
    pub rendering: RenderingOptions,
    /// Maximum number of concurrent image decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&s)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a defaulted map.
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.frame_style.border_width >= 0.0,
            "frame-style.border-width must not be negative"
        );
        ensure!(
            (0.0..=1.0).contains(&self.frame_style.shadow_opacity),
            "frame-style.shadow-opacity must be within [0, 1]"
        );
        self.viewport.validate()?;
        self.rendering.validate()?;
        Ok(self)
    }

    /// Anchor relative paths at `base`, usually the config file's directory.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.backdrop);
        resolve(&mut self.placeholder);
        self.landscape_photos.iter_mut().for_each(resolve);
        self.portrait_photos.iter_mut().for_each(resolve);
        self
    }

    pub fn photo_pools(&self) -> PhotoPools {
        let to_sources =
            |paths: &[PathBuf]| paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        PhotoPools {
            landscape: to_sources(&self.landscape_photos),
            portrait: to_sources(&self.portrait_photos),
        }
    }

    pub fn backdrop_source(&self) -> String {
        self.backdrop.to_string_lossy().into_owned()
    }

    pub fn placeholder_source(&self) -> String {
        self.placeholder.to_string_lossy().into_owned()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            backdrop: PathBuf::from(DEFAULT_BACKDROP),
            placeholder: PathBuf::from(DEFAULT_PLACEHOLDER),
            landscape_photos: Vec::new(),
            portrait_photos: Vec::new(),
            layout: LayoutPreset::default(),
            show_photos: true,
            frame_style: FrameStyle::default(),
            animation: AnimationOptions::default(),
            viewport: ViewportOptions::default(),
            rendering: RenderingOptions::default(),
            loader_max_concurrent_decodes: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AnimationOptions {
    /// Camera pan/zoom duration.
    #[serde(with = "humantime_serde")]
    pub camera: Duration,
    /// Frame morph between cover crop and full image.
    #[serde(with = "humantime_serde")]
    pub morph: Duration,
    /// Photo crossfade after a rotation.
    #[serde(with = "humantime_serde")]
    pub crossfade: Duration,
    /// Canvas fade-in once the scene is built.
    #[serde(with = "humantime_serde")]
    pub fade_in: Duration,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            camera: Duration::from_millis(550),
            morph: Duration::from_millis(300),
            crossfade: Duration::from_millis(250),
            fade_in: Duration::from_secs(1),
        }
    }
}

/// Limits on the on-screen size of the wall, in logical pixels.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewportOptions {
    pub max_width: f32,
    pub max_height: f32,
    /// Fraction of the window height the wall may use.
    pub max_height_fraction: f32,
}

impl ViewportOptions {
    /// Height budget for a window `window_height` logical pixels tall.
    pub fn max_height_for(&self, window_height: f32) -> f32 {
        (window_height * self.max_height_fraction).round().min(self.max_height)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.max_width > 0.0, "viewport.max-width must be positive");
        ensure!(self.max_height > 0.0, "viewport.max-height must be positive");
        ensure!(
            self.max_height_fraction > 0.0 && self.max_height_fraction <= 1.0,
            "viewport.max-height-fraction must be within (0, 1]"
        );
        Ok(())
    }
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            max_width: 1000.0,
            max_height: 900.0,
            max_height_fraction: 0.72,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RenderingOptions {
    /// Sampler anisotropy clamp, 1..=16.
    pub anisotropy: u16,
    /// Decoded textures are downscaled so neither side exceeds this.
    pub max_texture_dim: u32,
    /// How far photos are tinted toward the wall tone.
    pub tone_strength: f32,
    /// Fraction of chroma kept when photos are drawn.
    pub saturation: f32,
    /// Surface clear colour shown until the backdrop loads.
    pub clear_color: String,
}

impl RenderingOptions {
    /// Linear clear colour; falls back to neutral gray on a malformed value.
    pub fn clear_color_linear(&self) -> [f32; 3] {
        parse_hex_color(&self.clear_color).unwrap_or([0.033, 0.033, 0.033])
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            (1..=16).contains(&self.anisotropy),
            "rendering.anisotropy must be within 1..=16"
        );
        ensure!(
            self.max_texture_dim >= 16,
            "rendering.max-texture-dim must be at least 16"
        );
        ensure!(
            (0.0..=1.0).contains(&self.tone_strength),
            "rendering.tone-strength must be within [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.saturation),
            "rendering.saturation must be within [0, 1]"
        );
        ensure!(
            parse_hex_color(&self.clear_color).is_some(),
            "rendering.clear-color must be a #rrggbb colour"
        );
        Ok(())
    }
}

impl Default for RenderingOptions {
    fn default() -> Self {
        Self {
            anisotropy: 16,
            max_texture_dim: 4096,
            tone_strength: 0.06,
            saturation: 0.9,
            clear_color: "#333333".to_string(),
        }
    }
}
