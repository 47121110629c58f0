//! Engine configuration.
//!
//! Every section has defaults, so an empty TOML file is a valid configuration.
//! Values are validated once at load time and copied into components during
//! initialization; nothing is re-read afterwards.

use std::path::{Path, PathBuf};

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::lighting::{Frustum, MAX_LIGHTS};
use crate::logging::LoggingConfig;

/// Largest tile a compute workgroup may cover (`block_size²` invocations).
pub const MAX_TILE_INVOCATIONS: u32 = 256;

/// Most tiles a screen may be split into. At 96 bytes per frustum this keeps
/// the frustum buffer at 96 MiB, inside wgpu's default storage-binding limit.
pub const MAX_TILES: u64 = 1 << 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub screen: TileConfig,
    pub shaders: ShaderConfig,
    pub lights: LightConfig,
    pub camera: CameraConfig,
    pub logging: LoggingConfig,
}

/// Screen size in pixels and the edge length of a square lighting tile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub width: u32,
    pub height: u32,
    pub block_size: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self { width: 1280, height: 720, block_size: 16 }
    }
}

impl TileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "screen size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be non-zero".into()));
        }
        if self.block_size.saturating_mul(self.block_size) > MAX_TILE_INVOCATIONS {
            return Err(ConfigError::Invalid(format!(
                "block_size {} exceeds {MAX_TILE_INVOCATIONS} invocations per tile",
                self.block_size
            )));
        }
        let tiles = u64::from(self.width.div_ceil(self.block_size))
            * u64::from(self.height.div_ceil(self.block_size));
        if tiles > MAX_TILES {
            return Err(ConfigError::Invalid(format!(
                "{}x{} px in {}px tiles needs {tiles} frustums ({} bytes), limit is {MAX_TILES}",
                self.width,
                self.height,
                self.block_size,
                tiles * std::mem::size_of::<Frustum>() as u64
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub frustum: PathBuf,
    pub depth: PathBuf,
    pub light: PathBuf,
    /// Written with the full compiler output when a shader fails to build.
    pub diagnostics: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"));
        Self {
            frustum: dir.join("frustum_cs.wgsl"),
            depth: dir.join("depth_vs.wgsl"),
            light: dir.join("light.wgsl"),
            diagnostics: PathBuf::from(crate::shader::DEFAULT_DIAGNOSTICS_FILE),
        }
    }
}

/// Parameters of the procedural light set.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub count: u32,
    pub seed: u64,
    /// Point lights are scattered over `[-half_extent, half_extent]` in x and z.
    pub half_extent: f32,
    pub max_height: f32,
    pub min_range: f32,
    pub max_range: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            count: 64,
            seed: 0x1ee7,
            half_extent: 15.0,
            max_height: 4.0,
            min_range: 2.0,
            max_range: 6.0,
        }
    }
}

impl LightConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count as usize > MAX_LIGHTS {
            return Err(ConfigError::Invalid(format!(
                "{} lights requested, at most {MAX_LIGHTS} supported",
                self.count
            )));
        }
        if !(self.half_extent > 0.0 && self.max_height > 0.0) {
            return Err(ConfigError::Invalid("light volume must have positive extent".into()));
        }
        if !(self.min_range > 0.0 && self.min_range <= self.max_range) {
            return Err(ConfigError::Invalid(format!(
                "light range [{}, {}] is empty or non-positive",
                self.min_range, self.max_range
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { fov_y_degrees: 60.0, near: 0.1, far: 100.0 }
    }
}

impl CameraConfig {
    /// Left-handed perspective projection for a viewport of the given aspect.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_lh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_y_degrees {} outside (0, 180)",
                self.fov_y_degrees
            )));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ConfigError::Invalid(format!(
                "clip range near={} far={} is invalid",
                self.near, self.far
            )));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.screen.validate()?;
        self.lights.validate()?;
        self.camera.validate()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.screen.width as f32 / self.screen.height as f32
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
