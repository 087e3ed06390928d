//! TOML configuration for the viewer core and for batch jobs.

use crate::enums::{Interpolation, InterpolationOrder, SortBy};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Clip range [{lo}, {hi}] must satisfy 0 <= lo < hi <= 1")]
    InvalidClipRange { lo: f64, hi: f64 },

    #[error("Registration refers to volume {0}, but only {1} volumes are configured")]
    UnknownVolume(usize, usize),
}

/// Display window as fractions of a volume's load-time maximum intensity.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(try_from = "[f64; 2]")]
pub struct ClipRange {
    lo: f64,
    hi: f64,
}

impl ClipRange {
    pub fn new(lo: f64, hi: f64) -> Result<Self, ConfigError> {
        if (0.0..=1.0).contains(&lo) && (0.0..=1.0).contains(&hi) && lo < hi {
            Ok(Self { lo, hi })
        } else {
            Err(ConfigError::InvalidClipRange { lo, hi })
        }
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Absolute intensity window for a volume whose maximum is `max`.
    pub fn window(&self, max: u16) -> (f32, f32) {
        let max = max as f64;
        ((self.lo * max) as f32, (self.hi * max) as f32)
    }
}

impl Default for ClipRange {
    fn default() -> Self {
        Self { lo: 0.0, hi: 1.0 }
    }
}

impl TryFrom<[f64; 2]> for ClipRange {
    type Error = ConfigError;

    fn try_from([lo, hi]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lo, hi)
    }
}

/// Settings the viewer core consumes.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Whether slice changes on one volume propagate to the others.
    pub linked: bool,
    /// Resampling order: 0 nearest, 1 trilinear.
    pub interpolation_order: InterpolationOrder,
    pub clip: ClipRange,
    pub display_interpolation: Interpolation,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            linked: true,
            interpolation_order: InterpolationOrder::default(),
            clip: ClipRange::default(),
            display_interpolation: Interpolation::default(),
        }
    }
}

/// A batch job: volumes to load, viewer settings and optional landmarks.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(rename = "volume", default)]
    pub volumes: Vec<VolumeEntry>,
    pub registration: Option<RegistrationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeEntry {
    pub path: PathBuf,
    /// Overrides the spacing found in the files, in mm per axis.
    pub voxel_size: Option<[f64; 3]>,
    #[serde(default)]
    pub sort_by: SortBy,
}

/// Landmark index triplets, one list per volume. The source volume is the
/// one resampled into the target's frame.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationEntry {
    #[serde(default)]
    pub source_volume: usize,
    #[serde(default = "default_target_volume")]
    pub target_volume: usize,
    pub source: Vec<[usize; 3]>,
    pub target: Vec<[usize; 3]>,
}

fn default_target_volume() -> usize {
    1
}

impl JobConfig {
    fn validate(self) -> Result<Self, ConfigError> {
        if let Some(registration) = &self.registration {
            let count = self.volumes.len();
            for volume in [registration.source_volume, registration.target_volume] {
                if volume >= count {
                    return Err(ConfigError::UnknownVolume(volume, count));
                }
            }
        }
        Ok(self)
    }
}

pub fn parse_config(content: &str) -> Result<JobConfig, ConfigError> {
    let config: JobConfig = toml::from_str(content)?;
    config.validate()
}

/// Load and validate a TOML job file.
pub fn load_config(path: &Path) -> Result<JobConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}
