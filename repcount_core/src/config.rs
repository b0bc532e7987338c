//! Configuration file support for repcount.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/repcount/config.toml`.
//! Every field has a default, so partial files are fine.

use crate::counter::{CounterSettings, LinearMap, TriggerPolicy};
use crate::source::CoordinateSpace;
use crate::{Arm, Error, JointTriplet, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub joint: JointConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub smoothing: SmoothingConfig,

    #[serde(default)]
    pub trigger: TriggerPolicy,

    #[serde(default)]
    pub cue: CueConfig,

    #[serde(default)]
    pub input: InputConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Landmark indices of the tracked joint (shoulder, elbow, wrist)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JointConfig {
    #[serde(default = "default_first")]
    pub first: usize,

    #[serde(default = "default_vertex")]
    pub vertex: usize,

    #[serde(default = "default_last")]
    pub last: usize,
}

impl Default for JointConfig {
    fn default() -> Self {
        Self {
            first: default_first(),
            vertex: default_vertex(),
            last: default_last(),
        }
    }
}

impl JointConfig {
    pub fn for_arm(arm: Arm) -> Self {
        let triplet = JointTriplet::elbow(arm);
        Self {
            first: triplet.first.index(),
            vertex: triplet.vertex.index(),
            last: triplet.last.index(),
        }
    }
}

/// Angle ranges for the percentage readout and the progress bar
///
/// The two angle ranges are tuned independently.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_percentage_angle_low")]
    pub percentage_angle_low: f64,

    #[serde(default = "default_percentage_angle_high")]
    pub percentage_angle_high: f64,

    #[serde(default = "default_bar_angle_low")]
    pub bar_angle_low: f64,

    #[serde(default = "default_bar_angle_high")]
    pub bar_angle_high: f64,

    /// Bar pixel row at the low angle (also the rest position)
    #[serde(default = "default_bar_bottom")]
    pub bar_bottom: f64,

    /// Bar pixel row at the high angle
    #[serde(default = "default_bar_top")]
    pub bar_top: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            percentage_angle_low: default_percentage_angle_low(),
            percentage_angle_high: default_percentage_angle_high(),
            bar_angle_low: default_bar_angle_low(),
            bar_angle_high: default_bar_angle_high(),
            bar_bottom: default_bar_bottom(),
            bar_top: default_bar_top(),
        }
    }
}

/// Display smoothing parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmoothingConfig {
    #[serde(default = "default_smoothing_factor")]
    pub factor: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            factor: default_smoothing_factor(),
        }
    }
}

/// Audible cue band
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cue_low")]
    pub low: f64,

    #[serde(default = "default_cue_high")]
    pub high: f64,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low: default_cue_low(),
            high: default_cue_high(),
        }
    }
}

/// How landmark coordinates arrive from the pose model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputConfig {
    /// Coordinates are fractions of the frame rather than pixels
    #[serde(default)]
    pub normalized: bool,

    /// Frame size used to scale normalized coordinates
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            normalized: false,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

impl InputConfig {
    pub fn coordinate_space(&self) -> CoordinateSpace {
        if self.normalized {
            CoordinateSpace::Normalized {
                width: self.frame_width,
                height: self.frame_height,
            }
        } else {
            CoordinateSpace::Pixel
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("repcount")
}

fn default_first() -> usize {
    12
}

fn default_vertex() -> usize {
    14
}

fn default_last() -> usize {
    16
}

fn default_percentage_angle_low() -> f64 {
    210.0
}

fn default_percentage_angle_high() -> f64 {
    310.0
}

fn default_bar_angle_low() -> f64 {
    220.0
}

fn default_bar_angle_high() -> f64 {
    310.0
}

fn default_bar_bottom() -> f64 {
    650.0
}

fn default_bar_top() -> f64 {
    100.0
}

fn default_smoothing_factor() -> f64 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_cue_low() -> f64 {
    30.0
}

fn default_cue_high() -> f64 {
    40.0
}

fn default_frame_width() -> u32 {
    1280
}

fn default_frame_height() -> u32 {
    720
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("repcount").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = self.to_toml()?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// The tracked joint, checked against the pose schema
    pub fn joint_triplet(&self) -> Result<JointTriplet> {
        JointTriplet::from_indices(self.joint.first, self.joint.vertex, self.joint.last)
    }

    /// Counter parameters, checked for usable ranges
    pub fn counter_settings(&self) -> Result<CounterSettings> {
        let cal = &self.calibration;
        let settings = CounterSettings {
            percentage: LinearMap::new(
                cal.percentage_angle_low,
                cal.percentage_angle_high,
                0.0,
                100.0,
            ),
            bar: LinearMap::new(
                cal.bar_angle_low,
                cal.bar_angle_high,
                cal.bar_bottom,
                cal.bar_top,
            ),
            smoothing: self.smoothing.factor,
            policy: self.trigger,
            cue_band: self.cue.enabled.then_some((self.cue.low, self.cue.high)),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check everything that would otherwise fail at session start
    pub fn validate(&self) -> Result<()> {
        self.joint_triplet()?;
        self.counter_settings()?;
        if self.input.frame_width == 0 || self.input.frame_height == 0 {
            return Err(Error::Config("frame size must be non-zero".into()));
        }
        Ok(())
    }
}
