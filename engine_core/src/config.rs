use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{EngineError, EngineResult};
use crate::log::Logger;

/// Drawing context requested by the game. Only the 2D context is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextType {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "webgl")]
    WebGl,
}

/// How the display size is derived from the container bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// Largest size with the configured aspect ratio that fits the container.
    Fit,
    /// Fill the container, ignoring aspect ratio.
    Stretch,
    /// Always the configured width/height.
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub auto_start: bool,

    #[serde(default = "default_context_type")]
    pub context_type: ContextType,

    #[serde(default = "default_scaling_mode")]
    pub scaling_mode: ScalingMode,

    #[serde(default = "default_true")]
    pub enable_anti_aliasing: bool,

    #[serde(default = "default_true")]
    pub enable_batching: bool,

    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    #[serde(default = "default_max_stars")]
    pub max_stars: u32,

    #[serde(default = "default_star_speed")]
    pub star_speed: f32,

    /// Errors tolerated inside one window before an emergency stop.
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    #[serde(default = "default_error_reset_interval_ms")]
    pub error_reset_interval_ms: u64,

    /// Rolling window for the average FPS.
    #[serde(default = "default_fps_sample_size")]
    pub fps_sample_size: usize,

    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,

    #[serde(default)]
    pub log_fps: bool,

    #[serde(default = "default_fps_log_period_ms")]
    pub fps_log_period_ms: u64,
}

fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_context_type() -> ContextType {
    ContextType::TwoD
}
fn default_scaling_mode() -> ScalingMode {
    ScalingMode::Fit
}
fn default_true() -> bool {
    true
}
fn default_target_fps() -> u32 {
    60
}
fn default_max_stars() -> u32 {
    200
}
fn default_star_speed() -> f32 {
    1.0
}
fn default_max_errors() -> u32 {
    10
}
fn default_error_reset_interval_ms() -> u64 {
    5_000
}
fn default_fps_sample_size() -> usize {
    60
}
fn default_resize_debounce_ms() -> u64 {
    100
}
fn default_fps_log_period_ms() -> u64 {
    1_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            debug: false,
            auto_start: false,
            context_type: default_context_type(),
            scaling_mode: default_scaling_mode(),
            enable_anti_aliasing: true,
            enable_batching: true,
            target_fps: default_target_fps(),
            max_stars: default_max_stars(),
            star_speed: default_star_speed(),
            max_errors: default_max_errors(),
            error_reset_interval_ms: default_error_reset_interval_ms(),
            fps_sample_size: default_fps_sample_size(),
            resize_debounce_ms: default_resize_debounce_ms(),
            log_fps: false,
            fps_log_period_ms: default_fps_log_period_ms(),
        }
    }
}

impl EngineConfig {
    pub fn load_or_default(path: &str) -> EngineResult<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s)
                .map_err(|e| EngineError::Config(format!("parse {}: {}", path, e))),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Clamp every numeric option into its valid range. Out-of-range values are
    /// never rejected, only pulled back and logged.
    pub fn validated(mut self) -> Self {
        let log = Logger::new("Config");

        self.width = clamp_logged(&log, "width", self.width, 320, 4096);
        self.height = clamp_logged(&log, "height", self.height, 240, 4096);
        self.target_fps = clamp_logged(&log, "target_fps", self.target_fps, 30, 120);
        self.max_stars = clamp_logged(&log, "max_stars", self.max_stars, 0, 1000);
        self.max_errors = clamp_logged(&log, "max_errors", self.max_errors, 1, 100);
        self.error_reset_interval_ms = clamp_logged(
            &log,
            "error_reset_interval_ms",
            self.error_reset_interval_ms,
            100,
            60_000,
        );
        self.fps_sample_size = clamp_logged(&log, "fps_sample_size", self.fps_sample_size, 1, 600);
        self.resize_debounce_ms =
            clamp_logged(&log, "resize_debounce_ms", self.resize_debounce_ms, 0, 1000);
        self.fps_log_period_ms =
            clamp_logged(&log, "fps_log_period_ms", self.fps_log_period_ms, 250, 60_000);

        // NaN не сравнивается ни с чем, берём default.
        let speed = if self.star_speed.is_nan() { default_star_speed() } else { self.star_speed };
        self.star_speed = clamp_logged(&log, "star_speed", speed, 0.1, 10.0);

        self
    }

    /// Интервал между кадрами при target_fps (мс).
    #[inline]
    pub fn target_frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1) as f64
    }
}

fn clamp_logged<T>(log: &Logger, name: &str, v: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let out = if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    };
    if out != v {
        log.warn(format!("{name}={v} out of range [{min}, {max}], clamped to {out}"));
    }
    out
}
