//! TOML configuration for the contour-fitting demo: one section per
//! concern, each field defaulted independently so a config file only needs
//! to override the keys it cares about.

pub mod reader;

pub use reader::{read_config, ConfigReaderError};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Configuration keys consumed by `gbp_contour`'s dynamic topology manager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContourSection {
    #[serde(default = "ContourSection::default_transition_noise")]
    pub transition_noise: f64,
    #[serde(default = "ContourSection::default_line_factor_huber_distance")]
    pub line_factor_huber_distance: f64,
    #[serde(default = "ContourSection::default_birth_line_variance")]
    pub birth_line_variance: f64,
    #[serde(default = "ContourSection::default_death_node_sigma")]
    pub death_node_sigma: f64,
    #[serde(default = "ContourSection::default_line_measurement_noise")]
    pub line_measurement_noise: f64,
    #[serde(default = "ContourSection::default_line_merge_residual")]
    pub line_merge_residual: f64,
    #[serde(default = "ContourSection::default_max_iterations_per_measurement")]
    pub max_iterations_per_measurement: usize,
    #[serde(default = "ContourSection::default_num_initial_nodes")]
    pub num_initial_nodes: usize,
    #[serde(default = "ContourSection::default_use_huber")]
    pub use_huber: bool,
}

impl ContourSection {
    pub fn default_transition_noise() -> f64 {
        0.1
    }

    pub fn default_line_factor_huber_distance() -> f64 {
        0.05
    }

    pub fn default_birth_line_variance() -> f64 {
        0.1
    }

    pub fn default_death_node_sigma() -> f64 {
        0.08
    }

    pub fn default_line_measurement_noise() -> f64 {
        0.1
    }

    pub fn default_line_merge_residual() -> f64 {
        0.05
    }

    pub fn default_max_iterations_per_measurement() -> usize {
        500
    }

    pub fn default_num_initial_nodes() -> usize {
        2
    }

    pub fn default_use_huber() -> bool {
        true
    }
}

impl Default for ContourSection {
    fn default() -> Self {
        Self {
            transition_noise: Self::default_transition_noise(),
            line_factor_huber_distance: Self::default_line_factor_huber_distance(),
            birth_line_variance: Self::default_birth_line_variance(),
            death_node_sigma: Self::default_death_node_sigma(),
            line_measurement_noise: Self::default_line_measurement_noise(),
            line_merge_residual: Self::default_line_merge_residual(),
            max_iterations_per_measurement: Self::default_max_iterations_per_measurement(),
            num_initial_nodes: Self::default_num_initial_nodes(),
            use_huber: Self::default_use_huber(),
        }
    }
}

/// How the demo binary synthesizes or streams measurement frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationSection {
    #[serde(default = "SimulationSection::default_num_frames")]
    pub num_frames: usize,
    #[serde(default = "SimulationSection::default_points_per_frame")]
    pub points_per_frame: usize,
}

impl SimulationSection {
    pub fn default_num_frames() -> usize {
        20
    }

    pub fn default_points_per_frame() -> usize {
        40
    }
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            num_frames: Self::default_num_frames(),
            points_per_frame: Self::default_points_per_frame(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingSection {
    #[serde(default = "LoggingSection::default_level")]
    pub level: String,
}

impl LoggingSection {
    pub fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: Self::default_level() }
    }
}

/// Collection of all the sections in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub contour: ContourSection,
    pub simulation: SimulationSection,
    pub logging: LoggingSection,
}

impl Config {
    /// Parse a config file from a given path.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path>,
    {
        let file_contents = std::fs::read_to_string(path)?;
        Self::parse(file_contents.as_str())
    }

    /// Parse a config file from its contents.
    pub fn parse(contents: &str) -> Result<Self> {
        let config = toml::from_str(contents)?;
        Ok(config)
    }
}
