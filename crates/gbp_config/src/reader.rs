use std::path::Path;

use directories::BaseDirs;

use super::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigReaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no config file found")]
    NoConfigFile,
    #[error("parse error: {0}")]
    Parse(#[from] super::ParseError),
}

pub type Result<T> = std::result::Result<T, ConfigReaderError>;

fn default_paths() -> Vec<std::path::PathBuf> {
    let mut paths = vec![];

    if let Some(base_dirs) = BaseDirs::new() {
        paths.push(base_dirs.config_dir().join("gbp-contour").join("config.toml"));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config/config.toml"));
    }

    paths
}

/// Read a config file from `path`, falling back to the default search
/// locations. Returns `NoConfigFile` if none exist; callers that want to
/// fall back to `Config::default()` in that case do so themselves.
pub fn read_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config> {
    match path
        .map(|p| p.as_ref().to_path_buf())
        .into_iter()
        .chain(default_paths())
        .find(|p| p.exists())
    {
        Some(path) => Ok(Config::from_file(path)?),
        None => Err(ConfigReaderError::NoConfigFile),
    }
}
