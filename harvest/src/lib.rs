use camino::Utf8PathBuf as PathBuf;
use eyre::Result;
use harvest_core::Config;

pub mod telemetry;

/// Reads the config file if one was given, otherwise uses the built-in defaults.
pub async fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => harvest_core::read_config(&PathBuf::from(path)).await,
        None => {
            tracing::debug!("no config file given, using defaults");
            Ok(Config::default())
        }
    }
}
