use std::path::PathBuf;

use anyhow::{Context, Result};

fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("vocab-player"))
}

pub fn database_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("vocab-player.db"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("vocab-player.log"))
}

pub fn default_catalog_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join("catalog.json"))
}

pub fn default_cue_path(file_name: &str) -> Result<PathBuf> {
    Ok(app_data_dir()?.join("cues").join(file_name))
}
