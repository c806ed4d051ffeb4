use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

use super::player::{NoticeSources, split_command};
use super::sequence::DEFAULT_MEDIA_BASE;
use crate::paths;

const DEFAULT_START_MARKER: &str = "vocab-player:playing";
const DEFAULT_AUDIO_COMMAND: &str =
    "mpv --no-video --quiet --term-playing-msg=vocab-player:playing";
const DEFAULT_SETTLE_MS: u64 = 50;
const EMPTY_CUE_FILE: &str = "empty_category.mp3";
const END_CUE_FILE: &str = "endOfPlay.mp3";

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) catalog_path: PathBuf,
    pub(crate) audio_command: Vec<String>,
    /// Stdout text that tells a clip has really started playing.
    pub(crate) start_marker: Option<String>,
    pub(crate) media_base: String,
    pub(crate) notices: NoticeSources,
    pub(crate) settle_delay: Duration,
}

impl Settings {
    /// Flags win over environment variables, which win over defaults.
    pub(crate) fn resolve(catalog_flag: Option<PathBuf>) -> Result<Self> {
        let catalog_path = match catalog_flag {
            Some(path) => path,
            None => resolve_catalog_from_env(env::var_os("VOCAB_PLAYER_CATALOG"))?,
        };
        let command_env = env::var_os("VOCAB_PLAYER_AUDIO_CMD");
        let start_marker = resolve_start_marker_from_env(
            env::var_os("VOCAB_PLAYER_START_MARKER"),
            non_empty(command_env.clone()).is_some(),
        );
        let audio_command = resolve_audio_command_from_env(command_env)?;
        let notices = NoticeSources {
            empty_collection: resolve_cue_from_env(
                env::var_os("VOCAB_PLAYER_EMPTY_CUE"),
                EMPTY_CUE_FILE,
            )?,
            end_of_playback: resolve_cue_from_env(env::var_os("VOCAB_PLAYER_END_CUE"), END_CUE_FILE)?,
        };

        Ok(Self {
            catalog_path,
            audio_command,
            start_marker,
            media_base: resolve_media_base_from_env(env::var_os("VOCAB_PLAYER_MEDIA_BASE")),
            notices,
            settle_delay: resolve_settle_delay_from_env(env::var_os("VOCAB_PLAYER_SETTLE_MS")),
        })
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|value| !value.is_empty())
}

pub(crate) fn resolve_catalog_from_env(env_value: Option<OsString>) -> Result<PathBuf> {
    match non_empty(env_value) {
        Some(value) => Ok(PathBuf::from(value)),
        None => paths::default_catalog_path(),
    }
}

pub(crate) fn resolve_audio_command_from_env(env_value: Option<OsString>) -> Result<Vec<String>> {
    let raw = match non_empty(env_value) {
        Some(value) => value.to_string_lossy().into_owned(),
        None => DEFAULT_AUDIO_COMMAND.to_string(),
    };
    let command = split_command(&raw);
    if command.is_empty() {
        bail!("VOCAB_PLAYER_AUDIO_CMD does not name a program");
    }
    Ok(command)
}

/// A custom player command has no marker unless one is configured for it.
pub(crate) fn resolve_start_marker_from_env(
    env_value: Option<OsString>,
    custom_command: bool,
) -> Option<String> {
    match non_empty(env_value) {
        Some(value) => Some(value.to_string_lossy().into_owned()),
        None if custom_command => None,
        None => Some(DEFAULT_START_MARKER.to_string()),
    }
}

pub(crate) fn resolve_media_base_from_env(env_value: Option<OsString>) -> String {
    match non_empty(env_value) {
        Some(value) => value.to_string_lossy().trim_end_matches('/').to_string(),
        None => DEFAULT_MEDIA_BASE.to_string(),
    }
}

pub(crate) fn resolve_cue_from_env(env_value: Option<OsString>, file_name: &str) -> Result<PathBuf> {
    match non_empty(env_value) {
        Some(value) => Ok(PathBuf::from(value)),
        None => paths::default_cue_path(file_name),
    }
}

/// Unparseable values fall back to the default.
pub(crate) fn resolve_settle_delay_from_env(env_value: Option<OsString>) -> Duration {
    let millis = non_empty(env_value)
        .and_then(|value| value.to_string_lossy().trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_SETTLE_MS);
    Duration::from_millis(millis)
}
