// src/config/validate.rs

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile, WorkerConfig};
use crate::errors::{Result, StreamRunnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::StreamRunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(collapse_duplicates(raw.stream)))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    for (idx, stream) in cfg.stream.iter().enumerate() {
        validate_stream_id(idx, stream)?;
        validate_endpoints(stream)?;
    }
    Ok(())
}

fn validate_stream_id(idx: usize, stream: &WorkerConfig) -> Result<()> {
    if stream.id.trim().is_empty() {
        return Err(StreamRunnerError::ConfigError(format!(
            "stream #{} has an empty `id`",
            idx + 1
        )));
    }
    if stream.id.chars().any(char::is_whitespace) {
        return Err(StreamRunnerError::ConfigError(format!(
            "stream id '{}' must not contain whitespace",
            stream.id
        )));
    }
    Ok(())
}

fn validate_endpoints(stream: &WorkerConfig) -> Result<()> {
    if stream.source.trim().is_empty() {
        return Err(StreamRunnerError::ConfigError(format!(
            "stream '{}' has an empty `src`",
            stream.id
        )));
    }
    if stream.destination.trim().is_empty() {
        return Err(StreamRunnerError::ConfigError(format!(
            "stream '{}' has an empty `dst`",
            stream.id
        )));
    }
    Ok(())
}

/// Key the entries by id. A later entry with the same id replaces the earlier
/// one.
fn collapse_duplicates(streams: Vec<WorkerConfig>) -> BTreeMap<String, WorkerConfig> {
    let mut out = BTreeMap::new();
    for stream in streams {
        if let Some(previous) = out.insert(stream.id.clone(), stream) {
            warn!(
                stream_id = %previous.id,
                "duplicate stream id in config; the last entry wins"
            );
        }
    }
    out
}
