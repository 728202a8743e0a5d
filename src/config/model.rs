// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Stream configuration file exactly as read from TOML.
///
/// ```toml
/// [[stream]]
/// id = "cam-1"
/// src = "rtmp://source.example/live/cam1"
/// dst = "rtmp://dest.example/live/cam1"
/// ```
///
/// Entries keep file order here; duplicates are only resolved when the raw
/// file is converted into a [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// All `[[stream]]` entries, in file order.
    #[serde(default)]
    pub stream: Vec<WorkerConfig>,
}

/// One relayed stream: where to read from and where to push to.
///
/// Identity is `id`. Two configs with the same id describe the same worker;
/// the worker is restarted when `source` or `destination` changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Unique, non-empty stream identifier. Used as the log prefix.
    pub id: String,

    /// Source endpoint URI (e.g. `rtmp://...`).
    #[serde(rename = "src")]
    pub source: String,

    /// Destination endpoint URI.
    #[serde(rename = "dst")]
    pub destination: String,
}

impl WorkerConfig {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// True when both endpoints match, i.e. no restart is needed.
    pub fn same_endpoints(&self, other: &WorkerConfig) -> bool {
        self.source == other.source && self.destination == other.destination
    }
}

/// Validated desired set of workers, keyed by stream id.
///
/// Build one through [`load_and_validate`](crate::config::load_and_validate)
/// or `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    streams: BTreeMap<String, WorkerConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(streams: BTreeMap<String, WorkerConfig>) -> Self {
        Self { streams }
    }

    /// An empty desired set. Reconciling against it stops every worker.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn streams(&self) -> &BTreeMap<String, WorkerConfig> {
        &self.streams
    }

    pub fn get(&self, id: &str) -> Option<&WorkerConfig> {
        self.streams.get(id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
