#![allow(dead_code)]

use stream_runner::config::{ConfigFile, RawConfigFile, WorkerConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile { stream: Vec::new() },
        }
    }

    pub fn with_stream(mut self, id: &str, src: &str, dst: &str) -> Self {
        self.config.stream.push(WorkerConfig::new(id, src, dst));
        self
    }

    /// Add a stream with endpoints derived from its id.
    pub fn with_default_stream(self, id: &str) -> Self {
        let src = format!("rtmp://source.test/live/{id}");
        let dst = format!("rtmp://dest.test/live/{id}");
        self.with_stream(id, &src, &dst)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
