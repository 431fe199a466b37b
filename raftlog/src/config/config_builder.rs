use super::{Config, LogDestination};

#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    pub(crate) config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn applied(mut self, applied: u64) -> Self {
        self.config.applied = applied;
        self
    }

    pub fn max_committed_size_per_ready(mut self, size: u64) -> Self {
        self.config.max_committed_size_per_ready = size;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn log_destination(mut self, destination: LogDestination) -> Self {
        self.config.log_destination = destination;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
