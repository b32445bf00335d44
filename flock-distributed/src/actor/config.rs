use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Actor`](super::Actor).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActorConfig {
    /// Number of episodes after which the actor stops. `None` runs until the stop flag
    /// is raised.
    pub max_episodes: Option<usize>,

    /// Counter of environment steps in the parameter store, incremented after every
    /// episode.
    ///
    /// The default value is `executor_steps`.
    pub env_steps_key: Option<String>,

    /// Counter of completed episodes in the parameter store.
    ///
    /// The default value is `executor_episodes`.
    pub episodes_key: Option<String>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_episodes: None,
            env_steps_key: Some("executor_steps".to_string()),
            episodes_key: Some("executor_episodes".to_string()),
        }
    }
}

impl ActorConfig {
    /// Sets the number of episodes after which the actor stops.
    pub fn max_episodes(mut self, v: Option<usize>) -> Self {
        self.max_episodes = v;
        self
    }

    /// Sets the counter of environment steps.
    pub fn env_steps_key(mut self, v: Option<String>) -> Self {
        self.env_steps_key = v;
        self
    }

    /// Sets the counter of completed episodes.
    pub fn episodes_key(mut self, v: Option<String>) -> Self {
        self.episodes_key = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
