//! Configuration of [`ParameterClient`](super::ParameterClient).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ParameterClient`](super::ParameterClient).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ParameterClientConfig {
    /// Parameters fetched from the store.
    pub get_keys: Vec<String>,

    /// Parameters pushed to the store.
    pub set_keys: Vec<String>,

    /// Number of calls of the periodic hooks between two synchronizations.
    pub update_period: usize,
}

impl Default for ParameterClientConfig {
    fn default() -> Self {
        Self {
            get_keys: vec![],
            set_keys: vec![],
            update_period: 1,
        }
    }
}

impl ParameterClientConfig {
    /// Sets the parameters fetched from the store.
    pub fn get_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.get_keys = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Sets the parameters pushed to the store.
    pub fn set_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.set_keys = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Sets the update period.
    pub fn update_period(mut self, update_period: usize) -> Self {
        self.update_period = update_period;
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
