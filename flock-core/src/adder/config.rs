//! Configuration of [`NStepTransitionAdder`](super::NStepTransitionAdder).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`NStepTransitionAdder`](super::NStepTransitionAdder).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NStepTransitionAdderConfig {
    /// The "N" in N-step transition. Must be at least 1.
    pub n_step: usize,

    /// Discount applied by the adder at every hop, in addition to the discounts of
    /// the environment.
    pub discount: f32,
}

impl Default for NStepTransitionAdderConfig {
    fn default() -> Self {
        Self {
            n_step: 5,
            discount: 0.99,
        }
    }
}

impl NStepTransitionAdderConfig {
    /// Sets the N-step horizon.
    pub fn n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    /// Sets the accumulator discount.
    pub fn discount(mut self, discount: f32) -> Self {
        self.discount = discount;
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
