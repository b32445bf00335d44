use crate::{FlockDistributedError, PushedItemMessage};
use anyhow::Result;
use crossbeam_channel::Sender;
use flock_core::{error::FlockError, ReplaySink, Transition};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    mem,
    path::Path,
};

/// Configuration of [`ChannelReplaySink`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChannelReplaySinkConfig {
    /// Number of items buffered until sent to the consumer.
    pub n_buffer: usize,
}

impl Default for ChannelReplaySinkConfig {
    fn default() -> Self {
        Self { n_buffer: 100 }
    }
}

impl ChannelReplaySinkConfig {
    /// Sets the number of items buffered until sent.
    pub fn n_buffer(mut self, n_buffer: usize) -> Self {
        self.n_buffer = n_buffer;
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

/// A prioritized transition sent to the replay tables.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayItem {
    /// Name of the replay table.
    pub table: String,

    /// Sampling priority.
    pub priority: f64,

    /// The transition.
    pub transition: Transition,
}

/// A [`ReplaySink`] sending items to a consumer in another thread.
///
/// Items are buffered and sent in batches of `n_buffer` as [`PushedItemMessage`]s.
/// The last appended transition is kept until the next one arrives, so an item can
/// reference a single timestep only. Remaining items are sent on
/// [`flush()`](Self::flush) and when the sink is dropped.
pub struct ChannelReplaySink {
    id: usize,

    /// Sender of [PushedItemMessage].
    sender: Sender<PushedItemMessage<ReplayItem>>,

    /// Number of items buffered until sent to the consumer.
    n_buffer: usize,

    /// Buffer of [`ReplayItem`]s.
    buffer: Vec<ReplayItem>,

    last: Option<Transition>,
}

impl ChannelReplaySink {
    /// Creates a sink of the actor `id`.
    pub fn build_with_sender(
        id: usize,
        config: &ChannelReplaySinkConfig,
        sender: Sender<PushedItemMessage<ReplayItem>>,
    ) -> Self {
        let n_buffer = config.n_buffer.max(1);
        Self {
            id,
            sender,
            n_buffer,
            buffer: Vec::with_capacity(n_buffer),
            last: None,
        }
    }

    /// Number of items waiting to be sent.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if no item is waiting to be sent.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Sends the buffered items.
    ///
    /// If the consumer is gone, the items stay in the buffer.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = mem::replace(&mut self.buffer, Vec::with_capacity(self.n_buffer));
        trace!("Actor {} sends {} items", self.id, buffer.len());

        let msg = PushedItemMessage {
            id: self.id,
            pushed_items: buffer,
        };

        match self.sender.send(msg) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.buffer = e.into_inner().pushed_items;
                Err(FlockDistributedError::SendMsgForPush.into())
            }
        }
    }
}

impl ReplaySink for ChannelReplaySink {
    fn append(&mut self, transition: Transition) -> Result<()> {
        self.last = Some(transition);
        Ok(())
    }

    fn create_item(&mut self, table: &str, num_timesteps: usize, priority: f64) -> Result<()> {
        let transition = match (&self.last, num_timesteps) {
            (Some(t), 1) => t.clone(),
            _ => {
                return Err(FlockError::InvalidItem {
                    table: table.to_string(),
                    num_timesteps,
                    appended: self.last.iter().count(),
                }
                .into())
            }
        };

        self.buffer.push(ReplayItem {
            table: table.to_string(),
            priority,
            transition,
        });
        if self.buffer.len() >= self.n_buffer {
            self.flush()?;
        }
        Ok(())
    }
}

impl Drop for ChannelReplaySink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Actor {} dropped {} items: {}", self.id, self.buffer.len(), e);
        }
    }
}
