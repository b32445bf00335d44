use crate::{error::FlockError, Step};
use anyhow::Result;
use std::collections::{vec_deque::Iter, VecDeque};

/// Bounded FIFO of the most recent steps of an episode.
///
/// Unlike a ring buffer with silent overwrite, appending to a full buffer is an
/// error; the owner pops the oldest step first.
#[derive(Clone, Debug)]
pub struct StepBuffer {
    steps: VecDeque<Step>,
    capacity: usize,
}

impl StepBuffer {
    /// Creates an empty buffer holding at most `capacity` steps.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(FlockError::InvalidNStep(capacity).into());
        }
        Ok(Self {
            steps: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Inserts the newest step at the back.
    pub fn append(&mut self, step: Step) -> Result<()> {
        if self.is_full() {
            return Err(FlockError::CapacityExceeded(self.capacity).into());
        }
        self.steps.push_back(step);
        Ok(())
    }

    /// Removes and returns the oldest step.
    pub fn pop_front(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    /// The oldest step.
    pub fn front(&self) -> Option<&Step> {
        self.steps.front()
    }

    /// Steps from the oldest to the newest.
    pub fn iter(&self) -> Iter<'_, Step> {
        self.steps.iter()
    }

    /// Number of buffered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Maximum number of buffered steps.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if no step is buffered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if the buffer holds `capacity` steps.
    pub fn is_full(&self) -> bool {
        self.steps.len() == self.capacity
    }

    /// Discards all steps.
    pub fn clear(&mut self) {
        self.steps.clear();
    }
}
