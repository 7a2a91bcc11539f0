//! Runtime settings shared by every module of a pipeline run.
//!
//! These control pipe buffering and how quickly blocked modules notice
//! cancellation. They are separate from the module graph so the same
//! description can be run with different tuning.

use crate::pipeline::pipe::PipeSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime settings for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Bounded buffer depth of every pipe, in chunks
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,

    /// Interval at which blocked reads and writes check for cancellation
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,

    /// Cancel the remaining modules as soon as one fails
    #[serde(default = "default_true")]
    pub cancel_on_failure: bool,
}

fn default_pipe_capacity() -> usize {
    64
}

fn default_read_poll_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            pipe_capacity: default_pipe_capacity(),
            read_poll_ms: default_read_poll_ms(),
            cancel_on_failure: true,
        }
    }
}

impl RuntimeSettings {
    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms.max(1))
    }

    pub fn to_pipe_settings(&self) -> PipeSettings {
        PipeSettings {
            capacity: self.pipe_capacity.max(1),
            poll: self.read_poll(),
        }
    }
}
