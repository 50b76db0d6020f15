use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently running invocations across keys (Semaphore limit).
    pub parallelism: usize,
    /// Mailbox capacity of each per-key worker.
    #[serde(default = "default_key_queue_capacity")]
    pub key_queue_capacity: usize,
    /// Capacity of the pipeline input channel.
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,
}

fn default_key_queue_capacity() -> usize {
    256
}

fn default_input_capacity() -> usize {
    4096
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            key_queue_capacity: default_key_queue_capacity(),
            input_capacity: default_input_capacity(),
        }
    }
}
