#[macro_use]
mod log_macros;

pub mod error;
pub mod input;
pub mod lifecycle;
pub mod metrics;
mod output_task;
pub mod scheduler;
pub mod sink_build;
mod sweeper_task;
pub mod tracing_init;
mod worker;

pub use lifecycle::{Engine, wait_for_signal};
