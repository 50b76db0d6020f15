pub mod engine;
pub mod logging;
pub mod output;
pub mod runtime;
pub mod state;
pub mod types;
pub mod validate;
pub mod window;

pub use engine::EngineConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use output::{OutputConfig, SinkUri, parse_sink_uri};
pub use runtime::RuntimeConfig;
pub use state::StateConfig;
pub use types::{AssignerKind, FiringMode, HumanDuration, LatePolicy};
pub use validate::validate_window;
pub use window::{AssignerSpec, WindowConfig, WindowDefaults, WindowOverride};
