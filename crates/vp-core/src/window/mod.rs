mod assigner;
mod lifecycle;
mod time_window;

pub use assigner::WindowAssigner;
pub use lifecycle::{ElementDecision, WindowAction, WindowLifecycle, WindowPhase};
pub use time_window::TimeWindow;
