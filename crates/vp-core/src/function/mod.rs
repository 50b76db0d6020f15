mod builtin;
mod collector;
pub(crate) mod context;
mod ptf;
mod window_fn;

pub use builtin::{CountWindowFunction, RunningCountFunction};
pub use collector::Collector;
pub use context::{NamedState, PtfContext, ScopedState, WindowContext};
pub use ptf::ProcessTableFunction;
pub use window_fn::{AsyncWindowFunction, WindowInput};
