pub mod bridge;
pub mod clock;
pub mod error;
pub mod function;
pub mod partition;
pub mod processor;
pub mod row;
pub mod sink;
pub mod state;
pub mod window;
