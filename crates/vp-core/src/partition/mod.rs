mod key;
mod router;
mod semantics;

pub use key::{KeyPart, KeySelector, PartitionKey};
pub use router::VirtualProcessorRouter;
pub use semantics::{
    ArgumentKind, FunctionDescriptor, LATE_DATA_TAG, OutputTag, TableArgument, TableSemantics,
};
