mod backend;
mod decl;
mod store;
mod txn;

pub use backend::{
    MemoryBackend, Namespace, StagedOp, StateAddress, StateBackend, StateValue, StoredEntry,
};
pub use decl::{StateDecl, StateDecls};
pub use store::{KeyedState, StateStore, WINDOW_BUFFER};
pub use txn::StateTxn;
