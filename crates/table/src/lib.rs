pub mod coordinator;
pub mod pages;
pub mod source;
pub mod state;

pub use coordinator::{Command, TableHandle, TableSnapshot, spawn_table};
pub use pages::PageAccumulator;
pub use source::{MemorySource, SpanSource, paginate};
pub use state::{FetchKind, Outcome, PendingFetch, TableState, ViewMode};
