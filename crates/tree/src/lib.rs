pub mod expand;
pub mod flatten;
pub mod forest;
pub mod row;

pub use expand::ExpansionState;
pub use flatten::flatten;
pub use forest::{SpanNode, build_forest};
pub use row::{Row, flat_rows};
