pub mod commands;
pub mod handle;
pub mod snapshot;

pub use commands::Command;
pub use handle::{SubCmdIdx, TraceHandle};
