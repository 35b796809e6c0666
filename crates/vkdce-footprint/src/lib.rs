//! Footprint builder: the core engine of a Vulkan command-trace analyzer.
//!
//! Given a recorded, replayable sequence of Vulkan API calls, the builder
//! produces a dependency graph (the *footprint*) whose nodes are per-command
//! behaviors over abstract state variables. A downstream dead-code-elimination
//! pass walks the graph to prune commands that cannot affect a user-selected
//! observation point.
//!
//! The builder consumes one command at a time through [`trace::MutationContext`],
//! which the trace-handling collaborator implements: it applies the command to
//! its own Vulkan state snapshot, reports the actually-executed subcommand
//! order for queue submissions, and answers handle-state queries.

pub mod binding;
pub mod builder;
pub mod config;
pub mod coverage;
pub mod descriptor;
pub mod error;
pub mod exec;
pub mod graph;
pub mod record;
pub mod state;
pub mod trace;

pub use builder::FootprintBuilder;
pub use config::FootprintOptions;
pub use error::FootprintError;
pub use graph::{Behavior, BehaviorId, Footprint, Var, VarId};
pub use trace::{MutationContext, MutationOutcome};
