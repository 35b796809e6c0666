use serde::{Deserialize, Serialize};

/// Builder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FootprintOptions {
    /// Emit a debug log line for every dependency edge stamped. Very noisy;
    /// intended for tracing why a particular command was kept or pruned.
    #[serde(default)]
    pub debug_dependencies: bool,
}
