pub mod builder;

pub use builder::WorkerInfoBuilder;

use serde::{Deserialize, Serialize};

/// Snapshot of a launched worker process.
///
/// Built by the supervisor once the worker has been spawned; read-only
/// afterward. Use [`WorkerInfoBuilder`] to construct validated instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// Process id of the worker.
    pub pid: u32,
    /// Loopback port the worker was told to bind.
    pub port: u16,
    /// Base URL requests are sent to, e.g. `https://localhost:4096`.
    pub base_url: String,
    /// Whether this supervisor launched (and therefore owns) the process.
    pub owned: bool,
}
