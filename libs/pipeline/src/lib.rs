pub mod config;
pub mod error;
mod chain;
mod diagnostics;
mod runner;

pub use config::{AckPolicy, RunnerConfig};
pub use error::PipelineError;
pub use chain::{Outcome, StageChain, process_payload};
pub use diagnostics::{DiagnosticEvent, MemoryDiagnostics, TracingDiagnostics};
pub use runner::{PipelineRunner, StatsSnapshot, spawn_runner};
