//! Client for the OpenClaw CLI: process invocation, output parsing, and the
//! cached datasets built on top of them.

pub mod cost_text;
pub mod datasets;
pub mod errors;
pub mod invoker;
pub mod json;
pub mod models;

pub use datasets::{
    CacheKey, Dataset, DatasetDiagnostics, DatasetLimits, DatasetSettings, JobId, OpenClaw,
    Snapshot,
};
pub use errors::InvokeError;
pub use invoker::{CommandOutput, CommandRunner, CommandSpec, ExitPolicy, ProcessRunner};
