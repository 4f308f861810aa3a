use clap::Parser;
use std::path::PathBuf;

/// Mission Control: a cached HTTP dashboard API over the OpenClaw CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    /// Optional TOML config file, overridden by environment variables
    #[arg(long, env = "MISSION_CONTROL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output for local development
    Pretty,
    /// One JSON object per line for log collectors
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}
