//! Typed views of OpenClaw CLI output.
//!
//! The CLI's JSON varies between subcommands and releases, so every field is
//! optional or defaulted and unknown fields are ignored. What must hold is the
//! top-level shape; anything else is a [`InvokeError::ParseFailed`].

use crate::openclaw::errors::InvokeError;
use crate::openclaw::json::{extract_json_payload, parse_json_with_context};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Runtime status (`status --json`)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct RuntimeStatus {
    pub version: Option<String>,
    pub gateway: Option<GatewayStatus>,
    pub agents: Vec<AgentStatus>,
    pub sessions: Option<SessionCounts>,
    /// Top-level fields this crate does not model, passed through as-is.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct GatewayStatus {
    pub url: Option<String>,
    pub reachable: Option<bool>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct AgentStatus {
    pub id: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub status: Option<String>,
    pub sessions: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct SessionCounts {
    pub active: Option<u32>,
    pub total: Option<u32>,
}

impl RuntimeStatus {
    pub fn parse(stdout: &str) -> Result<Self, InvokeError> {
        parse_object(stdout, "runtime status")
    }
}

// ---------------------------------------------------------------------------
// Cost detail (`gateway usage-cost --json`)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct CostTotals {
    pub total_cost: f64,
    #[ts(type = "number")]
    pub input_tokens: u64,
    #[ts(type = "number")]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct DailyCost {
    pub date: String,
    pub total_cost: f64,
    #[serde(alias = "input")]
    #[ts(type = "number")]
    pub input_tokens: u64,
    #[serde(alias = "output")]
    #[ts(type = "number")]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostDetail {
    pub totals: CostTotals,
    pub daily: Vec<DailyCost>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCostDetail {
    totals: Option<CostTotals>,
    daily: Vec<DailyCost>,
}

impl CostDetail {
    /// Parse the JSON cost report, deriving totals from the daily rows when
    /// the CLI omits them.
    pub fn parse(stdout: &str) -> Result<Self, InvokeError> {
        let raw: RawCostDetail = parse_object(stdout, "cost detail")?;
        let totals = raw.totals.unwrap_or_else(|| CostTotals {
            total_cost: raw.daily.iter().map(|d| d.total_cost).sum(),
            input_tokens: raw.daily.iter().map(|d| d.input_tokens).sum(),
            output_tokens: raw.daily.iter().map(|d| d.output_tokens).sum(),
        });
        Ok(Self {
            totals,
            daily: raw.daily,
        })
    }
}

// ---------------------------------------------------------------------------
// Cron jobs (`cron list --json`)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct CronJob {
    pub id: String,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    /// Either a cron expression string or a structured schedule object.
    pub schedule: Option<serde_json::Value>,
    pub last_status: Option<String>,
    pub last_run_at: Option<serde_json::Value>,
    pub next_run_at: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CronJobs {
    pub jobs: Vec<CronJob>,
}

#[derive(Deserialize)]
struct WrappedCronJobs {
    jobs: Vec<CronJob>,
}

impl CronJobs {
    /// Accepts both `{"jobs": [...]}` and a bare array.
    pub fn parse(stdout: &str) -> Result<Self, InvokeError> {
        let payload = extract_json_payload(stdout)?;
        let jobs = if payload.starts_with('[') {
            parse_json_with_context::<Vec<CronJob>>(payload)?
        } else {
            parse_json_with_context::<WrappedCronJobs>(payload)?.jobs
        };
        Ok(Self { jobs })
    }
}

/// Output of a mutating command, returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommandReport {
    pub command: String,
    pub output: String,
}

/// Parse a payload that must be a JSON object. Serde would happily build a
/// struct from an array, which is never what the CLI meant.
fn parse_object<T: serde::de::DeserializeOwned>(
    stdout: &str,
    what: &str,
) -> Result<T, InvokeError> {
    let payload = extract_json_payload(stdout)?;
    if !payload.starts_with('{') {
        return Err(InvokeError::ParseFailed(format!(
            "{what} must be a JSON object"
        )));
    }
    parse_json_with_context(payload)
}
