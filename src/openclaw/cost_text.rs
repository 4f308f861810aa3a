//! Parser for the human-readable usage summary printed by `status --usage`.
//!
//! The block looks like:
//!
//! ```text
//! Usage
//!   Anthropic:
//!     Today: $1.24 · 310k tokens
//!     Last 30 days: $41.80 · 9.2M tokens
//!   OpenAI:
//!     Today: $0.00 · 0 tokens
//! ```
//!
//! Figure lines attach to the most recent provider header. Other lines, such
//! as notes between a provider's figures, are ignored.

use crate::openclaw::errors::InvokeError;
use serde::Serialize;
use std::sync::LazyLock;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostFigure {
    pub amount_usd: f64,
    /// Token description as printed, e.g. `310k tokens`.
    pub tokens: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProviderCost {
    pub provider: String,
    pub today: Option<CostFigure>,
    pub last_30_days: Option<CostFigure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostSummary {
    pub providers: Vec<ProviderCost>,
}

impl CostSummary {
    pub fn total_today(&self) -> f64 {
        self.providers
            .iter()
            .filter_map(|p| p.today.as_ref())
            .map(|f| f.amount_usd)
            .sum()
    }

    pub fn total_last_30_days(&self) -> f64 {
        self.providers
            .iter()
            .filter_map(|p| p.last_30_days.as_ref())
            .map(|f| f.amount_usd)
            .sum()
    }
}

enum Window {
    Today,
    Last30Days,
}

fn parse_figure_line(line: &str) -> Option<(Window, CostFigure)> {
    static FIGURE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(
            r"^(Today|Last 30 days):\s*\$([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:·\s*(.*))?$",
        )
        .unwrap()
    });

    let caps = FIGURE_RE.captures(line)?;
    let window = match &caps[1] {
        "Today" => Window::Today,
        _ => Window::Last30Days,
    };
    let amount_usd = caps[2].replace(',', "").parse().ok()?;
    let tokens = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((window, CostFigure { amount_usd, tokens }))
}

/// Strip list bullets and the trailing colon from a provider header line.
fn provider_name(line: &str) -> String {
    line.trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

/// A non-figure line names a provider when it ends in `:` or directly
/// precedes a figure line. Anything else is an annotation and is skipped.
fn is_provider_header(line: &str, next: Option<&str>) -> bool {
    line.ends_with(':') || next.is_some_and(|next| parse_figure_line(next).is_some())
}

/// Parse the usage block. Output without a single recognised figure is
/// reported as [`InvokeError::ParseFailed`].
pub fn parse_cost_summary(stdout: &str) -> Result<CostSummary, InvokeError> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut providers: Vec<ProviderCost> = Vec::new();
    let mut header: Option<String> = None;
    let mut attached = false;

    for (idx, &line) in lines.iter().enumerate() {
        let Some((window, figure)) = parse_figure_line(line) else {
            if is_provider_header(line, lines.get(idx + 1).copied()) {
                header = Some(provider_name(line));
                attached = false;
            }
            continue;
        };

        if !attached {
            providers.push(ProviderCost {
                provider: header.clone().unwrap_or_else(|| "unknown".to_string()),
                today: None,
                last_30_days: None,
            });
            attached = true;
        }
        let Some(current) = providers.last_mut() else {
            continue;
        };
        match window {
            Window::Today => current.today = Some(figure),
            Window::Last30Days => current.last_30_days = Some(figure),
        }
    }

    if providers.is_empty() {
        return Err(InvokeError::ParseFailed(
            "no `Today:` or `Last 30 days:` figures in usage output".to_string(),
        ));
    }
    Ok(CostSummary { providers })
}
