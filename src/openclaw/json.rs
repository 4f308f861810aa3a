//! JSON extraction and parsing for OpenClaw CLI output.

use crate::openclaw::errors::InvokeError;
use serde_json::error::Category;

/// Locate the JSON document in CLI stdout.
///
/// Plugins may print diagnostic lines ahead of the payload, so the payload
/// starts at a line whose first non-blank character is `{` or `[` and runs to
/// the end of the output. Log lines such as `[plugins] loaded` also start with
/// `[`, so the first candidate that is a complete JSON document wins; if none
/// is, the first candidate is returned and fails later with a syntax error.
pub fn extract_json_payload(stdout: &str) -> Result<&str, InvokeError> {
    let mut first_candidate = None;
    let mut offset = 0;
    for line in stdout.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let candidate = stdout[offset..].trim();
            if serde_json::from_str::<serde::de::IgnoredAny>(candidate).is_ok() {
                return Ok(candidate);
            }
            first_candidate.get_or_insert(candidate);
        }
        offset += line.len();
    }
    first_candidate.ok_or_else(|| {
        InvokeError::MalformedOutput(format!(
            "no JSON payload in {} bytes of output",
            stdout.len()
        ))
    })
}

/// Deserialize `body`, reporting the serde path, a type-mismatch summary and
/// a snippet of the offending line on failure.
///
/// Syntax errors become [`InvokeError::MalformedOutput`]; well-formed JSON of
/// the wrong shape becomes [`InvokeError::ParseFailed`].
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(
    body: &str,
) -> Result<T, InvokeError> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    let err = match serde_path_to_error::deserialize(jd) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let inner = err.inner();
    let (line, column) = (inner.line(), inner.column());
    let path = err.path().to_string();

    let msg = inner.to_string();
    let loc = format!(" at line {line} column {column}");
    let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

    let mut detail = String::new();
    if !path.is_empty() && path != "." {
        detail.push_str(&format!("at path '{path}': "));
    }
    detail.push_str(&format!(
        "{} (line {line} col {column})\n{}",
        describe_mismatch(msg),
        snippet(body, line, column, 20)
    ));

    match inner.classify() {
        Category::Data => Err(InvokeError::ParseFailed(detail)),
        Category::Syntax | Category::Eof | Category::Io => {
            Err(InvokeError::MalformedOutput(detail))
        }
    }
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(error_msg: &str) -> String {
    if let Some(rest) = error_msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    error_msg.to_string()
}

fn snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    // Work in chars; CLI output routinely contains `·` and other multibyte text.
    let chars: Vec<char> = target.chars().collect();
    let error_idx = column.saturating_sub(1).min(chars.len());
    let start = error_idx.saturating_sub(context_len / 2);
    let end = (error_idx + context_len / 2).min(chars.len());

    let slice: String = chars[start..end].iter().collect();
    let indicator = " ".repeat(error_idx - start) + "^";
    format!("...{slice}...\n   {indicator}")
}
