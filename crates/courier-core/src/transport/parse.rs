//! Parse raw response header lines and error bodies collected by curl.

use serde::Deserialize;

/// Status line and headers of the final response (after redirects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub status_text: String,
    pub headers: Vec<(String, String)>,
}

/// Parse collected header lines. curl reports every response in a redirect
/// chain, so only the block after the last status line is kept.
pub(crate) fn parse_head(lines: &[String]) -> ResponseHead {
    let mut head = ResponseHead::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            head = ResponseHead {
                status_text: reason_phrase(line),
                headers: Vec::new(),
            };
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            head.headers
                .push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    head
}

/// "HTTP/1.1 404 Not Found" -> "Not Found". HTTP/2 status lines carry no phrase.
fn reason_phrase(status_line: &str) -> String {
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next();
    let _code = parts.next();
    parts.next().unwrap_or("").trim().to_string()
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Structured message field of a JSON error body: `message`, falling back to a
/// string `error`. Non-JSON bodies and non-string fields yield `None`.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    let pick = |v: Option<serde_json::Value>| v.and_then(|v| v.as_str().map(str::to_string));
    pick(parsed.message).or_else(|| pick(parsed.error))
}
