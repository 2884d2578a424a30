//! libcurl-backed transport.
//!
//! Each dispatch runs a fresh `Easy` handle on tokio's blocking pool, so the
//! calling task is suspended (not blocked) while curl works.

use async_trait::async_trait;
use std::str;

use super::parse;
use super::{Method, Request, Response, Transport};
use crate::failure::{Failure, TransportErrorKind};

/// Redirect hops curl will follow before giving up.
const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct CurlTransport;

impl CurlTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for CurlTransport {
    async fn dispatch(&self, request: &Request) -> Result<Response, Failure> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || perform(&request))
            .await
            .map_err(|e| {
                Failure::transport(
                    TransportErrorKind::Other,
                    format!("dispatch task failed: {}", e),
                )
            })?
    }
}

/// Classify a curl error for the failure descriptor.
fn classify_curl_error(e: &curl::Error) -> TransportErrorKind {
    if e.is_operation_timedout() {
        return TransportErrorKind::Timeout;
    }
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return TransportErrorKind::InvalidRequest;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_ssl_connect_error()
    {
        return TransportErrorKind::Connection;
    }
    TransportErrorKind::Other
}

fn curl_failure(e: curl::Error) -> Failure {
    Failure::transport(classify_curl_error(&e), e.to_string())
}

/// Performs one request in the current thread.
fn perform(request: &Request) -> Result<Response, Failure> {
    let mut body: Vec<u8> = Vec::new();
    let mut header_lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url).map_err(curl_failure)?;
    easy.follow_location(true).map_err(curl_failure)?;
    easy.max_redirections(MAX_REDIRECTS).map_err(curl_failure)?;
    easy.timeout(request.timeout).map_err(curl_failure)?;

    match request.method {
        Method::Head => easy.nobody(true).map_err(curl_failure)?,
        Method::Post => easy.post(true).map_err(curl_failure)?,
        Method::Get | Method::Put | Method::Patch | Method::Delete => {}
    }
    if let Some(payload) = &request.body {
        easy.post_fields_copy(payload).map_err(curl_failure)?;
    } else if request.method == Method::Post {
        easy.post_field_size(0).map_err(curl_failure)?;
    }
    // Setting a body switches curl to POST; pin every other verb explicitly.
    if !matches!(request.method, Method::Post | Method::Head) {
        easy.custom_request(request.method.as_str())
            .map_err(curl_failure)?;
    }

    let mut list = curl::easy::List::new();
    for (k, v) in &request.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(curl_failure)?;
    }
    easy.http_headers(list).map_err(curl_failure)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    header_lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(curl_failure)?;
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_failure)?;
        transfer.perform().map_err(curl_failure)?;
    }

    let code = easy.response_code().map_err(curl_failure)?;
    let head = parse::parse_head(&header_lines);
    let status = u16::try_from(code).unwrap_or(0);

    tracing::trace!(
        method = %request.method,
        url = %request.url,
        status,
        bytes = body.len(),
        "dispatch finished"
    );

    if (200..300).contains(&status) {
        Ok(Response {
            status,
            status_text: head.status_text,
            headers: head.headers,
            body,
        })
    } else {
        Err(Failure::status(
            status,
            head.status_text,
            String::from_utf8_lossy(&body).into_owned(),
        ))
    }
}
