//! `courier request` – send one request through the pipeline.

use anyhow::{anyhow, Context, Result};
use courier_core::config::CourierConfig;
use courier_core::{
    CancellationToken, CredentialProvider, CurlTransport, LogRedirect, Method, Presenter,
    RequestPipeline, RequestSpec, Session,
};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RequestArgs;

/// Split "Name: value" into its parts.
pub(crate) fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header must look like 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header name is empty in '{}'", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub(crate) fn build_spec(args: &RequestArgs, cfg: &CourierConfig) -> Result<RequestSpec> {
    let method: Method = args.method.parse().map_err(|e: String| anyhow!(e))?;
    let mut spec = RequestSpec::new(method, args.path.clone());
    if let Some(data) = &args.data {
        let value: serde_json::Value =
            serde_json::from_str(data).context("--data must be valid JSON")?;
        spec = spec.with_body(serde_json::to_vec(&value)?);
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        spec = spec.with_header(name, value);
    }
    if args.max_attempts.is_some() || args.base_delay_ms.is_some() {
        let mut policy = cfg.retry_policy();
        if let Some(n) = args.max_attempts {
            policy = policy.with_max_attempts(n);
        }
        if let Some(ms) = args.base_delay_ms {
            policy = policy.with_base_delay(Duration::from_millis(ms));
        }
        spec = spec.with_retry(policy);
    }
    Ok(spec)
}

pub async fn run_request(cfg: &CourierConfig, args: RequestArgs) -> Result<()> {
    let session = Session::new();
    if let Some(token) = args
        .token
        .clone()
        .or_else(|| std::env::var("COURIER_TOKEN").ok())
    {
        session.login(token, None);
    }

    let credentials = CredentialProvider::new(session, Arc::new(LogRedirect));
    let mut pipeline = RequestPipeline::from_config(cfg, CurlTransport::new(), credentials)?;
    if let Some(base_url) = &args.base_url {
        pipeline = RequestPipeline::new(
            CurlTransport::new(),
            pipeline.credentials().clone(),
            base_url,
        )
        .with_context(|| format!("invalid --base-url '{}'", base_url))?
        .with_timeout(cfg.timeout())
        .with_retry_policy(cfg.retry_policy());
    }

    let spec = build_spec(&args, cfg)?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match pipeline.execute_with_cancel(spec, &cancel).await {
        Ok(response) => {
            tracing::info!(status = response.status, "request succeeded");
            println!("{}", response.text());
            Ok(())
        }
        Err(err) => {
            let presentation =
                Presenter::new()
                    .silent()
                    .present(&err, args.context.as_deref(), serde_json::Map::new());
            if args.log_json {
                eprintln!("{}", presentation.log.to_json());
            }
            Err(anyhow!(
                "{} ({}, {} attempt(s))",
                presentation.message,
                err.kind(),
                err.attempts()
            ))
        }
    }
}
