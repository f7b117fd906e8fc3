mod cloud_event;
mod config;
mod error;
mod event_value;
mod handler;
mod json_text;
mod parameter;
mod timestamp;
mod transform;
mod vro_client;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use lambda_runtime::{service_fn, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::handler::{HandlerContext, Outcome};

/// Proxy-integration response understood by function URLs and API Gateway.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    status_code: u16,
    headers: BTreeMap<&'static str, &'static str>,
    body: String,
}

impl From<Outcome> for FunctionResponse {
    fn from(outcome: Outcome) -> Self {
        let content_type = if serde_json::from_str::<Value>(outcome.body()).is_ok() {
            "application/json"
        } else {
            "text/plain"
        };
        let mut headers = BTreeMap::new();
        headers.insert("content-type", content_type);
        FunctionResponse {
            status_code: outcome.status(),
            headers,
            body: outcome.body().to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(Settings::from_env().verbose);

    let context = Arc::new(HandlerContext::default());
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let context = Arc::clone(&context);
        async move { event_handler(event.payload, &context).await }
    }))
    .await
    .map_err(|error| anyhow!(error).context("lambda runtime failed"))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    if verbose {
        warn!("debug logging has been enabled for this function, sensitive information could be printed to the logs");
    }
}

async fn event_handler(
    payload: Value,
    context: &HandlerContext,
) -> Result<FunctionResponse, lambda_runtime::Error> {
    let body = request_body(payload);
    let outcome = context.handle(&body, &Settings::from_env()).await;
    Ok(FunctionResponse::from(outcome))
}

/// The CloudEvent text carried by a trigger payload: the `body` of a proxied
/// HTTP request, a bare string, or the payload itself for direct invocations.
fn request_body(payload: Value) -> String {
    match payload {
        Value::String(body) => body,
        Value::Object(ref request) => match request.get("body") {
            Some(Value::String(body)) => body.clone(),
            _ => payload.to_string(),
        },
        other => other.to_string(),
    }
}
