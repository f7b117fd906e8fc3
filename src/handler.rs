//! Per-invocation pipeline: parse, validate, transform, POST, respond.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cloud_event::CloudEvent;
use crate::config::{Settings, VcenterConfig, VroConfig};
use crate::error::BridgeError;
use crate::parameter::{ExecutionRequest, Parameter, ParameterValue};
use crate::transform::{EventNameResolver, InventoryPathResolver, Transformed, Transformer};
use crate::vro_client::{UpstreamResponse, VroClient, WorkflowExecutor};

const RAW_EVENT_DATA: &str = "rawEventData";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { body: String, status: u16 },
    ClientError(String),
    ConfigOrConnectionError(String),
    UpstreamError { body: String, status: u16 },
    /// A managed object failed its path filter; nothing was posted.
    FilteredOut(String),
}

impl Outcome {
    pub fn status(&self) -> u16 {
        match *self {
            Outcome::Success { status, .. } | Outcome::UpstreamError { status, .. } => status,
            Outcome::ClientError(_) => 400,
            Outcome::ConfigOrConnectionError(_) => 500,
            Outcome::FilteredOut(_) => 200,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Outcome::Success { body, .. } | Outcome::UpstreamError { body, .. } => body,
            Outcome::ClientError(body)
            | Outcome::ConfigOrConnectionError(body)
            | Outcome::FilteredOut(body) => body,
        }
    }
}

impl From<BridgeError> for Outcome {
    fn from(error: BridgeError) -> Self {
        match error.status() {
            400 => Outcome::ClientError(error.to_string()),
            _ => Outcome::ConfigOrConnectionError(error.to_string()),
        }
    }
}

/// State shared by every invocation of one function instance.
///
/// The vRO client and the optional vCenter configuration are loaded on first
/// use. A failed load is not cached, so the next invocation tries again.
pub struct HandlerContext {
    executor: OnceCell<Arc<dyn WorkflowExecutor>>,
    vcenter: OnceCell<VcenterConfig>,
    resolver: Box<dyn InventoryPathResolver>,
}

impl Default for HandlerContext {
    fn default() -> Self {
        Self::new(Box::new(EventNameResolver))
    }
}

impl HandlerContext {
    pub fn new(resolver: Box<dyn InventoryPathResolver>) -> Self {
        HandlerContext {
            executor: OnceCell::new(),
            vcenter: OnceCell::new(),
            resolver,
        }
    }

    #[cfg(test)]
    pub fn with_executor(executor: Arc<dyn WorkflowExecutor>) -> Self {
        let context = Self::default();
        let _ = context.executor.set(executor);
        context
    }

    pub async fn handle(&self, body: &str, settings: &Settings) -> Outcome {
        match self.run(body, settings).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, status = error.status(), "invocation failed");
                Outcome::from(error)
            }
        }
    }

    async fn run(&self, body: &str, settings: &Settings) -> Result<Outcome, BridgeError> {
        debug!(event = body, "reading cloud event");
        let event = CloudEvent::parse(body)?;
        debug!(id = ?event.id(), subject = ?event.subject(), "cloud event validated");

        let vcenter_host = self.vcenter_host(&event, settings)?;
        let transformer = Transformer::new(&vcenter_host, settings, self.resolver.as_ref());

        let mut request = ExecutionRequest::default();
        for (field, value) in event.data() {
            match transformer.transform(field, value.clone())? {
                Transformed::Parameter(parameter) => request.parameters.push(parameter),
                Transformed::Omitted => {}
                Transformed::FilteredOut(mismatch) => {
                    info!(%mismatch, "object filtered out, workflow not started");
                    return Ok(Outcome::FilteredOut(mismatch.to_string()));
                }
            }
        }
        request.parameters.push(Parameter::new(
            RAW_EVENT_DATA,
            ParameterValue::text(event.to_json_string()),
        ));
        for parameter in &request.parameters {
            debug!(name = %parameter.name, kind = %parameter.type_name, "passing parameter to vRO");
        }

        let workflow_id = settings.workflow_id()?;
        debug!(workflow_id, "workflow selected");
        let executor = self.executor(settings)?;
        let response = executor.execute(workflow_id, &request).await?;
        Ok(interpret(response))
    }

    fn vcenter_host(&self, event: &CloudEvent, settings: &Settings) -> Result<String, BridgeError> {
        match settings.vc_config_path {
            Some(ref path) => {
                let config = self
                    .vcenter
                    .get_or_try_init(|| VcenterConfig::from_file(path))?;
                Ok(config.vcenter.server.clone())
            }
            None => event.source_host(),
        }
    }

    fn executor(&self, settings: &Settings) -> Result<Arc<dyn WorkflowExecutor>, BridgeError> {
        self.executor
            .get_or_try_init(|| {
                let config = VroConfig::from_file(&settings.vro_config_path)?;
                debug!(server = %config.vro.server, port = config.vro.port, "vRO configuration loaded");
                let client = VroClient::new(&config.vro, settings.insecure_ssl)?;
                Ok::<Arc<dyn WorkflowExecutor>, BridgeError>(Arc::new(client))
            })
            .map(Arc::clone)
    }
}

fn interpret(response: UpstreamResponse) -> Outcome {
    let success = response.is_success();
    let UpstreamResponse { status, body } = response;
    if !success {
        warn!(status, "failed to execute workflow");
        return Outcome::UpstreamError { body, status };
    }
    match serde_json::from_str::<Value>(&body) {
        Ok(execution) => {
            debug!(
                workflow = ?execution.get("name").and_then(|name| name.as_str()),
                "successfully executed vRO workflow"
            );
            Outcome::Success { body, status }
        }
        Err(error) => {
            warn!(%error, status, "response is not valid JSON");
            Outcome::UpstreamError {
                body: format!("Response is not valid JSON\n{}", body),
                status,
            }
        }
    }
}
