use async_trait::async_trait;
use tracing::debug;

use crate::config::VroServer;
use crate::error::BridgeError;
use crate::parameter::ExecutionRequest;

/// Raw outcome of a workflow execution request, passed back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    async fn execute(
        &self,
        workflow_id: &str,
        request: &ExecutionRequest,
    ) -> Result<UpstreamResponse, BridgeError>;
}

pub struct VroClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    pass: String,
}

impl VroClient {
    pub fn new(server: &VroServer, insecure_ssl: bool) -> Result<Self, BridgeError> {
        Self::with_base_url(server.base_url(), &server.user, &server.pass, insecure_ssl)
    }

    pub fn with_base_url(
        base_url: String,
        user: &str,
        pass: &str,
        insecure_ssl: bool,
    ) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure_ssl)
            .build()?;
        Ok(VroClient {
            client,
            base_url,
            user: user.to_string(),
            pass: pass.to_string(),
        })
    }

    fn executions_url(&self, workflow_id: &str) -> String {
        format!(
            "{}/vco/api/workflows/{}/executions",
            self.base_url, workflow_id
        )
    }
}

#[async_trait]
impl WorkflowExecutor for VroClient {
    async fn execute(
        &self,
        workflow_id: &str,
        request: &ExecutionRequest,
    ) -> Result<UpstreamResponse, BridgeError> {
        let url = self.executions_url(workflow_id);
        debug!(%url, "attempting HTTP POST");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(request)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, "POST completed");
        Ok(UpstreamResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VroServer;
    use crate::parameter::{ExecutionRequest, Parameter, ParameterValue};
    use crate::vro_client::{UpstreamResponse, VroClient, WorkflowExecutor};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with `status` and `body`, handing back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];
            loop {
                let read = stream.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let line = line.to_ascii_lowercase();
                            line.strip_prefix("content-length:")
                                .map(|value| value.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if read == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base_url, handle)
    }

    #[test]
    fn test_executions_url() {
        let server = VroServer {
            server: "vro01.lab.local".to_string(),
            port: 8281,
            user: "admin".to_string(),
            pass: "secret".to_string(),
        };
        let client = VroClient::new(&server, false).unwrap();
        assert_eq!(
            client.executions_url("5fff3097-61d4-4a5b-929c-9a1ce07ec195"),
            "https://vro01.lab.local:8281/vco/api/workflows/5fff3097-61d4-4a5b-929c-9a1ce07ec195/executions"
        );
    }

    #[tokio::test]
    async fn test_execute_posts_parameters_with_basic_auth() {
        let (base_url, server) = serve_once("404 Not Found", "<html>Not Found</html>").await;
        let client = VroClient::with_base_url(base_url, "admin", "secret", true).unwrap();
        let request = ExecutionRequest {
            parameters: vec![Parameter::new("UserName", ParameterValue::text("bob"))],
        };

        let response = client.execute("wf-1", &request).await.unwrap();

        assert_eq!(
            response,
            UpstreamResponse {
                status: 404,
                body: "<html>Not Found</html>".to_string(),
            }
        );
        assert!(!response.is_success());
        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /vco/api/workflows/wf-1/executions HTTP/1.1"));
        assert!(raw
            .to_ascii_lowercase()
            .contains("authorization: basic ywrtaw46c2vjcmv0"));
        assert!(raw.contains(r#""name":"userName""#));
    }

    #[tokio::test]
    async fn test_transport_failure_is_server_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = VroClient::with_base_url(base_url, "admin", "secret", false).unwrap();
        let error = client
            .execute("wf-1", &ExecutionRequest::default())
            .await
            .unwrap_err();

        assert_eq!(error.status(), 500);
        assert!(error.to_string().starts_with("Unexpected error occurred > "));
    }
}
