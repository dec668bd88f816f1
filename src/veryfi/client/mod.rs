
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{AuthHeaders, Config, Credentials};
use crate::veryfi::document::{DocumentPayload, DocumentType};
use crate::{Result, VeryfiError};

#[derive(Debug, Clone)]
pub struct VeryfiClient {
    base_url: Url,
    credentials: Credentials,
    timeout: Duration,
    agent: ureq::Agent,
}

/// Status and body of a completed HTTP exchange.
struct RawResponse {
    status: u16,
    body: String,
}

impl VeryfiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.api.api_url()?;
        let timeout = Duration::from_secs(config.api.timeout_secs);

        Ok(Self {
            base_url,
            credentials: config.credentials.clone(),
            timeout,
            agent: build_agent(timeout),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upload a document to Veryfi and return the extracted data verbatim.
    ///
    /// Credentials are checked first and the file second; neither failure
    /// touches the network. Exactly one request is made otherwise, with no
    /// retries.
    #[inline]
    pub async fn process_document(
        &self,
        file_path: &Path,
        document_type: DocumentType,
    ) -> Result<Value> {
        let auth = self.credentials.authorize()?;

        info!("Processing document: {}", file_path.display());

        let payload = DocumentPayload::from_file(file_path, document_type).await?;
        let result = self.submit(&payload, &auth).await?;

        let file_name = file_path
            .file_name()
            .map_or_else(|| file_path.display().to_string(), |n| n.to_string_lossy().into_owned());
        info!("Successfully processed document: {}", file_name);

        Ok(result)
    }

    /// Post an encoded document and decode the JSON response.
    #[inline]
    pub async fn submit(&self, payload: &DocumentPayload, auth: &AuthHeaders) -> Result<Value> {
        let url = self
            .base_url
            .join(payload.document_type.endpoint())
            .map_err(|e| VeryfiError::InvalidArguments(format!("Failed to build URL: {e}")))?;

        let request_json = serde_json::to_string(payload)?;

        debug!(
            "Submitting {} ({} bytes encoded) to {}",
            payload.document_type,
            payload.file_data.len(),
            url
        );

        let agent = self.agent.clone();
        let auth = auth.clone();
        let response = tokio::task::spawn_blocking(move || {
            post_json(&agent, url.as_str(), &auth, &request_json)
        })
        .await
        .map_err(|e| VeryfiError::Other(anyhow::anyhow!("Request task failed: {e}")))??;

        if !(200..300).contains(&response.status) {
            warn!(
                "Veryfi returned HTTP {}: {}",
                response.status, response.body
            );
            return Err(VeryfiError::RemoteService {
                status: response.status,
                body: response.body,
            });
        }

        let value: Value = serde_json::from_str(&response.body)?;
        Ok(value)
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn post_json(
    agent: &ureq::Agent,
    url: &str,
    auth: &AuthHeaders,
    body: &str,
) -> Result<RawResponse> {
    let result = agent
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .header("CLIENT-ID", &auth.client_id)
        .header("AUTHORIZATION", &auth.authorization)
        .send(body)
        .and_then(|mut resp| {
            let status = resp.status().as_u16();
            let body = resp.body_mut().read_to_string()?;
            Ok(RawResponse { status, body })
        });

    result.map_err(|e| {
        error!("Request to {} failed: {}", url, e);
        match e {
            ureq::Error::Timeout(_) => VeryfiError::Transport(format!("request timed out: {e}")),
            other => VeryfiError::Transport(other.to_string()),
        }
    })
}
