use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{DomainError, PhotoRef, RemoteCandidate};
use crate::ports::{MachineIdentifier, RemoteIdentification, RemoteKind};

/// Multipart field the backend reads the photo from.
const IMAGE_FIELD: &str = "image";

/// Longest body excerpt written to logs.
const BODY_SAMPLE_LEN: usize = 512;

/// Client for the MachineMate identification backend.
pub struct HttpMachineIdentifier {
    client: Client,
    base_url: Url,
    identify_url: Url,
    health_url: Url,
    timeout: Duration,
}

impl HttpMachineIdentifier {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DomainError> {
        let base = Self::parse_base_url(base_url)?;
        let identify_url = Self::join_endpoint(&base, "identify")?;
        let health_url = Self::join_endpoint(&base, "health")?;

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("MachineMate/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::HttpRequest(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            identify_url = %identify_url,
            timeout_secs = timeout.as_secs_f32(),
            "HttpMachineIdentifier initialized"
        );

        Ok(Self {
            client,
            base_url: base,
            identify_url,
            health_url,
            timeout,
        })
    }

    /// Base URL with a trailing slash so endpoints join beneath it.
    fn parse_base_url(base_url: &str) -> Result<Url, DomainError> {
        let trimmed = base_url.trim();
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };

        let parsed = Url::parse(&with_slash).map_err(|e| {
            DomainError::Config(format!("Invalid api_base_url '{}': {}", trimmed, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DomainError::Config(format!(
                "api_base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(parsed)
    }

    fn join_endpoint(base: &Url, path: &str) -> Result<Url, DomainError> {
        base.join(path)
            .map_err(|e| DomainError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    pub fn identify_url(&self) -> &Url {
        &self.identify_url
    }

    /// Query the backend `/health` endpoint.
    pub async fn health(&self) -> Result<BackendHealth, DomainError> {
        let response = self
            .client
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = Self::success_body(response, &self.health_url).await?;
        serde_json::from_str(&body).map_err(|e| DomainError::InvalidResponse(e.to_string()))
    }

    /// URL of the server-side record for one identification.
    fn trace_url(&self, trace_id: &str) -> Result<Url, DomainError> {
        let trace_id = trace_id.trim();
        if trace_id.is_empty() {
            return Err(DomainError::Precondition("trace id must not be empty".to_string()));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DomainError::Config(format!("Base URL {} cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .push("traces")
            .push(trace_id);
        Ok(url)
    }

    /// Fetch the raw model answer behind an identification.
    pub async fn trace(&self, trace_id: &str) -> Result<TraceDetails, DomainError> {
        let url = self.trace_url(trace_id)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "Trace not found");
            return Err(DomainError::TraceNotFound(trace_id.trim().to_string()));
        }

        let body = Self::success_body(response, &url).await?;
        serde_json::from_str(&body).map_err(|e| DomainError::InvalidResponse(e.to_string()))
    }

    async fn read_photo(photo: &PhotoRef) -> Result<Vec<u8>, DomainError> {
        let path = photo.to_path();
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            DomainError::Io(format!("Failed to read photo {}: {}", path.display(), e))
        })?;

        if bytes.is_empty() {
            return Err(DomainError::Io(format!("Photo {} is empty", path.display())));
        }
        Ok(bytes)
    }

    fn transport_error(&self, err: reqwest::Error) -> DomainError {
        if err.is_timeout() {
            DomainError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            DomainError::HttpRequest(err.to_string())
        }
    }

    /// Body of a 2xx response; any other status is an error.
    async fn success_body(response: Response, url: &Url) -> Result<String, DomainError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        if !status.is_success() {
            warn!(
                url = %url,
                status = status.as_u16(),
                body = %sample(&body),
                "Backend returned an error status"
            );
            return Err(DomainError::HttpRequest(format!("HTTP {} for {}", status, url)));
        }

        Ok(body)
    }
}

#[async_trait]
impl MachineIdentifier for HttpMachineIdentifier {
    async fn identify(&self, photo: &PhotoRef) -> Result<RemoteIdentification, DomainError> {
        let bytes = Self::read_photo(photo).await?;
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(photo.file_name())
            .mime_str(photo.mime_type())
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!(url = %self.identify_url, photo = %photo, bytes = size, "Uploading photo");

        let response = self
            .client
            .post(self.identify_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = Self::success_body(response, &self.identify_url).await?;
        let wire: IdentifyResponseBody = serde_json::from_str(&body).map_err(|e| {
            warn!(body = %sample(&body), error = %e, "Identification response is not valid JSON");
            DomainError::InvalidResponse(e.to_string())
        })?;

        wire.try_into()
    }

    fn endpoint(&self) -> String {
        self.identify_url.to_string()
    }
}

/// Backend `/health` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub vlm_configured: Option<bool>,
    #[serde(default)]
    pub mocking_enabled: Option<bool>,
}

/// Backend `/traces/{id}` payload: what the model saw and answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDetails {
    pub trace_id: String,
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub mocked: bool,
    #[serde(default)]
    pub raw_text: Option<String>,
    /// Label before catalog canonicalization.
    #[serde(default)]
    pub raw_machine: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    /// The model's label matched no known machine.
    #[serde(default)]
    pub unmapped: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub prompt_variant: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// `/identify` body: a candidate list or a single prediction.
#[derive(Debug, Deserialize)]
struct IdentifyResponseBody {
    #[serde(default)]
    kind: Option<RemoteKind>,
    #[serde(default)]
    candidates: Option<Vec<CandidateBody>>,
    #[serde(default)]
    machine: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "traceId")]
    trace_id: Option<String>,
    #[serde(default)]
    mocked: bool,
}

#[derive(Debug, Deserialize)]
struct CandidateBody {
    #[serde(alias = "machineLabel", alias = "machine")]
    label: String,
    confidence: f64,
}

impl TryFrom<IdentifyResponseBody> for RemoteIdentification {
    type Error = DomainError;

    fn try_from(body: IdentifyResponseBody) -> Result<Self, Self::Error> {
        let kind = body.kind.unwrap_or_default();

        let candidates = match (body.candidates, body.machine) {
            (Some(list), _) => list
                .into_iter()
                .map(|c| RemoteCandidate::new(c.label, c.confidence))
                .collect(),
            (None, Some(machine)) => {
                let confidence = body.confidence.ok_or_else(|| {
                    DomainError::InvalidResponse(format!(
                        "Prediction '{}' has no confidence",
                        machine
                    ))
                })?;
                vec![RemoteCandidate::new(machine, confidence)]
            }
            (None, None) if kind != RemoteKind::Match => Vec::new(),
            (None, None) => {
                return Err(DomainError::InvalidResponse(
                    "Response carries neither candidates nor a machine".to_string(),
                ))
            }
        };

        if let Some(bad) = candidates.iter().find(|c| !c.confidence.is_finite()) {
            return Err(DomainError::InvalidResponse(format!(
                "Non-finite confidence for '{}'",
                bad.label
            )));
        }

        Ok(RemoteIdentification {
            kind,
            candidates,
            trace_id: body.trace_id,
            mocked: body.mocked,
        })
    }
}

fn sample(body: &str) -> &str {
    match body.char_indices().nth(BODY_SAMPLE_LEN) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
