use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, TransportError};
use crate::validator::UploadRequest;
use crate::{Modality, RawPayload};

/// Multipart field the analysis service reads the image from.
pub const IMAGE_FIELD: &str = "image";

/// One outbound analysis request per call. Implementations never retry.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn submit(
        &self,
        modality: Modality,
        request: UploadRequest,
    ) -> Result<RawPayload, TransportError>;
}

#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    brain_tumor_url: Url,
    pneumonia_url: Url,
}

impl HttpTransport {
    /// `timeout` of `None` leaves requests unbounded. A zero timeout is rejected.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(endpoint)
            .map_err(|e| ConfigError::invalid("endpoint", format!("{endpoint:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::invalid("endpoint", format!("{endpoint:?} cannot be a base URL")));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let analyze_url = |modality: Modality| {
            base_url
                .join(&format!("api/analyze/{}", modality.path_segment()))
                .map_err(|e| ConfigError::invalid("endpoint", format!("{endpoint:?}: {e}")))
        };
        let brain_tumor_url = analyze_url(Modality::BrainTumor)?;
        let pneumonia_url = analyze_url(Modality::Pneumonia)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            if timeout.is_zero() {
                return Err(ConfigError::invalid("timeout", "must be greater than zero"));
            }
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            brain_tumor_url,
            pneumonia_url,
        })
    }

    pub fn endpoint_for(&self, modality: Modality) -> &Url {
        match modality {
            Modality::BrainTumor => &self.brain_tumor_url,
            Modality::Pneumonia => &self.pneumonia_url,
        }
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn submit(
        &self,
        modality: Modality,
        request: UploadRequest,
    ) -> Result<RawPayload, TransportError> {
        let url = self.endpoint_for(modality).clone();

        let part = Part::bytes(request.data().to_vec())
            .file_name(request.file_name().to_string())
            .mime_str(request.mime().as_str())
            .map_err(classify)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        info!(%url, file = request.file_name(), size_bytes = request.size_bytes(), "submitting image");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let err = TransportError::ServerError {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
                detail: error_detail(&body),
            };
            warn!(status = status.as_u16(), "analysis service returned an error");
            return Err(err);
        }

        let body = response.bytes().await.map_err(classify)?;
        let payload = RawPayload::from_json(&body)?;
        debug!(verdict = %payload.verdict, confidence = payload.confidence, "analysis received");
        Ok(payload)
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::InvalidPayload(err.to_string())
    } else {
        debug!(error = %err, "request failed before a response arrived");
        TransportError::ConnectionUnreachable
    }
}

/// Pulls `error` out of a `{"error": "..."}` body.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value["error"].as_str().map(str::to_string)
}
