//! HTTP client for the OCR service

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;

use super::request::{
    DocumentExtraction, ExtractionError, ExtractionResult, RegionRequest, ServiceVersion,
};
use crate::pdf::SourceFile;

/// Default API base URL of a locally running service
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of a finished HTTP exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Multipart body: text fields plus uploaded files, each under its part name
#[derive(Clone, Debug)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, SourceFile)>,
}

impl MultipartForm {
    /// One file under the `file` part
    #[must_use]
    pub fn with_file(fields: Vec<(String, String)>, file: SourceFile) -> Self {
        Self {
            fields,
            files: vec![("file".to_string(), file)],
        }
    }
}

/// Blocking HTTP exchange used by [`OcrClient`]
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpReply, ExtractionError>;

    fn post_multipart(
        &self,
        url: &str,
        query: &[(String, String)],
        form: MultipartForm,
    ) -> Result<HttpReply, ExtractionError>;
}

/// Where the service lives and how long to wait for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`Transport`] over a blocking `reqwest` client
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    fn finish(
        response: Result<reqwest::blocking::Response, reqwest::Error>,
    ) -> Result<HttpReply, ExtractionError> {
        let response = response.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(map_reqwest_error)?;
        Ok(HttpReply { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> ExtractionError {
    if error.is_timeout() {
        ExtractionError::Timeout
    } else {
        ExtractionError::Transport(error.to_string())
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpReply, ExtractionError> {
        Self::finish(self.client.get(url).send())
    }

    fn post_multipart(
        &self,
        url: &str,
        query: &[(String, String)],
        form: MultipartForm,
    ) -> Result<HttpReply, ExtractionError> {
        use reqwest::blocking::multipart::{Form, Part};

        let mut body = form
            .fields
            .into_iter()
            .fold(Form::new(), |body, (name, value)| body.text(name, value));
        for (name, file) in form.files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.name)
                .mime_str(&file.mime_type)
                .map_err(|e| ExtractionError::Transport(e.to_string()))?;
            body = body.part(name, part);
        }

        Self::finish(self.client.post(url).query(query).multipart(body).send())
    }
}

/// Typed client for the OCR service endpoints
#[derive(Clone)]
pub struct OcrClient {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl OcrClient {
    /// Client over the real HTTP transport
    pub fn new(config: &ClientConfig) -> Result<Self, ExtractionError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(&config.base_url, Arc::new(transport)))
    }

    #[must_use]
    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Extract the text inside one region of one page
    pub fn extract_region(&self, request: &RegionRequest) -> Result<ExtractionResult, ExtractionError> {
        let fields = request
            .form_fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        debug!(
            "POST /extract/region page {} {:?} rotation {}",
            request.page, request.region, request.rotation
        );
        let reply = self.transport.post_multipart(
            &self.url("/extract/region"),
            &[],
            MultipartForm::with_file(fields, request.file.clone()),
        )?;
        decode(reply)
    }

    /// OCR the whole document
    pub fn extract_document(
        &self,
        file: &SourceFile,
        dpi: Option<u32>,
        language: Option<&str>,
    ) -> Result<DocumentExtraction, ExtractionError> {
        let reply = self.transport.post_multipart(
            &self.url("/extract"),
            &ocr_query(dpi, language),
            MultipartForm::with_file(vec![], file.clone()),
        )?;
        decode(reply)
    }

    /// OCR several documents in one request.
    ///
    /// A file the service could not process comes back with `error` set
    /// instead of failing the whole batch.
    pub fn extract_documents(
        &self,
        files: &[SourceFile],
        dpi: Option<u32>,
        language: Option<&str>,
    ) -> Result<Vec<DocumentExtraction>, ExtractionError> {
        if files.is_empty() {
            return Ok(vec![]);
        }
        debug!("POST /extract/multi with {} files", files.len());
        let form = MultipartForm {
            fields: vec![],
            files: files
                .iter()
                .map(|file| ("files".to_string(), file.clone()))
                .collect(),
        };
        let reply = self
            .transport
            .post_multipart(&self.url("/extract/multi"), &ocr_query(dpi, language), form)?;
        decode(reply)
    }

    /// Whether the service answers its health check
    pub fn health(&self) -> Result<bool, ExtractionError> {
        let reply = self.transport.get(&self.url("/health"))?;
        Ok(reply.is_success() && reply.body.trim().trim_matches('"') == "ok")
    }

    pub fn version(&self) -> Result<ServiceVersion, ExtractionError> {
        let reply = self.transport.get(&self.url("/version"))?;
        decode(reply)
    }
}

fn ocr_query(dpi: Option<u32>, language: Option<&str>) -> Vec<(String, String)> {
    let mut query = vec![];
    if let Some(dpi) = dpi {
        query.push(("dpi".to_string(), dpi.to_string()));
    }
    if let Some(lang) = language {
        query.push(("lang".to_string(), lang.to_string()));
    }
    query
}

fn decode<T: DeserializeOwned>(reply: HttpReply) -> Result<T, ExtractionError> {
    if !reply.is_success() {
        let detail = error_detail(&reply.body);
        warn!("OCR service replied {}: {detail}", reply.status);
        return Err(ExtractionError::Http {
            status: reply.status,
            detail,
        });
    }
    serde_json::from_str(&reply.body).map_err(|e| ExtractionError::Decode(e.to_string()))
}

/// Human-readable detail of an error body: the `detail` field of a JSON
/// object when there is one, otherwise the body text itself
#[must_use]
pub fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "request failed".to_string();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(serde_json::Value::Null) | None => trimmed.to_string(),
            Some(other) => other.to_string(),
        },
        _ => trimmed.to_string(),
    }
}
