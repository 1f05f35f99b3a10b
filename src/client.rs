use std::time::Instant;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::domain::{Answer, Dataset, DatasetId, TabularFileName, UploadReceipt};
use crate::error::DataPilotError;

pub const UPLOAD_FAILED: &str = "Upload failed";
pub const FETCH_FAILED: &str = "Failed to fetch dashboard";
pub const QA_FAILED: &str = "QA request failed";

/// The three backend operations, one round trip each and never retried.
pub trait DataPilotClient: Send + Sync {
    fn upload_dataset(
        &self,
        file_bytes: &[u8],
        file_name: &TabularFileName,
    ) -> Result<UploadReceipt, DataPilotError>;
    fn fetch_registry(&self) -> Result<Vec<Dataset>, DataPilotError>;
    fn ask_question(
        &self,
        question: &str,
        dataset_id: Option<&DatasetId>,
    ) -> Result<Answer, DataPilotError>;
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub dataset_id: Option<String>,
    pub name: String,
    pub rows: u64,
    pub columns: u64,
}

impl From<UploadResponse> for UploadReceipt {
    fn from(value: UploadResponse) -> Self {
        UploadReceipt {
            dataset_id: value
                .dataset_id
                .filter(|id| !id.is_empty())
                .map(DatasetId::from),
            name: value.name,
            rows: value.rows,
            columns: value.columns,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardResponse {
    #[serde(default)]
    pub datasets: Vec<DashboardDataset>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardDataset {
    pub dataset_id: String,
    pub name: String,
    pub rows: u64,
    pub columns: u64,
    #[serde(default)]
    pub preview: Vec<Map<String, Value>>,
}

impl From<DashboardDataset> for Dataset {
    fn from(value: DashboardDataset) -> Self {
        Dataset {
            id: DatasetId::from(value.dataset_id),
            name: value.name,
            row_count: value.rows,
            column_count: value.columns,
            preview: value.preview,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QaRequest<'a> {
    pub question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<&'a str>,
}

impl<'a> QaRequest<'a> {
    pub fn new(question: &'a str, dataset_id: Option<&'a DatasetId>) -> Self {
        Self {
            question,
            dataset_id: dataset_id
                .filter(|id| !id.is_empty())
                .map(DatasetId::as_str),
        }
    }
}

/// Model output is not guaranteed to be a string, so text fields are taken as raw JSON.
#[derive(Debug, Deserialize)]
pub struct QaResponse {
    pub answer: Value,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub reasoning: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub dataset_id: Option<String>,
}

impl From<QaResponse> for Answer {
    fn from(value: QaResponse) -> Self {
        Answer {
            text: json_text(value.answer).unwrap_or_default(),
            reasoning: value.reasoning.and_then(json_text),
            code: value.code.and_then(json_text),
            provider_label: value.provider.unwrap_or_default(),
            dataset_id: value
                .dataset_id
                .filter(|id| !id.is_empty())
                .map(DatasetId::from),
        }
    }
}

fn json_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Pulls a non-empty string `detail` out of an error body, if there is one.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|detail| detail.as_str())
        .filter(|detail| !detail.trim().is_empty())
        .map(|detail| detail.to_string())
}

#[derive(Clone)]
pub struct DataPilotHttpClient {
    client: Client,
    base_url: String,
}

impl DataPilotHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, DataPilotError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("datapilot-client/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DataPilotError::HttpClient(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| DataPilotError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Outcome of one round trip before it is mapped onto an operation-specific error.
enum Failure {
    Network,
    Status { status: u16, body: String },
    Body { status: u16 },
}

impl Failure {
    fn status(&self) -> Option<u16> {
        match self {
            Failure::Network => None,
            Failure::Status { status, .. } | Failure::Body { status, .. } => Some(*status),
        }
    }
}

fn send(
    operation: &'static str,
    request: reqwest::blocking::RequestBuilder,
) -> Result<Response, Failure> {
    let start = Instant::now();
    let response = request.send().map_err(|err| {
        warn!(operation, error = %err, "request failed before a response arrived");
        Failure::Network
    })?;
    let status = response.status().as_u16();
    debug!(
        operation,
        status,
        latency_ms = start.elapsed().as_millis() as u64,
        "response received"
    );
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    warn!(operation, status, "backend returned a non-success status");
    Err(Failure::Status { status, body })
}

fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, Failure> {
    let status = response.status().as_u16();
    response.json::<T>().map_err(|error| {
        warn!(operation, status, error = %error, "malformed success body");
        Failure::Body { status }
    })
}

/// Message for operations that surface the backend's `detail`.
fn detailed_message(failure: &Failure, fallback: &str) -> String {
    match failure {
        Failure::Status { body, .. } => {
            extract_detail(body).unwrap_or_else(|| fallback.to_string())
        }
        Failure::Network | Failure::Body { .. } => fallback.to_string(),
    }
}

impl DataPilotClient for DataPilotHttpClient {
    fn upload_dataset(
        &self,
        file_bytes: &[u8],
        file_name: &TabularFileName,
    ) -> Result<UploadReceipt, DataPilotError> {
        debug!(file = %file_name, bytes = file_bytes.len(), "upload.request");
        let part = Part::bytes(file_bytes.to_vec()).file_name(file_name.as_str().to_string());
        let form = Form::new().part("file", part);
        let request = self.client.post(self.url("/upload")).multipart(form);

        send("upload", request)
            .and_then(|response| read_json::<UploadResponse>("upload", response))
            .map(UploadReceipt::from)
            .map_err(|failure| DataPilotError::UploadFailed {
                status: failure.status(),
                message: detailed_message(&failure, UPLOAD_FAILED),
            })
    }

    fn fetch_registry(&self) -> Result<Vec<Dataset>, DataPilotError> {
        debug!("dashboard.request");
        let request = self.client.get(self.url("/dashboard"));

        // Dashboard failures never carry the backend's detail.
        send("dashboard", request)
            .and_then(|response| read_json::<DashboardResponse>("dashboard", response))
            .map(|body| body.datasets.into_iter().map(Dataset::from).collect())
            .map_err(|failure| DataPilotError::FetchFailed {
                status: failure.status(),
                message: FETCH_FAILED.to_string(),
            })
    }

    fn ask_question(
        &self,
        question: &str,
        dataset_id: Option<&DatasetId>,
    ) -> Result<Answer, DataPilotError> {
        let payload = QaRequest::new(question, dataset_id);
        debug!(dataset_id = ?payload.dataset_id, "qa.request");
        let request = self.client.post(self.url("/qa")).json(&payload);

        send("qa", request)
            .and_then(|response| read_json::<QaResponse>("qa", response))
            .map(Answer::from)
            .map_err(|failure| DataPilotError::QaFailed {
                status: failure.status(),
                message: detailed_message(&failure, QA_FAILED),
            })
    }
}
