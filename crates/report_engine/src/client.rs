use std::path::Path;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use report_core::{
    is_supported_spreadsheet, CpuId, JobProgress, PreviewEntry, ProcessResult, Section,
};
use report_logging::{report_debug, report_warn};
use reqwest::{RequestBuilder, Response};
use url::Url;

use crate::wire::{
    decode, error_detail, CpuListResponse, HealthResponse, HistoryResponse, PreviewResponse,
    ProcessRequest, ProcessResponse, ProgressResponse, SectionPageResponse, UploadResponse,
};
use crate::{ApiError, FailureKind, HealthStatus, HistoryEntry, SectionPage};

pub const DEFAULT_API_URL: &str = "http://localhost:49490";

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLSM_MIME: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_upload_bytes: u64,
    pub max_download_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_upload_bytes: 50 * 1024 * 1024,
            max_download_bytes: 512 * 1024 * 1024,
        }
    }
}

/// The backend's HTTP contract.
#[async_trait::async_trait]
pub trait ReportApi: Send + Sync {
    /// `POST /upload/`; returns the server-assigned filename.
    async fn upload(&self, path: &Path) -> Result<String, ApiError>;
    async fn available_cpus(&self, filename: &str) -> Result<Vec<CpuId>, ApiError>;
    async fn submit(&self, filename: &str, cpus: &[CpuId]) -> Result<ProcessResult, ApiError>;
    async fn progress(&self, job_id: &str) -> Result<JobProgress, ApiError>;
    async fn preview(&self, filename: &str, cpu: &str) -> Result<PreviewEntry, ApiError>;
    async fn download(&self, filename: &str) -> Result<Bytes, ApiError>;
    async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError>;
    async fn section_page(
        &self,
        filename: &str,
        cpu: &str,
        section: Section,
        page: usize,
        page_size: usize,
    ) -> Result<SectionPage, ApiError>;
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    settings: ClientSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestApi {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    /// Builds `{base}/{segments...}`; each segment is percent-encoded.
    /// A trailing empty segment yields a trailing slash.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let message = error_detail(&body).unwrap_or_else(|| status.to_string());
        report_warn!("Request failed with {}: {}", status, message);
        Err(ApiError::new(
            FailureKind::HttpStatus(status.as_u16()),
            message,
        ))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        url: Url,
    ) -> Result<T, ApiError> {
        report_debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode(endpoint, &body)
    }
}

#[async_trait::async_trait]
impl ReportApi for ReqwestApi {
    async fn upload(&self, path: &Path) -> Result<String, ApiError> {
        if !is_supported_spreadsheet(path) {
            return Err(ApiError::new(
                FailureKind::UnsupportedFile,
                format!("{} is not an .xlsx or .xlsm file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::new(FailureKind::UnsupportedFile, "file name is not valid UTF-8"))?
            .to_string();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", path.display())))?;
        if meta.len() > self.settings.max_upload_bytes {
            return Err(ApiError::new(
                FailureKind::TooLarge {
                    max_bytes: self.settings.max_upload_bytes,
                    actual: meta.len(),
                },
                format!("{} is too large to upload", path.display()),
            ));
        }
        let content = tokio::fs::read(path)
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", path.display())))?;

        let mime = if name.to_ascii_lowercase().ends_with(".xlsm") {
            XLSM_MIME
        } else {
            XLSX_MIME
        };
        let part = reqwest::multipart::Part::bytes(content)
            .file_name(name)
            .mime_str(mime)
            .map_err(|err| ApiError::new(FailureKind::UnsupportedFile, err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.endpoint(&["upload", ""])?;
        report_debug!("POST {}", url);
        let response = self.send(self.client.post(url).multipart(form)).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode::<UploadResponse>("upload", &body)?.validate()
    }

    async fn available_cpus(&self, filename: &str) -> Result<Vec<CpuId>, ApiError> {
        let url = self.endpoint(&["available-cpus", filename])?;
        let raw: CpuListResponse = self.get_json("available-cpus", url).await?;
        Ok(raw.validate())
    }

    async fn submit(&self, filename: &str, cpus: &[CpuId]) -> Result<ProcessResult, ApiError> {
        let url = self.endpoint(&["process", ""])?;
        let request = ProcessRequest {
            filename,
            selected_cpus: cpus,
        };
        report_debug!("POST {}", url);
        let response = self.send(self.client.post(url).json(&request)).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode::<ProcessResponse>("process", &body)?.validate(cpus)
    }

    async fn progress(&self, job_id: &str) -> Result<JobProgress, ApiError> {
        let url = self.endpoint(&["progress", job_id])?;
        let raw: ProgressResponse = self.get_json("progress", url).await?;
        raw.validate()
    }

    async fn preview(&self, filename: &str, cpu: &str) -> Result<PreviewEntry, ApiError> {
        let url = self.endpoint(&["preview", filename, cpu])?;
        let raw: PreviewResponse = self.get_json("preview", url).await?;
        raw.validate()
    }

    async fn download(&self, filename: &str) -> Result<Bytes, ApiError> {
        let url = self.endpoint(&["download", filename])?;
        report_debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        let max_bytes = self.settings.max_download_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: content_len,
                    },
                    format!("{filename} is too large to download"),
                ));
            }
        }

        let mut bytes = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: next_len,
                    },
                    format!("{filename} is too large to download"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes.freeze())
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let url = self.endpoint(&["history", ""])?;
        let raw: HistoryResponse = self.get_json("history", url).await?;
        Ok(raw.validate())
    }

    async fn section_page(
        &self,
        filename: &str,
        cpu: &str,
        section: Section,
        page: usize,
        page_size: usize,
    ) -> Result<SectionPage, ApiError> {
        let mut url = self.endpoint(&["data", filename, cpu])?;
        url.query_pairs_mut()
            .append_pair("section", section.key())
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        let raw: SectionPageResponse = self.get_json("data", url).await?;
        Ok(raw.validate())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = self.endpoint(&["health"])?;
        let raw: HealthResponse = self.get_json("health", url).await?;
        Ok(raw.into())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::malformed(err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
