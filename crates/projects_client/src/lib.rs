use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{ObjectKey, ProjectId},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateProjectRequest, CreateProjectResponse, FinalizeUploadRequest, PrepareUploadRequest,
        PrepareUploadResponse, RegisterYoutubeSourceRequest,
    },
};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw bytes plus metadata for a direct-to-storage upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub contents: Arc<[u8]>,
}

impl FileUpload {
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
    #[error("invalid upload target '{url}': {reason}")]
    InvalidUploadTarget { url: String, reason: String },
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::InvalidUploadTarget { .. } => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            BackendError::Status { code, .. } => *code,
            BackendError::InvalidUploadTarget { .. } => None,
        }
    }
}

/// Calls consumed by the project creation pipeline.
#[async_trait]
pub trait ProjectsBackend: Send + Sync {
    async fn create_project(&self, request: CreateProjectRequest) -> Result<CreateProjectResponse>;
    async fn prepare_upload(
        &self,
        project_id: &ProjectId,
        request: PrepareUploadRequest,
    ) -> Result<PrepareUploadResponse>;
    async fn upload_file(
        &self,
        upload_url: &str,
        fields: &BTreeMap<String, String>,
        file: FileUpload,
    ) -> Result<()>;
    async fn finalize_upload(&self, project_id: &ProjectId, object_key: &ObjectKey) -> Result<()>;
    async fn register_youtube_source(&self, project_id: &ProjectId, youtube_url: &str)
        -> Result<()>;
}

pub struct HttpProjectsBackend {
    http: Client,
    base_url: String,
}

impl HttpProjectsBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, T>(&self, operation: &'static str, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("{operation} request failed"))?;
        let response = ensure_success(operation, response).await?;
        response
            .json()
            .await
            .with_context(|| format!("{operation} returned an unreadable body"))
    }

    async fn post_json_no_content<B>(&self, operation: &'static str, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + Sync,
    {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("{operation} request failed"))?;
        ensure_success(operation, response).await?;
        Ok(())
    }
}

async fn ensure_success(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => (Some(api_error.code), api_error.message),
        Err(_) if body.trim().is_empty() => (
            None,
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        ),
        Err(_) => (None, body),
    };

    Err(BackendError::Status {
        operation,
        status: status.as_u16(),
        code,
        message,
    }
    .into())
}

#[async_trait]
impl ProjectsBackend for HttpProjectsBackend {
    async fn create_project(&self, request: CreateProjectRequest) -> Result<CreateProjectResponse> {
        let created: CreateProjectResponse =
            self.post_json("create_project", "/projects", &request).await?;
        info!(project_id = %created.project_id, "project created");
        Ok(created)
    }

    async fn prepare_upload(
        &self,
        project_id: &ProjectId,
        request: PrepareUploadRequest,
    ) -> Result<PrepareUploadResponse> {
        let reservation: PrepareUploadResponse = self
            .post_json(
                "prepare_upload",
                &format!("/projects/{project_id}/uploads"),
                &request,
            )
            .await?;
        debug!(
            %project_id,
            object_key = %reservation.object_key,
            field_count = reservation.fields.len(),
            "upload reserved"
        );
        Ok(reservation)
    }

    async fn upload_file(
        &self,
        upload_url: &str,
        fields: &BTreeMap<String, String>,
        file: FileUpload,
    ) -> Result<()> {
        let content_type = file.content_type_or_default().to_string();
        let size_bytes = file.contents.len();
        let part = Part::bytes(file.contents.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&content_type)
            .map_err(|e| BackendError::InvalidUploadTarget {
                url: upload_url.to_string(),
                reason: format!("invalid content type '{content_type}': {e}"),
            })?;

        // Storage endpoints expect the policy fields before the file part.
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        let form = form.part("file", part);

        let response = self
            .http
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .context("upload_file request failed")?;
        ensure_success("upload_file", response).await?;
        debug!(file_name = %file.file_name, size_bytes, "file bytes uploaded");
        Ok(())
    }

    async fn finalize_upload(&self, project_id: &ProjectId, object_key: &ObjectKey) -> Result<()> {
        self.post_json_no_content(
            "finalize_upload",
            &format!("/projects/{project_id}/uploads/finalize"),
            &FinalizeUploadRequest {
                object_key: object_key.clone(),
            },
        )
        .await
    }

    async fn register_youtube_source(
        &self,
        project_id: &ProjectId,
        youtube_url: &str,
    ) -> Result<()> {
        self.post_json_no_content(
            "register_youtube_source",
            &format!("/projects/{project_id}/youtube"),
            &RegisterYoutubeSourceRequest {
                youtube_url: youtube_url.to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
