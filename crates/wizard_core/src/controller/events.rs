//! Pipeline stages and error modeling for the project creation controller.

use projects_client::BackendError;
use shared::{domain::ProjectId, error::ErrorCode};
use thiserror::Error;

use crate::draft::DraftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    CreateProject,
    PrepareUpload,
    UploadFile,
    FinalizeUpload,
    RegisterYoutube,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::CreateProject => "create_project",
            PipelineStage::PrepareUpload => "prepare_upload",
            PipelineStage::UploadFile => "upload_file",
            PipelineStage::FinalizeUpload => "finalize_upload",
            PipelineStage::RegisterYoutube => "register_youtube_source",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            PipelineStage::CreateProject => "creating the project",
            PipelineStage::PrepareUpload => "reserving the upload",
            PipelineStage::UploadFile => "uploading the file",
            PipelineStage::FinalizeUpload => "finalizing the upload",
            PipelineStage::RegisterYoutube => "registering the video URL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Transport,
    Validation,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn classify(err: &anyhow::Error) -> Self {
        if let Some(backend) = err.downcast_ref::<BackendError>() {
            match backend.code() {
                Some(ErrorCode::Unauthorized | ErrorCode::Forbidden) => return Self::Auth,
                Some(ErrorCode::Validation | ErrorCode::NotFound) => return Self::Validation,
                Some(ErrorCode::RateLimited) => return Self::Transport,
                Some(ErrorCode::Internal) => return Self::Server,
                None => {}
            }
            match backend.status() {
                Some(401 | 403) => return Self::Auth,
                Some(400 | 404 | 409 | 413 | 422) => return Self::Validation,
                Some(408 | 429) => return Self::Transport,
                Some(status) if status >= 500 => return Self::Server,
                _ => {}
            }
        }

        Self::from_message(&format!("{err:#}"))
    }

    fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("session expired")
            || lower.contains("invalid token")
        {
            Self::Auth
        } else if lower.contains("invalid")
            || lower.contains("missing")
            || lower.contains("malformed")
        {
            Self::Validation
        } else if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("connect")
            || lower.contains("dns")
            || lower.contains("network")
            || lower.contains("request failed")
        {
            Self::Transport
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("project creation wizard is not open")]
    Closed,
    #[error("a project is already being created from this wizard")]
    PipelineInFlight,
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("{} failed: {source:#}", .stage.as_str())]
    Stage {
        stage: PipelineStage,
        category: ErrorCategory,
        /// Set when the project was created before the failing stage.
        project_id: Option<ProjectId>,
        source: anyhow::Error,
    },
}

impl WizardError {
    pub fn stage(stage: PipelineStage, project_id: Option<ProjectId>, source: anyhow::Error) -> Self {
        Self::Stage {
            stage,
            category: ErrorCategory::classify(&source),
            project_id,
            source,
        }
    }

    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            WizardError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            WizardError::Stage { category, .. } => *category,
            WizardError::Draft(_) => ErrorCategory::Validation,
            WizardError::Closed | WizardError::PipelineInFlight => ErrorCategory::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WizardError::Stage { .. })
    }

    /// Short text suitable for a notification description.
    pub fn user_message(&self) -> String {
        match self {
            WizardError::Stage {
                stage, category, ..
            } => {
                let during = stage.describe();
                match category {
                    ErrorCategory::Auth => {
                        format!("Not authorized while {during}; sign in again and retry.")
                    }
                    ErrorCategory::Transport => {
                        format!("Server unreachable while {during}; check the network and retry.")
                    }
                    ErrorCategory::Validation => {
                        format!("The server rejected the request while {during}.")
                    }
                    ErrorCategory::Server => {
                        format!("The server failed while {during}; retry shortly.")
                    }
                    ErrorCategory::Unknown => format!("Something went wrong while {during}."),
                }
            }
            other => other.to_string(),
        }
    }
}
