use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ObjectKey, ProjectId, SourceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub source_type: SourceType,
    pub title: String,
    pub detect_automatically: bool,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub speaker_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    pub owner_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectResponse {
    pub project_id: ProjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

/// Upload reservation: a storage target plus the form fields it requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareUploadResponse {
    pub upload_url: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub object_key: ObjectKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeUploadRequest {
    pub object_key: ObjectKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterYoutubeSourceRequest {
    pub youtube_url: String,
}
