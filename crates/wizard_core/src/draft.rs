//! In-progress project draft and the validated outputs of each wizard step.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use projects_client::FileUpload;
use shared::{domain::SourceType, protocol::CreateProjectRequest};
use thiserror::Error;

use crate::config::WizardSettings;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("no file is attached to this file project; select a file and submit again")]
    MissingSourceFile,
    #[error("no video URL is set for this youtube project")]
    MissingYoutubeUrl,
    #[error("speaker count must be at least 1")]
    InvalidSpeakerCount,
    #[error("failed to read '{}': {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A local file chosen in the source step, with its bytes loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub contents: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: Option<String>,
        contents: impl Into<Arc<[u8]>>,
    ) -> Self {
        let contents = contents.into();
        Self {
            name: name.into(),
            size_bytes: contents.len() as u64,
            content_type,
            contents,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, DraftError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| DraftError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Ok(Self::new(name, content_type, contents))
    }

    pub fn to_upload(&self) -> FileUpload {
        FileUpload {
            file_name: self.name.clone(),
            content_type: self.content_type.clone(),
            contents: Arc::clone(&self.contents),
        }
    }
}

/// Output of the source selection step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    /// `None` keeps the previously recorded file name and size but attaches no bytes.
    File(Option<SelectedFile>),
    Youtube { url: String },
}

impl SourceSelection {
    pub fn mode(&self) -> SourceType {
        match self {
            SourceSelection::File(_) => SourceType::File,
            SourceSelection::Youtube { .. } => SourceType::Youtube,
        }
    }
}

/// Output of the settings step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsValues {
    pub title: String,
    pub detect_automatically: bool,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub speaker_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub source_type: SourceType,
    pub title: String,
    pub detect_automatically: bool,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub speaker_count: u32,
    pub file: Option<SelectedFile>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub youtube_url: Option<String>,
}

impl Draft {
    pub fn initial(settings: &WizardSettings) -> Self {
        Self {
            source_type: SourceType::File,
            title: String::new(),
            detect_automatically: true,
            source_language: settings.default_source_language.clone(),
            target_languages: Vec::new(),
            speaker_count: settings.default_speaker_count,
            file: None,
            file_name: None,
            file_size: None,
            youtube_url: None,
        }
    }

    pub fn apply_source(&mut self, selection: SourceSelection) {
        self.source_type = selection.mode();
        match selection {
            SourceSelection::File(file) => {
                if let Some(file) = &file {
                    self.file_name = Some(file.name.clone());
                    self.file_size = Some(file.size_bytes);
                }
                self.file = file;
                self.youtube_url = None;
            }
            SourceSelection::Youtube { url } => {
                self.youtube_url = Some(url);
                self.file = None;
                self.file_name = None;
                self.file_size = None;
            }
        }
    }

    pub fn apply_settings(&mut self, values: SettingsValues, default_source_language: &str) {
        self.title = values.title;
        self.detect_automatically = values.detect_automatically;
        self.source_language = if values.source_language.trim().is_empty() {
            default_source_language.to_string()
        } else {
            values.source_language
        };
        self.target_languages = values.target_languages;
        self.speaker_count = values.speaker_count;
    }

    /// Current settings as the details step's initial values.
    pub fn settings_values(&self, default_source_language: &str) -> SettingsValues {
        let source_language = if self.source_language.is_empty() {
            default_source_language.to_string()
        } else {
            self.source_language.clone()
        };
        SettingsValues {
            title: self.title.clone(),
            detect_automatically: self.detect_automatically,
            source_language,
            target_languages: self.target_languages.clone(),
            speaker_count: self.speaker_count,
        }
    }

    /// `"<name> • <size>MB"` for the last file seen, even after the bytes were dropped.
    pub fn recent_upload_summary(&self) -> Option<String> {
        let file_name = self.file_name.as_deref()?;
        let size_mb = match self.file_size {
            Some(size) if size > 0 => {
                // Half-up to one decimal place.
                let tenths = (u128::from(size) * 10 + u128::from(BYTES_PER_MB / 2))
                    / u128::from(BYTES_PER_MB);
                format!("{}.{}", tenths / 10, tenths % 10)
            }
            _ => "0".to_string(),
        };
        Some(format!("{file_name} • {size_mb}MB"))
    }

    pub fn ensure_ready(&self) -> Result<(), DraftError> {
        match self.source_type {
            SourceType::File if self.file.is_none() => return Err(DraftError::MissingSourceFile),
            SourceType::Youtube
                if self
                    .youtube_url
                    .as_deref()
                    .map_or(true, |url| url.trim().is_empty()) =>
            {
                return Err(DraftError::MissingYoutubeUrl)
            }
            _ => {}
        }
        if self.speaker_count == 0 {
            return Err(DraftError::InvalidSpeakerCount);
        }
        Ok(())
    }

    pub fn to_create_request(&self, owner_code: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            source_type: self.source_type,
            title: self.title.clone(),
            detect_automatically: self.detect_automatically,
            source_language: self.source_language.clone(),
            target_languages: self.target_languages.clone(),
            speaker_count: self.speaker_count,
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            youtube_url: self.youtube_url.clone(),
            owner_code: owner_code.to_string(),
        }
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::initial(&WizardSettings::default())
    }
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
