//! Sequenced backend calls that turn a submitted draft into a project with an attached source.

use projects_client::ProjectsBackend;
use shared::{
    domain::{ProjectId, SourceType},
    protocol::{CreateProjectRequest, PrepareUploadRequest},
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    controller::events::{PipelineStage, WizardError},
    draft::{Draft, DraftError, SelectedFile},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourcePlan {
    Upload(SelectedFile),
    Youtube(String),
}

/// Everything the pipeline needs, captured from the draft at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PipelinePlan {
    pub request: CreateProjectRequest,
    pub source: SourcePlan,
    /// Project created by an earlier attempt with an identical request.
    pub existing_project: Option<ProjectId>,
}

impl PipelinePlan {
    pub fn from_draft(draft: &Draft, owner_code: &str) -> Result<Self, DraftError> {
        draft.ensure_ready()?;
        let source = match draft.source_type {
            SourceType::File => SourcePlan::Upload(
                draft
                    .file
                    .clone()
                    .ok_or(DraftError::MissingSourceFile)?,
            ),
            SourceType::Youtube => SourcePlan::Youtube(
                draft
                    .youtube_url
                    .clone()
                    .ok_or(DraftError::MissingYoutubeUrl)?,
            ),
        };
        Ok(Self {
            request: draft.to_create_request(owner_code),
            source,
            existing_project: None,
        })
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// Source attached; the modal was closed and a success notification shown.
    Completed { project_id: ProjectId },
    /// A stage failed; the modal stays on the details step with the draft retained.
    Failed(WizardError),
    /// The modal was closed or reopened while the pipeline ran, so nothing was touched.
    Superseded {
        result: Result<ProjectId, WizardError>,
    },
}

impl PipelineOutcome {
    pub fn project_id(&self) -> Option<&ProjectId> {
        match self {
            PipelineOutcome::Completed { project_id } => Some(project_id),
            PipelineOutcome::Superseded {
                result: Ok(project_id),
            } => Some(project_id),
            PipelineOutcome::Failed(WizardError::Stage { project_id, .. })
            | PipelineOutcome::Superseded {
                result: Err(WizardError::Stage { project_id, .. }),
            } => project_id.as_ref(),
            _ => None,
        }
    }
}

/// A creation pipeline running in the background. Dropping the handle does not stop it.
#[derive(Debug)]
pub struct PipelineHandle {
    session: u64,
    task: JoinHandle<PipelineOutcome>,
}

impl PipelineHandle {
    pub(crate) fn new(session: u64, task: JoinHandle<PipelineOutcome>) -> Self {
        Self { session, task }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> anyhow::Result<PipelineOutcome> {
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("creation pipeline task did not complete: {e}"))
    }
}

pub(crate) async fn run_pipeline(
    backend: &dyn ProjectsBackend,
    plan: PipelinePlan,
) -> Result<ProjectId, WizardError> {
    let project_id = match plan.existing_project {
        Some(project_id) => {
            info!(%project_id, "reusing project from previous attempt");
            project_id
        }
        None => {
            let created = backend
                .create_project(plan.request)
                .await
                .map_err(|e| WizardError::stage(PipelineStage::CreateProject, None, e))?;
            created.project_id
        }
    };

    match plan.source {
        SourcePlan::Upload(file) => upload_source(backend, &project_id, file).await?,
        SourcePlan::Youtube(url) => {
            backend
                .register_youtube_source(&project_id, &url)
                .await
                .map_err(|e| {
                    WizardError::stage(PipelineStage::RegisterYoutube, Some(project_id.clone()), e)
                })?;
            info!(%project_id, "youtube source registered");
        }
    }

    Ok(project_id)
}

async fn upload_source(
    backend: &dyn ProjectsBackend,
    project_id: &ProjectId,
    file: SelectedFile,
) -> Result<(), WizardError> {
    let stage_err = |stage: PipelineStage| {
        move |e: anyhow::Error| WizardError::stage(stage, Some(project_id.clone()), e)
    };

    let upload = file.to_upload();
    let reservation = backend
        .prepare_upload(
            project_id,
            PrepareUploadRequest {
                file_name: upload.file_name.clone(),
                content_type: upload.content_type_or_default().to_string(),
            },
        )
        .await
        .map_err(stage_err(PipelineStage::PrepareUpload))?;
    info!(%project_id, object_key = %reservation.object_key, "upload reserved");

    backend
        .upload_file(&reservation.upload_url, &reservation.fields, upload)
        .await
        .map_err(stage_err(PipelineStage::UploadFile))?;
    info!(%project_id, size_bytes = file.size_bytes, "file uploaded");

    backend
        .finalize_upload(project_id, &reservation.object_key)
        .await
        .map_err(stage_err(PipelineStage::FinalizeUpload))?;
    info!(%project_id, "upload finalized");

    Ok(())
}
