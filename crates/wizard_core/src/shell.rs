//! Maps wizard state to the single step view to render, and routes step events back.

use std::sync::Arc;

use shared::domain::SourceType;

use crate::{
    controller::{events::WizardError, orchestration::PipelineHandle, ProjectCreationController},
    draft::{Draft, SettingsValues, SourceSelection},
    store::{Step, WizardState},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStepProps {
    pub initial_mode: SourceType,
    pub initial_youtube_url: Option<String>,
    pub previous_upload_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsStepProps {
    pub initial_values: SettingsValues,
    pub draft: Draft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepView {
    Source(SourceStepProps),
    Details(DetailsStepProps),
}

impl StepView {
    pub fn step(&self) -> Step {
        match self {
            StepView::Source(_) => Step::Source,
            StepView::Details(_) => Step::Details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellView {
    /// Clicking outside the dialog never closes it; in-progress input is only discarded explicitly.
    pub dismiss_on_outside_click: bool,
    pub step: StepView,
}

#[derive(Debug, Clone)]
pub enum StepEvent {
    SourceSubmitted(SourceSelection),
    SourceCancelled,
    DetailsSubmitted(SettingsValues),
    BackToSource,
    CloseRequested,
}

pub fn render(state: &WizardState, draft: &Draft, default_source_language: &str) -> Option<ShellView> {
    if !state.open {
        return None;
    }

    let step = match state.step {
        Step::Source => StepView::Source(SourceStepProps {
            initial_mode: draft.source_type,
            initial_youtube_url: draft.youtube_url.clone(),
            previous_upload_summary: draft.recent_upload_summary(),
        }),
        Step::Details => StepView::Details(DetailsStepProps {
            initial_values: draft.settings_values(default_source_language),
            draft: draft.clone(),
        }),
    };

    Some(ShellView {
        dismiss_on_outside_click: false,
        step,
    })
}

/// Routes a step view event to the controller. Details submission returns the running pipeline.
pub async fn dispatch(
    controller: &Arc<ProjectCreationController>,
    event: StepEvent,
) -> Result<Option<PipelineHandle>, WizardError> {
    match event {
        StepEvent::SourceSubmitted(selection) => {
            controller.submit_source(selection).await?;
            Ok(None)
        }
        StepEvent::SourceCancelled | StepEvent::CloseRequested => {
            controller.cancel().await;
            Ok(None)
        }
        StepEvent::DetailsSubmitted(values) => controller.submit_details(values).await.map(Some),
        StepEvent::BackToSource => {
            controller.back_to_source().await?;
            Ok(None)
        }
    }
}
