//! Project creation wizard: modal state, draft model, creation pipeline, and shell mapping.

pub mod analytics;
pub mod config;
pub mod controller;
pub mod draft;
pub mod notifications;
pub mod shell;
pub mod store;

pub use analytics::{AnalyticsEvent, AnalyticsSink, RecordingAnalytics, TracingAnalytics};
pub use config::{load_settings, WizardSettings};
pub use controller::{
    events::{ErrorCategory, PipelineStage, WizardError},
    orchestration::{PipelineHandle, PipelineOutcome},
    ProjectCreationController,
};
pub use draft::{Draft, DraftError, SelectedFile, SettingsValues, SourceSelection};
pub use notifications::{Notification, NotificationCenter, NotificationEvent, NotificationPayload};
pub use shell::{ShellView, StepEvent, StepView};
pub use store::{ModalStore, Step, WizardState};
