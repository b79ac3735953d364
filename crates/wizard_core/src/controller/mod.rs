//! Controller layer: owns the draft, drives modal steps, and launches the creation pipeline.

pub mod events;
pub mod orchestration;

use std::sync::{Arc, Mutex as StdMutex};

use projects_client::ProjectsBackend;
use shared::{domain::ProjectId, protocol::CreateProjectRequest};
use tokio::{
    sync::{mpsc, Mutex, MutexGuard},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    analytics::{AnalyticsEvent, AnalyticsSink},
    config::WizardSettings,
    draft::{Draft, SettingsValues, SourceSelection},
    notifications::{NotificationCenter, NotificationPayload},
    shell::{self, ShellView},
    store::{ModalStore, Step, WizardState},
};

use events::WizardError;
use orchestration::{run_pipeline, PipelineHandle, PipelineOutcome, PipelinePlan};

pub const SUCCESS_NOTIFICATION_ID: &str = "project-create-success";
pub const ERROR_NOTIFICATION_ID: &str = "project-create-error";
pub const SUCCESS_TITLE: &str = "Project created";
pub const ERROR_TITLE: &str = "Project creation failed";
pub const RETRY_LABEL: &str = "Retry";

struct ControllerState {
    draft: Draft,
    /// Store session the draft belongs to; a mismatch means the modal was closed or reopened.
    draft_session: u64,
    in_flight_session: Option<u64>,
    last_error: Option<String>,
    created_project: Option<(CreateProjectRequest, ProjectId)>,
}

pub struct ProjectCreationController {
    settings: WizardSettings,
    store: ModalStore,
    backend: Arc<dyn ProjectsBackend>,
    analytics: Arc<dyn AnalyticsSink>,
    notifications: Arc<NotificationCenter>,
    inner: Mutex<ControllerState>,
    retry_tx: mpsc::UnboundedSender<u64>,
    retry_rx: StdMutex<Option<mpsc::UnboundedReceiver<u64>>>,
}

impl ProjectCreationController {
    pub fn new(
        settings: WizardSettings,
        store: ModalStore,
        backend: Arc<dyn ProjectsBackend>,
        analytics: Arc<dyn AnalyticsSink>,
        notifications: Arc<NotificationCenter>,
    ) -> Arc<Self> {
        let draft = Draft::initial(&settings);
        let draft_session = store.snapshot().session;
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            settings,
            store,
            backend,
            analytics,
            notifications,
            inner: Mutex::new(ControllerState {
                draft,
                draft_session,
                in_flight_session: None,
                last_error: None,
                created_project: None,
            }),
            retry_tx,
            retry_rx: StdMutex::new(Some(retry_rx)),
        })
    }

    pub fn store(&self) -> &ModalStore {
        &self.store
    }

    pub fn settings(&self) -> &WizardSettings {
        &self.settings
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn wizard_state(&self) -> WizardState {
        self.store.snapshot()
    }

    pub async fn draft(&self) -> Draft {
        let mut state = self.inner.lock().await;
        self.sync_session(&mut state);
        state.draft.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        let mut state = self.inner.lock().await;
        self.sync_session(&mut state);
        state.last_error.clone()
    }

    pub async fn is_submitting(&self) -> bool {
        let mut state = self.inner.lock().await;
        let snapshot = self.sync_session(&mut state);
        state.in_flight_session == Some(snapshot.session)
    }

    pub async fn recent_upload_summary(&self) -> Option<String> {
        self.draft().await.recent_upload_summary()
    }

    /// What the wizard shell should render right now.
    pub async fn view(&self) -> Option<ShellView> {
        let mut state = self.inner.lock().await;
        let snapshot = self.sync_session(&mut state);
        shell::render(
            &snapshot,
            &state.draft,
            &self.settings.default_source_language,
        )
    }

    pub async fn open(&self) {
        let mut state = self.inner.lock().await;
        self.store.open(None);
        self.sync_session(&mut state);
    }

    pub async fn cancel(&self) {
        let mut state = self.inner.lock().await;
        self.store.close();
        self.sync_session(&mut state);
    }

    pub async fn submit_source(&self, selection: SourceSelection) -> Result<(), WizardError> {
        let mut state = self.inner.lock().await;
        let snapshot = self.sync_session(&mut state);
        if !snapshot.open {
            return Err(WizardError::Closed);
        }

        let mode = selection.mode();
        state.draft.apply_source(selection);
        state.last_error = None;
        drop(state);

        self.analytics.track(&AnalyticsEvent::SourceReady { mode });
        self.store.set_step(Step::Details);
        Ok(())
    }

    pub async fn back_to_source(&self) -> Result<(), WizardError> {
        let mut state = self.inner.lock().await;
        let snapshot = self.sync_session(&mut state);
        if !snapshot.open {
            return Err(WizardError::Closed);
        }
        self.store.set_step(Step::Source);
        Ok(())
    }

    /// Merges the settings into the draft and starts the creation pipeline in the background.
    /// Returns once the pipeline is launched; await the handle to observe its outcome.
    pub async fn submit_details(
        self: &Arc<Self>,
        values: SettingsValues,
    ) -> Result<PipelineHandle, WizardError> {
        let mut state = self.inner.lock().await;
        let snapshot = self.sync_session(&mut state);
        if !snapshot.open {
            return Err(WizardError::Closed);
        }
        if state.in_flight_session == Some(snapshot.session) {
            return Err(WizardError::PipelineInFlight);
        }

        state
            .draft
            .apply_settings(values, &self.settings.default_source_language);
        self.start_pipeline(state, snapshot.session, true).await
    }

    /// Resubmits the retained draft after a failed pipeline. A project created by the failed
    /// attempt is reused when the draft has not changed since.
    pub async fn retry(self: &Arc<Self>) -> Result<PipelineHandle, WizardError> {
        let mut state = self.inner.lock().await;
        let snapshot = self.sync_session(&mut state);
        if !snapshot.open {
            return Err(WizardError::Closed);
        }
        if state.in_flight_session == Some(snapshot.session) {
            return Err(WizardError::PipelineInFlight);
        }
        self.start_pipeline(state, snapshot.session, false).await
    }

    /// Resets the draft whenever the store is closed or reopened by anyone.
    pub fn spawn_reset_on_close(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::downgrade(self);
        let mut rx = self.store.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                let mut state = controller.inner.lock().await;
                controller.sync_session(&mut state);
            }
        })
    }

    /// Runs retries requested from the failure notification's action. Only the first call
    /// starts a listener; later calls return `None`.
    pub fn spawn_retry_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.retry_rx.lock().ok()?.take()?;
        let controller = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            while let Some(session) = rx.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                if controller.store.snapshot().session != session {
                    debug!(session, "ignoring retry requested from a previous session");
                    continue;
                }
                if let Err(e) = controller.retry().await {
                    warn!(error = %e, "retry could not start");
                }
            }
        }))
    }

    fn sync_session(&self, state: &mut ControllerState) -> WizardState {
        let snapshot = self.store.snapshot();
        if snapshot.session != state.draft_session {
            state.draft = Draft::initial(&self.settings);
            state.draft_session = snapshot.session;
            state.last_error = None;
            state.created_project = None;
        }
        snapshot
    }

    async fn start_pipeline(
        self: &Arc<Self>,
        mut state: MutexGuard<'_, ControllerState>,
        session: u64,
        track_submit: bool,
    ) -> Result<PipelineHandle, WizardError> {
        let mut plan = match PipelinePlan::from_draft(&state.draft, &self.settings.owner_code) {
            Ok(plan) => plan,
            Err(e) => {
                let err = WizardError::from(e);
                state.last_error = Some(err.to_string());
                drop(state);
                warn!(error = %err, "details submit rejected");
                self.notify_failure(&err, session).await;
                return Err(err);
            }
        };

        if let Some((request, project_id)) = &state.created_project {
            if *request == plan.request {
                plan.existing_project = Some(project_id.clone());
            }
        }
        state.in_flight_session = Some(session);
        state.last_error = None;
        let submitted = AnalyticsEvent::CreationComplete {
            title: state.draft.title.clone(),
            targets: state.draft.target_languages.clone(),
        };
        drop(state);

        info!(
            session,
            source_type = %plan.request.source_type,
            reuse_project = plan.existing_project.is_some(),
            "starting creation pipeline"
        );
        let request = plan.request.clone();
        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = run_pipeline(controller.backend.as_ref(), plan).await;
            controller.finish_pipeline(session, request, result).await
        });

        if track_submit {
            self.analytics.track(&submitted);
        }
        Ok(PipelineHandle::new(session, task))
    }

    async fn finish_pipeline(
        self: &Arc<Self>,
        session: u64,
        request: CreateProjectRequest,
        result: Result<ProjectId, WizardError>,
    ) -> PipelineOutcome {
        let mut state = self.inner.lock().await;
        if state.in_flight_session == Some(session) {
            state.in_flight_session = None;
        }

        let current = self.store.snapshot();
        if current.session != session || !current.open {
            drop(state);
            warn!(
                session,
                current_session = current.session,
                "creation pipeline finished after the wizard was closed; leaving it untouched"
            );
            return PipelineOutcome::Superseded { result };
        }

        match result {
            Ok(project_id) => {
                if !self.store.close_session(session) {
                    return PipelineOutcome::Superseded {
                        result: Ok(project_id),
                    };
                }
                self.sync_session(&mut state);
                drop(state);

                info!(%project_id, "project created with source attached");
                self.notifications.dismiss(ERROR_NOTIFICATION_ID).await;
                self.notifications
                    .notify(
                        NotificationPayload::titled(SUCCESS_TITLE)
                            .with_id(SUCCESS_NOTIFICATION_ID)
                            .with_auto_dismiss(self.settings.success_notification_duration_ms),
                    )
                    .await;
                PipelineOutcome::Completed { project_id }
            }
            Err(err) => {
                if let WizardError::Stage {
                    project_id: Some(project_id),
                    ..
                } = &err
                {
                    state.created_project = Some((request, project_id.clone()));
                }
                state.last_error = Some(err.to_string());
                drop(state);

                warn!(
                    error = %err,
                    stage = err.failed_stage().map(|stage| stage.as_str()),
                    "creation pipeline failed"
                );
                self.notify_failure(&err, session).await;
                PipelineOutcome::Failed(err)
            }
        }
    }

    async fn notify_failure(&self, err: &WizardError, session: u64) {
        let mut payload = NotificationPayload::titled(ERROR_TITLE)
            .with_id(ERROR_NOTIFICATION_ID)
            .with_description(err.user_message())
            .with_auto_dismiss(self.settings.notification_duration_ms);

        if err.is_retryable() {
            let retry_tx = self.retry_tx.clone();
            payload = payload.with_action(RETRY_LABEL, move || {
                let _ = retry_tx.send(session);
            });
        }

        self.notifications.notify(payload).await;
    }
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;
