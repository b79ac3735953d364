use super::*;
use std::{collections::BTreeMap, sync::Mutex as StdMutex, time::Duration};

use async_trait::async_trait;
use projects_client::{BackendError, FileUpload};
use shared::{
    domain::{ObjectKey, SourceType},
    protocol::{CreateProjectResponse, PrepareUploadRequest, PrepareUploadResponse},
};
use tokio::sync::oneshot;

use crate::{
    analytics::RecordingAnalytics,
    controller::events::{ErrorCategory, PipelineStage},
    draft::{DraftError, SelectedFile},
    notifications::NotificationEvent,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Create { title: String, owner_code: String },
    Prepare {
        project_id: String,
        file_name: String,
        content_type: String,
    },
    Upload {
        upload_url: String,
        fields: BTreeMap<String, String>,
        size: usize,
    },
    Finalize { project_id: String, object_key: String },
    Register { project_id: String, youtube_url: String },
}

#[derive(Default)]
struct ScriptedBackend {
    calls: StdMutex<Vec<Call>>,
    create_gate: StdMutex<Option<oneshot::Receiver<()>>>,
    fail_at: StdMutex<Option<PipelineStage>>,
}

impl ScriptedBackend {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }

    fn gate_create(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.create_gate.lock().expect("gate") = Some(rx);
        tx
    }

    fn fail_at(&self, stage: Option<PipelineStage>) {
        *self.fail_at.lock().expect("fail_at") = stage;
    }

    fn check(&self, stage: PipelineStage) -> anyhow::Result<()> {
        if *self.fail_at.lock().expect("fail_at") == Some(stage) {
            return Err(anyhow::anyhow!("connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectsBackend for ScriptedBackend {
    async fn create_project(
        &self,
        request: CreateProjectRequest,
    ) -> anyhow::Result<CreateProjectResponse> {
        self.record(Call::Create {
            title: request.title.clone(),
            owner_code: request.owner_code.clone(),
        });
        let gate = self.create_gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.check(PipelineStage::CreateProject)?;
        Ok(CreateProjectResponse {
            project_id: ProjectId::from("p1"),
        })
    }

    async fn prepare_upload(
        &self,
        project_id: &ProjectId,
        request: PrepareUploadRequest,
    ) -> anyhow::Result<PrepareUploadResponse> {
        self.record(Call::Prepare {
            project_id: project_id.to_string(),
            file_name: request.file_name,
            content_type: request.content_type,
        });
        self.check(PipelineStage::PrepareUpload)?;
        Ok(PrepareUploadResponse {
            upload_url: "u".to_string(),
            fields: BTreeMap::new(),
            object_key: ObjectKey::from("k"),
        })
    }

    async fn upload_file(
        &self,
        upload_url: &str,
        fields: &BTreeMap<String, String>,
        file: FileUpload,
    ) -> anyhow::Result<()> {
        self.record(Call::Upload {
            upload_url: upload_url.to_string(),
            fields: fields.clone(),
            size: file.contents.len(),
        });
        self.check(PipelineStage::UploadFile)
    }

    async fn finalize_upload(
        &self,
        project_id: &ProjectId,
        object_key: &ObjectKey,
    ) -> anyhow::Result<()> {
        self.record(Call::Finalize {
            project_id: project_id.to_string(),
            object_key: object_key.to_string(),
        });
        self.check(PipelineStage::FinalizeUpload)
    }

    async fn register_youtube_source(
        &self,
        project_id: &ProjectId,
        youtube_url: &str,
    ) -> anyhow::Result<()> {
        self.record(Call::Register {
            project_id: project_id.to_string(),
            youtube_url: youtube_url.to_string(),
        });
        self.check(PipelineStage::RegisterYoutube)
    }
}

struct Harness {
    controller: Arc<ProjectCreationController>,
    backend: Arc<ScriptedBackend>,
    analytics: Arc<RecordingAnalytics>,
}

fn harness() -> Harness {
    let backend = Arc::new(ScriptedBackend::default());
    let analytics = Arc::new(RecordingAnalytics::default());
    let controller = ProjectCreationController::new(
        WizardSettings::default(),
        ModalStore::new(),
        backend.clone(),
        analytics.clone(),
        NotificationCenter::new(),
    );
    Harness {
        controller,
        backend,
        analytics,
    }
}

fn two_megabyte_file() -> SelectedFile {
    SelectedFile::new(
        "clip.mp4",
        Some("video/mp4".to_string()),
        vec![7u8; 2 * 1024 * 1024],
    )
}

fn demo_settings() -> SettingsValues {
    SettingsValues {
        title: "Demo".to_string(),
        detect_automatically: true,
        source_language: "ko".to_string(),
        target_languages: vec!["en".to_string()],
        speaker_count: 2,
    }
}

async fn wait(handle: PipelineHandle) -> PipelineOutcome {
    tokio::time::timeout(WAIT, handle.wait())
        .await
        .expect("pipeline finished in time")
        .expect("pipeline task")
}

#[tokio::test]
async fn youtube_source_submit_advances_to_details() {
    let h = harness();
    h.controller.open().await;

    h.controller
        .submit_source(SourceSelection::Youtube {
            url: "https://youtu.be/abc".to_string(),
        })
        .await
        .expect("source submit");

    assert_eq!(h.controller.wizard_state().step, Step::Details);
    let draft = h.controller.draft().await;
    assert_eq!(draft.source_type, SourceType::Youtube);
    assert_eq!(draft.youtube_url.as_deref(), Some("https://youtu.be/abc"));
    assert!(draft.file.is_none());
    assert_eq!(
        h.analytics.events(),
        vec![AnalyticsEvent::SourceReady {
            mode: SourceType::Youtube
        }]
    );
}

#[tokio::test]
async fn file_pipeline_runs_stages_in_order_then_closes_and_notifies() {
    let h = harness();
    let mut notifications = h.controller.notifications().subscribe();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(Some(two_megabyte_file())))
        .await
        .expect("source submit");

    let handle = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect("details submit");
    let outcome = wait(handle).await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Completed { ref project_id } if project_id.as_str() == "p1"
    ));
    assert_eq!(
        h.backend.calls(),
        vec![
            Call::Create {
                title: "Demo".to_string(),
                owner_code: "temp".to_string()
            },
            Call::Prepare {
                project_id: "p1".to_string(),
                file_name: "clip.mp4".to_string(),
                content_type: "video/mp4".to_string()
            },
            Call::Upload {
                upload_url: "u".to_string(),
                fields: BTreeMap::new(),
                size: 2 * 1024 * 1024
            },
            Call::Finalize {
                project_id: "p1".to_string(),
                object_key: "k".to_string()
            },
        ]
    );

    let state = h.controller.wizard_state();
    assert!(!state.open);
    assert_eq!(state.step, Step::Source);
    assert_eq!(
        notifications.recv().await.expect("notification"),
        NotificationEvent::Shown {
            id: SUCCESS_NOTIFICATION_ID.to_string(),
            title: SUCCESS_TITLE.to_string()
        }
    );
    let shown = h
        .controller
        .notifications()
        .get(SUCCESS_NOTIFICATION_ID)
        .await
        .expect("success notification");
    assert_eq!(shown.duration, Some(Duration::from_millis(2500)));
    assert_eq!(h.controller.draft().await, Draft::default());
}

#[tokio::test]
async fn youtube_pipeline_registers_url_once() {
    let h = harness();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::Youtube {
            url: "u".to_string(),
        })
        .await
        .expect("source submit");

    let handle = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect("details submit");
    let outcome = wait(handle).await;

    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));
    let registrations: Vec<Call> = h
        .backend
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Register { .. }))
        .collect();
    assert_eq!(
        registrations,
        vec![Call::Register {
            project_id: "p1".to_string(),
            youtube_url: "u".to_string()
        }]
    );
    assert!(!h.controller.wizard_state().open);
    assert!(h
        .controller
        .notifications()
        .get(SUCCESS_NOTIFICATION_ID)
        .await
        .is_some());
    assert_eq!(
        h.analytics.events().last(),
        Some(&AnalyticsEvent::CreationComplete {
            title: "Demo".to_string(),
            targets: vec!["en".to_string()]
        })
    );
}

#[tokio::test]
async fn submit_returns_before_creation_resolves_and_no_stage_runs_early() {
    let h = harness();
    let release = h.backend.gate_create();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(Some(two_megabyte_file())))
        .await
        .expect("source submit");

    let handle = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect("details submit");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());
    assert!(h.controller.is_submitting().await);
    assert_eq!(h.controller.wizard_state().step, Step::Details);
    assert_eq!(h.backend.calls().len(), 1);
    assert!(matches!(
        h.controller.submit_details(demo_settings()).await,
        Err(WizardError::PipelineInFlight)
    ));

    release.send(()).expect("release create");
    let outcome = wait(handle).await;

    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));
    let creates = h
        .backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Create { .. }))
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn missing_file_at_details_submit_is_reported_not_dropped() {
    let h = harness();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(None))
        .await
        .expect("source submit");

    let err = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect_err("no file attached");

    assert!(matches!(err, WizardError::Draft(DraftError::MissingSourceFile)));
    assert!(h.backend.calls().is_empty());
    let state = h.controller.wizard_state();
    assert!(state.open);
    assert_eq!(state.step, Step::Details);
    assert!(h.controller.last_error().await.is_some());
    let notification = h
        .controller
        .notifications()
        .get(ERROR_NOTIFICATION_ID)
        .await
        .expect("error notification");
    assert!(notification.action.is_none());
    assert_eq!(h.controller.draft().await.title, "Demo");
}

#[tokio::test]
async fn stage_failure_keeps_wizard_open_and_retry_reuses_created_project() {
    let h = harness();
    h.controller
        .spawn_retry_listener()
        .expect("first listener");
    assert!(h.controller.spawn_retry_listener().is_none());
    h.backend.fail_at(Some(PipelineStage::UploadFile));
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(Some(two_megabyte_file())))
        .await
        .expect("source submit");

    let handle = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect("details submit");
    let outcome = wait(handle).await;

    match &outcome {
        PipelineOutcome::Failed(err) => {
            assert_eq!(err.failed_stage(), Some(PipelineStage::UploadFile));
            assert_eq!(err.category(), ErrorCategory::Transport);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.project_id().map(ProjectId::as_str), Some("p1"));
    let state = h.controller.wizard_state();
    assert!(state.open);
    assert_eq!(state.step, Step::Details);
    assert_eq!(h.controller.draft().await.title, "Demo");
    assert!(h.controller.draft().await.file.is_some());
    let failure = h
        .controller
        .notifications()
        .get(ERROR_NOTIFICATION_ID)
        .await
        .expect("error notification");
    assert_eq!(
        failure.action.as_ref().map(|action| action.label.as_str()),
        Some(RETRY_LABEL)
    );

    h.backend.fail_at(None);
    let mut store_rx = h.controller.store().subscribe();
    assert!(
        h.controller
            .notifications()
            .trigger_action(ERROR_NOTIFICATION_ID)
            .await
    );
    tokio::time::timeout(WAIT, store_rx.wait_for(|state| !state.open))
        .await
        .expect("retry finished in time")
        .expect("store alive");

    let creates = h
        .backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Create { .. }))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(
        h.backend.calls().last(),
        Some(&Call::Finalize {
            project_id: "p1".to_string(),
            object_key: "k".to_string()
        })
    );
    let creation_events = h
        .analytics
        .events()
        .iter()
        .filter(|event| matches!(event, AnalyticsEvent::CreationComplete { .. }))
        .count();
    assert_eq!(creation_events, 1);
}

#[tokio::test]
async fn changed_settings_after_failure_create_a_new_project() {
    let h = harness();
    h.backend.fail_at(Some(PipelineStage::FinalizeUpload));
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(Some(two_megabyte_file())))
        .await
        .expect("source submit");
    let first = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect("details submit");
    assert!(matches!(wait(first).await, PipelineOutcome::Failed(_)));

    h.backend.fail_at(None);
    let mut renamed = demo_settings();
    renamed.title = "Demo v2".to_string();
    let second = h
        .controller
        .submit_details(renamed)
        .await
        .expect("resubmit");
    assert!(matches!(wait(second).await, PipelineOutcome::Completed { .. }));

    let creates = h
        .backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Create { .. }))
        .count();
    assert_eq!(creates, 2);
}

#[tokio::test]
async fn pipeline_finishing_after_close_and_reopen_leaves_new_session_alone() {
    let h = harness();
    let release = h.backend.gate_create();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::Youtube {
            url: "u".to_string(),
        })
        .await
        .expect("source submit");
    let handle = h
        .controller
        .submit_details(demo_settings())
        .await
        .expect("details submit");

    h.controller.cancel().await;
    h.controller.open().await;
    let reopened = h.controller.wizard_state();
    release.send(()).expect("release create");
    let outcome = wait(handle).await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Superseded { result: Ok(_) }
    ));
    assert_eq!(h.controller.wizard_state(), reopened);
    assert_eq!(h.controller.draft().await, Draft::default());
    assert!(h
        .controller
        .notifications()
        .get(SUCCESS_NOTIFICATION_ID)
        .await
        .is_none());
    assert!(!h.controller.is_submitting().await);
}

#[tokio::test]
async fn cancel_at_details_discards_draft_and_resets_step() {
    let h = harness();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(Some(two_megabyte_file())))
        .await
        .expect("source submit");

    h.controller.cancel().await;

    let state = h.controller.wizard_state();
    assert!(!state.open);
    assert_eq!(state.step, Step::Source);
    assert_eq!(h.controller.draft().await, Draft::default());
    assert_eq!(h.controller.view().await, None);
}

#[tokio::test]
async fn back_to_source_keeps_draft() {
    let h = harness();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::File(Some(two_megabyte_file())))
        .await
        .expect("source submit");

    h.controller.back_to_source().await.expect("back");

    assert_eq!(h.controller.wizard_state().step, Step::Source);
    assert_eq!(
        h.controller.recent_upload_summary().await.as_deref(),
        Some("clip.mp4 • 2.0MB")
    );
    assert!(h.controller.draft().await.file.is_some());
}

#[tokio::test]
async fn closed_wizard_rejects_step_events() {
    let h = harness();

    let err = h
        .controller
        .submit_source(SourceSelection::Youtube {
            url: "u".to_string(),
        })
        .await
        .expect_err("wizard closed");

    assert!(matches!(err, WizardError::Closed));
    assert!(h.analytics.events().is_empty());
}

#[tokio::test]
async fn external_close_resets_draft_through_watcher() {
    let h = harness();
    let watcher = h.controller.spawn_reset_on_close();
    h.controller.open().await;
    h.controller
        .submit_source(SourceSelection::Youtube {
            url: "u".to_string(),
        })
        .await
        .expect("source submit");

    h.controller.store().close();

    let reset = tokio::time::timeout(WAIT, async {
        loop {
            {
                let state = h.controller.inner.lock().await;
                if state.draft == Draft::default() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reset.is_ok(), "draft should reset without a controller call");
    watcher.abort();
}

#[tokio::test]
async fn shell_dispatch_routes_events_to_controller() {
    let h = harness();
    h.controller.open().await;

    let none = shell::dispatch(
        &h.controller,
        shell::StepEvent::SourceSubmitted(SourceSelection::Youtube {
            url: "u".to_string(),
        }),
    )
    .await
    .expect("source");
    assert!(none.is_none());
    assert!(matches!(
        h.controller.view().await.map(|view| view.step),
        Some(shell::StepView::Details(_))
    ));

    let handle = shell::dispatch(
        &h.controller,
        shell::StepEvent::DetailsSubmitted(demo_settings()),
    )
    .await
    .expect("details")
    .expect("pipeline handle");
    assert!(matches!(wait(handle).await, PipelineOutcome::Completed { .. }));

    h.controller.open().await;
    shell::dispatch(&h.controller, shell::StepEvent::CloseRequested)
        .await
        .expect("close");
    assert!(!h.controller.wizard_state().open);
}

#[test]
fn backend_status_errors_are_classified() {
    let unauthorized: anyhow::Error = BackendError::Status {
        operation: "create_project",
        status: 401,
        code: None,
        message: "Unauthorized".to_string(),
    }
    .into();
    assert_eq!(ErrorCategory::classify(&unauthorized), ErrorCategory::Auth);

    let server: anyhow::Error = BackendError::Status {
        operation: "finalize_upload",
        status: 503,
        code: None,
        message: "Service Unavailable".to_string(),
    }
    .into();
    assert_eq!(ErrorCategory::classify(&server), ErrorCategory::Server);

    let transport = anyhow::anyhow!("error sending request: connection refused");
    assert_eq!(ErrorCategory::classify(&transport), ErrorCategory::Transport);

    let err = WizardError::stage(PipelineStage::PrepareUpload, None, unauthorized);
    assert!(err.user_message().contains("reserving the upload"));
    assert!(err.to_string().starts_with("prepare_upload failed"));
}
