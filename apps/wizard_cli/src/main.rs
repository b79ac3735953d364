use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use projects_client::HttpProjectsBackend;
use shared::domain::SourceType;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;
use wizard_core::{
    load_settings, shell, ModalStore, NotificationCenter, PipelineOutcome,
    ProjectCreationController, SelectedFile, SettingsValues, SourceSelection, StepEvent,
    TracingAnalytics, WizardSettings,
};

/// Creates a translation project and attaches its media source, the same way the wizard does.
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "youtube_url"])))]
struct Args {
    /// Local media file to upload.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, value_parser = parse_youtube_url)]
    youtube_url: Option<String>,
    #[arg(long)]
    title: String,
    /// Target language; repeat for several.
    #[arg(long = "target", required = true)]
    targets: Vec<String>,
    /// Source language. Omit to let the server detect it.
    #[arg(long)]
    source_language: Option<String>,
    #[arg(long)]
    speakers: Option<u32>,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    owner_code: Option<String>,
    /// How long to wait for the pipeline before giving up, in seconds.
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

fn parse_youtube_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw).map_err(|e| format!("not a URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    Ok(raw.trim().to_string())
}

fn apply_cli_overrides(mut settings: WizardSettings, args: &Args) -> WizardSettings {
    if let Some(url) = &args.api_base_url {
        settings.api_base_url = url.clone();
    }
    if let Some(owner_code) = &args.owner_code {
        settings.owner_code = owner_code.clone();
    }
    if let Some(speakers) = args.speakers {
        settings.default_speaker_count = speakers;
    }
    settings
}

async fn source_selection(args: &Args) -> Result<SourceSelection> {
    if let Some(path) = &args.file {
        let file = SelectedFile::from_path(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        return Ok(SourceSelection::File(Some(file)));
    }
    match &args.youtube_url {
        Some(url) => Ok(SourceSelection::Youtube { url: url.clone() }),
        None => bail!("either --file or --youtube-url is required"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let settings = apply_cli_overrides(load_settings(), &args);

    let selection = source_selection(&args).await?;
    let backend = Arc::new(HttpProjectsBackend::new(settings.api_base_url.clone()));
    info!(api = backend.base_url(), "using projects backend");
    let notifications = NotificationCenter::with_default_duration(settings.notification_duration_ms);
    let speaker_count = settings.default_speaker_count;
    let controller = ProjectCreationController::new(
        settings,
        ModalStore::new(),
        backend,
        Arc::new(TracingAnalytics),
        notifications,
    );
    let _reset = controller.spawn_reset_on_close();

    controller.open().await;
    let mode = selection.mode();
    shell::dispatch(&controller, StepEvent::SourceSubmitted(selection)).await?;
    info!(source_type = %mode, "source step submitted");

    let values = SettingsValues {
        title: args.title.clone(),
        detect_automatically: args.source_language.is_none(),
        source_language: args.source_language.clone().unwrap_or_default(),
        target_languages: args.targets.clone(),
        speaker_count,
    };
    let handle = shell::dispatch(&controller, StepEvent::DetailsSubmitted(values))
        .await?
        .context("details submit did not start a pipeline")?;
    info!(session = handle.session(), "creation pipeline started");

    let outcome = tokio::time::timeout(Duration::from_secs(args.timeout_secs), handle.wait())
        .await
        .context("timed out waiting for project creation")??;

    for notification in controller.notifications().active().await {
        match &notification.description {
            Some(description) => println!("[{}] {description}", notification.title),
            None => println!("[{}]", notification.title),
        }
    }

    match outcome {
        PipelineOutcome::Completed { project_id } => {
            let kind = match mode {
                SourceType::File => "uploaded file",
                SourceType::Youtube => "video URL",
            };
            println!("project_id={project_id} ({kind} attached)");
            Ok(())
        }
        PipelineOutcome::Failed(err) => Err(anyhow::Error::new(err).context("project creation failed")),
        PipelineOutcome::Superseded { .. } => bail!("wizard was closed before creation finished"),
    }
}
