use crate::error::ControllerError;
use crate::model::{ClientConfig, FormField, PollConfig, ResultSnapshot, RunStatus};
use crate::orchestrator::{RunController, RunEvent, RunView, TimelineSource};
use crate::transport::{HttpTransport, PipelineTransport};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "heal-cli",
    version,
    about = "Start and follow a remote CI/CD healing pipeline run"
)]
pub struct Cli {
    /// Repository to heal (required to start a run)
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Team name used in the fix branch name
    #[arg(long, default_value = "")]
    pub team_name: String,

    /// Team leader name used in the fix branch name
    #[arg(long, default_value = "")]
    pub leader_name: String,

    /// OpenAI API key forwarded to the pipeline
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub openai_key: String,

    /// GitHub token forwarded to the pipeline
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, default_value = "")]
    pub github_token: String,

    /// Maximum fix iterations (1-10; anything else falls back to 5)
    #[arg(long, default_value = "5")]
    pub retry_limit: String,

    /// Base URL of the pipeline API
    #[arg(long, env = "HEAL_API_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Per-request timeout
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Status poll period
    #[arg(long, default_value = "3s")]
    pub status_interval: humantime::Duration,

    /// Timeline poll period
    #[arg(long, default_value = "2s")]
    pub timeline_interval: humantime::Duration,

    /// Print the final result snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the text summary. This is the default output; the flag only
    /// makes the choice explicit and cannot be combined with --json
    #[arg(long, conflicts_with = "json")]
    pub text: bool,

    /// Export results as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Check pipeline API liveness and exit
    #[arg(long)]
    pub health: bool,

    /// Reset the remote pipeline and exit
    #[arg(long)]
    pub reset: bool,

    /// Print the remote run status once and exit
    #[arg(long)]
    pub status: bool,

    /// Print the fix branch name derived from team and leader and exit
    #[arg(long)]
    pub branch_preview: bool,

    /// List the newest saved runs and exit
    #[arg(long, value_name = "N")]
    pub history: Option<usize>,
}

impl Cli {
    /// Text output unless --json was asked for.
    fn text_output(&self) -> bool {
        self.text || !self.json
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.branch_preview {
        println!(
            "{}",
            crate::model::branch_preview(&args.team_name, &args.leader_name)
        );
        return Ok(());
    }
    if let Some(n) = args.history {
        return print_history(n);
    }

    let (client, poll) = build_config(&args)?;
    let transport: Arc<dyn PipelineTransport> =
        Arc::new(HttpTransport::new(&client).context("invalid pipeline API configuration")?);

    if args.health {
        let h = transport.health().await.context("health check failed")?;
        let service = h.service.as_deref().unwrap_or("pipeline");
        println!("{service}: {}", h.status);
        return Ok(());
    }
    if args.reset {
        let ack = transport.reset_remote().await.context("remote reset failed")?;
        println!("{}", ack.message.as_deref().unwrap_or("Pipeline reset"));
        return Ok(());
    }
    if args.status {
        let s = transport.poll_status().await.context("status request failed")?;
        match (s.run_id.as_deref(), s.message.as_deref()) {
            (Some(id), Some(msg)) => println!("{} ({id}): {msg}", s.status),
            (Some(id), None) => println!("{} ({id})", s.status),
            (None, Some(msg)) => println!("{}: {msg}", s.status),
            (None, None) => println!("{}", s.status),
        }
        return Ok(());
    }

    run_pipeline(args, transport, poll).await
}

/// Build client and poll settings from CLI arguments.
pub fn build_config(args: &Cli) -> Result<(ClientConfig, PollConfig)> {
    let status_interval = Duration::from(args.status_interval);
    let timeline_interval = Duration::from(args.timeline_interval);
    if status_interval.is_zero() || timeline_interval.is_zero() {
        anyhow::bail!("poll intervals must be greater than zero");
    }
    let client = ClientConfig {
        base_url: args.base_url.clone(),
        request_timeout: Duration::from(args.timeout),
        user_agent: format!("heal-cli/{}", env!("CARGO_PKG_VERSION")),
    };
    let poll = PollConfig {
        status_interval,
        timeline_interval,
    };
    Ok((client, poll))
}

async fn run_pipeline(
    args: Cli,
    transport: Arc<dyn PipelineTransport>,
    poll: PollConfig,
) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<RunEvent>();
    let controller = RunController::new(transport, poll, Some(evt_tx));

    controller.set_field(FormField::RepoUrl, args.repo_url.clone().unwrap_or_default());
    controller.set_field(FormField::TeamName, args.team_name.clone());
    controller.set_field(FormField::LeaderName, args.leader_name.clone());
    controller.set_field(FormField::OpenaiKey, args.openai_key.clone());
    controller.set_field(FormField::GithubToken, args.github_token.clone());
    controller.set_field(FormField::RetryLimit, args.retry_limit.clone());

    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Branch: {}",
        controller.branch_preview()
    )));

    match controller.start().await {
        Ok(ack) => {
            if let Some(msg) = ack.message {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
        }
        Err(e) => {
            drop(out_tx);
            let _ = out_handle.await;
            return match e {
                ControllerError::Validation(msg) => Err(anyhow::anyhow!(msg)),
                e => Err(e).context("failed to start pipeline run"),
            };
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                let _ = out_tx.send(OutputLine::Stderr("Interrupted; resetting pipeline".into()));
                controller.reset().await;
                drop(out_tx);
                let _ = out_handle.await;
                anyhow::bail!("cancelled");
            }
            ev = evt_rx.recv() => {
                let Some(ev) = ev else { break };
                if args.text_output() {
                    print_event(&out_tx, &ev);
                }
                if controller.view().is_settled() {
                    break;
                }
            }
        }
    }

    let view = controller.view();
    let outcome = finish(&args, &out_tx, &view);
    drop(out_tx);
    let _ = out_handle.await;
    outcome
}

fn print_event(out_tx: &mpsc::UnboundedSender<OutputLine>, ev: &RunEvent) {
    let line = match ev {
        RunEvent::StatusChanged(status) => format!("== {status} =="),
        RunEvent::TimelineAppended(events) => events
            .iter()
            .map(|e| e.display_line())
            .collect::<Vec<_>>()
            .join("\n"),
        RunEvent::TimelineReplaced(events) => {
            format!("Timeline: {} events (final)", events.len())
        }
        RunEvent::ResultsReady(snap) => format!("Results ready for run {}", snap.run_id),
        RunEvent::Reset => return,
        RunEvent::Error(msg) => format!("Error: {msg}"),
    };
    if !line.is_empty() {
        let _ = out_tx.send(OutputLine::Stderr(line));
    }
}

/// Print the final outcome, run exports and decide the exit result.
fn finish(args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>, view: &RunView) -> Result<()> {
    let Some(snap) = view.results.as_ref() else {
        let msg = view.error.clone().unwrap_or_else(|| "run ended without results".into());
        anyhow::bail!("pipeline run {}: {msg}", view.status);
    };

    handle_exports(args, snap)?;
    if !args.text_output() {
        let out = serde_json::to_string_pretty(snap)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        if view.timeline_source == TimelineSource::Snapshot {
            for e in &view.timeline {
                let _ = out_tx.send(OutputLine::Stdout(e.display_line()));
            }
        }
        let summary = crate::text_summary::build_text_summary(snap);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    if args.auto_save {
        match crate::storage::save_run(snap) {
            Ok(p) => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
            }
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "failed to save run"),
        }
    }

    if view.status == RunStatus::Failed {
        let msg = snap
            .error_message
            .clone()
            .or_else(|| view.error.clone())
            .unwrap_or_else(|| "pipeline reported failure".into());
        anyhow::bail!("pipeline run failed: {msg}");
    }
    Ok(())
}

/// Handle export operations for both text and JSON modes.
fn handle_exports(args: &Cli, snap: &ResultSnapshot) -> Result<()> {
    if let Some(p) = args.export_json.as_deref() {
        crate::storage::export_json(p, snap)?;
    }
    Ok(())
}

fn print_history(limit: usize) -> Result<()> {
    let runs = crate::storage::load_recent(limit).context("failed to read saved runs")?;
    if runs.is_empty() {
        println!("No saved runs");
        return Ok(());
    }
    for r in runs {
        println!(
            "{}  {:<8}  {}  fixes {}/{}  score {:.1}",
            r.finished_at.as_deref().or(r.started_at.as_deref()).unwrap_or("-"),
            r.status.as_str(),
            r.run_id,
            r.applied_fix_count(),
            r.fixes.len(),
            r.score.total_score
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_cadence() {
        let cli = Cli::parse_from(["heal-cli", "--repo-url", "https://github.com/a/b"]);
        let (client, poll) = build_config(&cli).unwrap();
        assert_eq!(poll.status_interval, Duration::from_secs(3));
        assert_eq!(poll.timeline_interval, Duration::from_secs(2));
        assert_eq!(client.request_timeout, Duration::from_secs(30));
        assert!(client.user_agent.starts_with("heal-cli/"));
        assert!(cli.auto_save);
    }

    #[test]
    fn text_is_the_default_and_conflicts_with_json() {
        let cli = Cli::parse_from(["heal-cli", "--text"]);
        assert!(cli.text_output());
        assert!(Cli::parse_from(["heal-cli"]).text_output());
        assert!(!Cli::parse_from(["heal-cli", "--json"]).text_output());
        assert!(Cli::try_parse_from(["heal-cli", "--text", "--json"]).is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cli = Cli::parse_from(["heal-cli", "--status-interval", "0s"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn auto_save_can_be_disabled() {
        let cli = Cli::parse_from(["heal-cli", "--auto-save", "false", "--timeline-interval", "500ms"]);
        assert!(!cli.auto_save);
        let (_, poll) = build_config(&cli).unwrap();
        assert_eq!(poll.timeline_interval, Duration::from_millis(500));
    }
}
