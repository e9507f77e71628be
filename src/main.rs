//! docflow-client
//!
//! Command-line front end for the document-processing API.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!   ┌──────────┐    ┌──────────┐    ┌───────────┐
//!   │   api    │───▶│ gateway  │───▶│ transport │───▶ Backend
//!   │ (typed)  │    │ 401→sess │    │ (reqwest) │
//!   └──────────┘    └────┬─────┘    └───────────┘
//!                        │
//!                        ▼
//!                  ┌───────────┐    ┌──────────────┐
//!                  │  session  │───▶│ credentials  │
//!                  │ (refresh) │    │ (kv store)   │
//!                  └───────────┘    └──────────────┘
//!
//!   jobs::JobTracker ─┐
//!   breaker::Monitor ─┼──▶ polling::PollTask ──▶ api
//!   metrics --watch  ─┘
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use docflow_client::api::{DocumentView, JobStatus, Upload};
use docflow_client::config::load_or_default;
use docflow_client::lifecycle::signals::{spawn_interrupt_listener, spawn_session_listener};
use docflow_client::lifecycle::{Shutdown, StopReason};
use docflow_client::observability::{logging, metrics};
use docflow_client::polling::{PollOptions, PollTask};
use docflow_client::{ApiClient, ApiError, ApiResult};

#[derive(Parser)]
#[command(name = "docflow-client")]
#[command(about = "Client for the asynchronous document-processing API", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "DOCFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long, env = "DOCFLOW_USERNAME")]
        username: String,
        #[arg(short, long, env = "DOCFLOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Upload a document for processing
    Upload {
        file: PathBuf,
        /// Processing timeout passed to the backend
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Register a completion webhook right after upload
        #[arg(long)]
        webhook: Option<String>,
        /// Keep polling until processing finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Show a job's status
    Status {
        id: String,
        /// Long-poll up to this many seconds for a change
        #[arg(long)]
        wait: Option<u64>,
    },
    /// Poll a job until it completes or fails
    Watch { id: String },
    /// List processed documents
    Documents {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
    },
    /// Manage completion webhooks
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
    /// Show processing metrics
    Metrics {
        #[arg(short, long)]
        watch: bool,
    },
    /// Inspect or reset the backend circuit breaker
    Breaker {
        #[command(subcommand)]
        action: BreakerAction,
    },
    /// Show pipeline health
    Health,
    /// Show background queue depth
    Queue,
}

#[derive(Subcommand)]
enum WebhookAction {
    Register { id: String, url: String },
    Unregister { id: String },
}

#[derive(Subcommand)]
enum BreakerAction {
    Status,
    Reset,
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let client = match ApiClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    spawn_interrupt_listener(shutdown.clone());
    spawn_session_listener(client.session_events(), shutdown.clone());

    let result = tokio::select! {
        result = run(cli.command, &client, &shutdown) => result,
        reason = shutdown.wait() => match reason {
            StopReason::SessionEnded => Err(ApiError::SessionTerminated),
            StopReason::Interrupted => Ok(()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(ApiError::SessionTerminated) => {
            eprintln!("Session expired. Run `docflow-client login` to sign in again.");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, client: &ApiClient, shutdown: &Shutdown) -> ApiResult<()> {
    match command {
        Commands::Login { username, password } => {
            let user = client.auth().login(&username, &password).await?;
            println!("Logged in as {} ({})", user.email, join_roles(&user.roles));
        }
        Commands::Logout => {
            client.auth().logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => {
            let auth = client.auth();
            let Some(user) = auth.current_user() else {
                println!("Not logged in");
                return Ok(());
            };
            println!("{} ({})", user.email, join_roles(&user.roles));
            print_json(&auth.me().await?)?;
        }
        Commands::Upload {
            file,
            timeout_ms,
            webhook,
            watch,
        } => {
            let mut upload = Upload::from_path(&file).await?;
            if let Some(ms) = timeout_ms {
                upload = upload.with_processing_timeout(ms);
            }
            let name = upload.file_name.clone();
            let accepted = client.documents().upload(upload).await?;
            print_json(&accepted)?;

            if let Some(url) = webhook {
                client.documents().register_webhook(&accepted.document_id, &url).await?;
                println!("Webhook registered: {url}");
            }
            if watch {
                watch_job(client, accepted.into_view(Some(name)), shutdown).await?;
            }
        }
        Commands::Status { id, wait } => {
            let report = match wait {
                Some(secs) => client.documents().await_status(&id, Duration::from_secs(secs)).await?,
                None => client.documents().status(&id).await?,
            };
            print_json(&report)?;
        }
        Commands::Watch { id } => {
            let view = match client.documents().document(&id).await {
                Ok(view) => view,
                Err(ApiError::Server { status: 404, .. }) => {
                    DocumentView::new(id.clone(), client.documents().status(&id).await?.status)
                }
                Err(e) => return Err(e),
            };
            watch_job(client, view, shutdown).await?;
        }
        Commands::Documents { page, size } => {
            print_json(&client.documents().list(page, size).await?)?;
        }
        Commands::Webhook { action } => match action {
            WebhookAction::Register { id, url } => {
                print_json(&client.documents().register_webhook(&id, &url).await?)?;
            }
            WebhookAction::Unregister { id } => {
                print_json(&client.documents().unregister_webhook(&id).await?)?;
            }
        },
        Commands::Metrics { watch } => {
            if !watch {
                print_json(&client.dashboard().metrics().await?)?;
                return Ok(());
            }
            let dashboard = client.dashboard();
            let task = PollTask::start(
                move || {
                    let dashboard = dashboard.clone();
                    async move { dashboard.metrics().await }
                },
                PollOptions::new(client.config().polling.metrics_interval()).resource("metrics"),
            );
            let mut rx = task.subscribe();
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        match (&snapshot.latest_value, &snapshot.latest_error) {
                            (_, Some(e)) if !snapshot.is_fetching => eprintln!("metrics unavailable: {e}"),
                            (Some(m), None) if !snapshot.is_fetching => print_json(m)?,
                            _ => {}
                        }
                    }
                    _ = shutdown.wait() => break,
                }
            }
            task.stop();
        }
        Commands::Breaker { action } => match action {
            BreakerAction::Status => {
                let snapshot = client.dashboard().breaker_status().await?;
                println!(
                    "{} failure rate {:.1}% (threshold {}%{})",
                    snapshot.state,
                    snapshot.failure_rate() * 100.0,
                    snapshot.failure_threshold,
                    if snapshot.over_threshold() { ", exceeded" } else { "" }
                );
                print_json(&snapshot)?;
            }
            BreakerAction::Reset => {
                let ack = client.dashboard().reset_breaker().await?;
                println!("{}", ack.message.as_deref().unwrap_or("Reset requested"));
            }
            BreakerAction::Watch => {
                let monitor = client.breaker_monitor();
                let mut rx = monitor.subscribe();
                loop {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let snapshot = rx.borrow_and_update().clone();
                            if snapshot.is_fetching {
                                continue;
                            }
                            match (snapshot.latest_value, snapshot.latest_error) {
                                (_, Some(e)) => eprintln!("breaker status unavailable: {e}"),
                                (Some(b), None) => println!(
                                    "{} failure rate {:.1}% ({} ok / {} failed)",
                                    b.state,
                                    b.failure_rate() * 100.0,
                                    b.success_count,
                                    b.failure_count
                                ),
                                (None, None) => {}
                            }
                        }
                        _ = shutdown.wait() => break,
                    }
                }
                monitor.stop();
            }
        },
        Commands::Health => print_json(&client.dashboard().health().await?)?,
        Commands::Queue => print_json(&client.dashboard().queue().await?)?,
    }
    Ok(())
}

async fn watch_job(client: &ApiClient, view: DocumentView, shutdown: &Shutdown) -> ApiResult<()> {
    println!("{} {}", view.id, view.status);
    let tracker = client.track_job(view);
    let Some(mut rx) = tracker.subscribe() else {
        return Ok(());
    };

    let mut last = None::<JobStatus>;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if let Some(e) = &snapshot.latest_error {
                    if e.is_auth() {
                        return Err(e.clone());
                    }
                    tracing::warn!(error = %e, "Status probe failed, retrying");
                }
                if let Some(current) = &snapshot.latest_value {
                    if last != Some(current.status) {
                        last = Some(current.status);
                        println!("{} {}", current.id, current.status);
                    }
                    if current.status.is_terminal() {
                        print_json(current)?;
                        break;
                    }
                }
            }
            _ = shutdown.wait() => break,
        }
    }
    tracker.stop();
    Ok(())
}

fn join_roles(roles: &std::collections::BTreeSet<String>) -> String {
    roles.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn print_json<T: Serialize>(value: &T) -> ApiResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}
