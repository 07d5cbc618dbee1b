#![forbid(unsafe_code)]

//! `task-relay`: command-line client for the remote task service.
//!
//! Launches analysis tasks, streams their progress to the terminal, and
//! keeps a session so interactive tasks can be chained onto the last
//! successful analysis.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use task_relay::display::TaskView;
use task_relay::models::task::{FormPayload, TaskId};
use task_relay::orchestrator::session::{TaskRun, TaskSession};
use task_relay::{AppError, ClientConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "task-relay", about = "Remote task launcher and watcher", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Task service root URL; overrides the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Launch one task and follow it until it finishes.
    Run {
        /// Form field as `key=value`; repeat for more fields.
        #[arg(short = 'f', long = "field", required = true)]
        fields: Vec<String>,

        /// Launch as a plain independent task that is never recorded as a
        /// dependency, whatever its type.
        #[arg(long)]
        no_chain: bool,
    },

    /// Interactive session reading commands from stdin.
    ///
    /// Commands: `start key=value ...`, `exec key=value ...`,
    /// `submit key=value ...`, `status`, `cancel`, `quit`.
    Shell,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = load_config(args.config.as_ref(), args.base_url)?;
    info!(base_url = %config.base_url, "configuration loaded");

    let session = Arc::new(TaskSession::from_config(&config)?);
    let ct = CancellationToken::new();
    let render_handle = tokio::spawn(render_view(session.subscribe(), ct.clone()));

    let outcome = match args.command {
        Command::Run { fields, no_chain } => run_once(&session, &fields, no_chain).await,
        Command::Shell => run_shell(&session).await,
    };

    ct.cancel();
    let _ = render_handle.await;
    outcome
}

fn load_config(path: Option<&PathBuf>, base_url: Option<String>) -> Result<ClientConfig> {
    let mut config = match (path, base_url.as_deref()) {
        (Some(path), _) => ClientConfig::load_from_path(path)?,
        (None, Some(url)) => ClientConfig::with_base_url(url)?,
        (None, None) => {
            return Err(AppError::Config(
                "either --config or --base-url is required".into(),
            ))
        }
    };
    config.apply_env_overrides()?;
    if let Some(url) = base_url {
        config.set_base_url(url)?;
    }
    Ok(config)
}

/// Launch a single task and wait for it, stopping early on ctrl-c.
async fn run_once(session: &TaskSession, fields: &[String], no_chain: bool) -> Result<()> {
    let payload = FormPayload::from_pairs(fields)?;
    let launched = if no_chain {
        session.launch_independent(payload, false).await
    } else {
        session.submit(payload).await
    };
    let task = launched.inspect_err(|err| {
        if err.is_user_facing() {
            eprintln!("{err}");
        }
    })?;
    let task_id = task.task_id().clone();

    let status = tokio::select! {
        status = wait_and_report(task) => status?,
        () = shutdown_signal() => {
            info!(%task_id, "interrupted, cancelling poller");
            session.cancel_active().await;
            return Err(AppError::Cancelled(format!("task {task_id} interrupted")));
        }
    };

    if status.succeeded() {
        Ok(())
    } else {
        Err(AppError::Server(format!(
            "task {task_id} finished without success"
        )))
    }
}

async fn run_shell(session: &Arc<TaskSession>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = shutdown_signal() => {
                session.cancel_active().await;
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            continue;
        };
        let rest: Vec<&str> = words.collect();

        let launched = match verb {
            "start" => match FormPayload::from_pairs(&rest) {
                Ok(payload) => session.launch_independent(payload, true).await,
                Err(err) => Err(err),
            },
            "exec" => match FormPayload::from_pairs(&rest) {
                Ok(payload) => session.launch_dependent(payload).await,
                Err(err) => Err(err),
            },
            "submit" => match FormPayload::from_pairs(&rest) {
                Ok(payload) => session.submit(payload).await,
                Err(err) => Err(err),
            },
            "status" => {
                print_status(session);
                continue;
            }
            "cancel" => {
                if !session.cancel_active().await {
                    eprintln!("no task is being polled");
                }
                continue;
            }
            "quit" | "exit" => {
                session.cancel_active().await;
                return Ok(());
            }
            other => {
                eprintln!("unknown command {other:?}");
                continue;
            }
        };

        match launched {
            Ok(task) => {
                tokio::spawn(async move {
                    let _ = wait_and_report(task).await;
                });
            }
            Err(err) if err.is_user_facing() => eprintln!("{err}"),
            Err(err) => error!(%err, "launch failed"),
        }
    }
}

async fn wait_and_report(task: TaskRun) -> Result<task_relay::models::status::TaskStatus> {
    let task_id = task.task_id().clone();
    match task.wait().await {
        Ok(status) => {
            info!(%task_id, success = ?status.success, "task done");
            Ok(status)
        }
        Err(err) => {
            warn!(%task_id, %err, "task did not complete");
            Err(err)
        }
    }
}

fn print_status(session: &TaskSession) {
    let view = session.view();
    let dependency = session
        .last_dependency()
        .map_or_else(|| "-".to_owned(), |id| id.to_string());
    println!(
        "running={} dependency={} task={} polls={} flash={:?}",
        session.is_running(),
        dependency,
        view.task_id.as_ref().map_or("-", TaskId::as_str),
        view.polls,
        view.flash,
    );
}

/// Print newly added log lines and changed flash notices as they arrive.
async fn render_view(mut rx: watch::Receiver<TaskView>, ct: CancellationToken) {
    let mut current: Option<TaskId> = None;
    let mut seen = 0usize;
    let mut last_flash = String::new();

    loop {
        tokio::select! {
            () = ct.cancelled() => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        let view = rx.borrow_and_update().clone();
        if view.task_id != current {
            current.clone_from(&view.task_id);
            seen = 0;
            last_flash.clear();
        }

        for line in view.new_lines_since(seen) {
            println!("{line}");
        }
        seen = view.line_count;

        if !view.flash.is_empty() && view.flash != last_flash {
            eprintln!(">> {}", view.flash);
            last_flash.clone_from(&view.flash);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
