use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use prwatch_core::store::{load_settings_at, prwatch_root, FileStore};
use prwatch_core::types::Token;
use prwatch_github::GitHubClient;
use prwatch_sync::{CycleState, FileSurface, Orchestrator};

use crate::error::{io_err, DaemonError};
use crate::lock::run_locked_cycle;
use crate::paths::{cycle_period, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Shared by every socket client and the timer.
struct DaemonContext {
    home: PathBuf,
    orchestrator: Arc<Orchestrator>,
    started_at: DateTime<Utc>,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Wire the GitHub client, the settings/state store and the file-backed
/// browser surface under `home`.
pub fn build_orchestrator(home: &Path) -> Result<Orchestrator, DaemonError> {
    let settings = load_settings_at(home)?;
    let surface = Arc::new(FileSurface::at_home(home));
    Ok(Orchestrator::new(
        Arc::new(GitHubClient::new(settings.api_base)),
        Arc::new(FileStore::new(home)),
        surface.clone(),
        surface,
    ))
}

/// Run the daemon runtime against the files under `home`.
///
/// The timer period and API base are read once at startup.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let settings = load_settings_at(&home)?;
    let orchestrator = Arc::new(build_orchestrator(&home)?);
    run_with(home, orchestrator, cycle_period(settings.interval_minutes)).await
}

/// Run the timer, socket server and signal handler until one of them stops.
pub async fn run_with(
    home: PathBuf,
    orchestrator: Arc<Orchestrator>,
    period: Duration,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let ctx = Arc::new(DaemonContext {
        home,
        orchestrator,
        started_at: Utc::now(),
    });
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let timer_handle = {
        let shutdown = shutdown_tx.clone();
        let home = ctx.home.clone();
        let orchestrator = ctx.orchestrator.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = timer_task(home, orchestrator, period, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(ctx, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!(
                            "ctrl-c handler failed: {err}"
                        ))),
                    }
                }
            }
        })
    };

    let (timer_result, socket_result, signal_result) =
        tokio::join!(timer_handle, socket_handle, signal_handle);

    handle_join("timer", timer_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Run a cycle on every tick, starting immediately. Cycle errors are logged
/// and go no further.
async fn timer_task(
    home: PathBuf,
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(period_secs = period.as_secs(), "update timer started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match run_locked_cycle(&home, &orchestrator).await {
                    Ok(outcome) => {
                        tracing::debug!(outcome = ?outcome, "timer-triggered cycle finished");
                    }
                    Err(DaemonError::Sync(_)) => {}
                    Err(err) => tracing::error!(error = %err, "timer-triggered cycle failed"),
                }
            }
        }
    }
    Ok(())
}

async fn socket_server_task(
    ctx: Arc<DaemonContext>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&ctx.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for requests");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let ctx = ctx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, ctx, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    ctx: Arc<DaemonContext>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = dispatch(&ctx, &request, &shutdown_tx).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    ctx: &DaemonContext,
    request: &DaemonRequest,
    shutdown_tx: &broadcast::Sender<()>,
) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => match build_status_payload(ctx) {
            Ok(payload) => DaemonResponse::ok(payload),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "update" => match run_locked_cycle(&ctx.home, &ctx.orchestrator).await {
            Ok(outcome) => DaemonResponse::ok(json!(outcome)),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "test-connection" => match test_connection(ctx, request.token.as_deref()).await {
            Ok(login) => DaemonResponse::ok(json!({ "login": login })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "stop" => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

async fn test_connection(ctx: &DaemonContext, token: Option<&str>) -> Result<String, DaemonError> {
    let token = match token {
        Some(raw) => Token::new(raw),
        None => ctx
            .orchestrator
            .store()
            .settings()?
            .token
            .ok_or(DaemonError::NoCredential)?,
    };
    let user = ctx.orchestrator.test_connection(&token).await?;
    tracing::info!(login = %user, "connection test succeeded");
    Ok(user.0)
}

fn build_status_payload(ctx: &DaemonContext) -> Result<Value, DaemonError> {
    let store = ctx.orchestrator.store();
    let settings = store.settings()?;
    let state = store.state()?;

    Ok(json!({
        "running": true,
        "started_at": ctx.started_at,
        "in_progress": ctx.orchestrator.state() == CycleState::Running,
        "last_update": state.last_update,
        "group_id": state.group_id,
        "repositories": settings.repositories.len(),
        "socket": socket_path(&ctx.home).display().to_string(),
    }))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = prwatch_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the `fmt` subscriber with an `info` default, `RUST_LOG` overrides.
///
/// Also bridges `log` records from the sync crate.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
