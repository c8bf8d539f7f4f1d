use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::fmt::MakeWriter;

use notebridge_core::{config, SyncConfig};
use notebridge_sync::{pipeline, SyncError, SyncResult, SyncSummary, TracingSink};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::rotate_log;
use crate::paths::{log_path, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse, CMD_STATUS, CMD_STOP, CMD_SYNC};

const ROTATION_CHECK: Duration = Duration::from_secs(30);

/// One blocking sync pass. The daemon wires this to [`pipeline::run`].
pub type PassRunner = Arc<dyn Fn() -> Result<SyncResult, SyncError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Timer,
    Socket,
}

/// What a socket `sync` request gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub trigger: Trigger,
    #[serde(flatten)]
    pub summary: SyncSummary,
}

/// Live counters served by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub started_at: DateTime<Utc>,
    pub interval_secs: u64,
    pub passes: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_summary: Option<SyncSummary>,
    pub last_error: Option<String>,
}

impl RuntimeStatus {
    fn new(interval: Duration) -> Self {
        Self {
            started_at: Utc::now(),
            interval_secs: interval.as_secs(),
            passes: 0,
            last_pass_at: None,
            last_summary: None,
            last_error: None,
        }
    }
}

type SharedStatus = Arc<RwLock<RuntimeStatus>>;

struct SyncJob {
    trigger: Trigger,
    respond_to: oneshot::Sender<Result<PassReport, String>>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load the config, send tracing output to the daemon log and run until
/// stopped. Blocks the calling thread.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    let config = config::load_at(home)?;
    let log = log_path(home, Some(&config));
    if let Some(dir) = log.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    init_tracing(&log);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the daemon: an immediate pass, then one every `interval_secs`, plus
/// the control socket and log rotation. Returns after `stop` or ctrl-c.
pub async fn run(home: PathBuf, config: SyncConfig) -> Result<(), DaemonError> {
    let interval = config.interval();
    let log = log_path(&home, Some(&config));
    let status: SharedStatus = Arc::new(RwLock::new(RuntimeStatus::new(interval)));
    let runner: PassRunner = {
        let home = home.clone();
        Arc::new(move || pipeline::run(&home, false, &TracingSink))
    };
    tracing::info!(
        org_dir = %config.org_dir.display(),
        markdown_dir = %config.markdown_dir.display(),
        interval_secs = interval.as_secs(),
        "daemon starting",
    );

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = ticker_task(interval, sync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let status = status.clone();
        tokio::spawn(async move {
            let result = processor_task(runner, status, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let status = status.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                status,
                sync_tx,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(log, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, shutting down daemon");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                },
            }
        })
    };

    let (ticker, processor, socket, rotation, signal) = tokio::join!(
        ticker_handle,
        processor_handle,
        socket_handle,
        rotation_handle,
        signal_handle
    );
    handle_join("ticker", ticker)?;
    handle_join("sync_processor", processor)?;
    handle_join("socket_server", socket)?;
    handle_join("log_rotation", rotation)?;
    handle_join("signal_handler", signal)?;
    tracing::info!("daemon stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Queue a pass on every tick. The first tick fires immediately; ticks missed
/// while a long pass runs are dropped rather than replayed.
async fn ticker_task(
    period: Duration,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticks.tick() => match enqueue_sync(&sync_tx, Trigger::Timer).await {
                Ok(report) => tracing::info!(
                    files_synced = report.summary.files_synced,
                    conflicts = report.summary.conflicts,
                    errors = report.summary.errors,
                    duration_ms = report.summary.duration_ms,
                    "scheduled pass completed",
                ),
                Err(DaemonError::ChannelClosed(_)) => break,
                Err(err) => tracing::error!(error = %err, "scheduled pass failed"),
            },
        }
    }
    Ok(())
}

/// The only place passes run, so timer and socket requests never overlap.
async fn processor_task(
    runner: PassRunner,
    status: SharedStatus,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let runner = runner.clone();
                let outcome = tokio::task::spawn_blocking(move || runner())
                    .await
                    .map_err(|err| DaemonError::Protocol(format!("sync task join error: {err}")))?;
                let reply = record_pass(&status, job.trigger, outcome).await;
                let _ = job.respond_to.send(reply);
            }
        }
    }
    Ok(())
}

async fn record_pass(
    status: &SharedStatus,
    trigger: Trigger,
    outcome: Result<SyncResult, SyncError>,
) -> Result<PassReport, String> {
    let mut status = status.write().await;
    status.passes += 1;
    status.last_pass_at = Some(Utc::now());
    match outcome {
        Ok(result) => {
            let summary = result.summary();
            status.last_summary = Some(summary.clone());
            status.last_error = None;
            Ok(PassReport { trigger, summary })
        }
        Err(err) => {
            let message = err.to_string();
            status.last_error = Some(message.clone());
            Err(message)
        }
    }
}

async fn socket_server_task(
    home: PathBuf,
    status: SharedStatus,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;
    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let socket = socket.clone();
                let status = status.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, socket, status, sync_tx, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if let Err(err) = fs::remove_file(&socket) {
        if err.kind() != ErrorKind::NotFound {
            tracing::warn!(socket = %socket.display(), error = %err, "could not remove daemon socket");
        }
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    socket: PathBuf,
    status: SharedStatus,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.map_err(|e| io_err(&socket, e))? {
        if line.trim().is_empty() {
            continue;
        }
        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let response = DaemonResponse::error(format!("invalid request JSON: {err}"));
                write_response(&mut writer, &socket, &response).await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            CMD_STATUS => DaemonResponse::ok(status_payload(&socket, &status).await),
            CMD_SYNC => match enqueue_sync(&sync_tx, Trigger::Socket).await {
                Ok(report) => DaemonResponse::ok(serde_json::to_value(report)?),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            CMD_STOP => {
                tracing::info!("stop requested over socket");
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &socket, &response).await?;
        if request.cmd == CMD_STOP {
            break;
        }
    }
    Ok(())
}

async fn status_payload(socket: &Path, status: &SharedStatus) -> Value {
    let status = status.read().await.clone();
    json!({
        "running": true,
        "pid": std::process::id(),
        "socket": socket.display().to_string(),
        "started_at": status.started_at,
        "interval_secs": status.interval_secs,
        "passes": status.passes,
        "last_pass_at": status.last_pass_at,
        "last_summary": status.last_summary,
        "last_error": status.last_error,
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    trigger: Trigger,
) -> Result<PassReport, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            trigger,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;
    rx.await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?
        .map_err(DaemonError::Protocol)
}

async fn log_rotation_task(
    log: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut checks = tokio::time::interval(ROTATION_CHECK);
    checks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    checks.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = checks.tick() => {
                let log = log.clone();
                // Failures are logged inside rotate_log.
                let _ = tokio::task::spawn_blocking(move || rotate_log(&log)).await;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

/// Remove a socket left by a crashed daemon. A socket that still accepts
/// connections belongs to a live daemon.
fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if let Some(dir) = socket.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    if !socket.exists() {
        return Ok(());
    }
    if StdUnixStream::connect(socket).is_ok() {
        return Err(DaemonError::AlreadyRunning {
            socket: socket.to_path_buf(),
        });
    }
    tracing::warn!(socket = %socket.display(), "removing stale daemon socket before bind");
    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    socket: &Path,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_string(response)?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err(socket, e))?;
    writer.flush().await.map_err(|e| io_err(socket, e))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    result.map_err(|err| DaemonError::Protocol(format!("{task} task join failure: {err}")))?
}

/// Opens the log by path for every event so rotation never leaves the
/// daemon writing into a renamed file.
struct AppendLog {
    path: PathBuf,
}

impl<'a> MakeWriter<'a> for AppendLog {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::stderr()),
        }
    }
}

fn init_tracing(log: &Path) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(AppendLog {
            path: log.to_path_buf(),
        })
        .try_init();
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;
    use tokio::time::Instant;

    fn empty_result() -> SyncResult {
        let now = Utc::now();
        SyncResult {
            files_processed: 2,
            conflicts: Vec::new(),
            errors: Vec::new(),
            writes: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn answer(job: SyncJob) {
        let summary = empty_result().summary();
        let _ = job.respond_to.send(Ok(PassReport {
            trigger: job.trigger,
            summary,
        }));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn ticker_fires_immediately_then_every_interval() {
        let (sync_tx, mut sync_rx) = mpsc::channel::<SyncJob>(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let ticker = tokio::spawn(ticker_task(
            Duration::from_secs(30),
            sync_tx,
            shutdown_tx.subscribe(),
        ));

        let origin = Instant::now();
        let mut offsets = Vec::new();
        for _ in 0..3 {
            let job = sync_rx.recv().await.expect("tick");
            assert_eq!(job.trigger, Trigger::Timer);
            offsets.push(origin.elapsed().as_secs());
            answer(job);
        }
        assert_eq!(offsets, vec![0, 30, 60]);

        shutdown_tx.send(()).expect("shutdown");
        ticker.await.expect("join").expect("ticker");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn slow_pass_skips_missed_ticks() {
        let (sync_tx, mut sync_rx) = mpsc::channel::<SyncJob>(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let _ticker = tokio::spawn(ticker_task(
            Duration::from_secs(10),
            sync_tx,
            shutdown_tx.subscribe(),
        ));

        let origin = Instant::now();
        let first = sync_rx.recv().await.expect("first tick");
        // The pass outlives three intervals.
        tokio::time::sleep(Duration::from_secs(35)).await;
        answer(first);

        let second = sync_rx.recv().await.expect("second tick");
        assert_eq!(origin.elapsed().as_secs(), 35, "one catch-up tick, not three");
        answer(second);

        let third = sync_rx.recv().await.expect("third tick");
        assert_eq!(origin.elapsed().as_secs(), 40);
        answer(third);
    }

    #[tokio::test]
    async fn processor_serialises_passes_and_records_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner: PassRunner = {
            let calls = calls.clone();
            Arc::new(move || {
                if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err(SyncError::StateLocked {
                        path: PathBuf::from("/tmp/state.lock"),
                        pid: Some(7),
                    });
                }
                Ok(empty_result())
            })
        };
        let status: SharedStatus = Arc::new(RwLock::new(RuntimeStatus::new(Duration::from_secs(30))));
        let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let processor = tokio::spawn(processor_task(
            runner,
            status.clone(),
            sync_rx,
            shutdown_tx.subscribe(),
        ));

        let report = enqueue_sync(&sync_tx, Trigger::Socket).await.expect("first pass");
        assert_eq!(report.trigger, Trigger::Socket);
        assert_eq!(report.summary.files_synced, 2);

        let err = enqueue_sync(&sync_tx, Trigger::Timer).await.unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg.contains("another sync is running")));
        {
            let status = status.read().await;
            assert_eq!(status.passes, 2);
            assert!(status.last_error.is_some());
            assert_eq!(status.last_summary.as_ref().map(|s| s.files_synced), Some(2));
        }

        enqueue_sync(&sync_tx, Trigger::Timer).await.expect("recovered");
        assert!(status.read().await.last_error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        shutdown_tx.send(()).expect("shutdown");
        processor.await.expect("join").expect("processor");
    }

    #[test]
    fn live_socket_is_not_replaced() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).expect("bind");

        let err = prepare_socket_for_bind(&socket).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { .. }));
        assert!(socket.exists());
    }

    #[test]
    fn stale_socket_is_removed() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        drop(std::os::unix::net::UnixListener::bind(&socket).expect("bind"));
        assert!(socket.exists(), "closed listener leaves its socket file behind");

        prepare_socket_for_bind(&socket).expect("prepare");
        assert!(!socket.exists());
    }

    #[test]
    fn pass_report_flattens_summary() {
        let report = PassReport {
            trigger: Trigger::Socket,
            summary: empty_result().summary(),
        };
        let value = serde_json::to_value(&report).expect("encode");
        assert_eq!(value["trigger"], json!("socket"));
        assert_eq!(value["files_synced"], json!(2));
        let back: PassReport = serde_json::from_value(value).expect("decode");
        assert_eq!(back, report);
    }
}
