// src/sandbox/runner.rs

//! Child-process runner for compiled documents.

use std::future::{pending, Future};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::compile::{parse_step_marker, Document, PLOTS_DIR};
use crate::config::SandboxSection;

use super::backend::{RunHooks, SandboxBackend};
use super::result::ExecutionResult;
use super::PROGRAM_FILE;

/// How long to wait for the output pipes to drain after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs `analysis.py` for one document in one workspace.
///
/// Holds only immutable settings, so a single runner can serve any number
/// of concurrent executions.
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    interpreter: String,
    interpreter_args: Vec<String>,
    timeout: Duration,
}

enum Termination {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

impl SandboxRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(cfg: &SandboxSection) -> Self {
        Self {
            interpreter: cfg.interpreter.clone(),
            interpreter_args: cfg.interpreter_args.clone(),
            timeout: cfg.timeout(),
        }
    }

    /// Run without progress reporting or cancellation.
    pub async fn run(&self, document: &Document, work_dir: &Path) -> ExecutionResult {
        self.run_with(document, work_dir, RunHooks::default()).await
    }

    /// Run the document. Never fails: launch and IO errors end up in
    /// `stderr` with `succeeded = false`.
    pub async fn run_with(
        &self,
        document: &Document,
        work_dir: &Path,
        hooks: RunHooks,
    ) -> ExecutionResult {
        let started = Instant::now();
        match self.run_inner(document, work_dir, hooks, started).await {
            Ok(result) => result,
            Err(err) => {
                let message = format!("{err:#}");
                error!(
                    work_dir = %work_dir.display(),
                    interpreter = %self.interpreter,
                    error = %message,
                    "sandbox launch failed"
                );
                ExecutionResult::launch_failed(message, started.elapsed())
            }
        }
    }

    async fn run_inner(
        &self,
        document: &Document,
        work_dir: &Path,
        hooks: RunHooks,
        started: Instant,
    ) -> Result<ExecutionResult> {
        let program_path = write_program(document, work_dir).await?;

        info!(
            program = %program_path.display(),
            interpreter = %self.interpreter,
            timeout_secs = self.timeout.as_secs(),
            "starting sandboxed program"
        );

        let mut std_cmd = std::process::Command::new(&self.interpreter);
        std_cmd
            .args(&self.interpreter_args)
            .arg(PROGRAM_FILE)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Lead a fresh group so a kill reaches everything it spawns.
            std_cmd.process_group(0);
        }
        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning interpreter '{}'", self.interpreter))?;
        let mut group = ProcessGroup::new(child.id());

        let stdout = child
            .stdout
            .take()
            .map(|stdout| Capture::lines(stdout, hooks.progress));
        let stderr = child.stderr.take().map(Capture::bytes);

        let cancelled = cancel_signal(hooks.cancel);

        let termination = tokio::select! {
            status = child.wait() => {
                Termination::Exited(status.context("waiting for sandboxed program")?)
            }
            _ = tokio::time::sleep(self.timeout) => Termination::TimedOut,
            _ = cancelled => Termination::Cancelled,
        };

        if matches!(termination, Termination::Exited(_)) {
            group.disarm();
        } else {
            group.kill();
            // Reap the leader; the group kill has usually done the work.
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill sandboxed program");
            }
        }

        let (stdout, stderr) = tokio::join!(drain(stdout, "stdout"), drain(stderr, "stderr"));
        let elapsed = started.elapsed();

        let result = match termination {
            Termination::Exited(status) => {
                ExecutionResult::exited(stdout, stderr, status.code(), elapsed)
            }
            Termination::TimedOut => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "sandboxed program exceeded its time limit; killed"
                );
                ExecutionResult::timed_out(stdout, self.timeout, elapsed)
            }
            Termination::Cancelled => {
                info!("sandboxed program cancelled; killed");
                ExecutionResult::cancelled(stdout, elapsed)
            }
        };

        info!(
            exit_code = result.exit_status,
            success = result.succeeded,
            seconds = result.wall_clock_seconds,
            "sandboxed program finished"
        );

        Ok(result)
    }
}

impl SandboxBackend for SandboxRunner {
    fn execute<'a>(
        &'a self,
        document: &'a Document,
        work_dir: &'a Path,
        hooks: RunHooks,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
        Box::pin(self.run_with(document, work_dir, hooks))
    }
}

/// Write `analysis.py` and make sure `plots/` exists.
async fn write_program(document: &Document, work_dir: &Path) -> Result<PathBuf> {
    let plots = work_dir.join(PLOTS_DIR);
    tokio::fs::create_dir_all(&plots)
        .await
        .with_context(|| format!("creating {}", plots.display()))?;

    let program_path = work_dir.join(PROGRAM_FILE);
    tokio::fs::write(&program_path, document.to_program())
        .await
        .with_context(|| format!("writing {}", program_path.display()))?;

    Ok(program_path)
}

fn cancel_signal(cancel: Option<oneshot::Receiver<()>>) -> impl Future<Output = ()> {
    async move {
        match cancel {
            Some(rx) => {
                if rx.await.is_err() {
                    // Sender dropped without cancelling.
                    pending::<()>().await;
                }
            }
            None => pending::<()>().await,
        }
    }
}

/// Kills the child's whole process group unless disarmed, including when
/// the run future is dropped mid-flight.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    /// The leader exited on its own; leave its group alone.
    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "process group killed"),
        Err(e) => debug!(pgid, error = %e, "process group already gone"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Bytes read from one pipe so far. Shared with the reader task so an
/// abandoned capture still yields everything read before the cut-off.
#[derive(Clone, Default)]
struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    fn extend(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    fn text(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

struct Capture {
    buffer: CaptureBuffer,
    task: JoinHandle<()>,
}

impl Capture {
    /// Line-oriented capture that forwards step markers as progress.
    fn lines<R>(stream: R, progress: Option<mpsc::Sender<u32>>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = CaptureBuffer::default();
        let task = tokio::spawn(read_lines(stream, buffer.clone(), progress));
        Self { buffer, task }
    }

    fn bytes<R>(stream: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = CaptureBuffer::default();
        let task = tokio::spawn(read_chunks(stream, buffer.clone()));
        Self { buffer, task }
    }
}

/// Capture stdout byte for byte. Lines that are not UTF-8 are kept and
/// still checked for markers after lossy decoding.
async fn read_lines<R>(stream: R, buffer: CaptureBuffer, progress: Option<mpsc::Sender<u32>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                buffer.extend(&line);
                if let Some(step) = parse_step_marker(&String::from_utf8_lossy(&line)) {
                    debug!(step, "step completion marker seen");
                    if let Some(tx) = &progress {
                        // Receiver gone means nobody is tracking; keep capturing.
                        let _ = tx.send(step).await;
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "error while reading stdout");
                break;
            }
        }
    }
}

async fn read_chunks<R>(mut stream: R, buffer: CaptureBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.extend(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "error while reading stream");
                break;
            }
        }
    }
}

/// Collect a capture, bounded so a pipe held open by a stray process cannot
/// stall the run. Whatever was read before the cut-off is returned.
async fn drain(capture: Option<Capture>, stream: &'static str) -> String {
    let Some(Capture { buffer, mut task }) = capture else {
        return String::new();
    };

    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(stream, error = %e, "capture task failed"),
        Err(_) => {
            warn!(stream, "output pipe still open after exit; keeping partial capture");
            task.abort();
        }
    }
    buffer.text()
}
