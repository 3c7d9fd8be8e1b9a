//! Child processes with a deadline, bounded capture, and whole-tree termination.
//!
//! Plan lines fork freely (`a && b`, pipelines, `npm start` launching node), so
//! every child leads a fresh process group and the whole group is killed when
//! the deadline passes. Grandchildren that escape the group, or that were
//! backgrounded on purpose, can keep an output pipe open indefinitely; once the
//! direct child is gone, capture waits at most [`PIPE_GRACE`] for the pipes to
//! close and then returns what it has.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long to keep draining pipes after the direct child has exited.
pub const PIPE_GRACE: Duration = Duration::from_millis(500);

/// Bytes kept from one output stream, and how many were dropped past the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Capture {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let keep = chunk.len().min(limit.saturating_sub(self.bytes.len()));
        self.bytes.extend_from_slice(&chunk[..keep]);
        self.dropped += chunk.len() - keep;
    }

    /// Lossy text, with a marker appended when bytes were dropped.
    pub fn text(&self, label: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[{label} truncated {} bytes]\n", self.dropped));
        }
        text
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Capture,
    pub stderr: Capture,
    /// The deadline passed and the process group was killed.
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        self.stdout.text("stdout")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.text("stderr")
    }
}

/// Run `cmd` until it exits or `timeout` passes, keeping at most `output_limit_bytes` per
/// stream. Stdin is closed.
///
/// Returns within roughly `timeout + PIPE_GRACE` no matter what the child forks.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut cmd);

    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn command");
        anyhow!(err).context("spawn command")
    })?;
    debug!(pid = child.id(), "child spawned");

    let stdout = StreamReader::start(
        child.stdout.take().ok_or_else(|| anyhow!("stdout was not piped"))?,
        output_limit_bytes,
    );
    let stderr = StreamReader::start(
        child.stderr.take().ok_or_else(|| anyhow!("stderr was not piped"))?,
        output_limit_bytes,
    );

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_ms = timeout.as_millis() as u64, "deadline passed, killing process group");
            kill_tree(&mut child)?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let drain_until = Instant::now() + PIPE_GRACE;
    let stdout = stdout.finish(drain_until, "stdout")?;
    let stderr = stderr.finish(drain_until, "stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// SIGKILL the child's whole process group; falls back to the child alone.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => {
            warn!(err = %err, "killpg failed, killing direct child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

/// Background drain of one pipe into a shared, bounded [`Capture`].
struct StreamReader {
    capture: Arc<Mutex<Capture>>,
    done: Receiver<std::io::Result<()>>,
}

impl StreamReader {
    fn start<R: Read + Send + 'static>(pipe: R, limit: usize) -> Self {
        let capture = Arc::new(Mutex::new(Capture::default()));
        let sink = Arc::clone(&capture);
        let (tx, done) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone once the grace period lapsed; nothing to report to.
            let _ = tx.send(pump(pipe, &sink, limit));
        });
        Self { capture, done }
    }

    /// Wait until the pipe closes or `deadline` passes, then snapshot what was captured.
    fn finish(self, deadline: Instant, label: &str) -> Result<Capture> {
        match self
            .done
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            Ok(result) => result.with_context(|| format!("read {label}"))?,
            Err(RecvTimeoutError::Timeout) => {
                warn!(stream = label, "pipe held open by a detached process, not waiting");
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("{label} reader stopped unexpectedly"));
            }
        }
        let capture = self
            .capture
            .lock()
            .map_err(|_| anyhow!("{label} capture lock poisoned"))?;
        Ok(capture.clone())
    }
}

fn pump<R: Read>(mut pipe: R, sink: &Mutex<Capture>, limit: usize) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = match pipe.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        sink.lock()
            .map_err(|_| std::io::Error::other("capture lock poisoned"))?
            .push(&chunk[..n], limit);
    }
}
