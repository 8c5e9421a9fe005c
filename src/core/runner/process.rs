//! Spawning, draining and reaping one child process.
//!
//! stdout and stderr are drained by one thread each while the calling
//! thread waits on the child, so a chatty child never stalls on a full pipe.
//! Children run in their own process group; on timeout the whole group is
//! killed so grandchildren do not outlive the invocation.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::sink::{self, OutputSinks, SharedSink};
use super::{CommandInvocation, CommandSpec};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long reader threads may keep draining after the child itself is gone.
///
/// Bounds the wait when a detached grandchild still holds the write end.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

/// How a child ended.
#[derive(Debug, Clone, Copy)]
pub struct ExitReport {
    pub status: ExitStatus,
    pub timed_out: bool,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        if self.timed_out {
            None
        } else {
            self.status.code()
        }
    }
}

/// Run `invocation` to completion, forwarding output to `sinks`.
///
/// With `use_tty` the child writes both streams into a pseudo-terminal whose
/// output goes to the stdout sink. If no pty can be allocated the pipe path
/// is used instead.
pub fn execute(
    invocation: &CommandInvocation,
    sinks: &OutputSinks,
    use_tty: bool,
) -> io::Result<ExitReport> {
    let command = build_command(invocation)?;

    #[cfg(unix)]
    {
        if use_tty {
            match super::pty::open() {
                Ok(pty) => return execute_in_pty(command, pty, invocation.timeout, sinks),
                Err(e) => crate::log_status!(
                    "runner",
                    "No pseudo-terminal available ({}), using pipes",
                    e
                ),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = use_tty;

    execute_piped(command, invocation.timeout, sinks)
}

fn build_command(invocation: &CommandInvocation) -> io::Result<Command> {
    let mut command = match &invocation.command {
        CommandSpec::Args(args) => {
            let (program, rest) = args.split_first().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "empty argument list")
            })?;
            let mut command = Command::new(program);
            command.args(rest);
            command
        }
        CommandSpec::Shell(code) => shell_command(code),
    };

    command.current_dir(&invocation.working_dir);
    command.stdin(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    Ok(command)
}

#[cfg(not(windows))]
fn shell_command(code: &str) -> Command {
    let mut command = Command::new("sh");
    command.args(["-c", code]);
    command
}

#[cfg(windows)]
fn shell_command(code: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", code]);
    command
}

fn execute_piped(
    mut command: Command,
    timeout: Option<Duration>,
    sinks: &OutputSinks,
) -> io::Result<ExitReport> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn()?;

    let (done_tx, done_rx) = mpsc::channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward(stdout, sinks.stdout.clone(), done_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward(stderr, sinks.stderr.clone(), done_tx.clone()));
    }
    drop(done_tx);

    let report = wait_with_timeout(&mut child, timeout)?;
    join_readers(readers, done_rx);

    Ok(report)
}

#[cfg(unix)]
fn execute_in_pty(
    mut command: Command,
    pty: super::pty::Pty,
    timeout: Option<Duration>,
    sinks: &OutputSinks,
) -> io::Result<ExitReport> {
    let stderr_slave = pty.slave.try_clone()?;
    command
        .stdout(Stdio::from(pty.slave))
        .stderr(Stdio::from(stderr_slave));

    let mut child = command.spawn()?;
    // Closes our copies of the slave so the master reports EOF once the child exits.
    drop(command);

    let (done_tx, done_rx) = mpsc::channel();
    let readers = vec![forward(pty.master, sinks.stdout.clone(), done_tx)];

    let report = wait_with_timeout(&mut child, timeout)?;
    join_readers(readers, done_rx);

    Ok(report)
}

/// Copy everything from `source` into `sink` as it arrives.
///
/// Write failures do not stop the loop: the child must keep being drained
/// even when the operator's terminal has gone away.
fn forward<R>(mut source: R, sink: SharedSink, done: Sender<()>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let _ = sink::write_to(&sink, &buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // A pty master reports EIO once the last slave descriptor closes.
                Err(_) => break,
            }
        }
        let _ = done.send(());
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> io::Result<ExitReport> {
    // A deadline past what `Instant` can represent never arrives.
    let Some((limit, deadline)) =
        timeout.and_then(|limit| Some((limit, Instant::now().checked_add(limit)?)))
    else {
        let status = child.wait()?;
        return Ok(ExitReport {
            status,
            timed_out: false,
        });
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(ExitReport {
                status,
                timed_out: false,
            });
        }

        let now = Instant::now();
        if now >= deadline {
            crate::log_status!(
                "runner",
                "Process {} exceeded {:.1}s, killing its process group",
                child.id(),
                limit.as_secs_f64()
            );
            kill_group(child);
            let status = child.wait()?;
            return Ok(ExitReport {
                status,
                timed_out: true,
            });
        }

        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // The child leads its own group (process_group(0)), so its pid is the pgid.
    let rc = unsafe { libc::killpg(child.id() as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn join_readers(readers: Vec<JoinHandle<()>>, done: Receiver<()>) {
    let deadline = Instant::now() + DRAIN_GRACE;
    let mut finished = 0;

    while finished < readers.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(()) => finished += 1,
            Err(RecvTimeoutError::Timeout) => {
                crate::log_status!(
                    "runner",
                    "Output still open {:.1}s after exit, detaching reader",
                    DRAIN_GRACE.as_secs_f64()
                );
                return;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for reader in readers {
        let _ = reader.join();
    }
}
