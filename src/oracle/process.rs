// Child processes with a hard wall-clock limit
//
// Each child runs in its own process group. On timeout the whole group gets
// SIGKILL, and so does anything left in the group after the leader exits,
// so a compiler's sub-processes or a program's children cannot keep the
// worker blocked.

use crate::error::{SflError, SflResult};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a child process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited on its own; streams are lossily decoded and trimmed
    Finished {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// Killed after exceeding the limit
    TimedOut,
}

/// Run `command` to completion or until `timeout` elapses
///
/// stdin is closed; stdout and stderr are captured.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> SflResult<ProcessOutcome> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .map_err(|source| SflError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            // Background helpers may still hold the pipes open
            kill_stragglers(&child);
            break Some(status);
        }
        if started.elapsed() >= timeout {
            kill_group(&mut child);
            child.wait()?;
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = collect(stdout);
    let stderr = collect(stderr);

    match status {
        Some(status) => Ok(ProcessOutcome::Finished {
            exit_code: exit_code(status),
            stdout,
            stderr,
        }),
        None => {
            tracing::debug!(program = %program, ?timeout, "process killed after timeout");
            Ok(ProcessOutcome::TimedOut)
        }
    }
}

fn kill_group(child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        tracing::warn!("killpg({}) failed: {}, killing leader only", pgid, e);
        let _ = child.kill();
    }
}

/// SIGKILL whatever is left of the group once its leader has exited
fn kill_stragglers(child: &Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => tracing::debug!("killed leftover processes in group {}", pgid),
        Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!("killpg({}) failed: {}", pgid, e),
    }
}

/// Exit code with signals reported as negative numbers
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| status.signal().map_or(-1, |sig| -sig))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).trim().to_string()
}
