//! golangci-lint execution
//!
//! [`ToolProcess`] owns the child: it is started with stdout/stderr
//! inherited from this process, then waited on while polling the
//! [`CancelToken`]. On cancellation the child gets SIGTERM, a grace period,
//! then SIGKILL.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::signal::CancelToken;

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Interval between exit/cancellation checks
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("cannot launch {}: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for {}: {source}", program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cancelled while {} was running", program.display())]
    Cancelled { program: PathBuf },
}

/// A running golangci-lint process
#[derive(Debug)]
pub struct ToolProcess {
    program: PathBuf,
    child: Child,
    grace: Duration,
}

impl ToolProcess {
    /// Start `program` with `args`, passing its output straight through
    pub fn start<I, S>(program: &Path, args: I) -> Result<Self, RunError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RunError::Launch {
                program: program.to_path_buf(),
                source,
            })?;

        debug!(program = %program.display(), pid = child.id(), "started golangci-lint");
        Ok(Self {
            program: program.to_path_buf(),
            child,
            grace: DEFAULT_TERMINATION_GRACE,
        })
    }

    /// Override the SIGTERM → SIGKILL grace period
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Wait for the child to exit, terminating it if `cancel` trips first.
    ///
    /// Returns the child's exit code verbatim, non-zero included.
    pub fn wait(mut self, cancel: &CancelToken) -> Result<i32, RunError> {
        loop {
            if cancel.is_cancelled() {
                self.terminate();
                return Err(RunError::Cancelled {
                    program: self.program,
                });
            }

            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(exit_code(status)),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    self.terminate();
                    return Err(RunError::Wait {
                        program: self.program,
                        source,
                    });
                }
            }
        }
    }

    /// Terminate the child gracefully then forcefully, and reap it.
    fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
                debug!(error = %e, "SIGTERM delivery failed");
            }

            let start = Instant::now();
            while start.elapsed() < self.grace {
                match self.child.try_wait() {
                    Ok(Some(_)) => return,
                    Ok(None) => thread::sleep(POLL_INTERVAL),
                    Err(_) => break,
                }
            }
            warn!(
                program = %self.program.display(),
                "golangci-lint did not stop within {:?}, killing",
                self.grace
            );
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Map an exit status to a process exit code. A child killed by a signal
/// reports `128 + signal`, as shells do.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Run `golangci-lint run --config <config_path>` and return its exit code.
pub fn run(executable: &Path, config_path: &Path, cancel: &CancelToken) -> Result<i32, RunError> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled {
            program: executable.to_path_buf(),
        });
    }

    let process = ToolProcess::start(
        executable,
        [
            std::ffi::OsStr::new("run"),
            std::ffi::OsStr::new("--config"),
            config_path.as_os_str(),
        ],
    )?;
    process.wait(cancel)
}
