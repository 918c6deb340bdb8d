//! External command execution utilities.
//!
//! Provides a Builder-based API for running a child process with piped
//! stdin/stdout and a hard wall-clock bound.
//!
//! On Unix the child leads its own process group, so a timeout kills every
//! process it started, not just the direct child.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::new("php-cgi")
//!     .arg(&script)
//!     .envs([("REQUEST_METHOD", "GET")])
//!     .stdin(body)
//!     .timeout(Duration::from_secs(30))
//!     .run()?;
//! ```

use crossbeam::channel;
use std::{
    ffi::{OsStr, OsString},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Interval between exit checks once stdout has closed.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("I/O error while talking to `{program}`")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Captured result of a finished command.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    clear_env: bool,
    stdin_data: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Start from an empty environment, keeping only `PATH`.
    pub fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    /// Set stdin data to pipe to the process.
    pub fn stdin<D: AsRef<[u8]>>(mut self, data: D) -> Self {
        self.stdin_data = Some(data.as_ref().to_vec());
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the program name for error messages.
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Run to completion and capture output.
    ///
    /// A non-zero exit status is not an error; callers inspect `status`.
    pub fn run(self) -> Result<Captured, ExecError> {
        let name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.clear_env {
            cmd.env_clear();
            if let Some(path) = std::env::var_os("PATH") {
                cmd.env("PATH", path);
            }
        }
        cmd.envs(self.envs.iter().cloned());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: name.clone(),
            source,
        })?;

        let io_err = |source| ExecError::Io {
            program: name.clone(),
            source,
        };

        // Each pipe is serviced on its own thread so the child never blocks
        // on a full pipe while we wait on another one.
        let writer = spawn_writer(child.stdin.take(), self.stdin_data.unwrap_or_default());
        let stderr = spawn_reader(child.stderr.take());
        let (tx, rx) = channel::bounded(1);
        let stdout_pipe = child.stdout.take();
        thread::spawn(move || {
            let _ = tx.send(read_all(stdout_pipe));
        });

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let stdout = match self.timeout {
            Some(timeout) => rx.recv_timeout(timeout).ok(),
            None => rx.recv().ok(),
        };
        let status = match (&stdout, deadline) {
            (None, _) => None,
            (Some(_), Some(deadline)) => wait_deadline(&mut child, deadline).map_err(io_err)?,
            (Some(_), None) => Some(child.wait().map_err(io_err)?),
        };

        let (Some(stdout), Some(status)) = (stdout, status) else {
            // Pipe threads are detached; they end once the killed group closes the pipes
            kill_and_reap(&mut child);
            return Err(ExecError::Timeout {
                program: name,
                timeout: self.timeout.unwrap_or_default(),
            });
        };

        let stdout = stdout.map_err(io_err)?;
        let stderr = join(stderr).map_err(io_err)?;
        join(writer).map_err(io_err)?;

        Ok(Captured {
            status,
            stdout,
            stderr,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_all<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || read_all(pipe))
}

/// Write `data` and close stdin. A child that exits without reading is fine.
fn spawn_writer(stdin: Option<ChildStdin>, data: Vec<u8>) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        if let Some(mut stdin) = stdin {
            match stdin.write_all(&data) {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
        }
        Ok(())
    })
}

fn join<T>(handle: thread::JoinHandle<io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe thread panicked")))
}

/// Poll for exit until `deadline`; `None` means the child is still running.
fn wait_deadline(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

/// Kill the child's process group, then reap the child.
fn kill_and_reap(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain syscall; the group id is the unreaped child's pid
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
