//! Launches an external tool and streams its combined output line by line.
//!
//! Used identically for the collector and the analyzer. Each run owns its child
//! handle and its reader task, so concurrent runs share nothing.
//!
//! ```text
//!   child stdout ──┐
//!                  ├──► one pipe ──► reader task ──► line queue ──► on_line(String)
//!   child stderr ──┘
//! ```
//!
//! On unix both streams share the write end of a single pipe, so lines reach the
//! sink in exactly the order the child wrote them. Elsewhere each stream gets its own
//! reader and only per-stream order holds. A non-zero exit is reported, never
//! treated as an error here.

use std::{ffi::OsString, path::PathBuf, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_util::sync::CancellationToken;

use crate::error::{ScanError, ScanResult};

/// Program, arguments and working directory of one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

/// Exit code of a finished child; `None` when it was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Start the child. Fails with [`ScanError::Launch`] if it cannot be started; no
    /// line is ever produced in that case.
    pub fn spawn(&self, invocation: &Invocation) -> ScanResult<RunningProcess> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        let merged = {
            let (reader, writer) = merged::pipe()?;
            command.stdout(Stdio::from(writer.try_clone()?)).stderr(Stdio::from(writer));
            tokio::net::unix::pipe::Receiver::from_owned_fd(reader)?
        };
        #[cfg(not(unix))]
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let spawned = command.spawn();
        // The parent's copies of the write end must be gone before reading to EOF.
        drop(command);
        let child = spawned.map_err(|source| ScanError::Launch {
            path: invocation.program.clone(),
            source,
        })?;
        log::info!(
            "Launched {} (pid {:?}) with {} args",
            invocation.program.display(),
            child.id(),
            invocation.args.len()
        );

        let (line_tx, lines) = mpsc::unbounded_channel();
        #[cfg(unix)]
        tokio::spawn(forward_lines(merged, line_tx));
        #[cfg(not(unix))]
        let mut child = child;
        #[cfg(not(unix))]
        {
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(forward_lines(stdout, line_tx.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(forward_lines(stderr, line_tx));
            }
        }

        Ok(RunningProcess {
            child,
            lines,
            program: invocation.program.clone(),
        })
    }

    /// Spawn and stream to completion without cancellation.
    pub async fn run<F>(&self, invocation: &Invocation, on_line: F) -> ScanResult<ExitOutcome>
    where
        F: FnMut(String),
    {
        let never = CancellationToken::new();
        self.spawn(invocation)?.stream_to(&never, on_line).await
    }
}

/// A started child whose output has not been consumed yet.
pub struct RunningProcess {
    child: Child,
    lines: UnboundedReceiver<String>,
    program: PathBuf,
}

impl RunningProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Forcibly terminate the child and reap it.
    pub async fn kill(&mut self) -> ScanResult<()> {
        log::warn!("Killing {} (pid {:?})", self.program.display(), self.child.id());
        self.child.kill().await?;
        Ok(())
    }

    /// Deliver every output line to `on_line`, then wait for the exit status.
    /// Cancelling `cancel` kills the child and returns [`ScanError::Cancelled`].
    pub async fn stream_to<F>(mut self, cancel: &CancellationToken, mut on_line: F) -> ScanResult<ExitOutcome>
    where
        F: FnMut(String),
    {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.kill().await?;
                    return Err(ScanError::Cancelled);
                }
                line = self.lines.recv() => match line {
                    Some(line) => on_line(line),
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.kill().await?;
                return Err(ScanError::Cancelled);
            }
            status = self.child.wait() => status?,
        };
        let outcome = ExitOutcome { code: status.code() };
        if outcome.success() {
            log::info!("{} exited successfully", self.program.display());
        } else {
            log::warn!("{} exited with {:?}", self.program.display(), outcome.code);
        }
        Ok(outcome)
    }
}

async fn forward_lines<R>(stream: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(decode_line(&buffer)).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::error!("Failed to read child output: {}", e);
                break;
            }
        }
    }
}

#[cfg(unix)]
mod merged {
    use std::{
        io,
        os::fd::{FromRawFd, OwnedFd},
    };

    /// A close-on-exec pipe as `(read end, write end)`.
    pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds = [0 as libc::c_int; 2];
        create(&mut fds)?;
        // SAFETY: both descriptors were just returned by the kernel and are owned by nobody else.
        let pair = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(pair)
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn create(fds: &mut [libc::c_int; 2]) -> io::Result<()> {
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    fn create(fds: &mut [libc::c_int; 2]) -> io::Result<()> {
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        for fd in fds.iter() {
            if unsafe { libc::fcntl(*fd, libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
                let err = io::Error::last_os_error();
                unsafe {
                    libc::close(fds[0]);
                    libc::close(fds[1]);
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

fn decode_line(buffer: &[u8]) -> String {
    let line = String::from_utf8_lossy(buffer);
    line.trim_end_matches(['\n', '\r']).to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{path::Path, time::Duration};

    fn sh(script: &str) -> Invocation {
        Invocation::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn nonzero_exit_still_delivers_every_line() {
        let mut lines = Vec::new();
        let outcome = ProcessRunner::new()
            .run(&sh("for i in 1 2 3 4 5; do echo line$i; done; exit 2"), |l| lines.push(l))
            .await
            .unwrap();
        assert_eq!(outcome.code, Some(2));
        assert!(!outcome.success());
        assert_eq!(lines, vec!["line1", "line2", "line3", "line4", "line5"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stdout_and_stderr_keep_emission_order() {
        let script = "for i in 1 2 3 4 5 6 7 8 9 10; do echo out$i; echo err$i 1>&2; done";
        let expected: Vec<String> = (1..=10).flat_map(|i| [format!("out{}", i), format!("err{}", i)]).collect();
        for _ in 0..20 {
            let mut lines = Vec::new();
            ProcessRunner::new().run(&sh(script), |l| lines.push(l)).await.unwrap();
            assert_eq!(lines, expected);
        }
    }

    #[tokio::test]
    async fn missing_executable_is_a_launch_error() {
        let mut called = false;
        let err = ProcessRunner::new()
            .run(&Invocation::new("/nonexistent/collector"), |_| called = true)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Launch { ref path, .. } if path == Path::new("/nonexistent/collector")));
        assert!(!called);
    }

    #[tokio::test]
    async fn working_dir_and_crlf_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = Vec::new();
        ProcessRunner::new()
            .run(&sh("pwd; printf 'a\\r\\nb'").working_dir(Some(dir.path().to_path_buf())), |l| lines.push(l))
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&lines[0]).canonicalize().unwrap(), canonical);
        assert_eq!(&lines[1..], &["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let cancel = CancellationToken::new();
        let process = ProcessRunner::new().spawn(&sh("echo started; sleep 30")).unwrap();
        assert!(process.id().is_some());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let mut lines = Vec::new();
        let err = process.stream_to(&cancel, |l| lines.push(l)).await.unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
