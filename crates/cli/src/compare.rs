//! Drives the external diff tool over local and remote inputs.
//!
//! Remote targets are opened over SFTP and streamed into OS pipes; diff
//! sees them as `/dev/fd/N`. The pipe read end is the only descriptor left
//! inheritable, and diff's copy is the only one still open once the child
//! is running, so a diff that exits early breaks the pipe and unwinds the
//! pump. Output is filtered so the synthetic names never reach the user.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;
use std::sync::Arc;

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use regex::Regex;
use sftpdiff_platform::{SftpdiffError, SftpdiffResult};
use sftpdiff_proto::sftp::{ConnectionPool, OpenFlags, ReadPump};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe::Sender as PipeSender;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A remote input being streamed to the diff tool.
struct RemoteInput {
    /// The user's spelling, restored in the output
    label: String,
    /// Synthetic name handed to diff
    fd_path: String,
    /// Inheritable read end; dropped once diff holds its own copy
    inherit: Option<OwnedFd>,
    /// Pump task feeding the write end
    pump: JoinHandle<()>,
}

/// Context for one comparison: the diff options and the connection pool.
pub struct Comparison {
    diff_args: Vec<String>,
    pool: ConnectionPool,
}

impl Comparison {
    /// Creates a comparison invoking diff with `diff_args` before the two
    /// file arguments.
    pub fn new(diff_args: Vec<String>) -> Self {
        Self {
            diff_args,
            pool: ConnectionPool::new(),
        }
    }

    /// Compares two files, each local or `HOST:PATH`, returning diff's
    /// exit code (0 no difference, 1 difference).
    pub async fn compare_files(&self, file1: &str, file2: &str) -> SftpdiffResult<i32> {
        let mut args = self.diff_args.clone();
        let mut inputs = Vec::new();

        let mut outcome = Ok(0);
        for spec in [file1, file2] {
            if let Err(e) = self.add_file(spec, &mut args, &mut inputs).await {
                outcome = Err(e);
                break;
            }
        }
        if outcome.is_ok() {
            outcome = self.run_diff(&args, &mut inputs).await;
        }

        // Closing the read ends unwinds any pump still blocked on a full
        // pipe, so the joins below cannot hang.
        for mut input in inputs {
            input.inherit.take();
            if let Err(e) = input.pump.await {
                warn!(target = %input.label, error = %e, "pump task failed");
            }
        }
        self.pool.disconnect_all().await;

        outcome
    }

    /// Adds one comparison target: local paths go to diff verbatim, remote
    /// ones become a `/dev/fd/N` pipe fed by a pump task.
    async fn add_file(
        &self,
        spec: &str,
        args: &mut Vec<String>,
        inputs: &mut Vec<RemoteInput>,
    ) -> SftpdiffResult<()> {
        let Some((host, path)) = split_target(spec) else {
            args.push(spec.to_string());
            return Ok(());
        };
        debug!(host, path, "preparing remote input");

        let conn = self.pool.get(host).await?;

        // A v3 server will happily open a directory and only fail at the
        // first read; catch it up front for a sane diagnostic.
        let attrs = conn.stat(path).await?;
        if attrs.is_dir() {
            return Err(SftpdiffError::Config(format!("{}: is a directory", spec)));
        }

        let handle = conn.open(path, OpenFlags::READ).await?;

        let (read_fd, write_fd) = nix::unistd::pipe().map_err(nix_io)?;
        // The read end must survive exec for diff; our write end must not,
        // or diff holds its own input open and never sees EOF.
        fcntl(write_fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(nix_io)?;
        fcntl(write_fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(nix_io)?;
        let sink = PipeSender::from_owned_fd(write_fd)?;

        let pump_conn = Arc::clone(&conn);
        let task_label = spec.to_string();
        let pump = tokio::spawn(async move {
            let pump = ReadPump::new(pump_conn);
            match pump.run(handle, sink).await {
                Ok(bytes) => debug!(target = %task_label, bytes, "remote input streamed"),
                Err(e) => error!(target = %task_label, error = %e, "streaming remote input failed"),
            }
        });

        let fd_path = format!("/dev/fd/{}", read_fd.as_raw_fd());
        debug!(target = %spec, fd_path = %fd_path, "remote input ready");
        args.push(fd_path.clone());
        inputs.push(RemoteInput {
            label: spec.to_string(),
            fd_path,
            inherit: Some(read_fd),
            pump,
        });
        Ok(())
    }

    /// Runs diff, proxying its output with the synthetic names rewritten.
    async fn run_diff(&self, args: &[String], inputs: &mut [RemoteInput]) -> SftpdiffResult<i32> {
        debug!(?args, "invoking diff");
        let mut child = Command::new("diff")
            .args(args)
            .stdout(Stdio::piped())
            .spawn()?;

        // diff holds its own copies of the read ends now; drop ours so the
        // pipes break when it exits.
        for input in inputs.iter_mut() {
            input.inherit.take();
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            SftpdiffError::Config("diff stdout not captured".to_string())
        })?;

        let rewriter = NameRewriter::new(
            inputs
                .iter()
                .map(|input| (input.fd_path.clone(), input.label.clone()))
                .collect(),
        )?;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            println!("{}", rewriter.rewrite(&line));
        }

        let status = child.wait().await?;
        match status.code() {
            Some(code) => Ok(code),
            None => Err(SftpdiffError::Io(std::io::Error::other(
                "diff terminated by signal",
            ))),
        }
    }
}

fn nix_io(errno: nix::errno::Errno) -> SftpdiffError {
    SftpdiffError::Io(errno.into())
}

/// Splits a `HOST:PATH` target; `None` means a local path.
fn split_target(spec: &str) -> Option<(&str, &str)> {
    let colon = spec.find(':')?;
    Some((&spec[..colon], &spec[colon + 1..]))
}

/// Rewrites synthetic `/dev/fd/N` names back to the user's spellings.
struct NameRewriter {
    pattern: Regex,
    names: HashMap<String, String>,
}

impl NameRewriter {
    fn new(names: HashMap<String, String>) -> SftpdiffResult<Self> {
        let pattern = Regex::new(r"/dev/fd/\d+")
            .map_err(|e| SftpdiffError::Config(format!("bad rewrite pattern: {}", e)))?;
        Ok(Self { pattern, names })
    }

    fn rewrite(&self, line: &str) -> String {
        self.pattern
            .replace_all(line, |caps: &regex::Captures<'_>| {
                let seen = &caps[0];
                self.names
                    .get(seen)
                    .cloned()
                    .unwrap_or_else(|| seen.to_string())
            })
            .into_owned()
    }
}
