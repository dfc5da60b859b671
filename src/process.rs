//! External process invocation with a timeout and bounded output.
//!
//! Every call to the PHP interpreter (validation, version detection, live
//! extraction) and the PATH lookup go through [`run`].  A call that hangs or
//! floods its pipes fails on its own; the caller decides what to fall back to.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::ProcessError;

/// Limits applied to one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub timeout: Duration,
    /// Maximum bytes accepted on each of stdout and stderr.
    pub max_output: usize,
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, optionally inside `cwd`.
///
/// Returns an error when the process cannot start, exceeds the timeout,
/// writes more than `limits.max_output` bytes to either pipe, or exits with
/// a non-zero status.  The child is killed when the timeout fires.
pub async fn run<S: AsRef<OsStr>>(
    program: &OsStr,
    args: &[S],
    cwd: Option<&Path>,
    limits: Limits,
) -> Result<Output, ProcessError> {
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: name.clone(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let work = async {
        let (out, err) = tokio::join!(
            read_bounded(stdout, limits.max_output),
            read_bounded(stderr, limits.max_output)
        );
        let status = child.wait().await;
        (out, err, status)
    };

    // Dropping `work` on timeout drops `child`, which kills it.
    let (out, err, status) = tokio::time::timeout(limits.timeout, work)
        .await
        .map_err(|_| ProcessError::Timeout {
            program: name.clone(),
            timeout: limits.timeout,
        })?;

    let io_err = |source| ProcessError::Io {
        program: name.clone(),
        source,
    };
    let too_large = || ProcessError::OutputTooLarge {
        program: name.clone(),
        limit: limits.max_output,
    };

    let stdout = out.map_err(io_err)?.ok_or_else(too_large)?;
    let stderr = err.map_err(io_err)?.ok_or_else(too_large)?;
    let status = status.map_err(io_err)?;

    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if !status.success() {
        return Err(ProcessError::Failed {
            program: name,
            status,
            stderr: if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            },
        });
    }

    Ok(Output { stdout, stderr })
}

/// Read a pipe to the end, or return `Ok(None)` once more than `limit`
/// bytes have arrived.
async fn read_bounded<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    limit: usize,
) -> std::io::Result<Option<Vec<u8>>> {
    let Some(pipe) = pipe else {
        return Ok(Some(Vec::new()));
    };
    let mut buf = Vec::new();
    pipe.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    if buf.len() > limit {
        return Ok(None);
    }
    Ok(Some(buf))
}
