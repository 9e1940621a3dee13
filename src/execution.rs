//! Runs generated scripts in a separate process.
//!
//! The script is written to a temporary file and started as
//! `<interpreter> <script> <input> <output>` with a cleared environment (plus
//! a small allow-list), no stdin, and a wall-clock limit. Nothing generated
//! is ever evaluated inside this process.
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ExecutionConfig;

/// Environment variables passed through to the child.
const ENV_ALLOW_LIST: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "TMPDIR",
    "TEMP",
    "TMP",
    "SYSTEMROOT",
    "VIRTUAL_ENV",
];

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The child was killed; `report` holds what it wrote until then.
    #[error("script did not finish within {limit:?}")]
    TimedOut {
        limit: Duration,
        report: Box<ExecutionReport>,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// What a finished script run produced.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn status_label(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub trait ScriptRunner {
    fn run(&self, script: &str, input: &Path, output: &Path)
    -> Result<ExecutionReport, ExecutionError>;
}

pub struct SubprocessRunner {
    interpreter: String,
    timeout: Duration,
    script_suffix: String,
}

impl SubprocessRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            script_suffix: ".py".to_string(),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(&config.interpreter, config.timeout())
    }

    /// File suffix of the temporary script (`.py` by default).
    pub fn with_script_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.script_suffix = suffix.into();
        self
    }

    fn command(&self, script: &Path, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(script).arg(input).arg(output).env_clear();
        for key in ENV_ALLOW_LIST {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Exit status of the child, or `None` when it was killed for running
    /// past the timeout.
    fn wait(&self, child: &mut std::process::Child) -> Result<Option<ExitStatus>, ExecutionError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if started.elapsed() >= self.timeout {
                warn!("Script exceeded {:?}, killing it", self.timeout);
                // The child may have exited between the checks.
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn read_capture(mut file: File) -> io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl ScriptRunner for SubprocessRunner {
    fn run(
        &self,
        script: &str,
        input: &Path,
        output: &Path,
    ) -> Result<ExecutionReport, ExecutionError> {
        let mut script_file = tempfile::Builder::new()
            .prefix("pdfchat-script-")
            .suffix(OsStr::new(&self.script_suffix))
            .tempfile()?;
        script_file.write_all(script.as_bytes())?;
        script_file.flush()?;

        // Files instead of pipes: a chatty child cannot block on a full pipe.
        let stdout = tempfile::tempfile()?;
        let stderr = tempfile::tempfile()?;

        let mut cmd = self.command(script_file.path(), input, output);
        cmd.stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?));

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            program: self.interpreter.clone(),
            source,
        })?;
        let status = self.wait(&mut child)?;

        let report = ExecutionReport {
            exit_code: status.and_then(|s| s.code()),
            success: status.is_some_and(|s| s.success()),
            stdout: read_capture(stdout)?,
            stderr: read_capture(stderr)?,
            elapsed: started.elapsed(),
        };
        if status.is_none() {
            return Err(ExecutionError::TimedOut {
                limit: self.timeout,
                report: Box::new(report),
            });
        }
        info!(
            "Script finished with {} in {:?}",
            report.status_label(),
            report.elapsed
        );
        Ok(report)
    }
}
