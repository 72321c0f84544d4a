//! Query submission gateway
//!
//! Each statement runs in a fresh shell process: the SQL is written to a
//! transient script, the shell reads it from stdin, and its output is
//! captured as raw bytes. Nothing is shared between calls, so any number
//! of statements may be in flight at once.

use async_trait::async_trait;
use chrono::Utc;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tabscrape_common::{OutputEncoding, Result, ScrapeError, ScriptEncoding, ShellSettings};
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::tis620;

/// Marker the database prints on stderr when a statement fails
const REMOTE_ERROR_MARKER: &str = "ERROR";

/// Longest stderr excerpt carried in an execution error
const STDERR_EXCERPT_LEN: usize = 512;

/// Captured output of one shell invocation
#[derive(Debug, Clone, Default)]
pub struct RawTranscript {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
    pub encoding: OutputEncoding,
}

impl RawTranscript {
    /// Standard output reinterpreted as text
    pub fn text(&self) -> Cow<'_, str> {
        self.decode(&self.stdout)
    }

    pub fn stderr_text(&self) -> Cow<'_, str> {
        self.decode(&self.stderr)
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self.encoding {
            OutputEncoding::Auto => tis620::decode_transcript(bytes),
            OutputEncoding::Tis620 => Cow::Owned(tis620::decode_single_byte(bytes)),
            OutputEncoding::Utf8 => String::from_utf8_lossy(bytes),
        }
    }
}

/// Something that can run one SQL statement and hand back its transcript
#[async_trait]
pub trait SqlShell: Send + Sync {
    async fn run(&self, sql: &str) -> Result<RawTranscript>;
}

/// Runs statements through an `isql`-style interactive shell
#[derive(Debug, Clone)]
pub struct IsqlShell {
    settings: ShellSettings,
    timeout: Duration,
}

impl IsqlShell {
    pub fn new(settings: ShellSettings) -> Self {
        let timeout = settings.timeout();
        Self { settings, timeout }
    }

    /// Override the per-statement timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    fn script_path(&self) -> PathBuf {
        self.settings.temp_dir.join(format!(
            "query_{}_{}.sql",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    fn script_body(&self, sql: &str) -> Vec<u8> {
        let script = format!("{}\n{}\n", sql, self.settings.terminator);
        match self.settings.script_encoding {
            ScriptEncoding::Tis620 => tis620::encode_lossy(&script),
            ScriptEncoding::Utf8 => script.into_bytes(),
        }
    }

    fn command(&self, stdin: std::fs::File) -> Command {
        let mut command = Command::new(&self.settings.program);
        command.args(&self.settings.args);
        if !self.settings.dsn.is_empty() {
            command.arg(&self.settings.dsn);
        }
        command
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl SqlShell for IsqlShell {
    #[instrument(skip(self, sql), fields(program = %self.settings.program))]
    async fn run(&self, sql: &str) -> Result<RawTranscript> {
        let script = ScriptFile::create(self.script_path(), &self.script_body(sql)).await?;
        let stdin = std::fs::File::open(script.path()).map_err(|e| {
            ScrapeError::Execution(format!(
                "could not open script {}: {}",
                script.path().display(),
                e
            ))
        })?;

        let start = Instant::now();
        let child = self.command(stdin).spawn().map_err(|e| {
            ScrapeError::Execution(format!("failed to spawn {}: {}", self.settings.program, e))
        })?;

        // Dropping the pending wait on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ScrapeError::Execution(format!(
                    "{} did not complete: {}",
                    self.settings.program, e
                )))
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Shell timed out, killing it");
                return Err(ScrapeError::QueryTimeout(self.timeout));
            }
        };

        let transcript = RawTranscript {
            stdout: output.stdout,
            stderr: output.stderr,
            elapsed: start.elapsed(),
            encoding: self.settings.output_encoding,
        };
        debug!(
            status = %output.status,
            stdout_bytes = transcript.stdout.len(),
            stderr_bytes = transcript.stderr.len(),
            elapsed_ms = transcript.elapsed.as_millis() as u64,
            "Shell finished"
        );

        if !output.status.success() {
            let stderr = transcript.stderr_text();
            return Err(ScrapeError::Execution(format!(
                "{} exited with {}: {}",
                self.settings.program,
                output.status,
                excerpt(stderr.trim(), STDERR_EXCERPT_LEN)
            )));
        }

        let stderr = transcript.stderr_text();
        if stderr.contains(REMOTE_ERROR_MARKER) {
            return Err(ScrapeError::RemoteSql(stderr.into_owned()));
        }

        Ok(transcript)
    }
}

/// Transient script removed on drop; removal failures are ignored
struct ScriptFile {
    path: PathBuf,
}

impl ScriptFile {
    async fn create(path: PathBuf, body: &[u8]) -> Result<Self> {
        let script = Self { path };
        tokio::fs::write(&script.path, body).await.map_err(|e| {
            ScrapeError::Execution(format!(
                "could not write script {}: {}",
                script.path.display(),
                e
            ))
        })?;
        Ok(script)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), "Could not remove script file: {}", e);
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}
