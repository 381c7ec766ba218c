//! The configured pdftohtml invocation and its execution.
//!
//! A [`Command`] is immutable once built: it owns the executable path and the
//! ordered option list. Each [`Command::run`] spawns a fresh child with
//! `[flags..., input, outdir]`, so one command can convert any number of
//! files, including concurrently from several tasks.
//!
//! ## Lifecycle of a run
//!
//! ```text
//! run(ctx, input, outdir)
//!  │
//!  ├─ 1. Context check   already cancelled / expired → error, nothing spawned
//!  ├─ 2. Spawn           NotFound / PermissionDenied → launch error
//!  ├─ 3. Wait            race child exit against ctx.stopped()
//!  │      └─ ctx fired   kill child, reap it → Cancelled / DeadlineExceeded
//!  ├─ 4. Collect stderr  bounded wait; descendants may keep the pipe open
//!  └─ 5. Exit status     0 → Ok(()), otherwise ToolFailed { code, stderr }
//! ```
//!
//! Files the tool wrote before failing or being killed are left in place.

use crate::config::{CommandBuilder, ConversionOption};
use crate::context::{RunContext, StopReason};
use crate::error::PdfToHtmlError;
use serde::{Serialize, Serializer};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Placeholders used by the [`Display`](fmt::Display) rendering.
pub const INPUT_PLACEHOLDER: &str = "<inpath>";
pub const OUTDIR_PLACEHOLDER: &str = "<outdir>";

/// Upper bound on captured stderr kept for [`PdfToHtmlError::ToolFailed`].
const STDERR_LIMIT: usize = 8 * 1024;

/// How long to keep reading stderr once the child has exited. Descendants
/// that inherited the pipe can hold it open indefinitely.
const STDERR_GRACE: Duration = Duration::from_millis(250);

/// A fully configured pdftohtml invocation.
///
/// Built with [`Command::builder()`]. Rendering it with `{}` shows the
/// command line with `<inpath> <outdir>` placeholders and password values
/// masked; nothing is executed.
#[derive(Clone, PartialEq)]
pub struct Command {
    executable: PathBuf,
    options: Vec<ConversionOption>,
    args: Vec<OsString>,
}

impl Command {
    /// Start configuring a command that runs [`crate::DEFAULT_EXECUTABLE`].
    pub fn builder() -> CommandBuilder {
        CommandBuilder::default()
    }

    pub(crate) fn from_parts(executable: PathBuf, options: Vec<ConversionOption>) -> Self {
        let mut args = Vec::with_capacity(options.len() * 2);
        for option in &options {
            option.push_tokens(&mut args);
        }
        Self {
            executable,
            options,
            args,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Options in the order they were applied.
    pub fn options(&self) -> &[ConversionOption] {
        &self.options
    }

    /// Flag tokens, without the positional arguments.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The full argument vector for one run: flags, then `input`, then
    /// `outdir`. Password values are not masked.
    pub fn argv(&self, input: impl AsRef<OsStr>, outdir: impl AsRef<OsStr>) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        argv.extend(self.args.iter().cloned());
        argv.push(input.as_ref().to_os_string());
        argv.push(outdir.as_ref().to_os_string());
        argv
    }

    /// Convert `input` into HTML files under `outdir`.
    ///
    /// # Errors
    /// - [`PdfToHtmlError::Cancelled`] / [`PdfToHtmlError::DeadlineExceeded`]
    ///   if `ctx` fires before or during the run; the child is killed.
    /// - [`PdfToHtmlError::ExecutableNotFound`],
    ///   [`PdfToHtmlError::PermissionDenied`], [`PdfToHtmlError::Spawn`] if
    ///   the process cannot be started.
    /// - [`PdfToHtmlError::ToolFailed`] if pdftohtml exits non-zero.
    pub async fn run(
        &self,
        ctx: &RunContext,
        input: impl AsRef<Path>,
        outdir: impl AsRef<Path>,
    ) -> Result<(), PdfToHtmlError> {
        let input = input.as_ref();
        let outdir = outdir.as_ref();
        let start = Instant::now();

        if let Some(reason) = ctx.stop_reason() {
            debug!("Context already stopped ({:?}); not launching pdftohtml", reason);
            return Err(stop_error(reason, start));
        }

        info!("Converting {} -> {}", input.display(), outdir.display());
        debug!("Command line: {}", self.describe(input, outdir));

        let mut child = self.spawn(input, outdir)?;

        // Drain stderr concurrently so a chatty tool never blocks on a full pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let outcome = tokio::select! {
            status = child.wait() => Ok(status),
            reason = ctx.stopped() => Err(reason),
        };

        let status = match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stderr_task.abort();
                return Err(PdfToHtmlError::Wait {
                    path: self.executable.clone(),
                    source: e,
                });
            }
            Err(reason) => {
                warn!(
                    "Stopping pdftohtml for {} after {}ms ({:?})",
                    input.display(),
                    start.elapsed().as_millis(),
                    reason
                );
                terminate(&mut child).await;
                stderr_task.abort();
                return Err(stop_error(reason, start));
            }
        };
        let stderr = collect_stderr(stderr_task, ctx).await;

        finish(status, &stderr, input, start)
    }

    /// Blocking wrapper around [`run`](Self::run) with an optional timeout.
    ///
    /// Creates a temporary tokio runtime internally, so it must not be called
    /// from inside an async context.
    pub fn run_blocking(
        &self,
        input: impl AsRef<Path>,
        outdir: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<(), PdfToHtmlError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PdfToHtmlError::Internal(format!("Failed to create tokio runtime: {e}")))?;
        runtime.block_on(async {
            let ctx = match timeout {
                Some(t) => RunContext::with_timeout(t),
                None => RunContext::background(),
            };
            self.run(&ctx, input, outdir).await
        })
    }

    /// Ask the tool for its version string (`pdftohtml -v`).
    ///
    /// Xpdf prints the banner on stderr and some builds exit non-zero for
    /// `-v`, so the exit status is ignored whenever there is output.
    pub async fn tool_version(&self) -> Result<String, PdfToHtmlError> {
        let output = tokio::process::Command::new(&self.executable)
            .arg("-v")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        let text = [output.stdout.as_slice(), output.stderr.as_slice()]
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect::<Vec<_>>()
            .join("\n");

        match text.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(line) => Ok(line.to_string()),
            None => Err(PdfToHtmlError::ToolFailed {
                code: output.status.code(),
                stderr: "no version output".into(),
            }),
        }
    }

    /// True if the executable can be launched at all.
    pub async fn is_available(&self) -> bool {
        self.tool_version().await.is_ok()
    }

    fn spawn(&self, input: &Path, outdir: &Path) -> Result<Child, PdfToHtmlError> {
        tokio::process::Command::new(&self.executable)
            .args(self.argv(input, outdir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.launch_error(e))
    }

    fn launch_error(&self, e: std::io::Error) -> PdfToHtmlError {
        let path = self.executable.clone();
        match e.kind() {
            ErrorKind::NotFound => PdfToHtmlError::ExecutableNotFound { path },
            ErrorKind::PermissionDenied => PdfToHtmlError::PermissionDenied { path },
            _ => PdfToHtmlError::Spawn { path, source: e },
        }
    }

    fn describe(&self, input: &Path, outdir: &Path) -> String {
        let mut parts = vec![self.executable.to_string_lossy().into_owned()];
        parts.extend(self.options.iter().flat_map(ConversionOption::display_tokens));
        parts.push(input.to_string_lossy().into_owned());
        parts.push(outdir.to_string_lossy().into_owned());
        parts.join(" ")
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        // Already exited between the select arms; nothing left to reap.
        debug!("kill after stop: {}", e);
    }
}

/// Wait briefly for the stderr reader after the child exited. The exit
/// status is already known, so a context that fires here only cuts the
/// capture short.
async fn collect_stderr(mut task: JoinHandle<Vec<u8>>, ctx: &RunContext) -> Vec<u8> {
    tokio::select! {
        biased;
        joined = &mut task => return joined.unwrap_or_default(),
        _ = tokio::time::sleep(STDERR_GRACE) => {
            debug!("stderr still open {}ms after exit; giving up on it", STDERR_GRACE.as_millis());
        }
        _ = ctx.stopped() => {}
    }
    task.abort();
    Vec::new()
}

fn stop_error(reason: StopReason, start: Instant) -> PdfToHtmlError {
    match reason {
        StopReason::Cancelled => PdfToHtmlError::Cancelled,
        StopReason::DeadlineExceeded => PdfToHtmlError::DeadlineExceeded {
            elapsed: start.elapsed(),
        },
    }
}

fn finish(
    status: ExitStatus,
    stderr: &[u8],
    input: &Path,
    start: Instant,
) -> Result<(), PdfToHtmlError> {
    let elapsed_ms = start.elapsed().as_millis();
    if status.success() {
        info!("Converted {} in {}ms", input.display(), elapsed_ms);
        return Ok(());
    }

    let tail = &stderr[stderr.len().saturating_sub(STDERR_LIMIT)..];
    let stderr = String::from_utf8_lossy(tail).into_owned();
    warn!(
        "pdftohtml failed on {} after {}ms: {}",
        input.display(),
        elapsed_ms,
        status
    );
    Err(PdfToHtmlError::ToolFailed {
        code: status.code(),
        stderr,
    })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(
            Path::new(INPUT_PLACEHOLDER),
            Path::new(OUTDIR_PLACEHOLDER),
        ))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options: Vec<ConversionOption> =
            self.options.iter().map(ConversionOption::redacted).collect();
        f.debug_struct("Command")
            .field("executable", &self.executable)
            .field("options", &options)
            .finish()
    }
}

/// Serialises as `{"executable": ..., "options": [...], "command_line": ...}`
/// with password values masked.
impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            executable: &'a Path,
            options: Vec<ConversionOption>,
            command_line: String,
        }

        Repr {
            executable: &self.executable,
            options: self.options.iter().map(ConversionOption::redacted).collect(),
            command_line: self.to_string(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_placeholders() {
        let cmd = Command::builder()
            .overwrite()
            .embed_fonts()
            .build()
            .unwrap();
        assert_eq!(
            cmd.to_string(),
            "/usr/bin/pdftohtml -overwrite -embedfonts <inpath> <outdir>"
        );
    }

    #[test]
    fn display_masks_passwords() {
        let cmd = Command::builder()
            .owner_password("s3cret")
            .user_password("hunter2")
            .build()
            .unwrap();
        let shown = cmd.to_string();
        assert_eq!(shown, "/usr/bin/pdftohtml -opw *** -upw *** <inpath> <outdir>");
        assert!(!format!("{cmd:?}").contains("hunter2"));
    }

    #[test]
    fn argv_puts_positionals_last() {
        let cmd = Command::builder()
            .executable("/opt/xpdf/bin/pdftohtml")
            .page_range(2, 4)
            .meta()
            .build()
            .unwrap();
        let argv = cmd.argv("in.pdf", "out");
        assert_eq!(
            argv,
            ["-f", "2", "-l", "4", "-meta", "in.pdf", "out"]
                .map(OsString::from)
                .to_vec()
        );
        assert_eq!(cmd.args().len(), 5, "positionals must not be stored");
        assert_eq!(cmd.executable(), Path::new("/opt/xpdf/bin/pdftohtml"));
    }

    #[test]
    fn argv_keeps_real_password() {
        let cmd = Command::builder().user_password("pw").build().unwrap();
        assert_eq!(
            cmd.argv("a.pdf", "b"),
            ["-upw", "pw", "a.pdf", "b"].map(OsString::from).to_vec()
        );
    }

    #[test]
    fn serialises_redacted() {
        let cmd = Command::builder()
            .first_page(1)
            .owner_password("top")
            .build()
            .unwrap();
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["executable"], "/usr/bin/pdftohtml");
        assert_eq!(json["options"][0]["option"], "first_page");
        assert_eq!(json["options"][1]["value"], "***");
        assert_eq!(
            json["command_line"],
            "/usr/bin/pdftohtml -f 1 -opw *** <inpath> <outdir>"
        );
    }

    #[tokio::test]
    async fn precancelled_context_skips_launch() {
        let token = crate::CancelToken::new();
        token.cancel();
        let ctx = RunContext::background().cancel_token(token);
        // The executable does not exist: a launch attempt would report
        // ExecutableNotFound instead of Cancelled.
        let cmd = Command::builder()
            .executable("/definitely/not/pdftohtml")
            .build()
            .unwrap();
        let err = cmd.run(&ctx, "in.pdf", "out").await.unwrap_err();
        assert!(matches!(err, PdfToHtmlError::Cancelled), "got: {err:?}");
    }

    #[tokio::test]
    async fn expired_deadline_skips_launch() {
        let ctx = RunContext::with_timeout(Duration::ZERO);
        let cmd = Command::builder()
            .executable("/definitely/not/pdftohtml")
            .build()
            .unwrap();
        let err = cmd.run(&ctx, "in.pdf", "out").await.unwrap_err();
        assert!(
            matches!(err, PdfToHtmlError::DeadlineExceeded { .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn missing_executable_is_launch_error() {
        let cmd = Command::builder()
            .executable("/definitely/not/pdftohtml")
            .build()
            .unwrap();
        let err = cmd
            .run(&RunContext::background(), "in.pdf", "out")
            .await
            .unwrap_err();
        assert!(
            matches!(err, PdfToHtmlError::ExecutableNotFound { .. }),
            "got: {err:?}"
        );
        assert!(!cmd.is_available().await);
    }
}
