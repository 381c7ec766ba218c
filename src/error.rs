//! Error type for the pdftohtml wrapper.
//!
//! Errors fall into three groups, and each group surfaces at a fixed point:
//!
//! * **Configuration**: rejected by [`crate::CommandBuilder::build`], never
//!   at run time.
//! * **Launch**: the executable is missing or cannot be started.
//! * **Execution**: the tool ran and exited non-zero, or the caller's
//!   [`crate::RunContext`] fired and the child was killed.
//!
//! Cancellation and deadline expiry are separate variants so callers can
//! tell "the tool failed" apart from "I stopped waiting"; see
//! [`PdfToHtmlError::is_cancellation`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors returned by this crate.
#[derive(Debug, Error)]
pub enum PdfToHtmlError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Launch errors ─────────────────────────────────────────────────────
    /// No executable exists at the configured path.
    #[error("pdftohtml executable not found: '{path}'\nInstall Xpdf tools or set PDFTOHTML_PATH.")]
    ExecutableNotFound { path: PathBuf },

    /// The executable exists but this process may not run it.
    #[error("Permission denied running '{path}'\nTry: chmod +x {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other failure to start the child process.
    #[error("Failed to launch '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the running child failed.
    #[error("Failed to wait for '{path}': {source}")]
    Wait {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Execution errors ──────────────────────────────────────────────────
    /// The tool exited unsuccessfully. `code` is `None` when the process
    /// was terminated by a signal we did not send.
    #[error("pdftohtml exited with {}{}", fmt_code(.code), fmt_stderr(.stderr))]
    ToolFailed { code: Option<i32>, stderr: String },

    /// The caller cancelled the run.
    #[error("pdftohtml run was cancelled")]
    Cancelled,

    /// The run's deadline elapsed before the tool finished.
    #[error("pdftohtml run exceeded its deadline after {}ms", fmt_millis(.elapsed))]
    DeadlineExceeded { elapsed: Duration },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Staging an in-memory PDF on disk failed.
    #[error("Failed to stage input file: {0}")]
    Staging(#[source] std::io::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfToHtmlError {
    /// True for [`Cancelled`](Self::Cancelled) and
    /// [`DeadlineExceeded`](Self::DeadlineExceeded).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded { .. })
    }

    /// True for errors raised before the child process existed.
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound { .. } | Self::PermissionDenied { .. } | Self::Spawn { .. }
        )
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a termination signal".to_string(),
    }
}

fn fmt_millis(elapsed: &Duration) -> u128 {
    elapsed.as_millis()
}

fn fmt_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failed_display_with_stderr() {
        let e = PdfToHtmlError::ToolFailed {
            code: Some(3),
            stderr: "Error: Couldn't open file 'x.pdf'\n".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("status 3"), "got: {msg}");
        assert!(msg.ends_with("Couldn't open file 'x.pdf'"), "got: {msg}");
    }

    #[test]
    fn tool_failed_display_without_code() {
        let e = PdfToHtmlError::ToolFailed {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(e.to_string(), "pdftohtml exited with a termination signal");
    }

    #[test]
    fn deadline_display() {
        let e = PdfToHtmlError::DeadlineExceeded {
            elapsed: Duration::from_millis(1500),
        };
        assert!(e.to_string().contains("1500ms"));
    }

    #[test]
    fn cancellation_classification() {
        assert!(PdfToHtmlError::Cancelled.is_cancellation());
        assert!(PdfToHtmlError::DeadlineExceeded {
            elapsed: Duration::ZERO
        }
        .is_cancellation());
        assert!(!PdfToHtmlError::ToolFailed {
            code: Some(1),
            stderr: String::new()
        }
        .is_cancellation());
    }

    #[test]
    fn launch_classification() {
        let e = PdfToHtmlError::ExecutableNotFound {
            path: "/nope/pdftohtml".into(),
        };
        assert!(e.is_launch_error());
        assert!(e.to_string().contains("/nope/pdftohtml"));
        assert!(!PdfToHtmlError::Cancelled.is_launch_error());
    }
}
