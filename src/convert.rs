//! Convenience entry points on top of [`Command::run`].

use crate::command::Command;
use crate::context::RunContext;
use crate::error::PdfToHtmlError;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Convert a PDF held in memory.
///
/// pdftohtml only reads from files, so `bytes` is written to a managed
/// [`tempfile`] that is removed when this function returns, whether the run
/// succeeded or not.
///
/// # Example
/// ```rust,no_run
/// use pdftohtml::{convert_from_bytes, Command, RunContext};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let cmd = Command::builder().overwrite().build()?;
/// convert_from_bytes(&cmd, &RunContext::background(), &bytes, "html").await?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    cmd: &Command,
    ctx: &RunContext,
    bytes: &[u8],
    outdir: impl AsRef<Path>,
) -> Result<(), PdfToHtmlError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("pdftohtml-")
        .suffix(".pdf")
        .tempfile()
        .map_err(PdfToHtmlError::Staging)?;
    tmp.write_all(bytes).map_err(PdfToHtmlError::Staging)?;
    tmp.flush().map_err(PdfToHtmlError::Staging)?;
    debug!("Staged {} bytes at {}", bytes.len(), tmp.path().display());
    // `tmp` is dropped (and the file deleted) once `run` returns
    cmd.run(ctx, tmp.path(), outdir).await
}
