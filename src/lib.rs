//! # pdftohtml
//!
//! Typed builder and async runner for the Xpdf
//! [`pdftohtml`](https://www.xpdfreader.com/pdftohtml-man.html) command-line
//! tool, which converts PDF files into HTML.
//!
//! This crate does not read PDF or HTML itself. It assembles the flag list,
//! launches the pre-installed executable, and reports how the run ended.
//!
//! ## Run overview
//!
//! ```text
//! Command::builder()            ordered ConversionOption list
//!  │  .overwrite() .page_range(1, 5) .zoom(1.5) ...
//!  ├─ build()                   validate → Command (immutable, reusable)
//!  └─ run(&ctx, input, outdir)  pdftohtml [flags...] <input> <outdir>
//!        ├─ ctx cancelled / deadline passed → child killed
//!        └─ exit status != 0 → ToolFailed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftohtml::{Command, RunContext};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cmd = Command::builder()
//!         .overwrite()
//!         .meta()
//!         .form_fields()
//!         .embed_fonts()
//!         .build()?;
//!
//!     let ctx = RunContext::with_timeout(Duration::from_secs(120));
//!     cmd.run(&ctx, "./example.pdf", "./html").await?;
//!     println!("Done");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2html` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! xpdf-pdftohtml = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod command;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use command::{Command, INPUT_PLACEHOLDER, OUTDIR_PLACEHOLDER};
pub use config::{
    format_decimal, format_integer, CommandBuilder, ConversionOption, DEFAULT_EXECUTABLE,
};
pub use context::{CancelToken, RunContext, StopReason};
pub use convert::convert_from_bytes;
pub use error::PdfToHtmlError;
