//! CLI binary for the pdftohtml wrapper.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `CommandBuilder`, runs the conversion, and reports the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdftohtml::{CancelToken, Command, CommandBuilder, ConversionOption, RunContext};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion into ./html
  pdf2html document.pdf html

  # Replace an existing output directory, pages 3 to 7 only
  pdf2html --overwrite --pages 3-7 document.pdf html

  # Self-contained HTML (background and fonts inlined)
  pdf2html --embed-background --embed-fonts document.pdf html

  # Give up after two minutes
  pdf2html --timeout 120 big.pdf html

  # Show what would run, without running it
  pdf2html --dry-run --zoom 1.5 --resolution 150 document.pdf html

  # Reuse a saved option list
  pdf2html --options-file options.json document.pdf html

OPTIONS FILE FORMAT:
  A JSON array of options, applied before command-line flags:
  [{"option": "overwrite"}, {"option": "first_page", "value": 3},
   {"option": "initial_zoom", "value": 1.5}]

ENVIRONMENT VARIABLES:
  PDFTOHTML_PATH    Location of the pdftohtml executable
  RUST_LOG          Override the log filter (e.g. pdftohtml=debug)
"#;

/// Convert PDF files to HTML with the Xpdf pdftohtml tool.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2html",
    version,
    about = "Convert PDF files to HTML with Xpdf pdftohtml",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to convert.
    #[arg(required_unless_present = "tool_version")]
    input: Option<PathBuf>,

    /// Directory pdftohtml writes the HTML, image and font files into.
    #[arg(required_unless_present = "tool_version")]
    outdir: Option<PathBuf>,

    /// Path to the pdftohtml executable.
    #[arg(long, env = "PDFTOHTML_PATH", default_value = pdftohtml::DEFAULT_EXECUTABLE)]
    executable: PathBuf,

    /// JSON file with a list of options applied before the flags below.
    #[arg(long, env = "PDF2HTML_OPTIONS_FILE")]
    options_file: Option<PathBuf>,

    /// Xpdf config file to read instead of ~/.xpdfrc.
    #[arg(long, env = "PDF2HTML_CONFIG")]
    config: Option<PathBuf>,

    /// Overwrite the output directory if it exists.
    #[arg(long, env = "PDF2HTML_OVERWRITE")]
    overwrite: bool,

    /// Page range to convert: 5 or 3-7.
    #[arg(long, env = "PDF2HTML_PAGES", conflicts_with_all = ["first_page", "last_page"])]
    pages: Option<String>,

    /// First page to convert.
    #[arg(short = 'f', long)]
    first_page: Option<u32>,

    /// Last page to convert.
    #[arg(short = 'l', long)]
    last_page: Option<u32>,

    /// Initial zoom (1.0 = 72 dpi).
    #[arg(short = 'z', long, env = "PDF2HTML_ZOOM")]
    zoom: Option<f64>,

    /// Background image resolution in dpi.
    #[arg(short = 'r', long, env = "PDF2HTML_RESOLUTION")]
    resolution: Option<u32>,

    /// Vertical stretch factor.
    #[arg(long, env = "PDF2HTML_VSTRETCH")]
    vstretch: Option<f64>,

    /// Embed the background image as base64 data.
    #[arg(long)]
    embed_background: bool,

    /// Do not extract embedded fonts.
    #[arg(long, conflicts_with = "embed_fonts")]
    no_fonts: bool,

    /// Embed extracted fonts as base64 data.
    #[arg(long)]
    embed_fonts: bool,

    /// Drop invisible (OCR) text.
    #[arg(long, conflicts_with = "all_invisible")]
    skip_invisible: bool,

    /// Treat all text as invisible.
    #[arg(long)]
    all_invisible: bool,

    /// Convert AcroForm fields to HTML inputs.
    #[arg(long)]
    form_fields: bool,

    /// Emit document metadata as <meta> tags.
    #[arg(long)]
    meta: bool,

    /// Use table mode for text extraction.
    #[arg(long)]
    table: bool,

    /// Owner password for encrypted PDFs.
    #[arg(long, env = "PDF2HTML_OWNER_PASSWORD", hide_env_values = true)]
    owner_password: Option<String>,

    /// User password for encrypted PDFs.
    #[arg(long, env = "PDF2HTML_USER_PASSWORD", hide_env_values = true)]
    user_password: Option<String>,

    /// Kill pdftohtml after this many seconds.
    #[arg(long, env = "PDF2HTML_TIMEOUT")]
    timeout: Option<u64>,

    /// Print the command line instead of running it.
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print the command as JSON.
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// Print the pdftohtml version and exit.
    #[arg(long)]
    tool_version: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2HTML_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2HTML_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.dry_run && !cli.tool_version;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cmd = build_command(&cli).await?;

    // ── Informational modes ──────────────────────────────────────────────
    if cli.tool_version {
        let version = cmd
            .tool_version()
            .await
            .context("Failed to query pdftohtml version")?;
        println!("{version}");
        return Ok(());
    }

    if cli.dry_run {
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&cmd).context("Failed to serialise command")?
            );
        } else {
            println!("{cmd}");
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let (Some(input), Some(outdir)) = (cli.input.as_deref(), cli.outdir.as_deref()) else {
        anyhow::bail!("INPUT and OUTDIR are required");
    };

    let token = CancelToken::new();
    let mut ctx = RunContext::background().cancel_token(token.clone());
    if let Some(secs) = cli.timeout {
        ctx = ctx.timeout(Duration::from_secs(secs));
    }

    // Ctrl-C kills pdftohtml instead of leaving it running detached.
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping pdftohtml");
            token.cancel();
        }
    });

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(input.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let start = Instant::now();
    let result = cmd.run(&ctx, input, outdir).await;
    ctrl_c.abort();

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    match result {
        Ok(()) => {
            if !cli.quiet {
                eprintln!(
                    "{}  {}  →  {}  {}ms",
                    green("✔"),
                    input.display(),
                    bold(&outdir.display().to_string()),
                    start.elapsed().as_millis()
                );
            }
            Ok(())
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("{}  {}", red("✘"), input.display());
            }
            Err(e).context("Conversion failed")
        }
    }
}

/// Map CLI args to a `Command`. Options-file entries come first, then flags
/// in the order they are listed in `--help`.
async fn build_command(cli: &Cli) -> Result<Command> {
    let mut builder = Command::builder().executable(&cli.executable);

    if let Some(ref path) = cli.options_file {
        builder = builder.options(load_options(path).await?);
    }

    if let Some(ref cfg) = cli.config {
        builder = builder.config_file(cfg);
    }
    if cli.overwrite {
        builder = builder.overwrite();
    }
    builder = apply_pages(builder, cli)?;
    if let Some(zoom) = cli.zoom {
        builder = builder.zoom(zoom);
    }
    if let Some(dpi) = cli.resolution {
        builder = builder.resolution(dpi);
    }
    if let Some(factor) = cli.vstretch {
        builder = builder.vertical_stretch(factor);
    }

    let switches = [
        (cli.embed_background, ConversionOption::EmbedBackground),
        (cli.no_fonts, ConversionOption::NoFonts),
        (cli.embed_fonts, ConversionOption::EmbedFonts),
        (cli.skip_invisible, ConversionOption::SkipInvisible),
        (cli.all_invisible, ConversionOption::AllInvisible),
        (cli.form_fields, ConversionOption::FormFields),
        (cli.meta, ConversionOption::Meta),
        (cli.table, ConversionOption::TableMode),
    ];
    builder = builder.options(
        switches
            .into_iter()
            .filter_map(|(enabled, option)| enabled.then_some(option)),
    );

    if let Some(ref pw) = cli.owner_password {
        builder = builder.owner_password(pw);
    }
    if let Some(ref pw) = cli.user_password {
        builder = builder.user_password(pw);
    }

    builder.build().context("Invalid configuration")
}

fn apply_pages(builder: CommandBuilder, cli: &Cli) -> Result<CommandBuilder> {
    if let Some(ref spec) = cli.pages {
        let (from, to) = parse_pages(spec)?;
        return Ok(builder.page_range(from, to));
    }
    let mut builder = builder;
    if let Some(first) = cli.first_page {
        builder = builder.first_page(first);
    }
    if let Some(last) = cli.last_page {
        builder = builder.last_page(last);
    }
    Ok(builder)
}

async fn load_options(path: &Path) -> Result<Vec<ConversionOption>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read options file {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid options file {:?}", path))
}

/// Parse `--pages` into an inclusive `(first, last)` pair.
fn parse_pages(s: &str) -> Result<(u32, u32)> {
    let s = s.trim();

    // Range: "3-7"
    if let Some((start, end)) = s.split_once('-') {
        let start: u32 = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: u32 = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok((start, end));
    }

    // Single page: "5"
    let page: u32 = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok((page, page))
}
