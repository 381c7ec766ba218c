//! Conversion options and the [`CommandBuilder`].
//!
//! Every pdftohtml flag is one [`ConversionOption`] variant. The builder keeps
//! them in the order they were added, so `-f 3 -l 7` stays exactly that on
//! the command line and a value token never drifts away from its flag.
//! Adding the same option twice adds the flag twice; pdftohtml decides what
//! that means.
//!
//! # Example
//! ```rust
//! use pdftohtml::Command;
//!
//! let cmd = Command::builder()
//!     .overwrite()
//!     .page_range(3, 7)
//!     .zoom(1.5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     cmd.to_string(),
//!     "/usr/bin/pdftohtml -overwrite -f 3 -l 7 -z 1.50 <inpath> <outdir>"
//! );
//! ```

use crate::command::Command;
use crate::error::PdfToHtmlError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// Location of `pdftohtml` in a standard Xpdf install.
pub const DEFAULT_EXECUTABLE: &str = "/usr/bin/pdftohtml";

/// Placeholder shown instead of password values in logs and descriptions.
pub(crate) const REDACTED: &str = "***";

/// A single pdftohtml flag, optionally with its value.
///
/// Serialises as `{"option": "first_page", "value": 3}` so option lists can
/// be kept in JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "option", content = "value", rename_all = "snake_case")]
pub enum ConversionOption {
    /// `-cfg <path>`: read this file instead of `~/.xpdfrc`.
    ConfigFile(PathBuf),
    /// `-overwrite`: allow writing into an existing output directory.
    Overwrite,
    /// `-f <n>`: first page to convert.
    FirstPage(u32),
    /// `-l <n>`: last page to convert.
    LastPage(u32),
    /// `-z <zoom>`: initial zoom; 1.0 means 72 dpi.
    InitialZoom(f64),
    /// `-r <dpi>`: background image resolution.
    Resolution(u32),
    /// `-vstretch <factor>`: vertical stretch factor.
    VerticalStretch(f64),
    /// `-embedbackground`: inline the background image as base64.
    EmbedBackground,
    /// `-nofonts`: skip font extraction.
    NoFonts,
    /// `-embedfonts`: inline extracted fonts as base64.
    EmbedFonts,
    /// `-skipinvisible`: drop invisible (OCR) text.
    SkipInvisible,
    /// `-allinvisible`: treat all text as invisible.
    AllInvisible,
    /// `-formfields`: turn AcroForm fields into HTML inputs.
    FormFields,
    /// `-meta`: emit document metadata as `<meta>` tags.
    Meta,
    /// `-table`: table-mode text extraction.
    TableMode,
    /// `-opw <password>`
    OwnerPassword(String),
    /// `-upw <password>`
    UserPassword(String),
}

impl ConversionOption {
    /// The flag token, e.g. `-vstretch`.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::ConfigFile(_) => "-cfg",
            Self::Overwrite => "-overwrite",
            Self::FirstPage(_) => "-f",
            Self::LastPage(_) => "-l",
            Self::InitialZoom(_) => "-z",
            Self::Resolution(_) => "-r",
            Self::VerticalStretch(_) => "-vstretch",
            Self::EmbedBackground => "-embedbackground",
            Self::NoFonts => "-nofonts",
            Self::EmbedFonts => "-embedfonts",
            Self::SkipInvisible => "-skipinvisible",
            Self::AllInvisible => "-allinvisible",
            Self::FormFields => "-formfields",
            Self::Meta => "-meta",
            Self::TableMode => "-table",
            Self::OwnerPassword(_) => "-opw",
            Self::UserPassword(_) => "-upw",
        }
    }

    /// The value token following the flag, if the flag takes one.
    pub fn value(&self) -> Option<OsString> {
        match self {
            Self::ConfigFile(path) => Some(path.clone().into_os_string()),
            Self::FirstPage(n) | Self::LastPage(n) | Self::Resolution(n) => {
                Some(format_integer(*n).into())
            }
            Self::InitialZoom(v) | Self::VerticalStretch(v) => Some(format_decimal(*v).into()),
            Self::OwnerPassword(s) | Self::UserPassword(s) => Some(s.into()),
            _ => None,
        }
    }

    /// True for options whose value must not appear in logs.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::OwnerPassword(_) | Self::UserPassword(_))
    }

    /// Append this option's tokens to `args`.
    pub(crate) fn push_tokens(&self, args: &mut Vec<OsString>) {
        args.push(self.flag().into());
        if let Some(v) = self.value() {
            args.push(v);
        }
    }

    /// Tokens as shown in descriptions: secrets replaced by [`REDACTED`].
    pub(crate) fn display_tokens(&self) -> Vec<String> {
        let mut out = vec![self.flag().to_string()];
        if self.is_secret() {
            out.push(REDACTED.to_string());
        } else if let Some(v) = self.value() {
            out.push(v.to_string_lossy().into_owned());
        }
        out
    }

    /// Same option with secret values masked, for serialised diagnostics.
    pub(crate) fn redacted(&self) -> Self {
        match self {
            Self::OwnerPassword(_) => Self::OwnerPassword(REDACTED.into()),
            Self::UserPassword(_) => Self::UserPassword(REDACTED.into()),
            other => other.clone(),
        }
    }

    fn validate(&self) -> Result<(), PdfToHtmlError> {
        match self {
            Self::ConfigFile(path) if path.as_os_str().is_empty() => Err(
                PdfToHtmlError::InvalidConfig("config file path must not be empty".into()),
            ),
            Self::FirstPage(0) | Self::LastPage(0) => Err(PdfToHtmlError::InvalidConfig(
                "page numbers are 1-indexed, got 0".into(),
            )),
            Self::Resolution(0) => Err(PdfToHtmlError::InvalidConfig(
                "resolution must be at least 1 dpi".into(),
            )),
            Self::InitialZoom(v) | Self::VerticalStretch(v) if !v.is_finite() || *v <= 0.0 => {
                Err(PdfToHtmlError::InvalidConfig(format!(
                    "{} expects a positive finite number, got {v}",
                    self.flag()
                )))
            }
            // The token the tool sees must itself be positive.
            Self::InitialZoom(v) | Self::VerticalStretch(v) if format_decimal(*v) == "0.00" => {
                Err(PdfToHtmlError::InvalidConfig(format!(
                    "{} value {v} rounds to 0.00 at two decimals",
                    self.flag()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Render an integer value token: base 10, no sign, no leading zeros.
pub fn format_integer(n: u32) -> String {
    n.to_string()
}

/// Render a decimal value token in plain fixed point with two fractional
/// digits. pdftohtml parses these with `atof`-style grammar, so exponent
/// forms like `1.50e+00` are never produced.
pub fn format_decimal(v: f64) -> String {
    format!("{v:.2}")
}

/// Builder for [`Command`].
///
/// Obtained from [`Command::builder()`]. Each setter appends one option;
/// nothing is validated until [`build`](Self::build).
#[derive(Clone)]
pub struct CommandBuilder {
    executable: PathBuf,
    options: Vec<ConversionOption>,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            options: Vec::new(),
        }
    }
}

impl fmt::Debug for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options: Vec<ConversionOption> =
            self.options.iter().map(ConversionOption::redacted).collect();
        f.debug_struct("CommandBuilder")
            .field("executable", &self.executable)
            .field("options", &options)
            .finish()
    }
}

impl CommandBuilder {
    /// Run this executable instead of [`DEFAULT_EXECUTABLE`].
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = path.into();
        self
    }

    /// Append an arbitrary option.
    pub fn option(mut self, option: ConversionOption) -> Self {
        self.options.push(option);
        self
    }

    /// Append several options in iteration order.
    pub fn options(mut self, options: impl IntoIterator<Item = ConversionOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn config_file(self, path: impl Into<PathBuf>) -> Self {
        self.option(ConversionOption::ConfigFile(path.into()))
    }

    /// By default pdftohtml refuses to write into an existing directory.
    pub fn overwrite(self) -> Self {
        self.option(ConversionOption::Overwrite)
    }

    pub fn first_page(self, page: u32) -> Self {
        self.option(ConversionOption::FirstPage(page))
    }

    pub fn last_page(self, page: u32) -> Self {
        self.option(ConversionOption::LastPage(page))
    }

    /// Same as `first_page(from)` followed by `last_page(to)`. The order of
    /// `from` and `to` is not checked; pdftohtml converts nothing for an
    /// inverted range.
    pub fn page_range(self, from: u32, to: u32) -> Self {
        self.first_page(from).last_page(to)
    }

    /// Initial zoom. 1.0 maps one PDF point to one pixel.
    pub fn zoom(self, zoom: f64) -> Self {
        self.option(ConversionOption::InitialZoom(zoom))
    }

    /// Background image resolution in dpi.
    pub fn resolution(self, dpi: u32) -> Self {
        self.option(ConversionOption::Resolution(dpi))
    }

    pub fn vertical_stretch(self, factor: f64) -> Self {
        self.option(ConversionOption::VerticalStretch(factor))
    }

    pub fn embed_background(self) -> Self {
        self.option(ConversionOption::EmbedBackground)
    }

    pub fn no_fonts(self) -> Self {
        self.option(ConversionOption::NoFonts)
    }

    pub fn embed_fonts(self) -> Self {
        self.option(ConversionOption::EmbedFonts)
    }

    pub fn skip_invisible(self) -> Self {
        self.option(ConversionOption::SkipInvisible)
    }

    pub fn all_invisible(self) -> Self {
        self.option(ConversionOption::AllInvisible)
    }

    pub fn form_fields(self) -> Self {
        self.option(ConversionOption::FormFields)
    }

    pub fn meta(self) -> Self {
        self.option(ConversionOption::Meta)
    }

    /// Changes how text is split up; it does not produce HTML tables.
    pub fn table_mode(self) -> Self {
        self.option(ConversionOption::TableMode)
    }

    /// Bypasses all security restrictions of the document.
    pub fn owner_password(self, password: impl Into<String>) -> Self {
        self.option(ConversionOption::OwnerPassword(password.into()))
    }

    pub fn user_password(self, password: impl Into<String>) -> Self {
        self.option(ConversionOption::UserPassword(password.into()))
    }

    /// Build the command, validating every option.
    pub fn build(self) -> Result<Command, PdfToHtmlError> {
        if self.executable.as_os_str().is_empty() {
            return Err(PdfToHtmlError::InvalidConfig(
                "executable path must not be empty".into(),
            ));
        }
        for option in &self.options {
            option.validate()?;
        }
        Ok(Command::from_parts(self.executable, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(cmd: &Command) -> Vec<String> {
        cmd.args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_executable() {
        let cmd = Command::builder().build().unwrap();
        assert_eq!(cmd.executable(), std::path::Path::new(DEFAULT_EXECUTABLE));
        assert!(cmd.args().is_empty());
    }

    #[test]
    fn flags_keep_application_order() {
        let cmd = Command::builder()
            .meta()
            .resolution(150)
            .overwrite()
            .config_file("/etc/xpdfrc")
            .embed_fonts()
            .build()
            .unwrap();
        assert_eq!(
            tokens(&cmd),
            [
                "-meta",
                "-r",
                "150",
                "-overwrite",
                "-cfg",
                "/etc/xpdfrc",
                "-embedfonts"
            ]
        );
    }

    #[test]
    fn page_range_matches_separate_options() {
        for (from, to) in [(3, 7), (5, 5), (7, 3)] {
            let range = Command::builder().page_range(from, to).build().unwrap();
            let separate = Command::builder()
                .first_page(from)
                .last_page(to)
                .build()
                .unwrap();
            assert_eq!(range, separate, "page_range({from}, {to})");
        }
        let cmd = Command::builder().page_range(7, 3).build().unwrap();
        assert_eq!(tokens(&cmd), ["-f", "7", "-l", "3"]);
    }

    #[test]
    fn page_range_zero_rejected_like_separate_options() {
        assert!(Command::builder().page_range(0, 3).build().is_err());
        assert!(Command::builder().first_page(0).last_page(3).build().is_err());
    }

    #[test]
    fn duplicate_options_are_kept() {
        let cmd = Command::builder()
            .no_fonts()
            .no_fonts()
            .first_page(1)
            .first_page(2)
            .build()
            .unwrap();
        assert_eq!(tokens(&cmd), ["-nofonts", "-nofonts", "-f", "1", "-f", "2"]);
    }

    #[test]
    fn every_flag_token() {
        let cmd = Command::builder()
            .embed_background()
            .skip_invisible()
            .all_invisible()
            .form_fields()
            .table_mode()
            .vertical_stretch(1.25)
            .owner_password("owner")
            .user_password("user")
            .build()
            .unwrap();
        assert_eq!(
            tokens(&cmd),
            [
                "-embedbackground",
                "-skipinvisible",
                "-allinvisible",
                "-formfields",
                "-table",
                "-vstretch",
                "1.25",
                "-opw",
                "owner",
                "-upw",
                "user"
            ]
        );
    }

    #[test]
    fn numeric_formatting() {
        assert_eq!(format_decimal(1.5), "1.50");
        assert_eq!(format_decimal(2.0), "2.00");
        assert_eq!(format_decimal(0.333), "0.33");
        assert_eq!(format_decimal(1000.0), "1000.00");
        assert_eq!(format_integer(150), "150");
        assert_eq!(format_integer(7), "7");

        let cmd = Command::builder().zoom(1.5).resolution(150).build().unwrap();
        assert_eq!(tokens(&cmd), ["-z", "1.50", "-r", "150"]);
    }

    #[test]
    fn rejects_empty_executable() {
        let err = Command::builder().executable("").build().unwrap_err();
        assert!(matches!(err, PdfToHtmlError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_factors_that_format_as_zero() {
        let err = Command::builder().zoom(0.004).build().unwrap_err();
        assert!(err.to_string().contains("0.00"), "got: {err}");
        assert!(Command::builder().vertical_stretch(0.001).build().is_err());
        assert!(Command::builder().zoom(-0.001).build().is_err());

        let cmd = Command::builder()
            .zoom(0.006)
            .vertical_stretch(0.01)
            .build()
            .unwrap();
        assert_eq!(tokens(&cmd), ["-z", "0.01", "-vstretch", "0.01"]);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(Command::builder().first_page(0).build().is_err());
        assert!(Command::builder().last_page(0).build().is_err());
        assert!(Command::builder().resolution(0).build().is_err());
        assert!(Command::builder().zoom(0.0).build().is_err());
        assert!(Command::builder().zoom(f64::NAN).build().is_err());
        assert!(Command::builder()
            .vertical_stretch(f64::INFINITY)
            .build()
            .is_err());
        assert!(Command::builder().config_file("").build().is_err());
    }

    #[test]
    fn option_json_shape() {
        let json = serde_json::to_string(&ConversionOption::FirstPage(3)).unwrap();
        assert_eq!(json, r#"{"option":"first_page","value":3}"#);

        let parsed: Vec<ConversionOption> =
            serde_json::from_str(r#"[{"option":"overwrite"},{"option":"initial_zoom","value":1.5}]"#)
                .unwrap();
        assert_eq!(
            parsed,
            [ConversionOption::Overwrite, ConversionOption::InitialZoom(1.5)]
        );
    }

    #[test]
    fn secrets_are_redacted_for_display() {
        let opt = ConversionOption::UserPassword("hunter2".into());
        assert_eq!(opt.display_tokens(), ["-upw", REDACTED]);
        assert_eq!(opt.redacted(), ConversionOption::UserPassword(REDACTED.into()));
        assert_eq!(opt.value(), Some(OsString::from("hunter2")));
    }
}
