//! The `mmd` command-line driver: reads MultiMarkdown from files or stdin,
//! converts it, and writes the result to a file, stdout, or (in batch mode)
//! a sibling file per input.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use mmd::{Engine, Extensions, Language, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "mmd",
    version,
    about = "MultiMarkdown - lightweight markup processor"
)]
struct Args {
    /// Input files; stdin when none are given.
    input: Vec<PathBuf>,

    /// Output format: html | latex | beamer | memoir | mmd
    #[arg(short = 't', long = "to", default_value = "html")]
    to: String,

    /// Output file; `-` for stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Process each input file separately, writing a sibling output file.
    #[arg(short = 'b', long = "batch")]
    batch: bool,

    /// Force a complete document.
    #[arg(short = 'f', long = "full", conflicts_with = "snippet")]
    full: bool,

    /// Force a snippet.
    #[arg(short = 's', long = "snippet")]
    snippet: bool,

    /// Compatibility mode: disable all MultiMarkdown extensions.
    #[arg(short = 'c', long = "compatibility")]
    compatibility: bool,

    /// Accept all CriticMarkup changes.
    #[arg(short = 'a', long = "accept", conflicts_with = "reject")]
    accept: bool,

    /// Reject all CriticMarkup changes.
    #[arg(short = 'r', long = "reject")]
    reject: bool,

    /// Disable smart typography.
    #[arg(long = "nosmart")]
    nosmart: bool,

    /// Disable header and table label generation.
    #[arg(long = "nolabels")]
    nolabels: bool,

    /// Disable transclusion.
    #[arg(long = "notransclude")]
    notransclude: bool,

    /// Use random numbers for footnote anchors.
    #[arg(long = "random")]
    random: bool,

    /// Use random-looking labels for unlabeled headers.
    #[arg(long = "unique")]
    unique: bool,

    /// Localization language (two-letter code).
    #[arg(short = 'l', long = "lang", default_value = "en")]
    lang: String,

    /// List metadata keys, one per line.
    #[arg(short = 'm', long = "metadata-keys")]
    metadata_keys: bool,

    /// Print the value of one metadata key.
    #[arg(short = 'e', long = "extract")]
    extract: Option<String>,
}

impl Args {
    fn extensions(&self) -> Extensions {
        let mut extensions = Extensions::standard();
        if self.compatibility {
            extensions = Extensions::COMPATIBILITY;
        }
        if self.full {
            extensions |= Extensions::COMPLETE;
        }
        if self.snippet {
            extensions |= Extensions::SNIPPET;
        }
        if self.accept {
            extensions |= Extensions::CRITIC | Extensions::CRITIC_ACCEPT;
        }
        if self.reject {
            extensions |= Extensions::CRITIC | Extensions::CRITIC_REJECT;
        }
        if self.nosmart {
            extensions -= Extensions::SMART;
        }
        if self.nolabels {
            extensions |= Extensions::NO_LABELS;
        }
        if !self.notransclude {
            extensions |= Extensions::TRANSCLUDE;
        }
        if self.random {
            extensions |= Extensions::RANDOM_FOOT;
        }
        if self.unique {
            extensions |= Extensions::RANDOM_LABELS;
        }
        extensions
    }

    fn format(&self) -> Result<OutputFormat> {
        match OutputFormat::from_name(&self.to) {
            Some(format) => Ok(format),
            None => match self.to.to_ascii_lowercase().as_str() {
                "odt" | "fodt" | "epub" | "bundle" | "bundlezip" | "opml" | "itmz" | "rtf" => {
                    bail!("output format '{}' is not supported by this build", self.to)
                }
                other => bail!("unknown output format '{}'", other),
            },
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("mmd: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let format = args.format()?;
    let extensions = args.extensions();
    let language = Language::from_code(&args.lang)
        .with_context(|| format!("unknown language code '{}'", args.lang))?;

    if args.batch {
        if args.input.is_empty() {
            bail!("batch mode requires input files");
        }
        for path in &args.input {
            let text = read_input(Some(path))?;
            let engine = Engine::with_options(&text, extensions, language, 0);
            if let Some(output) = metadata_query(&args, &engine) {
                print!("{}", output);
                continue;
            }
            let result = engine.render(format);
            report_diagnostics(&result.diagnostics);
            let output_path = path.with_extension(format.file_extension());
            fs::write(&output_path, result.text)
                .with_context(|| format!("cannot write {}", output_path.display()))?;
        }
        return Ok(());
    }

    // Non-batch: all inputs concatenate into one document.
    let mut text = String::new();
    if args.input.is_empty() {
        text = read_input(None)?;
    } else {
        for path in &args.input {
            text.push_str(&read_input(Some(path))?);
        }
    }

    let engine = Engine::with_options(&text, extensions, language, 0);
    if let Some(output) = metadata_query(&args, &engine) {
        print!("{}", output);
        return Ok(());
    }

    let result = engine.render(format);
    report_diagnostics(&result.diagnostics);
    write_output(args.output.as_deref(), &result.text)
}

fn metadata_query(args: &Args, engine: &Engine) -> Option<String> {
    if args.metadata_keys {
        let mut keys = String::new();
        for item in engine.metadata() {
            keys.push_str(&item.key);
            keys.push('\n');
        }
        return Some(keys);
    }
    if let Some(key) = &args.extract {
        let mut value = engine.metadata_value(key).unwrap_or("").to_string();
        value.push('\n');
        return Some(value);
    }
    None
}

fn read_input(path: Option<&Path>) -> Result<String> {
    let bytes = match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("cannot read {}", path.display()))?
        }
        None => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .context("cannot read stdin")?;
            bytes
        }
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?
        }
        _ => io::stdout()
            .write_all(text.as_bytes())
            .context("cannot write stdout")?,
    }
    Ok(())
}

fn report_diagnostics(diagnostics: &[mmd::Diagnostic]) {
    for diagnostic in diagnostics {
        log::warn!("{}", diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("mmd").chain(args.iter().copied()))
    }

    #[test]
    fn default_format_is_html() {
        let args = parse_args(&[]);
        assert_eq!(args.format().unwrap(), OutputFormat::Html);
    }

    #[test]
    fn known_but_unsupported_formats_error() {
        let args = parse_args(&["-t", "epub"]);
        let error = args.format().unwrap_err().to_string();
        assert!(error.contains("not supported"));
    }

    #[test]
    fn unknown_format_errors() {
        let args = parse_args(&["-t", "docx"]);
        assert!(args.format().is_err());
    }

    #[test]
    fn compatibility_clears_the_extension_set() {
        let extensions = parse_args(&["-c"]).extensions();
        assert!(extensions.contains(Extensions::COMPATIBILITY));
        assert!(!extensions.contains(Extensions::SMART));
    }

    #[test]
    fn accept_and_reject_set_critic_modes() {
        assert!(parse_args(&["-a"])
            .extensions()
            .contains(Extensions::CRITIC_ACCEPT));
        assert!(parse_args(&["-r"])
            .extensions()
            .contains(Extensions::CRITIC_REJECT));
    }

    #[test]
    fn nosmart_drops_smart() {
        assert!(!parse_args(&["--nosmart"])
            .extensions()
            .contains(Extensions::SMART));
    }

    #[test]
    fn batch_mode_writes_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# Hello\n").unwrap();

        let mut args = parse_args(&["-b"]);
        args.input = vec![input.clone()];
        run(args).unwrap();

        let output = fs::read_to_string(dir.path().join("doc.html")).unwrap();
        assert!(output.contains("<h1 id=\"hello\">Hello</h1>"));
    }

    #[test]
    fn batch_mode_without_inputs_fails() {
        let args = parse_args(&["-b"]);
        assert!(run(args).is_err());
    }

    #[test]
    fn metadata_extraction_query() {
        let engine = Engine::new("title: The Doc\n\nBody\n", Extensions::standard());
        let args = parse_args(&["-e", "title"]);
        assert_eq!(metadata_query(&args, &engine).unwrap(), "The Doc\n");

        let args = parse_args(&["-m"]);
        assert_eq!(metadata_query(&args, &engine).unwrap(), "title\n");
    }
}
