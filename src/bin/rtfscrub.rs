//! CLI binary for rtfscrub.
//!
//! A thin shim over the library crate that maps CLI flags to `ScrubConfig`,
//! scrubs each input and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rtfscrub::{
    flatten_alpha, scrub_bytes, scrub_files, to_ascii, to_data_uri, write_image, ExtractedImage,
    Extraction, ImageMatch, ProgressCallback, ScrubConfig, ScrubProgressCallback, Scrubber,
};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for batch runs. Files finish out of order, so each
/// completion is logged as its own line above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    images: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Scrubbing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            images: AtomicUsize::new(0),
        })
    }
}

impl ScrubProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
    }

    fn on_file_start(&self, path: &Path) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_file_complete(&self, path: &Path, text_len: usize, has_image: bool) {
        if has_image {
            self.images.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.println(format!(
            "  {} {:<40}  {}{}",
            green("✓"),
            path.display(),
            dim(&format!("{text_len:>6} chars")),
            if has_image { cyan("  + image") } else { String::new() },
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, path: &Path, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:<40}  {}",
            red("✗"),
            path.display(),
            red(first_line)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();
        let images = self.images.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} files scrubbed  {}",
                green("✔"),
                bold(&success_count.to_string()),
                dim(&format!("({images} with images)"))
            );
        } else {
            eprintln!(
                "{} {}/{} files scrubbed  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Display text of one fragment
  rtfscrub note.rtf

  # Read from stdin, strict ASCII output
  cat note.rtf | rtfscrub --ascii -

  # Save embedded pictures next to the text, flattened onto white
  rtfscrub --image-dir images/ --flatten exports/*.rtf

  # Embed the picture as a data URI after the text
  rtfscrub --data-uri note.rtf

  # What did the engine find, and how?
  rtfscrub --inspect --json note.rtf

  # Treat less text as noise
  rtfscrub --legibility-ratio 0.3 dump.rtf

OUTPUT:
  Text goes to stdout. With several inputs each one is preceded by a
  "==> path <==" header. Progress and logs go to stderr.

  Results degraded by a fallback path are still printed; run with --json
  to see the reasons (input_truncated, simplified_strip, pass_through,
  noise_recovered).

ENVIRONMENT VARIABLES:
  RTFSCRUB_ASCII             Same as --ascii
  RTFSCRUB_IMAGE_DIR         Same as --image-dir
  RTFSCRUB_FLATTEN           Same as --flatten
  RTFSCRUB_DATA_URI          Same as --data-uri
  RTFSCRUB_INSPECT           Same as --inspect
  RTFSCRUB_JSON              Same as --json
  RTFSCRUB_CONCURRENCY       Same as --concurrency
  RTFSCRUB_LEGIBILITY_RATIO  Same as --legibility-ratio
  RTFSCRUB_MAX_INPUT_BYTES   Same as --max-input-bytes
  RUST_LOG                   Override log filter (e.g. rtfscrub=debug)
"#;

/// Extract display text and embedded pictures from RTF fragments.
#[derive(Parser, Debug)]
#[command(
    name = "rtfscrub",
    version,
    about = "Extract display text and embedded pictures from RTF fragments",
    long_about = "Extract clean display text and embedded PNG/JPEG pictures from legacy \
rich-text (RTF) fragments, including fragments with mixed encodings, leaked binary \
payloads and broken group structure.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files; `-` reads from stdin.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Render text using printable ASCII only.
    #[arg(long, env = "RTFSCRUB_ASCII")]
    ascii: bool,

    /// Write each found picture to DIR/<stem>.<ext>.
    #[arg(long, env = "RTFSCRUB_IMAGE_DIR", value_name = "DIR")]
    image_dir: Option<PathBuf>,

    /// Composite transparent PNGs onto white before output.
    #[arg(long, env = "RTFSCRUB_FLATTEN")]
    flatten: bool,

    /// Print each found picture as a data URI after the text.
    #[arg(long, env = "RTFSCRUB_DATA_URI")]
    data_uri: bool,

    /// Print a per-file report instead of the text.
    #[arg(long, env = "RTFSCRUB_INSPECT")]
    inspect: bool,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "RTFSCRUB_JSON")]
    json: bool,

    /// Number of files processed in parallel.
    #[arg(short, long, env = "RTFSCRUB_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Fraction of legible characters below which text is treated as noise (0.0–1.0).
    #[arg(long, env = "RTFSCRUB_LEGIBILITY_RATIO", default_value_t = 0.45)]
    legibility_ratio: f64,

    /// Largest fragment scanned, in bytes.
    #[arg(long, env = "RTFSCRUB_MAX_INPUT_BYTES", default_value_t = 8 * 1024 * 1024)]
    max_input_bytes: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RTFSCRUB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RTFSCRUB_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "RTFSCRUB_NO_PROGRESS")]
    no_progress: bool,
}

/// One input's result as printed by `--json`.
#[derive(Serialize)]
struct FileOutput {
    path: String,
    #[serde(flatten)]
    text: Extraction<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImageOutput>,
}

#[derive(Serialize)]
struct ImageOutput {
    mime: String,
    len: usize,
    strategy: rtfscrub::ImageStrategy,
    offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_uri: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let reads_stdin = cli.inputs.iter().any(|i| i == "-");
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.inspect
        && cli.inputs.len() > 1
        && !reads_stdin;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ScrubProgressCallback>)
    } else {
        None
    };
    let scrubber = Arc::new(build_scrubber(&cli, progress_cb)?);

    // ── Inspect mode ─────────────────────────────────────────────────────
    if cli.inspect {
        return run_inspect(&cli, &scrubber).await;
    }

    // ── Scrub ────────────────────────────────────────────────────────────
    let mut outputs: Vec<FileOutput> = Vec::with_capacity(cli.inputs.len());
    let mut failures = 0usize;
    let mut image_names: HashSet<PathBuf> = HashSet::new();

    if reads_stdin {
        let bytes = read_stdin().await?;
        for input in &cli.inputs {
            let result = if input == "-" {
                scrub_bytes(PathBuf::from("-"), bytes.clone(), &scrubber).await
            } else {
                rtfscrub::scrub_file(input, &scrubber).await
            };
            match result {
                Ok(done) => {
                    let out = finish(&cli, input, done.text, done.image, &mut image_names).await?;
                    outputs.push(out);
                }
                Err(e) => {
                    failures += 1;
                    eprintln!("{} {}", red("✗"), e);
                }
            }
        }
    } else {
        let paths: Vec<PathBuf> = cli.inputs.iter().map(PathBuf::from).collect();
        let results = scrub_files(paths, Arc::clone(&scrubber)).await;
        for (input, result) in cli.inputs.iter().zip(results) {
            match result {
                Ok(done) => {
                    let out = finish(&cli, input, done.text, done.image, &mut image_names).await?;
                    outputs.push(out);
                }
                Err(e) => {
                    failures += 1;
                    if !show_progress {
                        eprintln!("{} {}", red("✗"), e);
                    }
                }
            }
        }
    }

    // ── Print ────────────────────────────────────────────────────────────
    if cli.json {
        let json = if outputs.len() == 1 && cli.inputs.len() == 1 {
            serde_json::to_string_pretty(&outputs[0])
        } else {
            serde_json::to_string_pretty(&outputs)
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_text(&cli, &outputs)?;
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} inputs could not be read", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args to a `Scrubber`.
fn build_scrubber(cli: &Cli, progress: Option<ProgressCallback>) -> Result<Scrubber> {
    let mut builder = ScrubConfig::builder()
        .concurrency(cli.concurrency)
        .legibility_ratio(cli.legibility_ratio)
        .max_input_bytes(cli.max_input_bytes);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;
    Scrubber::new(config).context("Invalid configuration")
}

async fn read_stdin() -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buf)
        .await
        .context("Failed to read stdin")?;
    Ok(buf)
}

async fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        read_stdin().await
    } else {
        tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {input}"))
    }
}

/// Apply `--ascii`, `--flatten`, `--image-dir` and `--data-uri` to one result.
async fn finish(
    cli: &Cli,
    input: &str,
    text: Extraction<String>,
    image: Option<ImageMatch>,
    image_names: &mut HashSet<PathBuf>,
) -> Result<FileOutput> {
    let text = if cli.ascii {
        match text {
            Extraction::Success { value } => Extraction::Success {
                value: to_ascii(&value),
            },
            Extraction::Degraded { value, reasons } => Extraction::Degraded {
                value: to_ascii(&value),
                reasons,
            },
            Extraction::Empty => Extraction::Empty,
        }
    } else {
        text
    };

    let image = match image {
        Some(found) => Some(save_image(cli, input, found, image_names).await?),
        None => None,
    };

    Ok(FileOutput {
        path: input.to_string(),
        text,
        image,
    })
}

async fn save_image(
    cli: &Cli,
    input: &str,
    found: ImageMatch,
    image_names: &mut HashSet<PathBuf>,
) -> Result<ImageOutput> {
    let image: ExtractedImage = if cli.flatten {
        match flatten_alpha(&found.image) {
            Ok(flat) => flat,
            Err(e) => {
                tracing::warn!("Could not flatten image from {input}: {e}");
                found.image.clone()
            }
        }
    } else {
        found.image.clone()
    };

    let file = match &cli.image_dir {
        Some(dir) => {
            let path = image_path(dir, input, image.mime().extension(), image_names);
            write_image(&path, &image)
                .await
                .with_context(|| format!("Failed to save image from {input}"))?;
            Some(path)
        }
        None => None,
    };

    Ok(ImageOutput {
        mime: image.mime().to_string(),
        len: image.len(),
        strategy: found.strategy,
        offset: found.offset,
        file,
        data_uri: cli.data_uri.then(|| to_data_uri(&image)),
    })
}

/// `DIR/<stem>.<ext>`, suffixed `-2`, `-3`, ... when an earlier input in this
/// run already claimed the name.
fn image_path(dir: &Path, input: &str, ext: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let stem = Path::new(input)
        .file_stem()
        .filter(|_| input != "-")
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string());
    let mut path = dir.join(format!("{stem}.{ext}"));
    let mut n = 2;
    while taken.contains(&path) {
        path = dir.join(format!("{stem}-{n}.{ext}"));
        n += 1;
    }
    if n > 2 {
        tracing::warn!("Image name for {input} already used; writing {}", path.display());
    }
    taken.insert(path.clone());
    path
}

fn print_text(cli: &Cli, outputs: &[FileOutput]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let with_headers = cli.inputs.len() > 1;

    for (i, out) in outputs.iter().enumerate() {
        if with_headers {
            if i > 0 {
                writeln!(handle).context("Failed to write to stdout")?;
            }
            writeln!(handle, "==> {} <==", out.path).context("Failed to write to stdout")?;
        }
        if let Some(text) = out.text.value() {
            writeln!(handle, "{text}").context("Failed to write to stdout")?;
        }
        if let Some(uri) = out.image.as_ref().and_then(|img| img.data_uri.as_deref()) {
            writeln!(handle, "{uri}").context("Failed to write to stdout")?;
        }
        if !cli.quiet && out.text.is_degraded() {
            let reasons: Vec<String> = out.text.reasons().iter().map(|r| r.to_string()).collect();
            eprintln!("{} {}: {}", cyan("⚠"), out.path, dim(&reasons.join("; ")));
        }
        if !cli.quiet {
            if let Some(file) = out.image.as_ref().and_then(|img| img.file.as_ref()) {
                eprintln!("{} image → {}", green("✓"), bold(&file.display().to_string()));
            }
        }
    }
    Ok(())
}

/// `--inspect`: a report per input, read sequentially.
async fn run_inspect(cli: &Cli, scrubber: &Scrubber) -> Result<()> {
    let mut reports = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let bytes = read_input(input).await?;
        reports.push((input.as_str(), scrubber.inspect(&bytes)));
    }

    if cli.json {
        let list: Vec<_> = reports
            .iter()
            .map(|(path, report)| serde_json::json!({ "path": path, "report": report }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&list).context("Failed to serialize report")?
        );
        return Ok(());
    }

    for (path, report) in &reports {
        println!("File:         {path}");
        println!("Size:         {} bytes", report.input_len);
        println!("Markup:       {}", report.is_markup);
        let status = match &report.text {
            Extraction::Success { value } => format!("ok ({} chars)", value.chars().count()),
            Extraction::Empty => "empty".to_string(),
            Extraction::Degraded { value, reasons } => format!(
                "degraded ({} chars): {}",
                value.chars().count(),
                reasons
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        };
        println!("Text:         {status}");
        match &report.image {
            Some(img) => {
                println!("Image:        {} ({} bytes)", img.mime, img.len);
                println!("  Strategy:   {:?} at offset {}", img.strategy, img.offset);
                match &img.info {
                    Some(info) => println!(
                        "  Decoded:    {}x{}{}",
                        info.width,
                        info.height,
                        if info.has_alpha { ", alpha" } else { "" }
                    ),
                    None => println!("  Decoded:    {}", red("codec rejected payload")),
                }
            }
            None => println!("Image:        none"),
        }
        println!();
    }
    Ok(())
}
