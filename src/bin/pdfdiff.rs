//! CLI binary for pdfdiff.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DiffConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfdiff::{
    compare, ComparisonOutput, ComparisonProgressCallback, DiffConfig, Orientation, PrintSize,
    ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page job. Jobs complete out of order, so lines carry the job index.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_comparison_start` reports the total.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDFs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} ops  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Comparing");
        self.bar.reset_eta();
    }
}

impl ComparisonProgressCallback for CliProgressCallback {
    fn on_comparison_start(&self, total_ops: usize) {
        self.activate_bar(total_ops);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting comparison ({total_ops} operations)…"))
        ));
    }

    fn on_page_complete(&self, index: usize, aligned_index: usize, percent: f64) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            green("✓"),
            index + 1,
            dim(&format!("→ differences_{aligned_index}.png")),
            dim(&format!("{percent:.2}%")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, index: usize, error: &str, percent: f64) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            red("✗"),
            index + 1,
            red(&msg),
            dim(&format!("{percent:.2}%")),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: &str, percent: f64) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            bold(stage),
            dim(&format!("{percent:.2}%"))
        ));
        if stage != "side-by-side" {
            self.bar.inc(1);
        }
    }

    fn on_comparison_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        let total = succeeded + failed;

        if failed == 0 {
            eprintln!(
                "{} {} pages compared successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages compared  ({} failed)",
                cyan("⚠"),
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Per-page difference images in the current directory
  pdfdiff old.pdf new.pdf

  # Merge the differences into one A4 PDF and remove the images
  pdfdiff --merge --clean --printsize A4 old.pdf new.pdf

  # new.pdf has 2 extra pages inserted after page 3 of old.pdf
  pdfdiff --merge --offset 2 --startoffset 3 old.pdf new.pdf

  # Side-by-side comparison, pages stacked vertically
  pdfdiff --sidebyside --verticalalign -o report.pdf old.pdf new.pdf

  # Machine-readable report
  pdfdiff --merge --json old.pdf new.pdf > report.json

COLOURS:
  red    the first document is brighter at this pixel (content removed)
  blue   the second document is brighter or equally bright (content added)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium when it is not installed system-wide
  RUST_LOG                Override the log filter (e.g. pdfdiff=debug)
"#;

/// Visually compare two PDF files page by page.
#[derive(Parser, Debug)]
#[command(
    name = "pdfdiff",
    version,
    about = "Visually compare two PDF files page by page",
    long_about = "Render two PDF documents and compare them pixel by pixel. Each page pair \
produces a difference image where changed pixels are painted red or blue; the images can be \
merged into a single PDF and the two versions shown side by side.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// The first (reference) PDF.
    first: PathBuf,

    /// The second PDF, compared against the first.
    second: PathBuf,

    /// Merge the difference images into a single PDF.
    #[arg(long, env = "PDFDIFF_MERGE")]
    merge: bool,

    /// Remove the difference images after processing.
    #[arg(long, env = "PDFDIFF_CLEAN")]
    clean: bool,

    /// Number of pages inserted in the second PDF.
    #[arg(long, env = "PDFDIFF_OFFSET", default_value_t = 0)]
    offset: usize,

    /// 0-based page of the first PDF from which the offset applies.
    #[arg(long = "startoffset", env = "PDFDIFF_START_OFFSET", default_value_t = 0)]
    start_offset: usize,

    /// Merged PDF orientation: P or L. Detected from the first page when unset.
    #[arg(long, env = "PDFDIFF_ORIENTATION", value_enum, ignore_case = true)]
    orientation: Option<OrientationArg>,

    /// Merged PDF paper size: A4, A3, A2, A1 or A0.
    #[arg(long = "printsize", env = "PDFDIFF_PRINT_SIZE", value_enum, ignore_case = true,
          default_value = "A3")]
    print_size: PrintSizeArg,

    /// Merged PDF path. The side-by-side PDF is written next to it as combined_<name>.
    #[arg(short, long, env = "PDFDIFF_OUTPUT", default_value = "differences.pdf")]
    output: PathBuf,

    /// Number of concurrent page workers. Default: number of CPUs.
    #[arg(short, long, env = "PDFDIFF_WORKERS")]
    workers: Option<usize>,

    /// Also create a side-by-side comparison PDF.
    #[arg(long = "sidebyside", env = "PDFDIFF_SIDE_BY_SIDE")]
    side_by_side: bool,

    /// Stack the two pages vertically in side-by-side images.
    #[arg(long = "verticalalign", env = "PDFDIFF_VERTICAL_ALIGN")]
    vertical_align: bool,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDFDIFF_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Directory for the per-page images.
    #[arg(long, env = "PDFDIFF_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// PDF user password, tried on both documents.
    #[arg(long, env = "PDFDIFF_PASSWORD")]
    password: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long = "pdfium-lib", env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the structured JSON report (ComparisonOutput) on stdout.
    #[arg(long, env = "PDFDIFF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFDIFF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFDIFF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFDIFF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    #[value(name = "P")]
    Portrait,
    #[value(name = "L")]
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PrintSizeArg {
    A4,
    A3,
    A2,
    A1,
    A0,
}

impl From<PrintSizeArg> for PrintSize {
    fn from(v: PrintSizeArg) -> Self {
        match v {
            PrintSizeArg::A4 => PrintSize::A4,
            PrintSizeArg::A3 => PrintSize::A3,
            PrintSizeArg::A2 => PrintSize::A2,
            PrintSizeArg::A1 => PrintSize::A1,
            PrintSizeArg::A0 => PrintSize::A0,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ComparisonProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run comparison ───────────────────────────────────────────────────
    let output = compare(&cli.first, &cli.second, &config)
        .await
        .context("Comparison failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

/// Map CLI args to `DiffConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DiffConfig> {
    let mut builder = DiffConfig::builder()
        .merge(cli.merge)
        .clean(cli.clean)
        .offset(cli.offset)
        .start_offset(cli.start_offset)
        .orientation(cli.orientation.map(Orientation::from))
        .print_size(cli.print_size.into())
        .output(&cli.output)
        .side_by_side(cli.side_by_side)
        .vertical_align(cli.vertical_align)
        .dpi(cli.dpi)
        .work_dir(&cli.work_dir);

    if let Some(n) = cli.workers {
        builder = builder.workers(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &ComparisonOutput, show_progress: bool) {
    let stats = &output.stats;

    // The progress callback already printed the final tick.
    if !show_progress {
        eprintln!(
            "Compared {}/{} pages in {}ms",
            stats.succeeded, stats.jobs, stats.total_duration_ms
        );
        if stats.failed > 0 {
            eprintln!("  {} pages failed", stats.failed);
        }
    }

    eprintln!(
        "   {} of {} pages differ  —  {}ms total",
        bold(&stats.changed_pages.to_string()),
        stats.jobs,
        stats.total_duration_ms,
    );
    for failure in output.failures() {
        if let Some(ref e) = failure.error {
            eprintln!("   {} page {}: {}", red("✗"), failure.index + 1, e);
        }
    }
    if let Some(ref merged) = output.merged {
        eprintln!(
            "The difference images have been merged into {}",
            bold(&merged.path.display().to_string())
        );
    }
    if let Some(ref combined) = output.side_by_side {
        eprintln!(
            "The combined images have been merged into {}",
            bold(&combined.path.display().to_string())
        );
    }
    if stats.missing_artifacts > 0 {
        eprintln!(
            "   {}",
            dim(&format!("{} page images were missing", stats.missing_artifacts))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(["pdfdiff", "a.pdf", "b.pdf"].iter().chain(args)).unwrap()
    }

    #[test]
    fn orientation_and_print_size_map_to_config() {
        let cli = parse(&["--orientation", "l", "--printsize", "a4"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.orientation, Some(Orientation::Landscape));
        assert_eq!(config.print_size, PrintSize::A4);
    }

    #[test]
    fn print_size_defaults_to_a3_and_orientation_to_detection() {
        let config = build_config(&parse(&[]), None).unwrap();
        assert_eq!(config.print_size, PrintSize::A3);
        assert_eq!(config.orientation, None);
    }

    #[test]
    fn unknown_choices_are_rejected_by_the_parser() {
        for args in [["--orientation", "X"], ["--printsize", "B5"]] {
            let argv = ["pdfdiff", "a.pdf", "b.pdf"].into_iter().chain(args);
            assert!(Cli::try_parse_from(argv).is_err());
        }
    }
}
