use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use calllog_to_csv::{
    CarrierResolver, DEFAULT_CARRIER_URL, ExtractionReport, HttpCarrierLookup, RetryPolicy,
    ScanOptions, Whitelist, extract_pdf_to_csv, write_carriers,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "calls2csv",
    version,
    about = "Extract one number's short calls from a call-log PDF into CSV"
)]
struct Cli {
    /// Call-log PDF to scan.
    #[arg(long = "pdf", env = "PDF_PATH")]
    pdf_path: PathBuf,

    /// Number whose call sections are extracted, as printed in the document.
    #[arg(long, env = "SEARCH_NUMBER")]
    search_number: String,

    /// Literal text of each section's column-header row.
    #[arg(long, env = "SEARCH_KEY")]
    search_key: String,

    /// Pages scanned for section markers.
    #[arg(long, env = "MAX_SEARCH_PAGES", default_value_t = 100)]
    max_pages: u32,

    /// Rows above a header row that carry the section's number.
    #[arg(long, env = "SECTION_HEADER_ROWS")]
    section_header_rows: usize,

    /// Rows between the end of one section and the next header row.
    #[arg(long, env = "ROWS_BETWEEN_SECTIONS", default_value_t = 5)]
    rows_between_sections: usize,

    /// Comma-separated numbers whose calls are never exported.
    #[arg(long, env = "WHITELISTED_NUMBERS")]
    whitelist: Option<Whitelist>,

    /// Directory receiving the CSV files.
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Look up the carrier of every exported number.
    #[arg(long, requires = "api_key")]
    carriers: bool,

    /// Access key for the number-validation service.
    #[arg(long, env = "CARRIER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number-validation endpoint.
    #[arg(long, env = "CARRIER_API_URL", default_value = DEFAULT_CARRIER_URL)]
    carrier_url: String,

    /// Enable debug logging and per-warning output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            pdf_path: self.pdf_path.clone(),
            search_number: self.search_number.clone(),
            search_key: self.search_key.clone(),
            max_pages: self.max_pages,
            section_header_rows: self.section_header_rows,
            rows_between_sections: self.rows_between_sections,
            whitelist: self.whitelist.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

fn log_report(report: &ExtractionReport, verbose: bool) {
    eprintln!(
        "wrote {} call(s) from pages {}-{} to {}",
        report.row_count,
        report.bounds.start_page,
        report.bounds.end_page,
        report.output_path.display()
    );
    if report.warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} page={:?} iterations={:?} rows={:?}: {}",
                warning.code, warning.page, warning.iterations, warning.rows, warning.message
            );
        }
    }
}

fn run_carriers(
    cli: &Cli,
    options: &ScanOptions,
    report: &mut ExtractionReport,
) -> Result<()> {
    let api_key = cli
        .api_key
        .as_deref()
        .context("--carriers needs --api-key or CARRIER_API_KEY")?;
    let lookup = HttpCarrierLookup::new(&cli.carrier_url, api_key)
        .context("failed to configure carrier lookup")?;
    let resolver = CarrierResolver::new(lookup, RetryPolicy::default());

    let carriers = resolver
        .resolve(&report.numbers, &mut report.warnings)
        .context("carrier resolution aborted")?;
    let path = options.output_path("_carriers");
    write_carriers(&path, &carriers)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    info!(numbers = carriers.len(), path = %path.display(), "exported carriers");
    Ok(())
}

fn run(cli: &Cli) -> Result<ExtractionReport> {
    let options = cli.scan_options();
    let mut report = extract_pdf_to_csv(&options).with_context(|| {
        format!(
            "failed to extract calls for {} from '{}'",
            options.search_number,
            options.pdf_path.display()
        )
    })?;
    if cli.carriers {
        run_carriers(cli, &options, &mut report)?;
    }
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "calllog_to_csv=debug,calls2csv=debug"
    } else {
        "calllog_to_csv=info,calls2csv=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(&cli) {
        Ok(report) => {
            log_report(&report, cli.verbose);
            if report.row_count > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
