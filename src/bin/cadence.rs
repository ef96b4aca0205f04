//! Cadence CLI - Command-line interface for Cadence Flux
//!
//! Commands:
//! - classify: Normalize timestamps and classify entity cadence (batch mode)
//! - normalize: Normalize individual timestamp values
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cadence_flux::normalizer::TimestampNormalizer;
use cadence_flux::pipeline::CadenceProcessor;
use cadence_flux::schema::RecordAdapter;
use cadence_flux::types::CanonicalFormat;
use cadence_flux::{
    CadenceConfig, CadenceError, FeedMatcher, RecordFormat, ReportEncoder, SlaChecker,
    FLUX_VERSION, PRODUCER_NAME,
};
use chrono::{DateTime, Utc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Cadence - Timestamp normalization and activity-cadence classification
#[derive(Parser)]
#[command(name = "cadence")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Normalize messy timestamps and classify entity activity cadence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize timestamps and classify entity cadence (batch mode)
    Classify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "csv")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// Config file (JSON) with streak thresholds and column names
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run clock as RFC 3339 (defaults to the current time)
        #[arg(long)]
        now: Option<String>,

        /// Display form of the utc column
        #[arg(long, default_value = "coarse")]
        utc_format: UtcFormat,

        /// Write unmatched timestamps to this file
        #[arg(long)]
        unmatched: Option<PathBuf>,

        /// Write the parse error log to this file
        #[arg(long)]
        error_log: Option<PathBuf>,

        /// Write a JSON run summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Feed arrivals (CSV) to check record SLAs against
        #[arg(long, requires = "feed_mapping")]
        feeds: Option<PathBuf>,

        /// Feed-to-entity mapping table (CSV of regex patterns)
        #[arg(long, requires = "feeds")]
        feed_mapping: Option<PathBuf>,

        /// Write the per-record SLA report to this file (output format applies)
        #[arg(long, requires = "feeds")]
        sla_report: Option<PathBuf>,
    },

    /// Normalize individual timestamp values
    Normalize {
        /// Raw timestamp values
        #[arg(required = true)]
        values: Vec<String>,

        /// Display form of the normalized instant
        #[arg(long, default_value = "iso")]
        utc_format: UtcFormat,

        /// Skip the dotted meridiem pattern (D-MON-YY H.MM.SS.ffff AM)
        #[arg(long)]
        standard: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check feed mapping file
        #[arg(long)]
        feed_mapping: Option<PathBuf>,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Newline-delimited JSON objects
    Ndjson,
    /// JSON array of objects
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Csv,
    Ndjson,
    Json,
    JsonPretty,
}

impl From<OutputFormat> for RecordFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => RecordFormat::Csv,
            OutputFormat::Ndjson => RecordFormat::Ndjson,
            OutputFormat::Json => RecordFormat::Json,
            OutputFormat::JsonPretty => RecordFormat::JsonPretty,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum UtcFormat {
    /// DD-MM-YYYY-HH-mm
    Coarse,
    /// ISO-8601 with milliseconds
    Iso,
}

impl From<UtcFormat> for CanonicalFormat {
    fn from(format: UtcFormat) -> Self {
        match format {
            UtcFormat::Coarse => CanonicalFormat::Coarse,
            UtcFormat::Iso => CanonicalFormat::Iso,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CadenceCliError> {
    match cli.command {
        Commands::Classify {
            input,
            output,
            input_format,
            output_format,
            config,
            now,
            utc_format,
            unmatched,
            error_log,
            summary,
            feeds,
            feed_mapping,
            sla_report,
        } => cmd_classify(ClassifyArgs {
            input: &input,
            output: &output,
            input_format,
            output_format: output_format.into(),
            config: config.as_deref(),
            now: now.as_deref(),
            utc_format: utc_format.into(),
            unmatched: unmatched.as_deref(),
            error_log: error_log.as_deref(),
            summary: summary.as_deref(),
            feeds: feeds.as_deref(),
            feed_mapping: feed_mapping.as_deref(),
            sla_report: sla_report.as_deref(),
        }),

        Commands::Normalize {
            values,
            utc_format,
            standard,
            json,
        } => cmd_normalize(&values, utc_format.into(), standard, json),

        Commands::Doctor {
            config,
            feed_mapping,
            json,
        } => cmd_doctor(config.as_deref(), feed_mapping.as_deref(), json),
    }
}

struct ClassifyArgs<'a> {
    input: &'a Path,
    output: &'a Path,
    input_format: InputFormat,
    output_format: RecordFormat,
    config: Option<&'a Path>,
    now: Option<&'a str>,
    utc_format: CanonicalFormat,
    unmatched: Option<&'a Path>,
    error_log: Option<&'a Path>,
    summary: Option<&'a Path>,
    feeds: Option<&'a Path>,
    feed_mapping: Option<&'a Path>,
    sla_report: Option<&'a Path>,
}

fn cmd_classify(args: ClassifyArgs<'_>) -> Result<(), CadenceCliError> {
    let config = match args.config {
        Some(path) => CadenceConfig::load(path)?,
        None => CadenceConfig::default(),
    };
    let now = parse_now(args.now)?;

    let mut processor =
        CadenceProcessor::new(config.clone(), now).with_utc_format(args.utc_format);

    if let (Some(feeds), Some(mapping)) = (args.feeds, args.feed_mapping) {
        let matcher = FeedMatcher::from_csv(File::open(mapping)?, &config.feed_columns)?;
        let matched = matcher.match_arrivals(
            File::open(feeds)?,
            &config.feed_columns,
            &TimestampNormalizer::with_dotted_meridiem(),
        )?;
        processor = processor.with_sla(SlaChecker::new(config.sla_hours, &matched.arrivals));
    }

    info!(
        now = %now,
        window_start = %processor.classifier().window_start(),
        "starting cadence run"
    );

    let report = match args.input_format {
        InputFormat::Csv => {
            let reader = open_input(args.input)?;
            let records = RecordAdapter::csv_records(reader, &config.columns)?;
            processor.process(records)
        }
        InputFormat::Ndjson => {
            let data = read_input(args.input)?;
            processor.process(RecordAdapter::ndjson_records(&data, &config.columns))
        }
        InputFormat::Json => {
            let data = read_input(args.input)?;
            processor.process(RecordAdapter::json_records(&data, &config.columns))
        }
    };

    // Results for ingested records are flushed even when the source failed
    let writer = open_output(args.output)?;
    ReportEncoder::write_records(writer, &report.records, args.output_format)?;

    if let Some(path) = args.unmatched {
        fs::write(path, ReportEncoder::encode_unmatched(&report.unmatched))?;
    }
    if let Some(path) = args.error_log {
        fs::write(path, ReportEncoder::encode_error_log(&report.error_log))?;
    }
    if let Some(path) = args.summary {
        fs::write(path, serde_json::to_string_pretty(&report.summary())?)?;
    }
    if let (Some(path), Some(sla)) = (args.sla_report, &report.sla) {
        ReportEncoder::write_sla(open_output(path)?, &sla.records, args.output_format)?;
    }

    match report.source_error {
        Some(message) => Err(CadenceCliError::SourceFailed(message)),
        None => Ok(()),
    }
}

fn cmd_normalize(
    values: &[String],
    utc_format: CanonicalFormat,
    standard: bool,
    json: bool,
) -> Result<(), CadenceCliError> {
    let normalizer = if standard {
        TimestampNormalizer::standard()
    } else {
        TimestampNormalizer::with_dotted_meridiem()
    };

    let results: Vec<NormalizeResult> = values
        .iter()
        .map(|value| match normalizer.normalize(Some(value.as_str())) {
            Ok(parsed) => NormalizeResult {
                input: value.clone(),
                utc: Some(parsed.render(utc_format)),
                strategy: Some(parsed.strategy.to_string()),
                error: None,
            },
            Err(failure) => NormalizeResult {
                input: value.clone(),
                utc: None,
                strategy: None,
                error: Some(failure.to_string()),
            },
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            match (&result.utc, &result.strategy, &result.error) {
                (Some(utc), Some(strategy), _) => {
                    println!("{}\t{}\t({})", result.input, utc, strategy)
                }
                (_, _, error) => println!(
                    "{}\t<failed: {}>",
                    result.input,
                    error.as_deref().unwrap_or("unknown")
                ),
            }
        }
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        Err(CadenceCliError::NormalizeFailed(failed))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    feed_mapping: Option<&Path>,
    json: bool,
) -> Result<(), CadenceCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();
    let mut feed_columns = CadenceConfig::default().feed_columns;

    // Check Flux version
    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Cadence Flux version {}", FLUX_VERSION),
    });

    // Check timestamp strategy order
    checks.push(DoctorCheck {
        name: "parse_strategies".to_string(),
        status: CheckStatus::Ok,
        message: TimestampNormalizer::with_dotted_meridiem()
            .strategy_names()
            .join(" -> "),
    });

    // Check config file if provided
    if let Some(config_path) = config {
        if config_path.exists() {
            match CadenceConfig::load(config_path) {
                Ok(config) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid ({} month window, {}-week / {}-month streaks, {}h SLA, columns {}/{}/{})",
                            config.trailing_months,
                            config.streak_weeks,
                            config.streak_months,
                            config.sla_hours,
                            config.columns.id,
                            config.columns.name,
                            config.columns.timestamp
                        ),
                    });
                    feed_columns = config.feed_columns;
                }
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist; defaults will be used".to_string(),
            });
        }
    }

    // Check feed mapping patterns compile
    if let Some(mapping_path) = feed_mapping {
        let check = match File::open(mapping_path) {
            Ok(file) => match FeedMatcher::from_csv(file, &feed_columns) {
                Ok(matcher) => DoctorCheck {
                    name: "feed_mapping".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Feed mapping valid ({} patterns)", matcher.len()),
                },
                Err(e) => DoctorCheck {
                    name: "feed_mapping".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            Err(e) => DoctorCheck {
                name: "feed_mapping".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read feed mapping: {}", e),
            },
        };
        checks.push(check);
    }

    // Check stdin is available (for --input -)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Cadence Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    // Any error fails the command
    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CadenceCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, CadenceCliError> {
    match now {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CadenceCliError::InvalidNow(format!("{}: {}", text, e))),
        None => Ok(Utc::now()),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>, CadenceCliError> {
    if is_stdio(path) {
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(File::open(path)?))
    }
}

fn read_input(path: &Path) -> Result<String, CadenceCliError> {
    let mut buffer = String::new();
    open_input(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn open_output(path: &Path) -> Result<Box<dyn Write>, CadenceCliError> {
    if is_stdio(path) {
        Ok(Box::new(BufWriter::new(io::stdout().lock())))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

// Error types

#[derive(Debug)]
enum CadenceCliError {
    Io(io::Error),
    Cadence(CadenceError),
    Json(serde_json::Error),
    InvalidNow(String),
    SourceFailed(String),
    NormalizeFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for CadenceCliError {
    fn from(e: io::Error) -> Self {
        CadenceCliError::Io(e)
    }
}

impl From<CadenceError> for CadenceCliError {
    fn from(e: CadenceError) -> Self {
        CadenceCliError::Cadence(e)
    }
}

impl From<serde_json::Error> for CadenceCliError {
    fn from(e: serde_json::Error) -> Self {
        CadenceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CadenceCliError> for CliError {
    fn from(e: CadenceCliError) -> Self {
        match e {
            CadenceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CadenceCliError::Cadence(e @ CadenceError::InvalidPattern { .. }) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'cadence doctor --feed-mapping <path>' for details".to_string()),
            },
            CadenceCliError::Cadence(CadenceError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'cadence doctor --config <path>' for details".to_string()),
            },
            CadenceCliError::Cadence(e) => CliError {
                code: "INPUT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the input format and column names".to_string()),
            },
            CadenceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CadenceCliError::InvalidNow(msg) => CliError {
                code: "INVALID_NOW".to_string(),
                message: msg,
                hint: Some("Pass --now as RFC 3339, e.g. 2025-06-30T12:00:00Z".to_string()),
            },
            CadenceCliError::SourceFailed(msg) => CliError {
                code: "SOURCE_FAILED".to_string(),
                message: msg,
                hint: Some(
                    "Records before the failure were classified and written".to_string(),
                ),
            },
            CadenceCliError::NormalizeFailed(count) => CliError {
                code: "NORMALIZE_FAILED".to_string(),
                message: format!("{} values could not be normalized", count),
                hint: None,
            },
            CadenceCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct NormalizeResult {
    input: String,
    utc: Option<String>,
    strategy: Option<String>,
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
