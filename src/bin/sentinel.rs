//! Sentinel CLI - Command-line interface for Study Sentinel
//!
//! Commands:
//! - replay: Feed recorded frames through a study session (batch mode)
//! - validate: Validate frame record schema
//! - doctor: Diagnose configuration and escalation delivery
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use study_sentinel::escalation::{
    CaptureAndNotify, DiscordWebhook, EscalationDispatcher, EscalationSink, LogSink, SnapshotStore,
};
use study_sentinel::schema::{FrameRecord, FrameRecordAdapter, RecordSignal, SCHEMA_VERSION};
use study_sentinel::session::{EscalationPolicy, SessionSummary, StudySession};
use study_sentinel::signal::HeuristicAnalyzer;
use study_sentinel::types::Observation;
use study_sentinel::{SentinelConfig, SentinelError, PRODUCER_NAME, SENTINEL_VERSION};

/// Sentinel - distraction monitor for study sessions
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version = SENTINEL_VERSION)]
#[command(about = "Replay study frames through the distraction monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed recorded frames through a study session
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Distraction threshold in seconds (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Folder for evidence snapshots (overrides config)
        #[arg(long)]
        evidence_dir: Option<PathBuf>,

        /// Webhook URL for escalations (overrides config and environment)
        #[arg(long)]
        webhook: Option<String>,

        /// Stop the session at the first escalation
        #[arg(long)]
        end_on_escalation: bool,

        /// Write the session summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Validate frame record schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and escalation delivery
    Doctor {
        /// JSON config file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one observation per line)
    Ndjson,
    /// JSON array of observations
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (study.frame.v1)
    Input,
    /// Output schema (observation per frame)
    Output,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), SentinelCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            threshold,
            evidence_dir,
            webhook,
            end_on_escalation,
            summary,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(secs) = threshold {
                config.monitor.threshold_secs = secs;
            }
            if let Some(dir) = evidence_dir.clone() {
                config.evidence_dir = dir;
            }
            if webhook.is_some() {
                config.webhook_url = webhook;
            }
            if end_on_escalation {
                config.escalation_policy = EscalationPolicy::EndSession;
            }
            config.validate()?;

            cmd_replay(
                &input,
                &output,
                input_format,
                output_format,
                &config,
                evidence_dir.is_some(),
                summary.as_deref(),
            )
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema { schema_type, json_schema } => cmd_schema(schema_type, json_schema),
    }
}

fn load_config(path: Option<&Path>) -> Result<SentinelConfig, SentinelCliError> {
    match path {
        Some(path) => Ok(SentinelConfig::load(path)?),
        None => {
            let mut config = SentinelConfig::default();
            config.apply_env();
            Ok(config)
        }
    }
}

fn read_input(input: &Path) -> Result<String, SentinelCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_records(data: &str, format: &InputFormat) -> Result<Vec<FrameRecord>, SentinelCliError> {
    Ok(match format {
        InputFormat::Ndjson => FrameRecordAdapter::parse_ndjson(data)?,
        InputFormat::Json => FrameRecordAdapter::parse_array(data)?,
    })
}

/// Webhook wins; an explicit evidence folder alone saves snapshots; otherwise log only
fn build_sink(
    config: &SentinelConfig,
    save_snapshots: bool,
) -> Result<Box<dyn EscalationSink>, SentinelCliError> {
    let store = SnapshotStore::new(config.evidence_dir.clone());
    match &config.webhook_url {
        Some(url) => {
            let webhook = DiscordWebhook::new(url.clone())
                .map_err(|e| SentinelCliError::Delivery(e.to_string()))?;
            Ok(Box::new(CaptureAndNotify::new(store, webhook)))
        }
        None if save_snapshots => Ok(Box::new(store)),
        None => Ok(Box::new(LogSink)),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: &SentinelConfig,
    save_snapshots: bool,
    summary_path: Option<&Path>,
) -> Result<(), SentinelCliError> {
    let input_data = read_input(input)?;
    let records = parse_records(&input_data, &input_format)?;

    if records.is_empty() {
        return Err(SentinelCliError::NoFrames);
    }

    for record in &records {
        record.validate()?;
    }

    let analyzer = HeuristicAnalyzer::new(config.analyzer.clone())?;
    let dispatcher = EscalationDispatcher::spawn(build_sink(config, save_snapshots)?)?;
    let mut session = StudySession::from_config(RecordSignal::new(analyzer), config, dispatcher)?;

    let mut lines: Vec<ReplayLine> = Vec::with_capacity(records.len());
    for record in &records {
        let now = record.timestamp()?;
        match session.process_frame(record, record.image_height, now) {
            Ok(observation) => lines.push(ReplayLine::new(record, observation)),
            Err(SentinelError::SessionEnded(id)) => {
                info!(session_id = %id, skipped = records.len() - lines.len(), "session ended, remaining frames skipped");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let summary = session.finish();
    if summary.dispatch.failed > 0 {
        warn!(failed = summary.dispatch.failed, "some escalations were not delivered");
    }

    let output_data = format_output(&lines, &output_format)?;
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        write!(stdout, "{}", output_data)?;
        stdout.flush()?;
    } else {
        fs::write(output, output_data)?;
    }

    if let Some(path) = summary_path {
        write_summary(path, &summary)?;
    }

    Ok(())
}

fn write_summary(path: &Path, summary: &SessionSummary) -> Result<(), SentinelCliError> {
    fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), SentinelCliError> {
    let input_data = read_input(input)?;
    let records = parse_records(&input_data, &input_format)?;
    let results = FrameRecordAdapter::validate_records(&records);

    let report = ValidationReport {
        total_frames: records.len(),
        valid_frames: records.len() - results.len(),
        invalid_frames: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                frame_id: r.frame_id.clone(),
                error: r.result.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Frame {} (index {}): {}",
                    err.frame_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(SentinelCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), SentinelCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "sentinel_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Sentinel version {}", SENTINEL_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    let config = match load_config(config_path) {
        Ok(config) => {
            let (status, message) = match config.validate() {
                Ok(()) => (
                    CheckStatus::Ok,
                    format!(
                        "Threshold {}s, policy {:?}",
                        config.monitor.threshold_secs, config.escalation_policy
                    ),
                ),
                Err(e) => (CheckStatus::Error, e.to_string()),
            };
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status,
                message,
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            });
            None
        }
    };

    if let Some(config) = &config {
        checks.push(match &config.webhook_url {
            Some(url) => match DiscordWebhook::new(url.clone()) {
                Ok(_) => DoctorCheck {
                    name: "webhook".to_string(),
                    status: CheckStatus::Ok,
                    message: "Webhook configured".to_string(),
                },
                Err(e) => DoctorCheck {
                    name: "webhook".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            None => DoctorCheck {
                name: "webhook".to_string(),
                status: CheckStatus::Warning,
                message: "No webhook configured; escalations are only logged or saved".to_string(),
            },
        });

        checks.push(check_evidence_dir(&config.evidence_dir));
    }

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
            message: "stdin is a pipe (replay from stdin ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: SENTINEL_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sentinel Doctor Report");
        println!("======================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SentinelCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

/// Checks the evidence folder without creating it: a missing folder is judged
/// by the nearest existing ancestor, where `SnapshotStore` would create it.
fn check_evidence_dir(dir: &Path) -> DoctorCheck {
    let existing = dir
        .ancestors()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .find(|p| p.exists());

    let (status, message) = match existing {
        None => (
            CheckStatus::Error,
            format!("No existing parent directory for {}", dir.display()),
        ),
        Some(base) if !base.is_dir() => (
            CheckStatus::Error,
            format!("{} is not a directory", base.display()),
        ),
        Some(base) => {
            let probe = base.join(".sentinel-doctor");
            match fs::write(&probe, b"ok").and_then(|_| fs::remove_file(&probe)) {
                Err(e) => (
                    CheckStatus::Error,
                    format!("Cannot write to {}: {}", base.display(), e),
                ),
                Ok(()) if base == dir => {
                    (CheckStatus::Ok, format!("{} is writable", dir.display()))
                }
                Ok(()) => (
                    CheckStatus::Ok,
                    format!(
                        "{} will be created under {} on first capture",
                        dir.display(),
                        base.display()
                    ),
                ),
            }
        }
    };

    DoctorCheck {
        name: "evidence_dir".to_string(),
        status,
        message,
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), SentinelCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One record per evaluated video frame:");
                println!();
                println!("- schema_version: \"{}\"", SCHEMA_VERSION);
                println!("- t: seconds since session start (monotonic, non-negative)");
                println!("- frame_id: optional identifier");
                println!("- image_height: pixels, default 480");
                println!("- studying: optional pre-computed signal (wins over detections)");
                println!("- detections: {{ labels: [..], face: {{ forehead_y, nose_y, chin_y }} }}");
                println!("- image_path: optional encoded frame attached to evidence");
                println!();
                println!("A frame is studying when a person is present, either a laptop/book is");
                println!("visible or the head is not tilted down, and no cell phone is visible.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: observation per frame");
                println!();
                println!("- frame_id, t: echoed from the input record");
                println!("- studying: signal used for the frame");
                println!("- countdown_seconds: whole seconds before escalation, null while studying");
                println!("- escalated_now: true on the single frame that triggers escalation");
            }
        }
    }

    Ok(())
}

// Helper functions

#[derive(serde::Serialize)]
struct ReplayLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_id: Option<String>,
    t: f64,
    #[serde(flatten)]
    observation: Observation,
}

impl ReplayLine {
    fn new(record: &FrameRecord, observation: Observation) -> Self {
        Self {
            frame_id: record.frame_id.clone(),
            t: record.t,
            observation,
        }
    }
}

fn format_output(lines: &[ReplayLine], format: &OutputFormat) -> Result<String, SentinelCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out: Vec<String> = Vec::new();
            for line in lines {
                out.push(serde_json::to_string(line)?);
            }
            Ok(out.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(lines)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(lines)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Study Sentinel frame record",
        "type": "object",
        "required": ["schema_version", "t"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "frame_id": { "type": "string" },
            "t": { "type": "number", "minimum": 0 },
            "image_height": { "type": "integer", "minimum": 1 },
            "studying": { "type": "boolean" },
            "detections": {
                "type": "object",
                "properties": {
                    "labels": { "type": "array", "items": { "type": "string" } },
                    "face": {
                        "type": "object",
                        "required": ["forehead_y", "nose_y", "chin_y"],
                        "properties": {
                            "forehead_y": { "type": "number", "minimum": 0, "maximum": 1 },
                            "nose_y": { "type": "number", "minimum": 0, "maximum": 1 },
                            "chin_y": { "type": "number", "minimum": 0, "maximum": 1 }
                        }
                    }
                }
            },
            "image_path": { "type": "string" }
        },
        "anyOf": [
            { "required": ["studying"] },
            { "required": ["detections"] }
        ]
    }).to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "study.observation.v1",
        "description": "Study Sentinel per-frame observation",
        "type": "object",
        "required": ["t", "studying", "countdown_seconds", "escalated_now"],
        "properties": {
            "frame_id": { "type": "string" },
            "t": { "type": "number" },
            "studying": { "type": "boolean" },
            "countdown_seconds": { "type": ["integer", "null"], "minimum": 0 },
            "escalated_now": { "type": "boolean" }
        }
    }).to_string()
}

// Error types

#[derive(Debug)]
enum SentinelCliError {
    Io(io::Error),
    Sentinel(SentinelError),
    Json(serde_json::Error),
    Validation(study_sentinel::schema::ValidationError),
    Delivery(String),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for SentinelCliError {
    fn from(e: io::Error) -> Self {
        SentinelCliError::Io(e)
    }
}

impl From<SentinelError> for SentinelCliError {
    fn from(e: SentinelError) -> Self {
        SentinelCliError::Sentinel(e)
    }
}

impl From<serde_json::Error> for SentinelCliError {
    fn from(e: serde_json::Error) -> Self {
        SentinelCliError::Json(e)
    }
}

impl From<study_sentinel::schema::ValidationError> for SentinelCliError {
    fn from(e: study_sentinel::schema::ValidationError) -> Self {
        SentinelCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SentinelCliError> for CliError {
    fn from(e: SentinelCliError) -> Self {
        match e {
            SentinelCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SentinelCliError::Sentinel(SentinelError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'sentinel doctor --config <file>' for details".to_string()),
            },
            SentinelCliError::Sentinel(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            SentinelCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SentinelCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'sentinel validate' for details".to_string()),
            },
            SentinelCliError::Delivery(msg) => CliError {
                code: "DELIVERY_ERROR".to_string(),
                message: msg,
                hint: Some("Check the webhook URL".to_string()),
            },
            SentinelCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            SentinelCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            SentinelCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    frame_id: Option<String>,
    error: String,
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
