//! mscope - Command-line interface for Markerscope
//!
//! Commands:
//! - analyze: Replay a detection trace and print the report
//! - validate: Validate a detection trace
//! - markers: List the markers visible at a playback position
//! - doctor: Diagnose configuration and environment
//! - schema: Print trace, report or config schema information

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use markerscope::pipeline::TraceAnalyzer;
use markerscope::trace::{PlaybackEvent, TraceFrame, TraceReader, TRACE_VERSION};
use markerscope::types::{AnalysisReport, Marker};
use markerscope::{visible_markers, AnalysisConfig, AnalysisError};
use markerscope::{MARKERSCOPE_VERSION, PRODUCER_NAME};

/// mscope - heuristic behavioral-marker analysis over detection traces
#[derive(Parser)]
#[command(name = "mscope")]
#[command(version = MARKERSCOPE_VERSION)]
#[command(about = "Score recorded object detections into behavioral markers", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a detection trace and print the report
    Analyze {
        /// Input trace path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Analysis configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sampling interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Minimum detection confidence (exclusive)
        #[arg(long)]
        threshold: Option<f64>,

        /// Treat the end of the trace as the end of playback
        #[arg(long)]
        finalize: bool,

        /// Also write every sampled frame's analysis as NDJSON to this path
        #[arg(long)]
        frames: Option<PathBuf>,
    },

    /// Validate a detection trace
    Validate {
        /// Input trace path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the markers visible at a playback position
    Markers {
        /// Report JSON or a JSON array of markers (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Playback position in seconds
        #[arg(long)]
        at: f64,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Detect from the first character
    Auto,
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Detection trace schema (markerscope.trace.v1)
    Trace,
    /// Analysis report schema
    Report,
    /// Analysis configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.as_str()),
    );
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn run(cli: Cli) -> Result<(), MscopeCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            config,
            interval,
            threshold,
            finalize,
            frames,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(interval) = interval {
                config.sampling_interval_sec = interval;
            }
            if let Some(threshold) = threshold {
                config.confidence_threshold = threshold;
            }
            cmd_analyze(
                &input,
                &output,
                input_format,
                output_format,
                config,
                finalize,
                frames.as_deref(),
            )
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Markers { input, at } => cmd_markers(&input, at),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: AnalysisConfig,
    finalize: bool,
    frames_path: Option<&Path>,
) -> Result<(), MscopeCliError> {
    let mut frames = parse_trace(&read_input(input)?, &input_format)?;
    if frames.is_empty() {
        return Err(MscopeCliError::EmptyTrace);
    }

    if finalize {
        if let Some(last) = frames.last() {
            if last.event != Some(PlaybackEvent::Ended) {
                let mut end = TraceFrame::new(last.time, last.duration, Vec::new());
                end.event = Some(PlaybackEvent::Ended);
                frames.push(end);
            }
        }
    }

    let analyzer = TraceAnalyzer::new(config)?;
    let run = analyzer.run(&frames)?;
    log::info!(
        "session {}: {} samples, {} skipped, {} dropped",
        run.session_id,
        run.frames.len(),
        run.skipped,
        run.dropped_ticks
    );

    if let Some(path) = frames_path {
        let mut lines = Vec::with_capacity(run.frames.len());
        for frame in &run.frames {
            lines.push(serde_json::to_string(frame)?);
        }
        fs::write(path, lines.join("\n") + "\n")?;
    }

    let report = run.into_report()?;
    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };
    write_output(output, &output_data)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), MscopeCliError> {
    let frames = parse_trace(&read_input(input)?, &input_format)?;
    let results = TraceReader::validate_frames(&frames);

    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - results.len(),
        invalid_frames: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                time: frames.get(r.index).map(|f| f.time),
                error: r.error.to_string(),
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
                match err.time {
                    Some(t) => println!("  - Frame {} (t={:.3}s): {}", err.index, t, err.error),
                    None => println!("  - Frame {}: {}", err.index, err.error),
                }
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(MscopeCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_markers(input: &Path, at: f64) -> Result<(), MscopeCliError> {
    let data = read_input(input)?;
    let markers: Vec<Marker> = if data.trim_start().starts_with('[') {
        serde_json::from_str(&data)?
    } else {
        let report: AnalysisReport = serde_json::from_str(&data)?;
        report.detected_markers
    };

    let visible = visible_markers(&markers, at);
    println!("{}", serde_json::to_string_pretty(&visible)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), MscopeCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "markerscope_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Markerscope version {}", MARKERSCOPE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "trace_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Trace format: {}", TRACE_VERSION),
    });

    if let Some(config_path) = config {
        let check = if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match AnalysisConfig::from_json(&content) {
                    Ok(cfg) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (sampling every {}s, threshold {}, {}x{} reference frame)",
                            cfg.sampling_interval_sec,
                            cfg.confidence_threshold,
                            cfg.reference_width,
                            cfg.reference_height
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist; defaults will be used".to_string(),
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass traces with --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MARKERSCOPE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Markerscope Doctor Report");
        println!("=========================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(MscopeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), MscopeCliError> {
    match schema_type {
        SchemaType::Trace => {
            if json_schema {
                println!("{}", serde_json::to_string_pretty(&trace_json_schema())?);
            } else {
                println!("Trace Schema: {}", TRACE_VERSION);
                println!();
                println!("One JSON object per line (or a JSON array of them):");
                println!();
                println!("- time: playback position in seconds (>= 0, non-decreasing)");
                println!("- duration: video duration in seconds (> 0)");
                println!("- detections: [{{ label, score, box: {{ xmin, ymin, xmax, ymax }} }}]");
                println!("- capture_failed: true if no frame could be grabbed (optional)");
                println!("- event: play | pause | ended (optional)");
            }
        }
        SchemaType::Report => {
            if json_schema {
                println!("{}", serde_json::to_string_pretty(&report_json_schema())?);
            } else {
                println!("Report Schema");
                println!();
                println!("- session_id: uuid of the analysis session");
                println!("- eye_contact, repetitive_movements, social_reciprocity:");
                println!("    {{ score: 0-100 (rounded mean), risk: low | moderate | high }}");
                println!("- overall_risk: low | moderate | high");
                println!("- detected_markers: [{{ id, type, x, y, size, timestamp, duration }}]");
                println!("- samples_analyzed: number of sampled frames");
                println!("- generated_at: RFC 3339 timestamp");
                println!();
                println!("Risk tiers: score >= 70 low, >= 40 moderate, otherwise high.");
            }
        }
        SchemaType::Config => {
            let defaults = AnalysisConfig::default();
            if json_schema {
                println!("{}", serde_json::to_string_pretty(&config_json_schema(&defaults))?);
            } else {
                println!("Analysis configuration (defaults shown):");
                println!();
                println!("{}", defaults.to_json()?);
            }
        }
    }
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, MscopeCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), MscopeCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn parse_trace(data: &str, format: &InputFormat) -> Result<Vec<TraceFrame>, MscopeCliError> {
    let frames = match format {
        InputFormat::Auto => TraceReader::parse(data)?,
        InputFormat::Ndjson => TraceReader::parse_ndjson(data)?,
        InputFormat::Json => TraceReader::parse_array(data)?,
    };
    Ok(frames)
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, MscopeCliError> {
    match path {
        Some(path) => Ok(AnalysisConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(AnalysisConfig::default()),
    }
}

fn box_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["xmin", "ymin", "xmax", "ymax"],
        "properties": {
            "xmin": { "type": "number" },
            "ymin": { "type": "number" },
            "xmax": { "type": "number" },
            "ymax": { "type": "number" }
        }
    })
}

fn trace_json_schema() -> serde_json::Value {
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": TRACE_VERSION,
        "title": "Markerscope detection trace frame",
        "type": "object",
        "required": ["time", "duration"],
        "properties": {
            "time": { "type": "number", "minimum": 0 },
            "duration": { "type": "number", "exclusiveMinimum": 0 },
            "detections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["label", "score", "box"],
                    "properties": {
                        "label": { "type": "string" },
                        "score": { "type": "number", "minimum": 0, "maximum": 1 },
                        "box": box_schema()
                    }
                }
            },
            "capture_failed": { "type": "boolean" },
            "event": { "type": "string", "enum": ["play", "pause", "ended"] }
        }
    })
}

fn report_json_schema() -> serde_json::Value {
    let category = serde_json::json!({
        "type": "object",
        "required": ["score", "risk"],
        "properties": {
            "score": { "type": "number", "minimum": 0, "maximum": 100 },
            "risk": { "type": "string", "enum": ["low", "moderate", "high"] }
        }
    });
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Markerscope analysis report",
        "type": "object",
        "required": [
            "eye_contact", "repetitive_movements", "social_reciprocity",
            "overall_risk", "detected_markers", "samples_analyzed", "generated_at"
        ],
        "properties": {
            "session_id": { "type": "string" },
            "eye_contact": category.clone(),
            "repetitive_movements": category.clone(),
            "social_reciprocity": category,
            "overall_risk": { "type": "string", "enum": ["low", "moderate", "high"] },
            "detected_markers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "type", "x", "y", "size", "timestamp", "duration"],
                    "properties": {
                        "id": { "type": "string" },
                        "type": {
                            "type": "string",
                            "enum": ["eye-contact", "repetitive-movement", "social-reciprocity"]
                        },
                        "x": { "type": "number" },
                        "y": { "type": "number" },
                        "size": { "type": "number" },
                        "timestamp": { "type": "number" },
                        "duration": { "type": "number" }
                    }
                }
            },
            "samples_analyzed": { "type": "integer", "minimum": 0 },
            "generated_at": { "type": "string", "format": "date-time" }
        }
    })
}

fn config_json_schema(defaults: &AnalysisConfig) -> serde_json::Value {
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Markerscope analysis configuration",
        "type": "object",
        "properties": {
            "sampling_interval_sec": { "type": "integer", "minimum": 1, "default": defaults.sampling_interval_sec },
            "confidence_threshold": { "type": "number", "minimum": 0, "maximum": 1, "default": defaults.confidence_threshold },
            "reference_width": { "type": "number", "exclusiveMinimum": 0, "default": defaults.reference_width },
            "reference_height": { "type": "number", "exclusiveMinimum": 0, "default": defaults.reference_height },
            "completion_fraction": { "type": "number", "exclusiveMinimum": 0, "maximum": 1, "default": defaults.completion_fraction },
            "marker_duration_sec": { "type": "number", "default": defaults.marker_duration_sec },
            "min_marker_size": { "type": "number", "default": defaults.min_marker_size },
            "social_distance_scale": { "type": "number", "exclusiveMinimum": 0, "default": defaults.social_distance_scale },
            "motion_history_len": { "type": "integer", "minimum": 3, "default": defaults.motion_history_len }
        }
    })
}

// Error types

#[derive(Debug)]
enum MscopeCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    EmptyTrace,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for MscopeCliError {
    fn from(e: io::Error) -> Self {
        MscopeCliError::Io(e)
    }
}

impl From<AnalysisError> for MscopeCliError {
    fn from(e: AnalysisError) -> Self {
        MscopeCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for MscopeCliError {
    fn from(e: serde_json::Error) -> Self {
        MscopeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MscopeCliError> for CliError {
    fn from(e: MscopeCliError) -> Self {
        match e {
            MscopeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MscopeCliError::Analysis(e) => {
                let (code, hint) = match &e {
                    AnalysisError::InvalidTrace(_) => {
                        ("INVALID_TRACE", "Run 'mscope validate' for details")
                    }
                    AnalysisError::Incomplete(_) => (
                        "INCOMPLETE",
                        "Playback never reached the completion point; pass --finalize to report anyway",
                    ),
                    AnalysisError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Run 'mscope schema config' for valid ranges")
                    }
                    AnalysisError::ParseError(_) | AnalysisError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input matches the markerscope.trace.v1 schema",
                    ),
                    AnalysisError::InvalidTransition { .. } | AnalysisError::ScorerFault { .. } => {
                        ("ANALYSIS_ERROR", "Re-run with --verbose for details")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            MscopeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MscopeCliError::EmptyTrace => CliError {
                code: "EMPTY_TRACE".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            MscopeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            MscopeCliError::DoctorFailed => CliError {
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
    time: Option<f64>,
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
