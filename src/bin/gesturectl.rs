//! gesturectl - Command-line interface for Gesture Pointer
//!
//! Commands:
//! - run: Map streaming landmark frames from stdin to pointer commands on stdout
//! - replay: Map a recorded frame file to pointer commands (batch mode)
//! - validate: Validate landmark frame input
//! - config: Print the default configuration or check a config file

use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::after;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gesture_pointer::adapter::{FrameAdapter, FRAME_SCHEMA};
use gesture_pointer::config::GestureConfig;
use gesture_pointer::encoder::PointerEncoder;
use gesture_pointer::pipeline::{frame_queue, stop_signal, GestureSession, PointerSink};
use gesture_pointer::types::{LandmarkFrame, StableEvent};
use gesture_pointer::{GestureError, PRODUCER_NAME, VERSION};

/// gesturectl - Hand gestures to pointer commands
#[derive(Parser)]
#[command(name = "gesturectl")]
#[command(version = VERSION)]
#[command(about = "Map hand-landmark frames to debounced pointer commands", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map streaming frames from stdin to commands on stdout
    Run {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output records
        #[arg(long, default_value = "commands")]
        output_format: OutputFormat,

        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Buffer output instead of flushing after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Map a recorded frame file to commands (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output records
        #[arg(long, default_value = "commands")]
        output_format: OutputFormat,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate landmark frame input
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

    /// Print the default configuration, or check a config file
    Config {
        /// Config file to check instead of printing defaults
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pointer commands in screen pixels
    Commands,
    /// Stable events in normalized coordinates
    Events,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

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

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), GesturectlError> {
    match cli.command {
        Commands::Run {
            config,
            output_format,
            duration_secs,
            no_flush,
        } => cmd_run(config.as_deref(), output_format, duration_secs, !no_flush),

        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_replay(&input, &output, input_format, output_format, config.as_deref()),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Config { check } => cmd_config(check.as_deref()),
    }
}

/// Writes each event as one NDJSON record
struct NdjsonSink<W: Write> {
    writer: W,
    encoder: PointerEncoder,
    format: OutputFormat,
    flush: bool,
}

impl<W: Write> NdjsonSink<W> {
    fn new(writer: W, config: &GestureConfig, session_id: String, format: OutputFormat) -> Self {
        Self {
            writer,
            encoder: PointerEncoder::with_session_id(&config.screen, session_id),
            format,
            flush: false,
        }
    }
}

impl<W: Write> PointerSink for NdjsonSink<W> {
    fn emit(&mut self, event: &StableEvent) -> Result<(), GestureError> {
        let line = match self.format {
            OutputFormat::Commands => self.encoder.encode_to_json(event)?,
            OutputFormat::Events => serde_json::to_string(event)?,
        };
        writeln!(self.writer, "{line}")?;
        if self.flush {
            self.writer.flush()?;
        }
        Ok(())
    }
}

fn cmd_run(
    config_path: Option<&Path>,
    output_format: OutputFormat,
    duration_secs: Option<u64>,
    flush: bool,
) -> Result<(), GesturectlError> {
    let config = GestureConfig::load_or_default(config_path)?;
    let mut session = GestureSession::new(&config)?;

    if atty::is(atty::Stream::Stdin) {
        warn!("stdin is a terminal; expecting {} NDJSON frames", FRAME_SCHEMA);
    }

    let (frame_tx, frame_rx) = frame_queue();
    let (stop, stop_rx) = stop_signal();

    let reader = thread::spawn(move || -> Result<(), GestureError> {
        let stdin = io::stdin();
        for (line_num, line) in stdin.lock().lines().enumerate() {
            let line = line?;
            match FrameAdapter::parse_line(&line) {
                Ok(Some(frame)) => {
                    if frame_tx.send(frame).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(line = line_num + 1, error = %e, "skipping malformed frame"),
            }
        }
        Ok(())
    });

    if let Some(secs) = duration_secs {
        let stop = stop.clone();
        thread::spawn(move || {
            let _ = after(Duration::from_secs(secs)).recv();
            info!(secs, "duration elapsed, stopping");
            stop.stop();
        });
    }

    let stdout = io::stdout();
    let mut sink = NdjsonSink::new(
        stdout.lock(),
        &config,
        session.id().to_string(),
        output_format,
    );
    sink.flush = flush;

    let summary = session.run(&frame_rx, &stop_rx, &mut sink)?;
    if let Some(release) = session.release_drag() {
        sink.emit(&release)?;
    }
    sink.writer.flush()?;

    info!(
        frames = summary.frames,
        skipped = summary.skipped,
        events = summary.events,
        "run complete"
    );

    // A stopped run may leave the reader blocked on stdin
    if !summary.stopped {
        reader.join().map_err(|_| GesturectlError::ReaderPanicked)??;
    }
    Ok(())
}

fn read_input(input: &Path) -> Result<String, GesturectlError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_frames(data: &str, format: &InputFormat) -> Result<Vec<LandmarkFrame>, GesturectlError> {
    let frames = match format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(data)?,
        InputFormat::Json => FrameAdapter::parse_array(data)?,
    };
    if frames.is_empty() {
        return Err(GesturectlError::NoFrames);
    }
    Ok(frames)
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<(), GesturectlError> {
    let config = GestureConfig::load_or_default(config_path)?;
    let frames = parse_frames(&read_input(input)?, &input_format)?;

    let mut session = GestureSession::new(&config)?;
    let mut sink = NdjsonSink::new(
        Vec::new(),
        &config,
        session.id().to_string(),
        output_format,
    );

    for event in session.events(frames) {
        sink.emit(&event)?;
    }
    if let Some(release) = session.release_drag() {
        sink.emit(&release)?;
    }

    let stats = session.stats();
    info!(
        frames = stats.frames,
        skipped = stats.skipped_frames,
        events = stats.events,
        "replay complete"
    );

    if output.to_string_lossy() == "-" {
        io::stdout().write_all(&sink.writer)?;
    } else {
        fs::write(output, &sink.writer)?;
    }
    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), GesturectlError> {
    let frames = parse_frames(&read_input(input)?, &input_format)?;
    let problems = FrameAdapter::validate_frames(&frames);

    let mut invalid: Vec<usize> = problems.iter().map(|p| p.index).collect();
    invalid.dedup();

    let report = ValidationReport {
        schema: FRAME_SCHEMA.to_string(),
        total_frames: frames.len(),
        valid_frames: frames.len() - invalid.len(),
        invalid_frames: invalid.len(),
        errors: problems
            .iter()
            .map(|p| ValidationErrorDetail {
                index: p.index,
                timestamp: p.timestamp.to_rfc3339(),
                error: p.error.clone(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", report.schema);
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Frame {} at {}: {}", err.index, err.timestamp, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(GesturectlError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_config(check: Option<&Path>) -> Result<(), GesturectlError> {
    match check {
        Some(path) => {
            GestureConfig::load(path)?;
            println!("{}: ok", path.display());
        }
        None => {
            println!("# {} {} default configuration", PRODUCER_NAME, VERSION);
            print!("{}", GestureConfig::default().to_toml()?);
        }
    }
    Ok(())
}

enum GesturectlError {
    Io(io::Error),
    Gesture(GestureError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    ReaderPanicked,
}

impl From<io::Error> for GesturectlError {
    fn from(e: io::Error) -> Self {
        GesturectlError::Io(e)
    }
}

impl From<GestureError> for GesturectlError {
    fn from(e: GestureError) -> Self {
        GesturectlError::Gesture(e)
    }
}

impl From<serde_json::Error> for GesturectlError {
    fn from(e: serde_json::Error) -> Self {
        GesturectlError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GesturectlError> for CliError {
    fn from(e: GesturectlError) -> Self {
        match e {
            GesturectlError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GesturectlError::Gesture(e @ GestureError::Configuration(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'gesturectl config' to see valid defaults".to_string()),
            },
            GesturectlError::Gesture(e @ GestureError::SinkError(_)) => CliError {
                code: "SINK_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            GesturectlError::Gesture(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {FRAME_SCHEMA} schema")),
            },
            GesturectlError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GesturectlError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            GesturectlError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some(
                    "Invalid frames are skipped at runtime; fix them for reliable replays"
                        .to_string(),
                ),
            },
            GesturectlError::ReaderPanicked => CliError {
                code: "READER_FAILED".to_string(),
                message: "stdin reader thread panicked".to_string(),
                hint: None,
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema: String,
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: String,
    error: String,
}
