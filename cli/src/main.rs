//! segcopy - Command-line interface for the segmented copy engine.
//!
//! Copies one file into a destination folder using several parallel range
//! workers, with a progress bar on stderr. With `--interactive` the copy can
//! be paused, resumed or stopped by typing commands on stdin.

use clap::Parser;
use segcopy_engine::{
    start_copy, CopyController, CopyJob, CopyOptions, JobReport, JobResult, ProgressSink,
    DEFAULT_BUFFER_SIZE, DEFAULT_WORKER_COUNT,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// segcopy - copy a file with parallel range workers
#[derive(Parser, Debug)]
#[command(name = "segcopy")]
#[command(version)]
#[command(about = "Copy a file by splitting it into byte ranges copied in parallel")]
struct Args {
    /// Source file
    #[arg(long, value_name = "FILE")]
    src: PathBuf,

    /// Destination folder (the copy keeps the source file name)
    #[arg(long, value_name = "DIR")]
    dst: PathBuf,

    /// Number of parallel range workers
    #[arg(long, short = 'w', value_name = "N", default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Bytes copied per read/write by each worker
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// How often paused workers re-check for resume/stop, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    poll_interval_ms: u64,

    /// Do not copy the source modification time onto the destination
    #[arg(long)]
    no_preserve_mtime: bool,

    /// Read pause/resume/stop commands from stdin while copying
    #[arg(long)]
    interactive: bool,

    /// Print the final job summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// CLI implementation of ProgressSink for displaying copy progress
struct CliProgress {
    start_time: Instant,
    last_progress_update: Option<Instant>,
    last_drawn: u64,
}

impl CliProgress {
    const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(200);

    fn new() -> Self {
        CliProgress {
            start_time: Instant::now(),
            last_progress_update: None,
            last_drawn: 0,
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else if elapsed.as_millis() < 1000 {
            format!("{}ms", elapsed.as_millis())
        } else {
            format!("{}s", secs)
        }
    }

    fn progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {:3}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    fn percent(copied: u64, total: u64) -> u32 {
        if total == 0 {
            100
        } else {
            (copied as f64 / total as f64 * 100.0) as u32
        }
    }

    fn throughput(bytes: u64, elapsed: Duration) -> String {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return "-".to_string();
        }
        format!("{}/s", Self::format_bytes((bytes as f64 / secs) as u64))
    }

    fn draw(&mut self, bytes_copied: u64, total_size: u64) {
        self.last_progress_update = Some(Instant::now());
        self.last_drawn = bytes_copied;

        eprint!(
            "\rProgress: {} | {}/{} | {}   ",
            Self::progress_bar(Self::percent(bytes_copied, total_size)),
            Self::format_bytes(bytes_copied),
            Self::format_bytes(total_size),
            Self::throughput(bytes_copied, self.start_time.elapsed())
        );
        let _ = io::stderr().flush();
    }
}

impl ProgressSink for CliProgress {
    fn on_job_started(&mut self, job: &CopyJob) {
        eprintln!("Preparing copy...");
        eprintln!("  Source: {}", job.source_path.display());
        eprintln!("  Destination: {}", job.destination_path.display());
        eprintln!(
            "  Total: {} in {} ranges ({} byte buffers)",
            Self::format_bytes(job.total_size),
            job.worker_count,
            job.buffer_size
        );
        eprintln!();
        self.start_time = Instant::now();
    }

    fn on_progress(&mut self, bytes_copied: u64, total_size: u64) {
        // Throttle progress updates to avoid spam, but always draw the last one
        if bytes_copied < total_size {
            if let Some(last) = self.last_progress_update {
                if last.elapsed() < Self::MIN_UPDATE_INTERVAL {
                    return;
                }
            }
        }
        self.draw(bytes_copied, total_size);
    }

    fn on_job_finished(&mut self, report: &JobReport) {
        // A stopped or failed job may end between throttled draws.
        self.draw(report.bytes_copied, report.total_size);
        eprintln!();
        match &report.result {
            JobResult::Completed => eprintln!("Copy complete!"),
            JobResult::Stopped => eprintln!("Copy stopped."),
            JobResult::Failed(e) => {
                eprintln!("Copy failed: {}", e);
                if let Some(cause) = std::error::Error::source(e) {
                    eprintln!("  Cause: {}", cause);
                }
            }
        }

        eprintln!(
            "Bytes copied: {} of {}",
            Self::format_bytes(report.bytes_copied),
            Self::format_bytes(report.total_size)
        );
        eprintln!("Elapsed: {}", Self::format_duration(report.elapsed()));
        if !report.result.is_completed() && report.bytes_copied < report.total_size {
            eprintln!(
                "Partial copy left at {}",
                report.destination_path.display()
            );
        }
    }
}

/// Parse and validate command-line arguments, then run the copy
fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(report) => exit_code_for(&report.result),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose {
        "segcopy_engine=debug,segcopy_cli=debug,warn"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// 0 completed, 1 stopped, 2 failed.
fn exit_code_for(result: &JobResult) -> i32 {
    match result {
        JobResult::Completed => 0,
        JobResult::Stopped => 1,
        JobResult::Failed(_) => 2,
    }
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<JobReport, String> {
    let options = build_options(args)?;

    let handle = start_copy(&args.src, &args.dst, &options, CliProgress::new())
        .map_err(|e| format!("Could not start copy: {}", e))?;

    if args.interactive {
        eprintln!("Commands: p = pause, r = resume, s = stop");
        spawn_command_reader(handle.controller());
    }

    let report = handle.wait();

    if args.json {
        let json = serde_json::to_string_pretty(&report.summary())
            .map_err(|e| format!("Could not encode summary: {}", e))?;
        println!("{}", json);
    }

    Ok(report)
}

fn build_options(args: &Args) -> Result<CopyOptions, String> {
    let options = CopyOptions::default()
        .with_workers(args.workers)
        .with_buffer_size(args.buffer_size)
        .with_pause_poll_interval(Duration::from_millis(args.poll_interval_ms))
        .with_preserve_mtime(!args.no_preserve_mtime);

    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

/// A line typed on stdin while the copy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Stop,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "p" | "pause" => Some(Command::Pause),
            "r" | "resume" => Some(Command::Resume),
            "s" | "stop" | "q" | "quit" => Some(Command::Stop),
            _ => None,
        }
    }
}

fn apply_command(controller: &CopyController, command: Command) {
    let result = match command {
        Command::Pause => controller.pause(),
        Command::Resume => controller.resume(),
        Command::Stop => {
            controller.stop();
            Ok(())
        }
    };
    match result {
        Ok(()) => debug!(?command, state = %controller.state(), "command applied"),
        Err(e) => warn!(?command, error = %e, "command rejected"),
    }
}

/// Feed stdin commands to the running job until stdin closes or the job ends.
fn spawn_command_reader(controller: CopyController) {
    let spawned = thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if !controller.state().is_active() {
                    break;
                }
                match Command::parse(&line) {
                    Some(command) => apply_command(&controller, command),
                    None if line.trim().is_empty() => {}
                    None => eprintln!("\nUnknown command '{}' (p, r, s)", line.trim()),
                }
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "interactive commands unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(src: PathBuf, dst: PathBuf) -> Args {
        Args {
            src,
            dst,
            workers: 4,
            buffer_size: 4096,
            poll_interval_ms: 500,
            no_preserve_mtime: false,
            interactive: false,
            json: false,
            verbose: false,
        }
    }

    fn source_file(dir: &TempDir, len: usize) -> PathBuf {
        let path = dir.path().join("input.bin");
        let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        std::fs::write(&path, data).expect("Failed to write file");
        path
    }

    #[test]
    fn test_cli_copies_file() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let src = source_file(&src_dir, 10_000);

        let report = run_cli(&args(src.clone(), dst_dir.path().to_path_buf()))
            .expect("CLI should succeed with valid paths");

        assert!(report.result.is_completed());
        assert_eq!(exit_code_for(&report.result), 0);
        let copied = std::fs::read(dst_dir.path().join("input.bin")).expect("Failed to read copy");
        assert_eq!(copied, std::fs::read(&src).expect("Failed to read source"));
    }

    #[test]
    fn test_cli_with_json_summary() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let src = source_file(&src_dir, 500);

        let mut cli_args = args(src, dst_dir.path().to_path_buf());
        cli_args.json = true;
        cli_args.no_preserve_mtime = true;

        let report = run_cli(&cli_args).expect("CLI should succeed with JSON output");
        let json = serde_json::to_value(report.summary()).expect("summary encodes");
        assert_eq!(json["state"], "completed");
        assert_eq!(json["bytes_copied"], 500);
    }

    #[test]
    fn test_cli_rejects_missing_source() {
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let result = run_cli(&args(
            PathBuf::from("/nonexistent/path/input.bin"),
            dst_dir.path().to_path_buf(),
        ));
        assert!(result.is_err(), "CLI should reject missing source");
    }

    #[test]
    fn test_cli_rejects_missing_destination() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let src = source_file(&src_dir, 10);

        let result = run_cli(&args(src, src_dir.path().join("missing")));
        assert!(result.is_err(), "CLI should reject missing destination folder");
    }

    #[test]
    fn test_cli_rejects_zero_workers() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let src = source_file(&src_dir, 10);

        let mut cli_args = args(src, dst_dir.path().to_path_buf());
        cli_args.workers = 0;

        let result = run_cli(&cli_args);
        assert!(result.is_err(), "CLI should reject zero workers");
        assert!(!dst_dir.path().join("input.bin").exists());
    }

    #[test]
    fn test_cli_rejects_zero_buffer() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let src = source_file(&src_dir, 10);

        let mut cli_args = args(src, dst_dir.path().to_path_buf());
        cli_args.buffer_size = 0;

        assert!(run_cli(&cli_args).is_err(), "CLI should reject zero buffer size");
    }

    #[test]
    fn test_parse_arguments() {
        let parsed = Args::try_parse_from([
            "segcopy", "--src", "a.bin", "--dst", "out", "-w", "8", "--buffer-size", "65536",
        ])
        .expect("arguments parse");
        assert_eq!(parsed.workers, 8);
        assert_eq!(parsed.buffer_size, 65536);
        assert_eq!(parsed.poll_interval_ms, 500);

        let defaults = Args::try_parse_from(["segcopy", "--src", "a.bin", "--dst", "out"])
            .expect("arguments parse");
        assert_eq!(defaults.workers, 1);
        assert_eq!(defaults.buffer_size, 4096);
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("p"), Some(Command::Pause));
        assert_eq!(Command::parse(" Resume \n"), Some(Command::Resume));
        assert_eq!(Command::parse("s"), Some(Command::Stop));
        assert_eq!(Command::parse("dance"), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&JobResult::Completed), 0);
        assert_eq!(exit_code_for(&JobResult::Stopped), 1);
    }

    #[test]
    fn test_final_count_drawn_despite_throttle() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let src = source_file(&src_dir, 300);
        let report = segcopy_engine::run_copy(
            &src,
            dst_dir.path(),
            &CopyOptions::default(),
            segcopy_engine::NoProgress,
        )
        .expect("copy runs");

        let mut progress = CliProgress::new();
        progress.on_progress(100, 300);
        progress.on_progress(200, 300);
        assert_eq!(progress.last_drawn, 100, "second update should be throttled");

        progress.on_job_finished(&report);
        assert_eq!(progress.last_drawn, report.bytes_copied);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(CliProgress::format_bytes(512), "512.00 B");
        assert_eq!(CliProgress::format_bytes(1536), "1.50 KB");
        assert_eq!(CliProgress::percent(0, 0), 100);
        assert_eq!(CliProgress::percent(25, 100), 25);
        assert_eq!(CliProgress::progress_bar(50), "[==========          ]  50%");
        assert_eq!(CliProgress::format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
