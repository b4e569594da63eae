use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mediavault_core::{
    CancellationToken, OrganizeControl, OrganizeOptions, OrganizeOutcome, VaultError, LOG_FILENAME,
};
use tracing::{info, warn};

// clap already uses 2 for usage errors.
const EXIT_NOTHING_TO_DO: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "mediavault",
    version,
    about = "Rename photos and videos to their capture date and sort them into year folders"
)]
struct Cli {
    /// Directory to organize
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Undo a previous run by replaying its log
    #[arg(
        long,
        conflicts_with_all = [
            "recursive", "no_guess", "monthly", "bucket_threshold",
            "day_boundary", "unprocessed", "dry_run", "touch",
        ]
    )]
    revert: bool,

    /// Rename log to write (or to replay with --revert) [default: <DIR>/_mediavault_log.md]
    #[arg(long)]
    log: Option<PathBuf>,

    /// Also organize files in subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Disable date guessing from filenames
    #[arg(long)]
    no_guess: bool,

    /// Organize into YYYY/MM subdirectories
    #[arg(long)]
    monthly: bool,

    /// Give a day its own folder once it has this many files
    #[arg(long, value_name = "COUNT", default_value_t = u32::MAX, hide_default_value = true)]
    bucket_threshold: u32,

    /// Files taken before this hour count towards the previous day's folder
    #[arg(long, value_name = "HOUR", default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=23))]
    day_boundary: u32,

    /// Move files without a usable date into this folder under DIR
    #[arg(long, value_name = "NAME")]
    unprocessed: Option<String>,

    /// Show what would be renamed without touching anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Set each renamed file's modification time to its capture time
    #[arg(long)]
    touch: bool,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,

    /// Debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.revert {
        return run_revert(&cli);
    }
    run_organize(cli)
}

fn run_revert(cli: &Cli) -> anyhow::Result<ExitCode> {
    let log = cli.log.clone().unwrap_or_else(|| cli.dir.join(LOG_FILENAME));
    info!(log = %log.display(), "reverting");
    let summary = mediavault_core::revert(&log)
        .with_context(|| format!("cannot replay {}", log.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Reverted {} file(s), {} no longer present, {} failed",
            summary.reverted, summary.missing, summary.failed
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_organize(cli: Cli) -> anyhow::Result<ExitCode> {
    let t_total = std::time::Instant::now();
    let options = OrganizeOptions {
        root: cli.dir,
        best_effort: !cli.no_guess,
        bucket_threshold: cli.bucket_threshold,
        day_boundary_hour: cli.day_boundary,
        monthly: cli.monthly,
        recursive: cli.recursive,
        unprocessed_dir: cli.unprocessed,
        log_path: cli.log,
        dry_run: cli.dry_run,
        touch: cli.touch,
    };

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, stopping after the current file...");
        handler_token.cancel();
    })
    .context("cannot install Ctrl-C handler")?;
    let control = OrganizeControl::new().with_cancel_token(token);

    let bar: Mutex<Option<(String, ProgressBar)>> = Mutex::new(None);
    let show_progress = !cli.quiet && !cli.json;
    let callback = |stage: &str, current: u64, total: u64, message: &str| {
        if !show_progress {
            return;
        }
        let Ok(mut slot) = bar.lock() else {
            return;
        };
        if slot.as_ref().map(|(s, _)| s.as_str()) != Some(stage) {
            if let Some((_, old)) = slot.take() {
                old.finish_and_clear();
            }
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}") {
                pb.set_style(style);
            }
            *slot = Some((stage.to_string(), pb));
        }
        if let Some((_, pb)) = slot.as_ref() {
            pb.set_message(message.to_string());
            pb.set_position(current + 1);
        }
    };

    let result = mediavault_core::organize_with_control(&options, &control, &callback);
    if let Ok(mut slot) = bar.lock() {
        if let Some((_, pb)) = slot.take() {
            pb.finish_and_clear();
        }
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(VaultError::Cancelled) => {
            warn!("interrupted; completed renames are in the log and can be reverted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(e) => return Err(e).context("organize failed"),
    };

    let summary = outcome.summary();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        let verb = if summary.dry_run { "Would rename" } else { "Renamed" };
        println!(
            "{} {} file(s), {} already in place, {} skipped without a date ({} implausible), {} moved to unprocessed, {} failed ({:.2}s)",
            verb,
            summary.renamed,
            summary.unchanged,
            summary.skipped,
            summary.invalid,
            summary.unprocessed_moved,
            summary.failed,
            t_total.elapsed().as_secs_f64()
        );
        if let Some(log) = &summary.log_path {
            println!("Log written to {}", log.display());
        }
    }

    match outcome {
        OrganizeOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
        OrganizeOutcome::NothingToDo(_) => {
            if !cli.json {
                eprintln!("No files could be processed.");
            }
            Ok(ExitCode::from(EXIT_NOTHING_TO_DO))
        }
    }
}
