use anyhow::{bail, Context};
use clap::Parser;
use crossterm::style::Stylize;
use poolhit::channel::{CommandChannel, ProcessChannel, ScriptedChannel};
use poolhit::config::{Overrides, SessionConfig};
use poolhit::journal::FileJournal;
use poolhit::monitor::{triage, CancelToken, RunSummary};
use std::fs;
use std::path::{Path, PathBuf};

/// Arm nt!PoolHitTag on a single pool tag and journal every allocation and free of it.
///
/// Reload driver symbols in the engine before a run. It is recommended to make a run with a
/// small count first and check that the journal is filled as expected.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session config file (default: ~/.config/poolhit/session.toml)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Pool tag, exactly 4 characters
    #[clap(short, long)]
    tag: Option<String>,

    /// Number of halts to process
    #[clap(short = 'n', long)]
    count: Option<u32>,

    /// Journal file
    #[clap(short, long)]
    log: Option<PathBuf>,

    /// Evidence layout: compact or detailed
    #[clap(short, long)]
    format: Option<String>,

    /// Fail a command if the engine is silent for this number of milliseconds
    #[clap(long, env = "POOLHIT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Engine side transcript, opened with the engine log commands
    #[clap(long)]
    engine_log: Option<PathBuf>,

    /// Resume the target once right after the trigger is armed
    #[clap(long)]
    resume_after_arm: bool,

    /// Answer engine commands from a toml transcript instead of a live engine
    #[clap(long)]
    replay: Option<PathBuf>,

    /// Mute diagnostic logs
    #[clap(short, long)]
    quiet: bool,

    /// Engine console and its arguments, for example: -- cdb -remote tcp:server=host,port=5005
    #[clap(last = true)]
    engine: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.quiet {
        poolhit::log::disable();
    }

    let overrides = Overrides {
        tag: args.tag,
        iterations: args.count,
        log_path: args.log,
        format: args.format,
        command_timeout_ms: args.timeout_ms,
        engine_log: args.engine_log,
        resume_after_arm: args.resume_after_arm,
    };
    let config =
        SessionConfig::load(args.config.as_deref(), overrides).context("load session config")?;

    let channel: Box<dyn CommandChannel> = match (&args.replay, args.engine.split_first()) {
        (Some(path), _) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("read transcript {}", path.display()))?;
            Box::new(ScriptedChannel::from_transcript(&data).context("parse transcript")?)
        }
        (None, Some((program, engine_args))) => Box::new(ProcessChannel::spawn(
            program,
            engine_args,
            &config.commands.echo,
            config.command_timeout,
        )?),
        (None, None) => bail!("engine command (after `--`) or --replay is required"),
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).context("install Ctrl-C handler")?;
    }

    let log_path = config.log_path.clone();
    match triage(config, channel, FileJournal::new(), cancel) {
        Ok(summary) => {
            print_summary(&summary, &log_path);
            Ok(())
        }
        Err(e) => {
            if e.is_fatal() {
                eprintln!(
                    "run stopped early, journal {} may be incomplete",
                    log_path.display()
                );
            }
            Err(e.into())
        }
    }
}

fn print_summary(summary: &RunSummary, log_path: &Path) {
    let styled = |text: String, malloc: bool| {
        if cfg!(feature = "int_test") {
            text
        } else if malloc {
            text.green().to_string()
        } else {
            text.yellow().to_string()
        }
    };

    println!("journal: {}", log_path.display());
    println!(
        "halts: {}, {}, {}, unclassified: {}",
        summary.iterations,
        styled(format!("malloc: {}", summary.allocations), true),
        styled(format!("free: {}", summary.deallocations), false),
        summary.unclassified,
    );
    if summary.cancelled {
        println!("{}", styled("run cancelled".to_string(), false));
    }
}
