use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jumpbot::config::Parameter;
use jumpbot::environment::simulated::discover_windows;
use jumpbot::learn::coordinator::{Coordinator, StopSignal};
use jumpbot::ml_model::value_network::CandleValueModel;

#[derive(Parser)]
#[command(name = "jumpbot", about = "Learns to play a jump-and-run game from its pixels")]
struct Args {
    /// Number of game windows to play in concurrently
    #[arg(long, default_value_t = 2)]
    windows: usize,
    /// Play in one window only, without experience sharing
    #[arg(long, default_value_t = false)]
    single: bool,
    /// Checkpoint directory
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Stop after that many games
    #[arg(long)]
    max_episodes: Option<usize>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Persist and restore the episode counter and record
    #[arg(long, default_value_t = false)]
    resume_progress: bool,
    /// Milliseconds per simulated frame
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
}

/// Reads commands until `q` / `quit` / `stop` (true) or the end of the input (false)
fn stop_requested(input: impl BufRead) -> bool {
    for line in input.lines() {
        match line {
            Ok(line) if matches!(line.trim(), "q" | "quit" | "stop") => return true,
            Ok(_) => {}
            Err(e) => {
                log::warn!("reading stdin: {}", e);
                return false;
            }
        }
    }
    false
}

/// Raises the stop signal on a stop command. A closed stdin only ends the watching.
fn watch_stdin(stop: StopSignal) -> Result<()> {
    thread::Builder::new().name("stdin".to_string()).spawn(move || {
        if stop_requested(io::stdin().lock()) {
            log::info!("stop requested, finishing running episodes");
            stop.raise();
        } else {
            log::info!("stdin closed, no more commands; training goes on");
        }
    })?;
    Ok(())
}

fn main() -> Result<()> {
    jumpbot::log::init_logging();
    let args = Args::parse();

    let mut param = Parameter::default();
    if let Some(model_dir) = args.model_dir {
        param.model_dir = model_dir;
    }
    param.max_episodes = args.max_episodes;
    param.resume_progress = args.resume_progress;

    let window_count = if args.single { 1 } else { args.windows };
    let frame_interval = Duration::from_millis(args.frame_ms);
    let windows = discover_windows(window_count, args.seed)?
        .into_iter()
        .map(|w| w.with_frame_interval(frame_interval))
        .collect::<Vec<_>>();

    let stop = StopSignal::new();
    watch_stdin(stop.clone())?;
    log::info!("enter 'q' to stop");

    let frame_size = param.frame_size;
    let learning_rate = param.learning_rate;
    let coordinator = Coordinator::new(param, stop);
    let reports = if args.single {
        let window = windows.into_iter().next().context("no game window")?;
        vec![coordinator.run_single(window, CandleValueModel::init(frame_size, learning_rate)?, args.seed)?]
    } else {
        coordinator.run(windows, || CandleValueModel::init(frame_size, learning_rate), args.seed)?
    };

    for report in reports {
        log::info!("{}: {} games played, record {}", report.name, report.games_played, report.record);
    }
    Ok(())
}
