mod config;
mod controller;
mod eta;
mod player;
mod schedule;
mod trigger;
mod wake;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;

use crate::config::{ProgramConfig, load_program_config};
use crate::controller::{ProgramController, ProgramEvent, ProgramState};
use crate::eta::{CommandEtaProvider, EtaProvider, FixedEtaProvider};
use crate::player::CommandAlarmPlayer;

#[derive(Parser, Debug)]
#[command(
    name = "trafficwake",
    version,
    about = "Traffic-aware wake-up alarm: polls a live ETA source and rings at the latest viable wake time"
)]
struct Cli {
    /// Program configuration file.
    #[arg(long, default_value = "program.json")]
    config: PathBuf,

    /// Use a fixed travel-time sample instead of an external estimator.
    #[arg(long, conflicts_with = "eta_command")]
    eta_seconds: Option<u32>,

    /// External command invoked as `CMD <origin> <destination>`, printing
    /// current travel seconds on stdout.
    #[arg(long)]
    eta_command: Option<String>,

    /// Audio player program for the alarm sound.
    #[arg(long, default_value_t = CommandAlarmPlayer::default_program().to_string())]
    player: String,

    /// Validate the configuration, print one wake computation, and exit.
    #[arg(long)]
    check: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_program_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let eta: Box<dyn EtaProvider> = match (cli.eta_seconds, &cli.eta_command) {
        (Some(seconds), _) => Box::new(FixedEtaProvider::new(seconds)),
        (None, Some(command)) => Box::new(CommandEtaProvider::new(command.clone())),
        (None, None) => bail!("choose an ETA source: --eta-seconds or --eta-command"),
    };

    if cli.check {
        return run_check(&config, eta.as_ref());
    }

    let player = Box::new(CommandAlarmPlayer::new(cli.player));
    let (mut controller, events) = ProgramController::new();
    controller.start(config.clone(), eta, player);

    let stdin_lines = spawn_stdin_listener();
    drive_until_idle(&mut controller, &events, &stdin_lines, &config);
    controller.join();
    Ok(())
}

fn run_check(config: &ProgramConfig, eta: &dyn EtaProvider) -> Result<()> {
    let now = Utc::now().with_timezone(&config.timezone);
    let eta_seconds = eta.estimate_travel_seconds(&config.origin, &config.destination)?;
    let snapshot = wake::compute(
        config.arrival_deadline,
        config.prep,
        config.buffer,
        eta_seconds,
        now,
    );

    println!("Configuration OK");
    println!("route: {} -> {}", config.origin, config.destination);
    println!("arrival_deadline: {}", config.arrival_deadline.to_rfc3339());
    println!("eta: {} min", snapshot.eta_minutes());
    println!("depart_latest: {}", snapshot.depart_latest.to_rfc3339());
    println!("wake_time: {}", snapshot.wake_time.to_rfc3339());
    println!("wake_now: {}", snapshot.wake_now);
    Ok(())
}

/// Prints the event stream and applies stdin control (a line dismisses a
/// ringing alarm, or stops a running program) until the run ends.
fn drive_until_idle(
    controller: &mut ProgramController,
    events: &Receiver<ProgramEvent>,
    stdin_lines: &Receiver<()>,
    config: &ProgramConfig,
) {
    loop {
        if stdin_lines.try_recv().is_ok() {
            match controller.state() {
                ProgramState::Ringing => controller.stop_alarm(),
                ProgramState::Running | ProgramState::Paused => controller.stop(),
                ProgramState::Idle => {}
            }
        }
        match events.recv_timeout(StdDuration::from_millis(100)) {
            Ok(event) => {
                let stamp = Utc::now()
                    .with_timezone(&config.timezone)
                    .format("%H:%M:%S");
                match event {
                    ProgramEvent::Log(line) => println!("[{stamp}] {line}"),
                    ProgramEvent::StateChanged {
                        state,
                        action_label,
                    } => {
                        println!("[{stamp}] state: {state} ({action_label})");
                        if state == ProgramState::Idle {
                            return;
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn spawn_stdin_listener() -> Receiver<()> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || sender.send(()).is_err() {
                break;
            }
        }
    });
    receiver
}
