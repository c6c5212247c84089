mod context;
mod position;
mod session;
mod uplink;
mod wake_lock;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::position::Track;
use crate::session::TrackingStatus;
use crate::web::{AppState, Config};

#[derive(Parser)]
#[command(name = "driver-tracker")]
#[command(about = "Live vehicle location tracking for drivers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and the replay track it points at
    Validate {
        #[arg(short, long)]
        config: String,
    },
    /// Serve the local control API
    Serve {
        #[arg(short, long)]
        config: String,
    },
    /// Start tracking right away and run until Ctrl-C
    Track {
        #[arg(short, long)]
        config: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Serve { config } => with_runtime(&config, serve),
        Commands::Track { config } => with_runtime(&config, track),
    }
}

fn load(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            None
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };

    println!("Config is valid");
    println!("  uplink: {}/gps", config.api.base_url.trim_end_matches('/'));
    println!("  control API: {}", config.control.bind);
    println!(
        "  wake lock: {}",
        config
            .wake_lock
            .as_ref()
            .map(|w| w.command.as_str())
            .unwrap_or("unsupported")
    );

    match &config.position {
        Some(position) => match Track::from_file(&position.replay) {
            Ok(track) => {
                println!(
                    "  replay track: {} ({} entries{})",
                    position.replay.display(),
                    track.steps.len(),
                    if track.repeat { ", repeating" } else { "" }
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Replay track error: {}", e);
                ExitCode::FAILURE
            }
        },
        None => {
            println!("  position source: unavailable");
            ExitCode::SUCCESS
        }
    }
}

fn with_runtime<F, Fut>(path: &str, f: F) -> ExitCode
where
    F: FnOnce(Config, AppState) -> Fut,
    Fut: std::future::Future<Output = ExitCode>,
{
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };

    // Everything runs on one event loop.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let state = match AppState::from_config(&config) {
            Ok(state) => state,
            Err(e) => {
                eprintln!("Startup error: {}", e);
                return ExitCode::FAILURE;
            }
        };
        f(config, state).await
    })
}

async fn serve(config: Config, state: AppState) -> ExitCode {
    match web::run_server(&config.control.bind, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn track(_config: Config, state: AppState) -> ExitCode {
    let manager = state.manager;
    if let Err(e) = manager.start() {
        eprintln!("Cannot start tracking: {}", e);
        return ExitCode::FAILURE;
    }

    let mut status_rx = manager.watch_status();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status_rx.borrow_and_update().clone();
                if let Some(position) = snapshot.current_position {
                    println!(
                        "[{}] {:.6}, {:.6}",
                        snapshot.status, position.latitude, position.longitude
                    );
                }
                if let Some(error) = &snapshot.last_error {
                    println!("[{}] {}", snapshot.status, error);
                }
                if snapshot.status == TrackingStatus::Idle {
                    break;
                }
            }
        }
    }

    let snapshot = manager.stop();
    println!("Tracking stopped ({})", snapshot.status);
    ExitCode::SUCCESS
}
