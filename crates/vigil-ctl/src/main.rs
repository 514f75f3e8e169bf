//! vigil-ctl — supervisor console for the vigil pipeline.
//!
//! Reads lifecycle commands from stdin and prints status lines; the
//! status surface is the only place vigil prints to stdout by contract.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use vigil_core::config::VigilConfig;
use vigil_core::control::SessionState;
use vigil_ctl::{StartOutcome, Supervisor};

fn print_usage() {
    println!("Usage: vigil-ctl [--config <path>]");
    println!();
    println!("Commands (stdin):");
    println!("  start    Spawn the relay and bring the session up");
    println!("  stop     Tear the session down");
    println!("  status   Print the current status line");
    println!("  quit     Stop any session and exit");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(
                    args.get(i)
                        .context("--config requires a value")?
                        .clone()
                        .into(),
                );
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    if let Err(e) = VigilConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let path = config_path.unwrap_or_else(VigilConfig::file_path);
    let config = VigilConfig::load_from(&path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        VigilConfig::default()
    });
    tracing::info!(config = %path.display(), "vigil-ctl starting");

    let mut supervisor = Supervisor::new(config);
    let mut state_rx = supervisor.state();
    println!("{}", supervisor.status());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.context("stdin read failed")?;
                match line.as_deref().map(str::trim) {
                    Some("start") => match supervisor.start().await {
                        Ok(StartOutcome::Started) => {}
                        Ok(StartOutcome::AlreadyRunning) => println!("Already running."),
                        Err(e) => println!("Start failed: {e:#}"),
                    },
                    Some("stop") => {
                        if let Err(e) = supervisor.stop().await {
                            println!("Stop failed: {e:#}");
                        }
                    }
                    Some("status") => println!("{}", supervisor.status()),
                    Some("quit") | None => {
                        if let Err(e) = supervisor.stop().await {
                            tracing::warn!(error = %e, "stop during quit failed");
                        }
                        break;
                    }
                    Some("") => {}
                    Some(other) => {
                        println!("Unknown command: {other}");
                        println!("Commands: start | stop | status | quit");
                    }
                }
            }

            _ = state_rx.changed() => {
                let state = *state_rx.borrow_and_update();
                println!("{}", state.status_line());
                // relay-initiated teardown: complete the stop sequence
                if state == SessionState::Ending {
                    if let Err(e) = supervisor.stop().await {
                        tracing::warn!(error = %e, "teardown failed");
                    }
                }
            }
        }
    }

    Ok(())
}
