//! vigild — vigil relay daemon entry point.

use anyhow::{Context, Result};

use vigil_core::config::VigilConfig;
use vigild::notify::TelegramNotifier;

fn print_usage() {
    println!("Usage: vigild [--config <path>]");
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

    let path = config_path.unwrap_or_else(VigilConfig::file_path);
    let config = VigilConfig::load_from(&path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        VigilConfig::default()
    });
    tracing::info!(config = %path.display(), "vigild starting");

    let notifier = TelegramNotifier::spawn(&config.notifier);
    vigild::run(config, Box::new(notifier)).await
}
