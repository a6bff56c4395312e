// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Serving the HTTP control surface with the capture loop
//! - One-shot headless detection
//! - Receiving detection results
//! - Printing the effective configuration

use depth_locator::config::Config;
use depth_locator::errors::ConfigError;
use depth_locator::pipelines::broker::FrameBroker;
use depth_locator::pipelines::transport::ResultListener;
use depth_locator::{server, session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Default config location, used only when the file exists
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("depth-locator").join("config.toml"))
}

/// Load the config named on the command line, else the default file,
/// else built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        info!(path = %path.display(), "Loading config");
        return Config::from_file(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            info!(path = %path.display(), "Loading config");
            Config::from_file(&path)
        }
        _ => Ok(Config::default()),
    }
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// Run the HTTP server until `/exit` or Ctrl+C
pub fn serve(config: Config) -> CliResult {
    info!(
        bind = %config.server.bind,
        backend = %config.camera.backend,
        "Starting server"
    );
    runtime()?.block_on(server::serve(&config))?;
    Ok(())
}

/// Capture a few frames, run detection on the last one, print the report
///
/// The warm-up frames let the temporal filter settle before detecting.
pub fn detect(config: Config, warmup: u32) -> CliResult {
    let broker = Arc::new(FrameBroker::new());
    let service = session::detection_service(&config, Arc::clone(&broker))?;

    let mut source = session::frame_source(&config)?;
    source.start()?;
    broker.start();

    let wanted = warmup.max(1);
    let mut captured = 0;
    // Dropped or timed-out pairs get a few extra attempts
    for _ in 0..wanted * 3 {
        if let Some(frames) = source.try_capture()? {
            broker.publish_sample(frames);
            captured += 1;
            if captured >= wanted {
                break;
            }
        }
    }
    source.stop();
    if captured < wanted {
        warn!(captured, wanted, "Fewer frames than requested");
    }

    let report = runtime()?.block_on(service.process(config.detection.confidence))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Listen for results until Ctrl+C
pub fn receive(config: Config) -> CliResult {
    let settings = config.receiver;
    runtime()?.block_on(async move {
        let listener = ResultListener::bind(settings.listen.as_str(), settings.framing)
            .await?
            .with_read_limit(settings.read_limit());
        listener
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
            })
            .await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Print the effective configuration as TOML
pub fn print_config(config: &Config) -> CliResult {
    print!("{}", config.to_toml()?);
    Ok(())
}
