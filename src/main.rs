// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use depth_locator::config::Config;
use depth_locator::constants::app_info;
use depth_locator::pipelines::transport::Framing;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depth-locator")]
#[command(about = "Locate detected objects in 3D with a depth camera and relay the coordinates")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/depth-locator/config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control surface (default)
    Serve {
        /// Listen address, e.g. 127.0.0.1:8000
        #[arg(short, long)]
        bind: Option<String>,

        /// Receiver address for detection results
        #[arg(short, long)]
        remote: Option<String>,

        /// Keep results local instead of sending them
        #[arg(long)]
        no_send: bool,
    },

    /// Capture once, run detection, print the report as JSON
    Detect {
        /// Confidence threshold in [0, 1]
        #[arg(long)]
        confidence: Option<f64>,

        /// Receiver address for detection results
        #[arg(short, long)]
        remote: Option<String>,

        /// Keep results local instead of sending them
        #[arg(long)]
        no_send: bool,

        /// Frames to capture before detecting
        #[arg(short, long, default_value = "5")]
        warmup: u32,

        /// Directory for the annotated result image
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Listen for detection results and log them
    Receive {
        /// Listen address, e.g. 0.0.0.0:5000
        #[arg(short, long)]
        listen: Option<String>,

        /// Message framing: length-prefixed or raw
        #[arg(short, long)]
        framing: Option<Framing>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depth_locator=debug, RUST_LOG=warn
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let mut config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        None => cli::serve(config),
        Some(Commands::Serve {
            bind,
            remote,
            no_send,
        }) => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            apply_send_overrides(&mut config, remote, no_send);
            config.validate()?;
            cli::serve(config)
        }
        Some(Commands::Detect {
            confidence,
            remote,
            no_send,
            warmup,
            output,
        }) => {
            if let Some(confidence) = confidence {
                config.detection.confidence = confidence;
            }
            if output.is_some() {
                config.detection.output_dir = output;
            }
            apply_send_overrides(&mut config, remote, no_send);
            config.validate()?;
            cli::detect(config, warmup)
        }
        Some(Commands::Receive { listen, framing }) => {
            if let Some(listen) = listen {
                config.receiver.listen = listen;
            }
            if let Some(framing) = framing {
                config.receiver.framing = framing;
            }
            config.validate()?;
            cli::receive(config)
        }
        Some(Commands::Config) => cli::print_config(&config),
    }
}

fn apply_send_overrides(config: &mut Config, remote: Option<String>, no_send: bool) {
    if let Some(remote) = remote {
        config.transport.remote = remote;
    }
    if no_send {
        config.detection.send_results = false;
    }
}
