// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::app::{App, AppServices, ScreenKind, UiContext};
use barcode_scanner::backends::camera::{CameraProvider, LensFacing, V4l2CameraProvider};
use barcode_scanner::constants::APP_DIR_NAME;
use barcode_scanner::errors::{AppError, AppResult};
use barcode_scanner::permission::PortalAuthorizer;
use barcode_scanner::{BarcodeDetector, Config, terminal};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

const LOG_FILE_NAME: &str = "scanner.log";

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan barcodes and QR codes with a camera")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Camera device node to use (e.g. /dev/video2)
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Which camera to prefer: back, front or external
    #[arg(short, long, global = true)]
    facing: Option<LensFacing>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the scanner screen directly
    Scan,

    /// List available cameras
    List,

    /// Decode barcodes from image files or directories
    Decode {
        /// Images or directories to scan
        #[arg(required = true)]
        input: Vec<PathBuf>,
    },

    /// Show the effective settings
    Config {
        /// Write them, including --device and --facing, to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The terminal owns stdout/stderr while the UI is up, so it logs to a file
    match cli.command {
        Some(Commands::List | Commands::Decode { .. } | Commands::Config { .. }) => {
            init_stderr_logging()
        }
        Some(Commands::Scan) | None => init_file_logging()?,
    }

    let mut config = Config::load();
    if let Some(device) = cli.device {
        config.device_path = Some(device);
    }
    if let Some(facing) = cli.facing {
        config.lens_facing = facing;
    }

    match cli.command {
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Decode { input }) => {
            cli::decode_images(&input, config.decoder_max_dimension)
        }
        Some(Commands::Config { save }) => cli::show_config(&config, save),
        Some(Commands::Scan) => run_tui(config, ScreenKind::Scanner),
        None => run_tui(config, ScreenKind::Launcher),
    }
}

fn run_tui(config: Config, initial: ScreenKind) -> Result<(), Box<dyn std::error::Error>> {
    info!(version = env!("GIT_VERSION"), "Starting barcode scanner");

    let runtime = tokio::runtime::Runtime::new()?;
    let (ctx, receiver) = UiContext::new(runtime.handle().clone());

    let capture_format = config.capture_format();
    let capture_buffers = config.capture_buffers;
    let services = AppServices {
        authorizer: Arc::new(PortalAuthorizer::new()),
        scanner: Arc::new(BarcodeDetector::with_max_dimension(config.decoder_max_dimension)),
        provider_factory: Box::new(move || {
            Box::new(V4l2CameraProvider::new(capture_format, capture_buffers))
                as Box<dyn CameraProvider>
        }),
        selector: config.selector(),
        backpressure: config.backpressure,
    };

    let app = App::new(ctx, services, initial);
    terminal::run(app, receiver)?;

    info!("Barcode scanner exited");
    Ok(())
}

fn env_filter() -> EnvFilter {
    // Set RUST_LOG to control the level, e.g. RUST_LOG=barcode_scanner=debug
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

fn init_file_logging() -> AppResult<()> {
    let path = log_file_path()?;
    let file = File::create(&path)
        .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .init();
    Ok(())
}

fn log_file_path() -> AppResult<PathBuf> {
    let dir = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| AppError::Storage("no state or cache directory".to_string()))?
        .join(APP_DIR_NAME);
    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::Storage(format!("{}: {}", dir.display(), e)))?;
    Ok(dir.join(LOG_FILE_NAME))
}
