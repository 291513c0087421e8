// Clutchify CLI
// Re-emit foot switch presses and releases as two separate key taps

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use clutchify_core::settings::DEFAULT_DEVICE_PATTERN;
use clutchify_core::{Config, ConfigFile, ConfigOverrides, EvdevDevice, SessionError};

/// Exit status when the device pattern matches nothing or is malformed
const CONFIGURATION_EXIT_CODE: i32 = 126;

/// Convert down and up keystrokes to two separate taps
#[derive(Parser, Debug)]
#[command(name = "clutchify")]
#[command(version)]
#[command(about = "Convert down and up keystrokes to two separate taps", long_about = None)]
struct Args {
    /// Regex matched against input device names (first match wins)
    #[arg(short, long, value_name = "PATTERN")]
    device: Option<String>,

    /// Preset (legacy, f-low, f-high, ptt), one key for both edges, or DOWN UP
    #[arg(
        short,
        long,
        value_name = "KEYS",
        num_args = 1..=2,
        value_delimiter = ',',
        conflicts_with_all = ["down", "up"]
    )]
    keys: Vec<String>,

    /// Key tapped when the switch is pressed (default F11)
    #[arg(long, value_name = "KEY")]
    down: Option<String>,

    /// Key tapped when the switch is released (default F12)
    #[arg(long, value_name = "KEY")]
    up: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// List available input devices
    #[arg(long)]
    list_devices: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            device: self.device.clone(),
            keys: self.keys.clone(),
            down: self.down.clone(),
            up: self.up.clone(),
        }
    }
}

/// Main application state
struct Application {
    config: Config,
    /// Flag to signal event loop to stop
    running: Arc<AtomicBool>,
}

impl Application {
    /// Create a new application from CLI arguments
    fn new(args: &Args) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => ConfigFile::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConfigFile::load_default().context("Failed to load default config")?,
        };
        if let Some(path) = file.source_path() {
            log::debug!("Loaded config from {}", path.display());
        }

        let config = Config::resolve(args.overrides(), &file)?;

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// List available input devices
    fn list_devices() {
        let devices = EvdevDevice::list();
        println!("Found {} input device(s):", devices.len());
        for device in &devices {
            match &device.path {
                Some(path) => println!("  {}: {} ({})", device.index, device.name, path),
                None => println!("  {}: {}", device.index, device.name),
            }
        }
    }

    /// Lower the running flag on SIGINT/SIGTERM/SIGHUP so the session can
    /// release the device through its normal exit path. A second signal
    /// exits immediately in case the release itself hangs.
    fn install_signal_handlers(&self) -> anyhow::Result<()> {
        use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM, SIGHUP]).context("Failed to install signal handlers")?;
        let running = self.running.clone();

        // Spawn a thread to handle signals
        std::thread::spawn(move || {
            if let Some(code) = watch_signals(signals.forever(), &running) {
                process::exit(code);
            }
        });

        Ok(())
    }

    /// Run the core loop until interrupted or the device goes away
    fn run(&self) -> Result<(), SessionError> {
        log::debug!(
            "Device pattern \"{}\", keys {}",
            self.config.device_pattern,
            self.config.keys
        );
        clutchify_core::run(&self.config, self.running.clone())?;
        Ok(())
    }
}

/// Lower `running` on the first signal. Returns the exit status to force
/// on the second one.
fn watch_signals<I>(signals: I, running: &AtomicBool) -> Option<i32>
where
    I: IntoIterator<Item = i32>,
{
    let mut signals = signals.into_iter();

    let first = signals.next()?;
    log::info!("Received signal {}, shutting down", first);
    running.store(false, Ordering::SeqCst);

    let second = signals.next()?;
    log::warn!("Received signal {} again, exiting without cleanup", second);
    Some(128 + second)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn try_main(args: Args) -> anyhow::Result<()> {
    let app = Application::new(&args)?;
    app.install_signal_handlers()?;
    app.run()?;
    Ok(())
}

/// Exit status for a failed run
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SessionError>() {
        Some(session_err) if session_err.is_configuration() => CONFIGURATION_EXIT_CODE,
        _ => 1,
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    // Handle list-devices flag (doesn't need a device match)
    if args.list_devices {
        Application::list_devices();
        return;
    }

    if let Err(err) = try_main(args) {
        let code = exit_code(&err);
        if code == CONFIGURATION_EXIT_CODE {
            eprintln!("{}", err);
            eprintln!(
                "Use --list-devices to see device names (default pattern: \"{}\")",
                DEFAULT_DEVICE_PATTERN
            );
        } else {
            eprintln!("Error: {:#}", err);
        }
        process::exit(code);
    }
}
