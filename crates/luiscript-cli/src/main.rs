use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::Parser;
use tokio::runtime::Handle;
use tracing::{info, warn};

use luiscript_runtime::{ConfigLoadError, Engine, HeadlessHost, RuntimeConfig};

mod logging;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file, defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load this package directory in addition to the configured ones
    #[arg(short, long = "package")]
    packages: Vec<PathBuf>,

    /// Run a Lua file as a standalone script
    #[arg(short, long)]
    exec: Option<PathBuf>,

    /// Stop after this many frames, runs until ctrl-c otherwise
    #[arg(short, long)]
    frames: Option<u64>,

    /// Frame length in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Enables debug mode
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write logs to the default log file
    #[arg(long)]
    log: bool,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<RuntimeConfig> {
    let explicit = path.is_some();
    let Some(path) = path.or_else(RuntimeConfig::default_path) else {
        warn!("No config directory available, using defaults");
        return Ok(default_config());
    };

    match RuntimeConfig::load(&path) {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) if !explicit => {
            info!("No config at {}, using defaults", path.display());
            Ok(default_config())
        }
        Err(e) => bail!("{}: {}", path.display(), e),
    }
}

fn default_config() -> RuntimeConfig {
    RuntimeConfig {
        search_paths: RuntimeConfig::default_search_path().into_iter().collect(),
        ..RuntimeConfig::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match (cli.log_file.clone(), cli.log) {
        (Some(path), _) => Some(path),
        (None, true) => Some(logging::default_log_file()?),
        (None, false) => None,
    };
    let _guard = logging::init_logging(cli.debug, log_file)?;

    let config = load_config(cli.config.clone())?;
    info!("Starting luiscript with {} search path(s)", config.search_paths.len());

    let host = Rc::new(HeadlessHost::new());
    let mut engine = Engine::new(host.clone(), config).with_runtime_handle(Handle::current());
    engine.start();

    for package in &cli.packages {
        engine
            .load_package(package)
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .with_context(|| format!("failed to load package {}", package.display()))?;
    }

    if let Some(path) = &cli.exec {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path.display().to_string();
        engine
            .load_code(&name, &source)
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .with_context(|| format!("failed to run {}", path.display()))?;
    }

    let mut interval = tokio::time::interval(Duration::from_millis(cli.frame_ms.max(1)));
    let mut frame: u64 = 0;

    loop {
        if cli.frames.is_some_and(|limit| frame >= limit) {
            break;
        }

        tokio::select! {
            _ = interval.tick() => {
                engine.run_frame();
                frame += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!(
        "Ran {} frame(s) across {} context(s)",
        frame,
        engine.context_count()
    );

    let open_menus: Vec<String> = engine.with_objects(|objects| {
        objects
            .menus()
            .filter(|(_, menu)| menu.is_open(host.as_ref()))
            .map(|(name, _)| name.clone())
            .collect()
    });
    if !open_menus.is_empty() {
        info!("Open menus: {}", open_menus.join(", "));
    }

    for command in host.commands() {
        info!("Host command: {}", command);
    }

    let errors = engine.errors();
    engine.stop();

    if !errors.is_empty() {
        warn!("{} script error(s) reported", errors.len());
        for error in &errors {
            warn!("[{}] {}", error.source, error.message);
        }
    }

    Ok(())
}
