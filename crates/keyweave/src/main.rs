//! keyweave entry point.
//!
//! Loads the mapping file, installs the global keyboard hook on its own
//! thread, and remaps keys until Ctrl-C.  The mapping file can also be edited
//! from the command line.
//!
//! # Usage
//!
//! ```text
//! keyweave [--config <PATH>] [COMMAND]
//!
//! Commands:
//!   run    Install the hook and remap until Ctrl-C (default)
//!   map    Add or replace a mapping in the config file
//!   unmap  Remove a mapping from the config file
//!   list   Print the mappings in the config file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable           | Default       | Description                     |
//! |--------------------|---------------|---------------------------------|
//! | `KEYWEAVE_CONFIG`  | `config.json` | Mapping file                    |
//! | `KEYWEAVE_BACKEND` | `hook`        | Interception backend for `run`  |
//! | `RUST_LOG`         | `info`        | Log filter (`debug` when the    |
//! |                    |               | file sets `ShowDebugConsole`)   |

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

use keyweave::application::remap_keys::KeyInjector;
use keyweave::infrastructure::hook::{HookCapabilities, HookError};
use keyweave::infrastructure::storage::config::{
    load_config, load_or_default, ConfigError, JsonConfigStore, MappingConfig,
    DEFAULT_CONFIG_FILE,
};
use keyweave::KeyRemapper;
use keyweave_core::{RemapTable, VirtualKey};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// System-wide keyboard remapper.
#[derive(Debug, Parser)]
#[command(name = "keyweave", about = "System-wide keyboard remapper", version)]
struct Cli {
    /// Mapping file (JSON).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, env = "KEYWEAVE_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the keyboard hook and remap until Ctrl-C.
    Run {
        #[arg(long, value_enum, default_value_t = BackendKind::Hook, env = "KEYWEAVE_BACKEND")]
        backend: BackendKind,
    },
    /// Map SOURCE to TARGET (key name, `0x..` hex, or decimal code).
    Map { source: VirtualKey, target: VirtualKey },
    /// Remove the mapping for SOURCE.
    Unmap { source: VirtualKey },
    /// Print the configured mappings.
    List,
}

/// Interception mechanism used by `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Low-level keyboard hook; can suppress the original key.
    Hook,
    /// Raw input sink; observe-only, remaps are additive.
    RawInput,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The debug flag lives in the config file, so peek at it before logging
    // starts; problems with the file are reported once logging is up.
    let show_debug = load_config(&cli.config)
        .map(|config| config.show_debug_console)
        .unwrap_or(false);
    // Hold the guard until exit so buffered log lines are flushed.
    let _log_guard = init_tracing(show_debug);

    let command = cli.command.unwrap_or(Command::Run {
        backend: BackendKind::Hook,
    });
    match command {
        Command::Run { backend } => run(&cli.config, backend).await,
        Command::Map { source, target } => edit_mappings(&cli.config, |table| {
            table.insert(source, target);
            info!("mapped {source} -> {target}");
        }),
        Command::Unmap { source } => edit_mappings(&cli.config, |table| {
            match table.remove(source) {
                Some(target) => info!("unmapped {source} (was -> {target})"),
                None => warn!("no mapping for {source}"),
            }
        }),
        Command::List => list(&cli.config),
    }
}

/// Initialises structured logging.  `RUST_LOG` overrides the default level.
///
/// Lines are handed to a background writer thread: the hook callback logs, and
/// it must never block on a slow or paused console.
fn init_tracing(show_debug: bool) -> WorkerGuard {
    let default_level = if show_debug { "debug" } else { "info" };
    let (writer, guard) = background_writer(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_thread_names(true)
        .with_writer(writer)
        .init();
    guard
}

/// Moves writes to `sink` onto a dedicated thread.
fn background_writer<W>(sink: W) -> (NonBlocking, WorkerGuard)
where
    W: std::io::Write + Send + 'static,
{
    tracing_appender::non_blocking(sink)
}

// ── run ───────────────────────────────────────────────────────────────────────

async fn run(config_path: &Path, backend: BackendKind) -> anyhow::Result<()> {
    info!("keyweave starting");

    let config = load_or_default(config_path);
    let injector = platform_injector()?;
    let mut remapper = KeyRemapper::new(config.to_table(), injector)
        .with_persister(Arc::new(JsonConfigStore::new(config_path)));

    let observer = spawn_observer_log(remapper.subscribe())
        .context("failed to spawn the key observer thread")?;

    let capabilities = start_backend(&mut remapper, backend)
        .with_context(|| format!("failed to start the {backend:?} backend"))?;
    if !capabilities.can_suppress {
        warn!(
            "the {backend:?} backend cannot suppress keys: remapped keys are typed in \
             addition to the original"
        );
    }

    info!("keyweave ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");

    remapper.stop().context("failed to uninstall the keyboard hook")?;
    let stats = remapper.stats();
    info!(
        "keyweave stopped: {} key-downs, {} remapped, {} injected events skipped, {} injection failures",
        stats.key_downs, stats.remapped, stats.injected_skipped, stats.injection_failures
    );

    // Dropping the remapper drops the engine and closes the observer channel.
    drop(remapper);
    join_observer(observer);
    Ok(())
}

/// Waits for the observer thread; returns `false` (and logs) if it panicked.
fn join_observer(observer: JoinHandle<()>) -> bool {
    match observer.join() {
        Ok(()) => true,
        Err(_) => {
            warn!("key observer thread panicked");
            false
        }
    }
}

/// Logs every `KeyObserved` key off the hook thread.
fn spawn_observer_log(observed: Receiver<VirtualKey>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("keyweave-observer".to_string())
        .spawn(move || {
            for key in observed {
                debug!("key observed: {key}");
            }
        })
}

#[cfg(target_os = "windows")]
fn platform_injector() -> Result<Arc<dyn KeyInjector>, HookError> {
    use keyweave::infrastructure::injector::windows::SendInputInjector;
    Ok(Arc::new(SendInputInjector::new()))
}

#[cfg(not(target_os = "windows"))]
fn platform_injector() -> Result<Arc<dyn KeyInjector>, HookError> {
    Err(HookError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}

#[cfg(target_os = "windows")]
fn start_backend(
    remapper: &mut KeyRemapper,
    backend: BackendKind,
) -> Result<HookCapabilities, HookError> {
    use keyweave::infrastructure::hook::raw_input::RawInputBackend;
    use keyweave::infrastructure::hook::windows::LowLevelHookBackend;
    match backend {
        BackendKind::Hook => remapper.start(LowLevelHookBackend::new),
        BackendKind::RawInput => remapper.start(RawInputBackend::new),
    }
}

#[cfg(not(target_os = "windows"))]
fn start_backend(
    _remapper: &mut KeyRemapper,
    _backend: BackendKind,
) -> Result<HookCapabilities, HookError> {
    Err(HookError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}

// ── map / unmap / list ────────────────────────────────────────────────────────

/// Applies `edit` to the table in the config file and writes it back.
///
/// A missing file starts from an empty table; an unreadable one is left
/// untouched.
fn edit_mappings(config_path: &Path, edit: impl FnOnce(&mut RemapTable)) -> anyhow::Result<()> {
    let mut table = match load_config(config_path) {
        Ok(config) => config.to_table(),
        Err(ConfigError::NotFound(_)) => RemapTable::new(),
        Err(e) => return Err(e).context("refusing to edit an unreadable config file"),
    };
    edit(&mut table);
    JsonConfigStore::new(config_path)
        .save_table(&table)
        .with_context(|| format!("failed to write {}", config_path.display()))
}

fn list(config_path: &Path) -> anyhow::Result<()> {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            info!(
                "{} does not exist; `run` would use the built-in defaults",
                config_path.display()
            );
            MappingConfig::built_in_default()
        }
        Err(e) => return Err(e.into()),
    };
    for (source, target) in config.to_table().iter() {
        println!("{source} -> {target}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Console stand-in that blocks every write while `gate` is held.
    #[derive(Clone)]
    struct PausedConsole {
        gate: Arc<Mutex<()>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for PausedConsole {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let _open = self.gate.lock().unwrap();
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_join_observer_reports_panicked_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let clean = spawn_observer_log(rx).expect("spawn");
        drop(tx);
        let broken = thread::spawn(|| panic!("observer failed"));

        assert!(join_observer(clean));
        assert!(!join_observer(broken));
    }

    #[test]
    fn test_logging_does_not_wait_for_a_blocked_console() {
        // Arrange
        let console = PausedConsole {
            gate: Arc::new(Mutex::new(())),
            written: Arc::new(Mutex::new(Vec::new())),
        };
        let paused = console.gate.lock().unwrap();
        let (writer, guard) = background_writer(console.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .finish();

        // Act
        let started = Instant::now();
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..50 {
                debug!("A -> B ({i})");
            }
        });
        let elapsed = started.elapsed();

        // Assert: every call returned while the console was still paused
        assert!(elapsed < Duration::from_secs(1), "logging blocked for {elapsed:?}");
        drop(paused);
        drop(guard);
        let written = String::from_utf8(console.written.lock().unwrap().clone()).unwrap();
        assert!(written.contains("A -> B (49)"));
    }
}
