//! propsrv daemon - Subscription-driven TCP property server
//!
//! This binary serves live simulation telemetry to line-protocol clients
//! on the loopback interface.
//!
//! # Usage
//!
//! ```bash
//! # Start the server (foreground)
//! propsrvd start
//!
//! # Start in the background, fed by the synthetic demo host
//! propsrvd start -d --demo
//!
//! # Stop the server
//! propsrvd stop
//!
//! # Check server status
//! propsrvd status
//!
//! # List every property a client can subscribe to
//! propsrvd properties
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use propsrvd::config::Settings;
use propsrvd::host::{host_registry, spawn_demo_host, LogInputTrigger, TickBridge};
use propsrvd::logging;
use propsrvd::server::{PropertyServer, ServerContext};
use propsrvd::subscriptions::SubscriptionManager;

/// propsrv daemon - live telemetry over a line protocol
#[derive(Parser, Debug)]
#[command(name = "propsrvd", version, about)]
struct Args {
    /// Settings file (defaults to <config_dir>/propsrv/settings.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,

        /// Feed properties from the synthetic demo host
        #[arg(long)]
        demo: bool,

        /// Listen port, overrides settings and environment
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Stop the running server
    Stop,
    /// Show server status
    Status,
    /// List the discoverable properties and their types
    Properties,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("propsrv")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("propsrvd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("propsrv.log")
}

fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

/// Loads settings from `path` or the default location, then applies the
/// environment and an optional port override.
fn load_settings(path: Option<&Path>, port: Option<u16>) -> Result<Settings> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Settings::default_path(),
    };

    let mut settings = match &path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    settings
        .apply_env()
        .context("Invalid settings in environment")?;
    if let Some(port) = port {
        settings.port = port;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start {
        daemon: false,
        demo: false,
        port: None,
    });

    match command {
        Command::Start { daemon, demo, port } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Server is already running (PID {pid})");
                eprintln!("Use 'propsrvd stop' to stop it first.");
                process::exit(1);
            }

            let settings = load_settings(args.config.as_deref(), port)?;

            if daemon {
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon(settings, demo);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping server (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Server stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Server did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Server is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Server is running (PID {pid})");
                if let Ok(settings) = load_settings(args.config.as_deref(), None) {
                    println!("Address: 127.0.0.1:{}", settings.port);
                }
                Ok(())
            } else {
                println!("Server is not running.");
                process::exit(1);
            }
        }
        Command::Properties => {
            for descriptor in host_registry().available_properties() {
                println!("{} {}", descriptor.qualified_name(), descriptor.value_type());
            }
            Ok(())
        }
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(&log_path).context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(settings: Settings, demo: bool) -> Result<()> {
    logging::init(settings.log_level).map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        port = settings.port,
        log_level = settings.log_level.as_str(),
        "Property server starting"
    );

    let cancel_token = CancellationToken::new();

    let subscriptions = Arc::new(SubscriptionManager::new(Arc::new(host_registry())));
    let ctx = Arc::new(ServerContext::new(
        Arc::clone(&subscriptions),
        Arc::new(LogInputTrigger),
        settings.product_name.as_str(),
    ));

    let server = Arc::new(
        PropertyServer::bind(settings.port, ctx, cancel_token.clone())
            .await
            .with_context(|| format!("Failed to start server on port {}", settings.port))?,
    );

    let shutdown_server = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_server.stop().await;
    });

    let demo_handle = demo.then(|| {
        let bridge = TickBridge::new(Arc::clone(&subscriptions), settings.update_interval());
        info!("Demo host enabled");
        spawn_demo_host(bridge, cancel_token.clone())
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    if let Some(handle) = demo_handle {
        let _ = handle.await;
    }

    info!("Property server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
