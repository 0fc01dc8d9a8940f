//! Serve command: run the process-control daemon
//!
//! Foreground by default (for service managers and containers); `--daemon`
//! detaches from the terminal first. SIGINT and SIGTERM trip the shutdown
//! token, which drains the server: cancel every supervisor, wait the grace
//! period, close the listening socket.

use std::path::{Path, PathBuf};

use daemonize::Daemonize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use detach_core::config::{load_config, DaemonConfig};
use detach_core::error::{DetachError, ServerError};
use detach_core::registry::Registry;
use detach_core::server::Server;

/// Run the daemon until a stop signal arrives
pub fn run_serve(detach: bool) -> Result<(), DetachError> {
    let config = load_config()?;

    if detach {
        // Fork before the runtime exists; tokio does not survive a fork
        detach_from_terminal()?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: DaemonConfig) -> Result<(), DetachError> {
    info!(
        "Starting up the service at: {}",
        chrono::Utc::now().format("%Y-%m-%d_%H-%M")
    );

    let registry = Registry::new();
    let server = Server::bind(config, registry).await?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_stop_signal().await;
        info!("Stop signal received, shutting down");
        trigger.cancel();
    });

    server.run(shutdown).await
}

async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = ctrl_c.await;
        }
    }
}

fn detach_from_terminal() -> Result<(), DetachError> {
    let pid_file = default_pid_file();
    if let Some(parent) = pid_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let working_directory = std::env::current_dir()?;
    Daemonize::new()
        .pid_file(&pid_file)
        .working_directory(working_directory)
        .umask(0o027)
        .start()
        .map_err(|e| {
            DetachError::Server(ServerError::DaemonizeFailed {
                reason: e.to_string(),
            })
        })?;

    info!("Successfully daemonized process, PID: {}", std::process::id());
    Ok(())
}

/// Get the default PID file path
fn default_pid_file() -> PathBuf {
    // Use XDG_RUNTIME_DIR if available, otherwise /tmp
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        Path::new(&runtime_dir).join("detach.pid")
    } else {
        Path::new("/tmp").join(format!("detach-{}.pid", nix::unistd::getuid()))
    }
}
