//! TCP connection server
//!
//! Binds the control socket and handles connections strictly one at a time:
//! read a complete framed request, dispatch it, write the framed response,
//! close the connection, accept the next one. Supervisor tasks launched by a
//! dispatch keep running concurrently with the accept loop.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::error::{DetachError, ServerError};
use crate::protocol::{self, Request, FIELD_SEPARATOR};
use crate::registry::{ProcessRecord, Registry};
use crate::supervisor::{self, CancelPolicy, LaunchCommand};

/// The control daemon's connection server
pub struct Server {
    listener: TcpListener,
    registry: Registry,
    config: DaemonConfig,
}

impl Server {
    /// Resolve the bind address and bind the listening socket.
    ///
    /// Without an explicit `bind_address` in the configuration, the first
    /// address obtained by resolving the local hostname is used. A bind
    /// failure here is fatal to the daemon.
    pub async fn bind(config: DaemonConfig, registry: Registry) -> Result<Self, DetachError> {
        let host = match &config.bind_address {
            Some(address) => address.clone(),
            None => local_hostname()?,
        };
        let addr = lookup_host((host.as_str(), config.port))
            .await
            .map_err(|e| {
                error!("Error when binding the socket: {}", e);
                ServerError::BindFailed {
                    addr: format!("{}:{}", host, config.port),
                    source: e,
                }
            })?
            .next()
            .ok_or(ServerError::NoBindAddress)?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("Error when binding the socket: {}", e);
            ServerError::BindFailed {
                addr: addr.to_string(),
                source: e,
            }
        })?;
        info!("Listening on {}", addr);

        Ok(Self {
            listener,
            registry,
            config,
        })
    }

    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop until `shutdown` is triggered.
    ///
    /// On shutdown, every outstanding supervisor is asked to cancel, a fixed
    /// grace period elapses, and the listening socket is closed. The daemon
    /// does not wait for children beyond the grace period.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DetachError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        // Handled inline: the next accept waits for this
                        // connection to finish
                        if let Err(e) = self.handle_connection(stream).await {
                            warn!("Connection error: {}", e);
                        }
                    }
                    Err(e) => warn!("Accept error: {}", e),
                }
            }
        }

        // Best-effort cancellation broadcast, then a bounded grace period
        self.registry.cancel_all();
        tokio::time::sleep(Duration::from_millis(self.config.shutdown_grace_ms)).await;
        info!("Closing socket at: {}", Utc::now().format("%Y-%m-%d_%H-%M"));
        drop(self.listener);
        Ok(())
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let message = protocol::read_framed(&mut stream).await?;
        let response = match protocol::decode_request(&message) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                // Malformed requests get an empty response; the connection
                // itself still closes cleanly
                warn!("Rejected malformed request: {}", e);
                String::new()
            }
        };

        stream
            .write_all(protocol::frame(&response).as_bytes())
            .await?;
        debug!("Sent response to client");
        stream.shutdown().await?;
        Ok(())
    }

    async fn dispatch(&self, request: Request) -> String {
        match request {
            Request::Unrecognized => {
                info!("Did not recognize request, aborting task");
                String::new()
            }
            Request::Launch {
                executable,
                working_directory,
                arguments,
            } => {
                info!("Requested new process be launched: {}", executable);
                let record = self.registry.insert_new();
                let command = LaunchCommand {
                    executable,
                    working_directory,
                    arguments,
                };
                tokio::spawn(supervisor::supervise(
                    self.registry.clone(),
                    record.clone(),
                    command,
                    self.config.output_dir.clone(),
                    CancelPolicy::default(),
                ));
                // The response reflects acceptance, not spawn success
                serialize_record(&record)
            }
            Request::Cancel { id } => {
                info!("Requested process {} be cancelled", id);
                if self.registry.signal_cancel(id) {
                    // Give the supervisor a moment to react; the response
                    // does not guarantee the process has exited
                    tokio::time::sleep(Duration::from_millis(self.config.cancel_delay_ms)).await;
                    match self.registry.get(id) {
                        Some(record) => serialize_record(&record),
                        None => String::new(),
                    }
                } else {
                    warn!("Process id {} not found", id);
                    String::new()
                }
            }
            Request::FetchAll => {
                info!("Requested info on all processes");
                let mut response = String::new();
                for record in self.registry.snapshot() {
                    response.push_str(&serialize_record(&record));
                    response.push_str(FIELD_SEPARATOR);
                }
                response
            }
        }
    }
}

fn serialize_record(record: &ProcessRecord) -> String {
    serde_json::to_string(record).unwrap_or_else(|e| {
        error!("Failed to serialize record {}: {}", record.id, e);
        String::new()
    })
}

/// First-choice bind host: the machine's own hostname
pub fn local_hostname() -> Result<String, DetachError> {
    let name = nix::unistd::gethostname().map_err(|e| {
        error!("Failed to read the local hostname: {}", e);
        ServerError::NoBindAddress
    })?;
    Ok(name.to_string_lossy().into_owned())
}
