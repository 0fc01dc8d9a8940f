//! Error types for the detach process-control daemon
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the detach application
#[derive(Error, Debug)]
pub enum DetachError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to decoding wire protocol messages
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Errors related to the connection server
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Errors related to the client side of the control socket
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Wire protocol decoding errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A command was recognized but one of its required fields is absent
    #[error("Message is missing required field: {field}")]
    MissingField { field: &'static str },

    /// The id field of a cancel request did not parse as an unsigned integer.
    /// Distinct from `MissingField`: the field was present but unusable.
    #[error("Could not parse process id from field {value:?}")]
    InvalidId { value: String },
}

/// Connection server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Could not resolve the local hostname to a bind address")]
    NoBindAddress,

    #[error("Failed to bind listening socket on {addr}: {source}")]
    BindFailed {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to daemonize: {reason}")]
    DaemonizeFailed { reason: String },
}

/// Control-socket client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not connect to the detach service at {addr}")]
    Unreachable { addr: String },

    #[error("Connection to the detach service failed: {reason}")]
    Transport { reason: String },
}
