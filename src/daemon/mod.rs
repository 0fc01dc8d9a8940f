//! Daemon entry point for the process-control service
//!
//! This module wires the connection server into a runnable service: runtime
//! setup, optional detachment from the terminal, and signal-driven shutdown.

pub mod serve;
