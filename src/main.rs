//! detach - remote process-control daemon and client
//!
//! A command-line tool for launching detached processes on a machine running
//! the detach service, cancelling them, and listing everything the service
//! has launched.

use clap::{Parser, Subcommand};
use detach_core::{error::DetachError, init_logging};

mod cli;
mod daemon;

#[derive(Parser)]
#[command(name = "detach")]
#[command(about = "Launch and control detached processes over a control socket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the process-control daemon
    Serve {
        /// Detach from the terminal and run in the background
        #[arg(long)]
        daemon: bool,
    },
    /// Launch a new process
    Launch {
        /// The target executable
        #[arg(short, long)]
        executable: String,

        /// Working directory the underlying process should use
        #[arg(short = 'd', long = "workingDirectory")]
        working_directory: Option<String>,

        /// Arguments required by the underlying process
        #[arg(short, long, num_args = 0..)]
        arguments: Vec<String>,
    },
    /// Close a running process
    Close {
        /// The integer id assigned to the process
        #[arg(short = 'i', long = "processId")]
        process_id: u32,
    },
    /// Fetch info on all processes
    Fetch,
}

fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { daemon } => daemon::serve::run_serve(daemon),
        Commands::Launch {
            executable,
            working_directory,
            arguments,
        } => cli::launch::run_launch(executable, working_directory, arguments),
        Commands::Close { process_id } => cli::close::run_close(process_id),
        Commands::Fetch => cli::fetch::run_fetch(),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                DetachError::Config(_) | DetachError::Toml(_) | DetachError::TomlSerialize(_) => 2,
                // Runtime errors, including an unreachable daemon (exit code 1)
                DetachError::Protocol(_)
                | DetachError::Server(_)
                | DetachError::Client(_)
                | DetachError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
