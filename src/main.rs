use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use chatrelay::{client, config, server};

#[derive(Parser, Debug)]
#[command(author, version, about = "Relay chat messages between TCP clients.")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the chat server; type `.exit` on its console to stop it.
    Serve(config::ServeArgs),
    /// Join a chat server from this console.
    Connect(config::ConnectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Serve(serve_args) => {
            init_server_logging(serve_args.log_file.as_deref())?;
            info!("Starting chatrelay server");

            let console = tokio::io::BufReader::new(tokio::io::stdin());
            server::run(&serve_args, console).await
        }
        Commands::Connect(connect_args) => {
            init_client_logging(connect_args.log_file.as_deref())?;
            info!("Starting chatrelay client");

            client::run_client(connect_args).await
        }
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn open_log(path: &Path) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Server logs go to the operator console, and to a file when asked.
fn init_server_logging(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            let writer = std::io::stdout.and(Mutex::new(open_log(path)?));
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("info"))
                .with_writer(writer)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("info"))
                .init();
        }
    }

    Ok(())
}

/// The client console belongs to the chat, so only warnings reach it unless
/// logs are sent to a file.
fn init_client_logging(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("info"))
                .with_writer(Mutex::new(open_log(path)?))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("warn"))
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}
