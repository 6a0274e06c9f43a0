use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

use crate::protocol::DEFAULT_EXIT_TOKEN;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_READ_CHUNK: NonZeroUsize = NonZeroUsize::new(1024).unwrap();
pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = NonZeroUsize::new(256).unwrap();
pub const DEFAULT_WELCOME: &str = "Welcome to the chat, you are connection {id}";

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Host to bind the chat server to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Console line that shuts the server down
    #[arg(long, default_value = DEFAULT_EXIT_TOKEN)]
    pub exit_token: String,

    /// Largest chunk read from a connection before it is relayed
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK)]
    pub read_chunk: NonZeroUsize,

    /// Payloads queued per connection before a slow reader starts missing them
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: NonZeroUsize,

    /// Greeting sent to each new connection; `{id}` becomes its identity
    #[arg(long, default_value = DEFAULT_WELCOME)]
    pub welcome: String,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ConnectArgs {
    /// Chat server host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Chat server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Input line that leaves the chat
    #[arg(long, default_value = DEFAULT_EXIT_TOKEN)]
    pub exit_token: String,

    /// Write logs to this file instead of the console
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Server settings that do not concern binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub exit_token: String,
    pub read_chunk: usize,
    pub queue_capacity: usize,
    pub welcome: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            exit_token: DEFAULT_EXIT_TOKEN.to_string(),
            read_chunk: DEFAULT_READ_CHUNK.get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY.get(),
            welcome: DEFAULT_WELCOME.to_string(),
        }
    }
}

impl From<&ServeArgs> for ServerConfig {
    fn from(args: &ServeArgs) -> Self {
        Self {
            exit_token: args.exit_token.clone(),
            read_chunk: args.read_chunk.get(),
            queue_capacity: args.queue_capacity.get(),
            welcome: args.welcome.clone(),
        }
    }
}
