//! # chatrelay
//!
//! A small real-time text chat over plain TCP. The server relays every chunk a
//! client sends to all other connected clients, labeled with the sender's
//! connection number. The operator types announcements on the server console
//! and stops the server with an exit token (`.exit` by default).
//!
//! ```bash
//! chatrelay serve --port 8080
//! chatrelay connect --host 127.0.0.1 --port 8080
//! ```
//!
//! ## Architecture
//!
//! - **[Registry](state::Registry)**: the connections eligible for broadcasts,
//!   behind a single lock that also covers every fan-out
//! - **[Session worker](conn)**: one task per connection, reads and relays
//!   until the peer leaves or the server stops
//! - **[Command worker](console)**: operator console, the only trigger of shutdown
//! - **[Server](server::Server)**: accept loop and shutdown coordination
//! - **[Client](client)**: console client
//!
//! Each connection has a bounded outbound queue drained by its own writer, so
//! a stalled reader misses messages instead of stalling the sender.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use chatrelay::{Server, ServerConfig};
//! use tokio::io::{stdin, BufReader};
//! use tokio::net::TcpListener;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:8080").await?;
//! Server::new(ServerConfig::default())
//!     .run(listener, BufReader::new(stdin()))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod conn;
pub mod console;
pub mod peer;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod state;

pub use client::Client;
pub use config::ServerConfig;
pub use peer::ConnId;
pub use server::Server;
pub use state::{Registry, RegistryError};
