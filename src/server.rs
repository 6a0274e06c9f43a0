use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncBufRead;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::config::{ServeArgs, ServerConfig};
use crate::conn::{self, Session};
use crate::console;
use crate::peer::Peer;
use crate::protocol;
use crate::shutdown::Shutdown;
use crate::state::Registry;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Binds from the command line and serves until the operator types the exit token.
pub async fn run<R>(args: &ServeArgs, operator: R) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let listen_addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to listen on {listen_addr}"))?;

    Server::new(ServerConfig::from(args)).run(listener, operator).await
}

pub struct Server {
    config: ServerConfig,
    registry: Registry,
    shutdown: Shutdown,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Accepts connections until shutdown, then waits for every worker.
    ///
    /// Resolving means all connections are closed and all I/O has stopped.
    pub async fn run<R>(self, listener: TcpListener, operator: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let local = listener.local_addr().context("listener has no local address")?;
        info!("listening on {local}");

        self.shutdown.spawn(console::run(
            operator,
            self.registry.clone(),
            self.shutdown.clone(),
            self.config.exit_token.clone(),
        ));

        self.accept_loop(listener).await;

        info!("joining all workers");
        self.shutdown.trigger();
        self.shutdown.join_all().await;
        info!("server stopped");

        Ok(())
    }

    /// Owns the listener; returning drops it, which closes the endpoint.
    async fn accept_loop(&self, listener: TcpListener) {
        while self.shutdown.is_running() {
            let accepted = tokio::select! {
                _ = self.shutdown.stopped() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((socket, addr)) => self.admit(socket, addr),
                Err(_) if !self.shutdown.is_running() => break,
                Err(e) => {
                    // Back off: errors such as EMFILE persist across retries.
                    warn!("accept failed: {e}");
                    if !self.shutdown.pause(ACCEPT_RETRY_DELAY).await {
                        break;
                    }
                }
            }
        }

        info!("accept loop exited");
    }

    fn admit(&self, socket: TcpStream, addr: SocketAddr) {
        if !self.shutdown.is_running() {
            return;
        }

        let id = self.registry.next_id();
        let (peer, queue) = Peer::new(self.config.queue_capacity, self.shutdown.child());
        let closed = peer.close_signal();

        if let Err(e) = self.registry.register(id, peer) {
            warn!(%addr, "dropping connection: {e}");
            return;
        }

        // Announce before the session starts reading, so a departure can
        // never overtake the arrival.
        self.registry.send_to(id, protocol::welcome(&self.config.welcome, id));
        info!(conn = %id, %addr, "connection {} has joined the chat", id);
        self.registry.broadcast(protocol::joined(id), Some(id));

        let session = Session {
            id,
            addr,
            queue,
            closed,
        };
        self.shutdown.spawn(conn::handle(
            self.registry.clone(),
            socket,
            session,
            self.config.read_chunk,
        ));
    }
}
