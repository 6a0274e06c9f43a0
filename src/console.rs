use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::protocol::{self, Command};
use crate::shutdown::Shutdown;
use crate::state::Registry;

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Operator command worker.
///
/// Turns console lines into server announcements until the exit token
/// arrives. It is the only place that stops the server and closes every
/// connection.
pub async fn run<R>(mut input: R, registry: Registry, shutdown: Shutdown, exit_token: String)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        line.clear();
        // Raw bytes: operator text need not be UTF-8.
        let read = tokio::select! {
            _ = shutdown.stopped() => break,
            read = input.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => {
                info!("operator console closed, server keeps running");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("failed to read operator console: {e}");
                if shutdown.pause(RETRY_DELAY).await {
                    continue;
                }
                break;
            }
        }

        match protocol::parse_command(&line, &exit_token) {
            Command::Exit => {
                info!("shutdown requested from the operator console");
                // Releases the accept loop, which drops the listener.
                shutdown.trigger();
                let closed = registry.close_all();
                info!(closed, "closed all connections");
                break;
            }
            Command::Broadcast(text) => {
                let recipients = registry.broadcast(protocol::operator(&text), None);
                debug!(recipients, "operator broadcast");
            }
        }
    }

    info!("command worker exited");
}
