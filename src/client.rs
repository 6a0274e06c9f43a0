//! Console chat client.
//!
//! Forwards typed lines to the server and prints whatever the server sends,
//! until the exit token is typed or the server goes away.

use std::io::BufRead;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ConnectArgs;

pub async fn run_client(args: ConnectArgs) -> Result<()> {
    let server_addr = format!("{}:{}", args.host, args.port);
    let stream = TcpStream::connect(&server_addr)
        .await
        .with_context(|| format!("failed to connect to {server_addr}"))?;
    info!("connected to {server_addr}");

    Client::new(stream, args.exit_token)
        .run(spawn_stdin_reader(), tokio::io::stdout())
        .await
}

/// Stdin is read on a plain thread: a pending console read must not keep the
/// runtime alive after the chat is over.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("failed to read console input: {e}");
                    break;
                }
            }
        }
    });

    rx
}

pub struct Client {
    stream: TcpStream,
    exit_token: String,
}

impl Client {
    pub fn new(stream: TcpStream, exit_token: String) -> Self {
        Self { stream, exit_token }
    }

    pub async fn run<W>(self, mut input: mpsc::UnboundedReceiver<String>, output: W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, mut writer) = self.stream.into_split();
        let mut receive_output = tokio::spawn(print_incoming(reader, output));

        loop {
            tokio::select! {
                _ = &mut receive_output => {
                    info!("server closed the connection");
                    break;
                }
                line = input.recv() => match line {
                    Some(line) if line == self.exit_token => {
                        info!("leaving the chat");
                        break;
                    }
                    Some(line) => {
                        let mut message = line.into_bytes();
                        message.push(b'\n');
                        if let Err(e) = writer.write_all(&message).await {
                            warn!("could not send message: {e}");
                            break;
                        }
                    }
                    None => {
                        debug!("console input ended");
                        break;
                    }
                },
            }
        }

        // Closing our side is all the server hears about us leaving.
        let _ = writer.shutdown().await;
        receive_output.abort();

        Ok(())
    }
}

async fn print_incoming<W>(mut reader: OwnedReadHalf, mut output: W)
where
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if output.write_all(&buf[..n]).await.is_err() || output.flush().await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("error receiving message: {e}");
                break;
            }
        }
    }
}
