//! Operator commands and the text labels the server puts on the wire.
//!
//! Payloads stay opaque bytes; the server only prefixes a sender label.

use crate::peer::ConnId;

pub const DEFAULT_EXIT_TOKEN: &str = ".exit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Exit,
    Broadcast(Vec<u8>),
}

/// One operator console line, as raw bytes. Anything but the exit token is a broadcast.
pub fn parse_command(line: &[u8], exit_token: &str) -> Command {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    let line = &line[..end];

    if line == exit_token.as_bytes() {
        Command::Exit
    } else {
        Command::Broadcast(line.to_vec())
    }
}

/// A chunk read from `id`, labeled for everybody else.
pub fn relayed(id: ConnId, chunk: &[u8]) -> Vec<u8> {
    let mut out = format!("connection {id}: ").into_bytes();
    out.extend_from_slice(chunk);
    out
}

pub fn operator(line: &[u8]) -> Vec<u8> {
    let mut out = b"Server: ".to_vec();
    out.extend_from_slice(line);
    out.push(b'\n');
    out
}

pub fn joined(id: ConnId) -> Vec<u8> {
    format!("connection {id} has joined the chat\n").into_bytes()
}

pub fn left(id: ConnId) -> Vec<u8> {
    format!("connection {id} has left the chat\n").into_bytes()
}

/// Fills `{id}` in the configured welcome line.
pub fn welcome(template: &str, id: ConnId) -> Vec<u8> {
    let mut line = template.replace("{id}", &id.to_string());
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line.into_bytes()
}
