//! Lifecycle of the duplex channel to the backend.
//!
//! `ConnectionManager` lives on the event-loop thread and decides whether an
//! outbound message may be written. The socket itself is owned by a worker
//! thread (see [`spawn_socket_link`]) that connects, pumps frames both ways,
//! and reconnects after a fixed delay for as long as the process runs.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::error::HostResult;
use crate::protocol::{ClientEnvelope, ServerEnvelope, decode_server_envelope, encode_client_envelope};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_TOKEN: &str = "1234";
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Where the backend lives and how this device introduces itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub device_id: String,
}

impl Endpoint {
    pub fn url(&self) -> String {
        format!(
            "ws://{}:{}/?token={}&device={}",
            self.host,
            self.port,
            urlencoding::encode(&self.token),
            urlencoding::encode(&self.device_id)
        )
    }
}

/// Write half of the channel as seen from the event loop.
pub trait Link {
    /// Hands one text frame to the channel. Returns `false` if the channel
    /// is gone.
    fn send_text(&mut self, text: String) -> bool;

    /// Drops the current connection and reconnects right away.
    fn reload(&mut self);
}

type StatusSubscriber = Box<dyn FnMut(ConnectionState)>;

pub struct ConnectionManager<L> {
    link: L,
    state: ConnectionState,
    subscribers: Vec<StatusSubscriber>,
}

impl<L: Link> ConnectionManager<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            state: ConnectionState::Connecting,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(ConnectionState) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn on_connecting(&mut self) {
        self.transition(ConnectionState::Connecting);
    }

    pub fn on_open(&mut self) {
        self.transition(ConnectionState::Open);
    }

    pub fn on_close(&mut self) {
        self.transition(ConnectionState::Closed);
    }

    /// Decodes one inbound frame. Undecodable frames and unknown message
    /// types are logged and skipped.
    pub fn on_text(&self, text: &str) -> Option<ServerEnvelope> {
        match decode_server_envelope(text) {
            Ok(ServerEnvelope::Unrecognized) => {
                debug!("ignoring inbound message of unrecognized type");
                None
            }
            Ok(envelope) => Some(envelope),
            Err(err) => {
                warn!(%err, "dropping undecodable inbound message");
                None
            }
        }
    }

    /// Writes `envelope` if the channel is open. Otherwise the message is
    /// dropped: every save carries full state, so the next one repairs it.
    pub fn send(&mut self, envelope: &ClientEnvelope) -> bool {
        if !self.is_open() {
            debug!(state = ?self.state, "channel not open; dropping outbound message");
            return false;
        }

        match encode_client_envelope(envelope) {
            Ok(text) => self.link.send_text(text),
            Err(err) => {
                warn!(%err, "failed to encode outbound message");
                false
            }
        }
    }

    pub fn request_reload(&mut self) {
        self.link.reload();
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }

        self.state = next;
        for subscriber in &mut self.subscribers {
            subscriber(next);
        }
    }
}

/// What the socket worker reports to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connecting,
    Opened,
    Text(String),
    Closed(String),
}

#[derive(Debug)]
enum LinkCommand {
    Send(String),
    Reload,
}

/// [`Link`] backed by the socket worker thread.
#[derive(Debug, Clone)]
pub struct SocketLink {
    commands: Sender<LinkCommand>,
}

impl Link for SocketLink {
    fn send_text(&mut self, text: String) -> bool {
        self.commands.send(LinkCommand::Send(text)).is_ok()
    }

    fn reload(&mut self) {
        if self.commands.send(LinkCommand::Reload).is_err() {
            warn!("socket worker gone; cannot reload");
        }
    }
}

/// Starts the socket worker. `on_event` returns `false` once the event loop
/// has gone away, which ends the worker.
pub fn spawn_socket_link<F>(
    endpoint: Endpoint,
    reconnect_delay: Duration,
    on_event: F,
) -> HostResult<SocketLink>
where
    F: FnMut(LinkEvent) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("panel-link".to_string())
        .spawn(move || connection_loop(&endpoint, reconnect_delay, &rx, on_event))?;
    Ok(SocketLink { commands: tx })
}

enum PumpOutcome {
    Closed(String),
    Reload,
    Shutdown,
}

fn connection_loop<F>(
    endpoint: &Endpoint,
    reconnect_delay: Duration,
    commands: &Receiver<LinkCommand>,
    mut on_event: F,
) where
    F: FnMut(LinkEvent) -> bool,
{
    let url = endpoint.url();

    loop {
        if !on_event(LinkEvent::Connecting) {
            return;
        }
        debug!(host = %endpoint.host, port = endpoint.port, device = %endpoint.device_id, "connecting");

        let outcome = match tungstenite::connect(url.as_str()) {
            Ok((mut socket, _response)) => {
                configure_read_timeout(&mut socket);
                discard_stale_commands(commands);
                if !on_event(LinkEvent::Opened) {
                    return;
                }
                pump(&mut socket, commands, &mut on_event)
            }
            Err(err) => PumpOutcome::Closed(err.to_string()),
        };

        match outcome {
            PumpOutcome::Closed(reason) => {
                if !on_event(LinkEvent::Closed(reason)) {
                    return;
                }
                thread::sleep(reconnect_delay);
            }
            PumpOutcome::Reload => {
                if !on_event(LinkEvent::Closed("reload requested".to_string())) {
                    return;
                }
            }
            PumpOutcome::Shutdown => return,
        }
    }
}

fn pump<S, F>(socket: &mut WebSocket<S>, commands: &Receiver<LinkCommand>, on_event: &mut F) -> PumpOutcome
where
    S: Read + Write,
    F: FnMut(LinkEvent) -> bool,
{
    loop {
        loop {
            match commands.try_recv() {
                Ok(LinkCommand::Send(text)) => {
                    if let Err(err) = socket.send(Message::text(text)) {
                        return PumpOutcome::Closed(err.to_string());
                    }
                }
                Ok(LinkCommand::Reload) => {
                    let _ = socket.close(None);
                    return PumpOutcome::Reload;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    return PumpOutcome::Shutdown;
                }
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if !on_event(LinkEvent::Text(text.as_str().to_owned())) {
                    return PumpOutcome::Shutdown;
                }
            }
            Ok(Message::Close(_)) => return PumpOutcome::Closed("closed by backend".to_string()),
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => return PumpOutcome::Closed(err.to_string()),
        }
    }
}

// Frames queued while no connection was open belong to a dead session.
fn discard_stale_commands(commands: &Receiver<LinkCommand>) {
    let mut dropped = 0_usize;
    while commands.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "discarded commands queued for a previous connection");
    }
}

fn configure_read_timeout(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        if let Err(err) = stream.set_read_timeout(Some(READ_POLL_INTERVAL)) {
            warn!(%err, "failed to set socket read timeout");
        }
    }
}
