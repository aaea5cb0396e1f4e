//! Async driver owning a single link.
//!
//! The task reads raw bytes from the transport, receives payloads from any
//! number of [`LinkHandle`]s, and writes the frames produced by the engine.
//! Each completed write grants the next transmission opportunity. Observer
//! notifications are forwarded as [`Event`]s.

use std::collections::VecDeque;

use bytes::BytesMut;

use futures::StreamExt;
use futures::channel::mpsc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Config, Direction, Error, Link, Result, Transport};


const READ_BUFFER_SIZE: usize = 4096;


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RawFrame {
        bytes: Box<[u8]>,
        direction: Direction,
        valid: bool,
    },
    Described {
        text: String,
        direction: Direction,
        valid: bool,
    },
    Payload {
        bytes: Box<[u8]>,
        direction: Direction,
    },
}

pub type Events = mpsc::UnboundedReceiver<Event>;


#[derive(Debug)]
enum Command {
    Submit(Box<[u8]>),
}


#[derive(Debug)]
struct Outbox {
    wire: VecDeque<BytesMut>,
    events: mpsc::UnboundedSender<Event>,
}

impl Outbox {
    fn emit(&mut self, event: Event) {
        // nobody listening is fine
        let _ = self.events.unbounded_send(event);
    }
}

impl Transport for Outbox {
    fn send_wire_bytes(&mut self, bytes: BytesMut) {
        self.wire.push_back(bytes);
    }

    fn on_raw_frame_observed(&mut self, bytes: &[u8], direction: Direction, valid: bool) {
        self.emit(Event::RawFrame { bytes: bytes.into(), direction, valid });
    }

    fn on_frame_described(&mut self, text: &str, direction: Direction, valid: bool) {
        self.emit(Event::Described { text: text.to_owned(), direction, valid });
    }

    fn on_payload_delivered(&mut self, bytes: &[u8], direction: Direction) {
        self.emit(Event::Payload { bytes: bytes.into(), direction });
    }
}


/// Application-side handle of a running link.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl LinkHandle {
    /// Queue a payload for transmission.
    pub fn submit(&self, payload: impl Into<Box<[u8]>>) -> Result<()> {
        self.sender.unbounded_send(Command::Submit(payload.into()))
            .map_err(|_| Error::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}


pub struct LinkTask<T> {
    io: T,
    link: Link<Outbox>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<T> LinkTask<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T, config: Config) -> (Self, LinkHandle, Events) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded();
        let (evt_tx, evt_rx) = mpsc::unbounded();

        let outbox = Outbox {
            wire: VecDeque::new(),
            events: evt_tx,
        };

        let task = LinkTask {
            io,
            link: Link::new(config, outbox),
            commands: cmd_rx,
        };

        let handle = LinkHandle { sender: cmd_tx };

        (task, handle, evt_rx)
    }

    /// Run the link until the transport is closed or all handles are gone.
    ///
    /// Payloads still waiting for transmission are dropped on return.
    pub async fn run(mut self) -> Result<()> {
        let mut buf = vec![0; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                res = self.io.read(&mut buf) => {
                    let n = res?;
                    if n == 0 {
                        tracing::trace!("transport closed");
                        break;
                    }

                    tracing::trace!(len = n, "received data");
                    self.link.ingest_raw_bytes(&buf[..n]);
                },
                cmd = self.commands.next() => match cmd {
                    Some(Command::Submit(payload)) => {
                        self.link.submit_payload(payload);
                    },
                    None => {
                        tracing::trace!("all link handles dropped");
                        break;
                    },
                },
            }

            self.flush().await?;
        }

        let pending = self.link.engine().pending();
        if pending > 0 {
            tracing::debug!(pending, "dropping untransmitted payloads");
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        while let Some(wire) = self.link.transport_mut().wire.pop_front() {
            self.io.write_all(&wire).await?;
            self.io.flush().await?;

            self.link.notify_transmit_ready()?;
        }

        Ok(())
    }
}
