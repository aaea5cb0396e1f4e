//! HDLC link: ARQ state machine and its integration with a byte transport.
//!
//! A [`Link`] owns both the byte stream framer and the protocol [`Engine`] of
//! a single link. All state mutation happens through `&mut Link`, so inbound
//! bytes and outbound application calls are serialized by ownership. The
//! [`task`] module drives a link from an async byte stream.

pub mod engine;
pub mod task;

pub use engine::{Engine, Interpretation};
pub use task::{Event, LinkHandle, LinkTask};

use bytes::BytesMut;

use crate::hdlc::{consts, Decoder};


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transmission opportunity granted while one is still outstanding")]
    TransmitAlreadyReady,

    #[error("link closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;


/// Link configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Address placed in every outgoing frame.
    pub address: u8,

    /// Maximum unescaped frame length, including both flags. Values above
    /// [`consts::frame::MAX_LEN`] are capped.
    pub max_frame_len: usize,
}

impl Config {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.min(consts::frame::MAX_LEN);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: 0x30,
            max_frame_len: consts::frame::DEFAULT_MAX_LEN,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn is_incoming(&self) -> bool {
        *self == Direction::Incoming
    }
}


/// Byte transport and observer sink of a link.
///
/// The engine only ever calls into the transport, it never expects a
/// callback into link state from within these methods. Observer methods are
/// fire-and-forget and must not block.
pub trait Transport {
    /// Hand fully escaped and delimited frame bytes to the transport.
    fn send_wire_bytes(&mut self, bytes: BytesMut);

    /// Unescaped frame bytes, including both flags.
    fn on_raw_frame_observed(&mut self, _bytes: &[u8], _direction: Direction, _valid: bool) {}

    /// Human readable frame description.
    fn on_frame_described(&mut self, _text: &str, _direction: Direction, _valid: bool) {}

    /// Payload received from the peer or submitted for transmission.
    fn on_payload_delivered(&mut self, _bytes: &[u8], _direction: Direction) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_wire_bytes(&mut self, bytes: BytesMut) {
        (**self).send_wire_bytes(bytes)
    }

    fn on_raw_frame_observed(&mut self, bytes: &[u8], direction: Direction, valid: bool) {
        (**self).on_raw_frame_observed(bytes, direction, valid)
    }

    fn on_frame_described(&mut self, text: &str, direction: Direction, valid: bool) {
        (**self).on_frame_described(text, direction, valid)
    }

    fn on_payload_delivered(&mut self, bytes: &[u8], direction: Direction) {
        (**self).on_payload_delivered(bytes, direction)
    }
}


/// A single HDLC link session: framer and protocol engine.
#[derive(Debug)]
pub struct Link<T> {
    decoder: Decoder,
    engine: Engine<T>,
}

impl<T: Transport> Link<T> {
    pub fn new(config: Config, transport: T) -> Self {
        Self {
            decoder: Decoder::with_max_len(config.max_frame_len),
            engine: Engine::new(config, transport),
        }
    }

    /// Feed raw bytes received from the transport, in stream order.
    pub fn ingest_raw_bytes(&mut self, bytes: &[u8]) {
        let Self { decoder, engine } = self;

        decoder.ingest(bytes, |frame| {
            engine.on_frame_decoded(&frame);
        });
    }

    /// Queue a payload for transmission in an I-frame.
    pub fn submit_payload(&mut self, payload: impl Into<Box<[u8]>>) {
        self.engine.submit_payload(payload)
    }

    /// Grant the next transmission opportunity.
    ///
    /// Granting an opportunity while the previous one is still unused is a
    /// bug in the caller and fails with [`Error::TransmitAlreadyReady`]. The
    /// error must be propagated, not ignored.
    pub fn notify_transmit_ready(&mut self) -> Result<()> {
        self.engine.notify_transmit_ready()
    }

    /// Restart the link, dropping any partial frame and all link state.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.engine.reset();
    }

    pub fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.engine.transport_mut()
    }

    pub fn into_transport(self) -> T {
        self.engine.into_transport()
    }
}
