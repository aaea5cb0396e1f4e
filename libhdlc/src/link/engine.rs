use std::collections::VecDeque;

use crate::hdlc::consts::control::SEQ_MASK;
use crate::hdlc::{encoder, Decoded, Frame, FrameType};

use super::{Config, Direction, Error, Result, Transport};


/// How the engine handled a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// The frame failed validation and did not touch link state.
    Invalid,

    /// The frame was processed.
    Accepted,

    /// I-frame repeating the last accepted send sequence number.
    Duplicate,

    /// Supervisory frame that is recognized but has no corrective action
    /// (RNR, REJ, SREJ). Flow control and retransmission are not supported.
    Unhandled(FrameType),
}


#[derive(Debug)]
struct State {
    send_seq: u8,
    recv_seq_incoming: Option<u8>,
    recv_seq_window_start: u8,
    peer_requires_ack: bool,
    transmit_ready: bool,
    pending: VecDeque<Box<[u8]>>,
}

impl State {
    fn new() -> Self {
        Self {
            send_seq: 0,
            recv_seq_incoming: None,
            recv_seq_window_start: 0,
            peer_requires_ack: false,
            transmit_ready: true,
            pending: VecDeque::new(),
        }
    }
}


/// ARQ state machine of a single link.
///
/// Acknowledgments are piggy-backed on every outgoing frame. A separate
/// receive-ready frame is only sent if an acknowledgment is owed and no
/// payload is waiting. At most one transmission opportunity is outstanding at
/// any time; the link starts with one.
#[derive(Debug)]
pub struct Engine<T> {
    config: Config,
    state: State,
    transport: T,
}

impl<T: Transport> Engine<T> {
    pub fn new(config: Config, transport: T) -> Self {
        Self {
            config,
            state: State::new(),
            transport,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::new();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send sequence number of the next outgoing frame.
    pub fn send_seq(&self) -> u8 {
        self.state.send_seq
    }

    /// Send sequence number of the last I-frame accepted from the peer.
    pub fn recv_seq_incoming(&self) -> u8 {
        self.state.recv_seq_incoming.unwrap_or(0)
    }

    /// Receive sequence number most recently reported by the peer.
    pub fn recv_seq_outgoing_window_start(&self) -> u8 {
        self.state.recv_seq_window_start
    }

    pub fn peer_requires_ack(&self) -> bool {
        self.state.peer_requires_ack
    }

    pub fn transmit_ready(&self) -> bool {
        self.state.transmit_ready
    }

    /// Number of payloads waiting for an I-frame.
    pub fn pending(&self) -> usize {
        self.state.pending.len()
    }

    pub fn submit_payload(&mut self, payload: impl Into<Box<[u8]>>) {
        let payload = payload.into();

        self.transport.on_payload_delivered(&payload, Direction::Outgoing);
        self.state.pending.push_back(payload);

        if self.state.transmit_ready {
            self.attempt_transmit();
        }
    }

    /// Grant a transmission opportunity.
    ///
    /// Fails if the previous opportunity has not been used yet. This is a
    /// logic error in the caller; link state is left untouched.
    pub fn notify_transmit_ready(&mut self) -> Result<()> {
        if self.state.transmit_ready {
            tracing::error!("transmission opportunity granted while one is still outstanding");
            return Err(Error::TransmitAlreadyReady);
        }

        self.state.transmit_ready = true;
        self.attempt_transmit();

        Ok(())
    }

    pub fn on_frame_decoded(&mut self, decoded: &Decoded) -> Interpretation {
        let frame = &decoded.frame;
        let valid = decoded.is_valid();

        self.transport.on_raw_frame_observed(&decoded.raw, Direction::Incoming, valid);
        self.transport.on_frame_described(&format!(">>> Rcvd: {frame}"), Direction::Incoming, valid);

        if !valid {
            tracing::debug!(validity = %decoded.validity, "ignoring invalid frame: {frame}");
            return Interpretation::Invalid;
        }

        tracing::debug!("received frame: {frame}");

        let mut result = Interpretation::Accepted;

        match frame.frame_type {
            FrameType::I => {
                if self.state.recv_seq_incoming == Some(frame.send_seq) {
                    tracing::trace!(seq = frame.send_seq, "ignoring repeated I-frame");
                    result = Interpretation::Duplicate;
                } else {
                    self.state.recv_seq_incoming = Some(frame.send_seq);
                    self.state.peer_requires_ack = true;
                    self.transport.on_payload_delivered(frame.payload(), Direction::Incoming);
                }

                self.state.recv_seq_window_start = frame.recv_seq;
            },
            FrameType::Rr => {
                self.state.recv_seq_window_start = frame.recv_seq;
            },
            FrameType::Rnr | FrameType::Rej | FrameType::Srej => {
                // TODO: pause on RNR, go-back-N on REJ, single retransmission on SREJ
                tracing::trace!(recv_seq = frame.recv_seq, "{} not implemented, ignoring", frame.frame_type);
                result = Interpretation::Unhandled(frame.frame_type);
            },
            _ => {
                if let Some(payload) = &frame.payload {
                    self.transport.on_payload_delivered(payload, Direction::Incoming);
                }
            },
        }

        if self.state.transmit_ready {
            self.attempt_transmit();
        }

        result
    }

    fn attempt_transmit(&mut self) {
        debug_assert!(self.state.transmit_ready);

        if self.state.pending.is_empty() && !self.state.peer_requires_ack {
            return;
        }

        self.state.transmit_ready = false;

        let address = self.config.address;
        let send_seq = self.state.send_seq;
        let recv_seq = self.recv_seq_incoming();

        let frame = match self.state.pending.pop_front() {
            Some(payload) => Frame::information(address, send_seq, recv_seq, payload),
            None => Frame::supervisory(address, FrameType::Rr, recv_seq),
        };

        self.state.peer_requires_ack = false;

        tracing::debug!("sending frame: {frame}");

        let raw = encoder::encode(&frame);
        self.transport.send_wire_bytes(encoder::escape(&raw));
        self.transport.on_raw_frame_observed(&raw, Direction::Outgoing, true);
        self.transport.on_frame_described(&format!("<<< Sent: {frame}"), Direction::Outgoing, true);

        self.state.send_seq = (send_seq + 1) & SEQ_MASK;
    }
}


#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;
    use crate::hdlc::{decoder, Validity};

    #[derive(Debug, Default)]
    struct Recorder {
        sent: Vec<Frame>,
        raw: Vec<(Vec<u8>, Direction, bool)>,
        delivered: Vec<(Vec<u8>, Direction)>,
    }

    impl Transport for Recorder {
        fn send_wire_bytes(&mut self, bytes: BytesMut) {
            let decoded = decoder::decode(&bytes, 1024).unwrap();
            assert!(decoded.is_valid());
            self.sent.push(decoded.frame);
        }

        fn on_raw_frame_observed(&mut self, bytes: &[u8], direction: Direction, valid: bool) {
            self.raw.push((bytes.to_vec(), direction, valid));
        }

        fn on_payload_delivered(&mut self, bytes: &[u8], direction: Direction) {
            self.delivered.push((bytes.to_vec(), direction));
        }
    }

    fn engine() -> Engine<Recorder> {
        Engine::new(Config::default(), Recorder::default())
    }

    fn valid(frame: Frame) -> Decoded {
        let raw = encoder::encode(&frame).into();
        Decoded { frame, validity: Validity::Valid, raw }
    }

    fn incoming(send_seq: u8, recv_seq: u8, payload: &[u8]) -> Decoded {
        valid(Frame::information(0x01, send_seq, recv_seq, payload))
    }

    /// Use up the initial transmission opportunity.
    fn busy_engine() -> Engine<Recorder> {
        let mut engine = engine();
        engine.submit_payload(vec![0xFF]);
        engine.transport_mut().sent.clear();
        engine
    }

    #[test]
    fn test_initial_state() {
        let engine = engine();

        assert_eq!(engine.send_seq(), 0);
        assert_eq!(engine.recv_seq_incoming(), 0);
        assert_eq!(engine.recv_seq_outgoing_window_start(), 0);
        assert!(!engine.peer_requires_ack());
        assert!(engine.transmit_ready());
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_single_opportunity_sends_one_frame() {
        let mut engine = busy_engine();
        assert_eq!(engine.send_seq(), 1);

        engine.submit_payload(vec![1, 2]);
        engine.submit_payload(vec![3, 4]);
        assert!(engine.transport().sent.is_empty());
        assert_eq!(engine.pending(), 2);

        engine.notify_transmit_ready().unwrap();

        assert_eq!(engine.transport().sent, [Frame::information(0x30, 1, 0, vec![1, 2])]);
        assert_eq!(engine.send_seq(), 2);
        assert_eq!(engine.pending(), 1);
        assert!(!engine.transmit_ready());

        engine.notify_transmit_ready().unwrap();
        assert_eq!(engine.transport().sent[1], Frame::information(0x30, 2, 0, vec![3, 4]));
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_send_seq_wraps() {
        let mut engine = engine();

        for i in 0..10u8 {
            engine.submit_payload(vec![i]);
            if i < 9 {
                engine.notify_transmit_ready().unwrap();
            }
        }

        let seqs: Vec<u8> = engine.transport().sent.iter().map(|f| f.send_seq).collect();
        assert_eq!(seqs, [0, 1, 2, 3, 4, 5, 6, 7, 0, 1]);
        assert_eq!(engine.send_seq(), 2);
    }

    #[test]
    fn test_second_opportunity_is_rejected() {
        let mut engine = engine();

        assert!(matches!(engine.notify_transmit_ready(), Err(Error::TransmitAlreadyReady)));
        assert!(engine.transmit_ready());
        assert!(engine.transport().sent.is_empty());

        // a grant left unused after the queue drained rejects the next one as well
        let mut engine = busy_engine();
        engine.submit_payload(vec![1]);
        engine.notify_transmit_ready().unwrap();
        engine.submit_payload(vec![2]);
        assert_eq!(engine.pending(), 1);

        engine.notify_transmit_ready().unwrap();
        engine.notify_transmit_ready().unwrap();
        assert!(matches!(engine.notify_transmit_ready(), Err(Error::TransmitAlreadyReady)));
        assert_eq!(engine.transport().sent.len(), 2);
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.send_seq(), 3);
    }

    #[test]
    fn test_ack_with_receive_ready() {
        let mut engine = busy_engine();

        assert_eq!(engine.on_frame_decoded(&incoming(5, 1, b"data")), Interpretation::Accepted);
        assert!(engine.peer_requires_ack());
        assert_eq!(engine.recv_seq_incoming(), 5);
        assert_eq!(engine.recv_seq_outgoing_window_start(), 1);
        assert!(engine.transport().sent.is_empty());

        engine.notify_transmit_ready().unwrap();

        assert_eq!(engine.transport().sent, [Frame::supervisory(0x30, FrameType::Rr, 5)]);
        assert!(!engine.peer_requires_ack());
        assert_eq!(engine.send_seq(), 2);

        // nothing owed anymore, the next opportunity stays unused
        engine.notify_transmit_ready().unwrap();
        assert_eq!(engine.transport().sent.len(), 1);
        assert!(engine.transmit_ready());
    }

    #[test]
    fn test_ack_piggy_backed_on_payload() {
        let mut engine = busy_engine();

        engine.on_frame_decoded(&incoming(3, 0, b"x"));
        engine.submit_payload(vec![9]);
        engine.notify_transmit_ready().unwrap();

        assert_eq!(engine.transport().sent, [Frame::information(0x30, 1, 3, vec![9])]);
        assert!(!engine.peer_requires_ack());
    }

    #[test]
    fn test_immediate_ack_when_ready() {
        let mut engine = engine();

        engine.on_frame_decoded(&incoming(0, 0, b"first"));

        assert_eq!(engine.transport().sent, [Frame::supervisory(0x30, FrameType::Rr, 0)]);
        assert!(!engine.transmit_ready());
    }

    #[test]
    fn test_duplicate_suppressed() {
        let mut engine = busy_engine();

        assert_eq!(engine.on_frame_decoded(&incoming(2, 0, b"a")), Interpretation::Accepted);
        engine.notify_transmit_ready().unwrap();
        assert_eq!(engine.transport().sent.len(), 1);

        assert_eq!(engine.on_frame_decoded(&incoming(2, 0, b"a")), Interpretation::Duplicate);
        assert!(!engine.peer_requires_ack());
        assert_eq!(engine.recv_seq_incoming(), 2);

        engine.notify_transmit_ready().unwrap();
        assert_eq!(engine.transport().sent.len(), 1);

        let delivered: Vec<_> = engine.transport().delivered.iter()
            .filter(|(_, d)| d.is_incoming())
            .collect();
        assert_eq!(delivered.len(), 1);
    }

    #[test]
    fn test_invalid_frame_does_not_touch_state() {
        let mut engine = busy_engine();
        engine.notify_transmit_ready().unwrap();

        let mut decoded = incoming(4, 6, b"bad");
        decoded.validity = Validity::ChecksumFailed;

        assert_eq!(engine.on_frame_decoded(&decoded), Interpretation::Invalid);
        assert_eq!(engine.recv_seq_incoming(), 0);
        assert_eq!(engine.recv_seq_outgoing_window_start(), 0);
        assert!(!engine.peer_requires_ack());
        assert!(engine.transport().sent.is_empty());

        // observers still see the frame
        let (raw, direction, valid) = engine.transport().raw.last().unwrap();
        assert_eq!(raw[..], decoded.raw[..]);
        assert_eq!(*direction, Direction::Incoming);
        assert!(!valid);
    }

    #[test]
    fn test_receive_ready_moves_window() {
        let mut engine = busy_engine();

        let rr = valid(Frame::supervisory(0x01, FrameType::Rr, 4));
        assert_eq!(engine.on_frame_decoded(&rr), Interpretation::Accepted);
        assert_eq!(engine.recv_seq_outgoing_window_start(), 4);
        assert!(!engine.peer_requires_ack());
    }

    #[test]
    fn test_unhandled_supervisory() {
        let mut engine = busy_engine();

        for ty in [FrameType::Rnr, FrameType::Rej, FrameType::Srej] {
            let frame = valid(Frame::supervisory(0x01, ty, 6));
            assert_eq!(engine.on_frame_decoded(&frame), Interpretation::Unhandled(ty));
        }

        assert_eq!(engine.recv_seq_outgoing_window_start(), 0);
        assert!(!engine.peer_requires_ack());
    }

    #[test]
    fn test_unnumbered_payload_delivered() {
        let mut engine = busy_engine();

        let ui = valid(Frame::unnumbered(0x01, FrameType::Ui, Some(vec![7, 7].into())));
        assert_eq!(engine.on_frame_decoded(&ui), Interpretation::Accepted);

        assert_eq!(engine.transport().delivered.last(), Some(&(vec![7, 7], Direction::Incoming)));
        assert!(!engine.peer_requires_ack());

        let sabm = valid(Frame::unnumbered(0x01, FrameType::Sabm, None));
        assert_eq!(engine.on_frame_decoded(&sabm), Interpretation::Accepted);
        assert_eq!(engine.transport().delivered.len(), 2);
    }

    #[test]
    fn test_outgoing_observers() {
        let mut engine = engine();
        engine.submit_payload(vec![0x7E]);

        assert_eq!(engine.transport().delivered, [(vec![0x7E], Direction::Outgoing)]);

        let (raw, direction, valid) = &engine.transport().raw[0];
        assert_eq!(raw, &encoder::encode(&Frame::information(0x30, 0, 0, vec![0x7E])));
        assert_eq!(*direction, Direction::Outgoing);
        assert!(*valid);
    }
}
