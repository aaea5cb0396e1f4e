use bytes::{Buf, BytesMut};

use super::consts;
use super::crc;
use super::{Frame, FrameType, Validity};


/// Reason for dropping an assembled candidate without reporting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Nothing between the two flags.
    Empty,
    /// Shorter than the minimum frame size after unescaping.
    TooShort(usize),
    /// Longer than the maximum frame size after unescaping.
    TooLong(usize),
}


/// A decoded frame together with its integrity verdict.
///
/// Frames are reported even when invalid so that observers can see what was
/// attempted. Only valid frames may drive protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub frame: Frame,
    pub validity: Validity,
    /// Unescaped frame bytes, including both flags.
    pub raw: Box<[u8]>,
}

impl Decoded {
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }
}


/// Byte stream framer: recovers frame boundaries from an arbitrarily chunked
/// byte stream and decodes each complete candidate.
#[derive(Debug)]
pub struct Decoder {
    buf: Vec<u8>,
    state: State,
    max_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingStart,
    InFrame,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_len(consts::frame::DEFAULT_MAX_LEN)
    }

    /// Create a decoder for frames of at most `max_len` unescaped bytes.
    ///
    /// The length is capped at [`consts::frame::MAX_LEN`].
    pub fn with_max_len(max_len: usize) -> Self {
        let max_len = max_len.min(consts::frame::MAX_LEN);

        let mut buf = Vec::with_capacity(max_len.min(consts::frame::DEFAULT_MAX_LEN));
        buf.push(consts::flags::FRAME);

        Self {
            buf,
            state: State::AwaitingStart,
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Upper bound for the buffered, still escaped candidate.
    fn limit(&self) -> usize {
        self.max_len.saturating_mul(2)
    }

    /// Drop any partially assembled frame and wait for the next start flag.
    pub fn reset(&mut self) {
        self.buf.truncate(1);
        self.state = State::AwaitingStart;
    }

    /// Consume all of `src`, passing every decoded frame to `sink` in stream
    /// order.
    pub fn ingest<F>(&mut self, mut src: &[u8], mut sink: F)
    where
        F: FnMut(Decoded),
    {
        while !src.is_empty() {
            let (n, frame) = self.step(src);
            src = &src[n..];

            if let Some(frame) = frame {
                sink(frame);
            }
        }
    }

    /// Consume bytes from `buf` until a frame has been decoded or the buffer
    /// is exhausted.
    pub fn process(&mut self, buf: &mut BytesMut) -> Option<Decoded> {
        while !buf.is_empty() {
            let (n, frame) = self.step(&buf[..]);
            buf.advance(n);

            if frame.is_some() {
                return frame;
            }
        }

        None
    }

    /// Run a single framing step on a non-empty input, returning the number
    /// of bytes consumed (always non-zero) and the frame completed by them.
    fn step(&mut self, src: &[u8]) -> (usize, Option<Decoded>) {
        debug_assert!(!src.is_empty());

        let flag = find_flag(src);

        match self.state {
            State::AwaitingStart => match flag {
                // expected: immediate start of frame
                Some(0) => {
                    self.state = State::InFrame;
                    (1, None)
                },
                // unexpected: n bytes before start of frame
                Some(n) => {
                    tracing::trace!(len = n, "discarding data before start of frame");
                    self.state = State::InFrame;
                    (n + 1, None)
                },
                // unexpected: no start of frame at all
                None => {
                    tracing::trace!(len = src.len(), "discarding data outside of frame");
                    (src.len(), None)
                },
            },
            State::InFrame => {
                let room = self.limit().saturating_sub(self.buf.len());

                match flag {
                    // overflow before the end flag, the end flag may start the next frame
                    Some(n) if n > room => {
                        tracing::debug!(limit = self.limit(), "dropping oversized frame");
                        self.reset();
                        (n, None)
                    },
                    // overflow right at the end flag, the flag starts the next frame
                    Some(n) if n == room => {
                        tracing::debug!(limit = self.limit(), "dropping oversized frame");
                        self.reset();
                        self.state = State::InFrame;
                        (n + 1, None)
                    },
                    Some(n) => {
                        self.buf.extend_from_slice(&src[..=n]);
                        let frame = self.decode_buffered();

                        self.reset();
                        (n + 1, frame)
                    },
                    None if src.len() > room => {
                        tracing::debug!(limit = self.limit(), "dropping oversized frame");
                        self.reset();
                        (src.len(), None)
                    },
                    None => {
                        self.buf.extend_from_slice(src);
                        (src.len(), None)
                    },
                }
            },
        }
    }

    fn decode_buffered(&self) -> Option<Decoded> {
        match decode(&self.buf, self.max_len) {
            Ok(frame) => {
                if !frame.is_valid() {
                    tracing::debug!(validity = %frame.validity, "received invalid frame");
                }
                Some(frame)
            },
            Err(reason) => {
                tracing::trace!(?reason, "discarding junk frame");
                None
            },
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}


fn find_flag(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|b| *b == consts::flags::FRAME)
}

/// Undo byte stuffing.
///
/// An escape byte followed by anything but an escaped flag or escape byte is
/// reported as malformed, the following byte is passed through unchanged.
pub fn unescape(src: &[u8]) -> (Vec<u8>, Validity) {
    let mut out = Vec::with_capacity(src.len());
    let mut validity = Validity::Valid;

    let mut iter = src.iter().copied();
    while let Some(b) = iter.next() {
        if b != consts::flags::ESCAPE {
            out.push(b);
            continue;
        }

        match iter.next() {
            Some(b) if b == consts::flags::FRAME ^ consts::escape::MASK => {
                out.push(consts::flags::FRAME);
            },
            Some(b) if b == consts::flags::ESCAPE ^ consts::escape::MASK => {
                out.push(consts::flags::ESCAPE);
            },
            Some(b) => {
                validity = Validity::MalformedEscape;
                out.push(b);
            },
            None => {
                validity = Validity::MalformedEscape;
                out.push(b);
            },
        }
    }

    (out, validity)
}

/// Decode an assembled frame, still escaped and delimited by flags on both
/// ends.
pub fn decode(buf: &[u8], max_len: usize) -> Result<Decoded, Discard> {
    if buf.len() <= 2 {
        return Err(Discard::Empty);
    }

    // an escape right before the end flag cannot be completed
    let (unescaped, validity) = if buf[buf.len() - 2] == consts::flags::ESCAPE {
        (buf.to_vec(), Validity::MalformedEscape)
    } else {
        unescape(buf)
    };

    if unescaped.len() < consts::frame::MIN_LEN {
        return Err(Discard::TooShort(unescaped.len()));
    }

    if unescaped.len() > max_len {
        return Err(Discard::TooLong(unescaped.len()));
    }

    // check everything between the flags, including the FCS
    let validity = match validity {
        Validity::Valid if !crc::verify(&unescaped[1..unescaped.len() - 1]) => {
            Validity::ChecksumFailed
        },
        validity => validity,
    };

    let frame = parse(&unescaped);

    Ok(Decoded {
        frame,
        validity,
        raw: unescaped.into(),
    })
}

/// Structurally decode an unescaped frame of at least the minimum length.
fn parse(buf: &[u8]) -> Frame {
    use consts::control;

    let address = buf[1];
    let ctrl = buf[2];

    let poll_final = ctrl & control::POLL_FINAL != 0;
    let recv_seq = (ctrl >> control::RECV_SEQ_SHIFT) & control::SEQ_MASK;

    let (frame_type, send_seq, recv_seq) = if ctrl & control::FRAME_I == 0 {
        let send_seq = (ctrl >> control::SEND_SEQ_SHIFT) & control::SEQ_MASK;
        (FrameType::I, send_seq, recv_seq)
    } else if ctrl & control::FRAME_S == 0 {
        let ty = FrameType::from_supervisory(ctrl >> control::TYPE_SHIFT);
        (ty, 0, recv_seq)
    } else {
        let low = (ctrl >> control::TYPE_SHIFT) & control::TYPE_MASK;
        let high = (ctrl >> control::RECV_SEQ_SHIFT) & control::SEQ_MASK;
        let ty = FrameType::from_modifier(low | (high << 2));
        (ty, 0, 0)
    };

    let payload = if frame_type.has_payload() {
        Some(buf[3..buf.len() - 3].into())
    } else {
        None
    };

    Frame {
        address,
        frame_type,
        poll_final,
        send_seq,
        recv_seq,
        payload,
    }
}
