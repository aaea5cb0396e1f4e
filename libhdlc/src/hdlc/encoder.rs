use bytes::{BufMut, BytesMut};

use super::{consts, crc, Frame, FrameClass};


struct ByteEscape<B: BufMut> {
    buf: B,
}

impl<B: BufMut> ByteEscape<B> {
    fn new(buf: B) -> Self {
        Self { buf }
    }

    fn put_u8(&mut self, byte: u8) {
        match byte {
            consts::flags::ESCAPE | consts::flags::FRAME => self.buf.put_slice(&[
                consts::flags::ESCAPE,
                consts::escape::MASK ^ byte
            ]),
            _ => self.buf.put_u8(byte),
        }
    }

    fn put_frame_flag(&mut self) {
        self.buf.put_u8(consts::flags::FRAME)
    }
}

impl ByteEscape<&mut BytesMut> {
    fn reserve(&mut self, additional: usize) -> &mut Self {
        self.buf.reserve(additional);
        self
    }
}


struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    fn flag(&mut self) -> &mut Self {
        self.buf.push(consts::flags::FRAME);
        self
    }

    fn put_u8(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn finalize(&mut self) -> Vec<u8> {
        // checksum everything after the opening flag
        let fcs = crc::checksum(&self.buf[1..]);

        self.put_bytes(&fcs.to_le_bytes());
        self.flag();

        std::mem::take(&mut self.buf)
    }
}


/// Build the control byte of a frame.
pub fn control(frame: &Frame) -> u8 {
    use consts::control;

    let pf = if frame.poll_final { control::POLL_FINAL } else { 0 };
    let recv_seq = (frame.recv_seq & control::SEQ_MASK) << control::RECV_SEQ_SHIFT;

    match frame.class() {
        FrameClass::Information => {
            let send_seq = (frame.send_seq & control::SEQ_MASK) << control::SEND_SEQ_SHIFT;
            send_seq | pf | recv_seq
        },
        FrameClass::Supervisory => {
            let code = frame.frame_type.supervisory_code().unwrap_or(0);
            control::FRAME_I | (code << control::TYPE_SHIFT) | pf | recv_seq
        },
        FrameClass::Unnumbered => {
            let code = frame.frame_type.modifier().unwrap_or(0);
            let low = (code & control::TYPE_MASK) << control::TYPE_SHIFT;
            let high = ((code >> 2) & control::SEQ_MASK) << control::RECV_SEQ_SHIFT;
            control::FRAME_I | control::FRAME_S | low | pf | high
        },
    }
}

/// Encode a frame without byte stuffing, including FCS and both flags.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let payload = if frame.frame_type.has_payload() { frame.payload() } else { &[] };

    Encoder::with_capacity(payload.len() + consts::frame::MIN_LEN)
        .flag()                         // flag
        .put_u8(frame.address)          // address
        .put_u8(control(frame))         // control
        .put_bytes(payload)             // data
        .finalize()                     // checksum and flag
}

/// Apply byte stuffing to an unescaped frame, appending the result to `buf`.
///
/// Flags at the very start and end of `frame` are kept as-is, every other
/// flag or escape byte is escaped.
pub fn escape_into(buf: &mut BytesMut, frame: &[u8]) {
    let mut out = ByteEscape::new(buf);
    out.reserve(frame.len() + frame.len() / 4 + 2);

    match frame {
        [consts::flags::FRAME, body @ .., consts::flags::FRAME] => {
            out.put_frame_flag();
            for b in body {
                out.put_u8(*b);
            }
            out.put_frame_flag();
        },
        _ => {
            for b in frame {
                out.put_u8(*b);
            }
        },
    }
}

pub fn escape(frame: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    escape_into(&mut buf, frame);
    buf
}

/// Encode a frame into its wire representation, appending it to `buf`.
pub fn encode_into(buf: &mut BytesMut, frame: &Frame) {
    escape_into(buf, &encode(frame))
}

pub fn encode_bytes(frame: &Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_into(&mut buf, frame);
    buf
}
