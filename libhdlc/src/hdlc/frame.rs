use std::fmt;

use num_enum::{FromPrimitive, IntoPrimitive};

use super::consts::control;


/// Frame class, derived from the low bits of the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    Information,
    Supervisory,
    Unnumbered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Information
    I,

    /// Receive ready
    Rr,
    /// Receive not ready
    Rnr,
    /// Reject
    Rej,
    /// Selective reject
    Srej,

    /// Unnumbered information
    Ui,
    /// Set initialization mode
    Sim,
    /// Set asynchronous response mode
    Sarm,
    /// Unnumbered poll
    Up,
    /// Set asynchronous balanced mode
    Sabm,
    /// Disconnect
    Disc,
    /// Unnumbered acknowledgment
    Ua,
    /// Set normal response mode
    Snrm,
    /// Command reject
    Cmdr,
    /// Test
    Test,
    /// Exchange identification
    Xid,

    /// Unnumbered frame with an unrecognized modifier.
    Unset,
}

impl FrameType {
    pub fn class(&self) -> FrameClass {
        match self {
            FrameType::I => FrameClass::Information,
            FrameType::Rr | FrameType::Rnr | FrameType::Rej | FrameType::Srej => {
                FrameClass::Supervisory
            },
            _ => FrameClass::Unnumbered,
        }
    }

    /// Whether frames of this type carry an information field.
    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            FrameType::I | FrameType::Ui | FrameType::Cmdr | FrameType::Test | FrameType::Xid
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameType::I => "I",
            FrameType::Rr => "RR",
            FrameType::Rnr => "RNR",
            FrameType::Rej => "REJ",
            FrameType::Srej => "SREJ",
            FrameType::Ui => "UI",
            FrameType::Sim => "SIM",
            FrameType::Sarm => "SARM",
            FrameType::Up => "UP",
            FrameType::Sabm => "SABM",
            FrameType::Disc => "DISC",
            FrameType::Ua => "UA",
            FrameType::Snrm => "SNRM",
            FrameType::Cmdr => "CMDR",
            FrameType::Test => "TEST",
            FrameType::Xid => "XID",
            FrameType::Unset => "UNSET",
        }
    }

    pub(crate) fn from_supervisory(code: u8) -> Self {
        match code & control::TYPE_MASK {
            0b00 => FrameType::Rr,
            0b01 => FrameType::Rnr,
            0b10 => FrameType::Rej,
            _ => FrameType::Srej,
        }
    }

    pub(crate) fn supervisory_code(&self) -> Option<u8> {
        match self {
            FrameType::Rr => Some(0b00),
            FrameType::Rnr => Some(0b01),
            FrameType::Rej => Some(0b10),
            FrameType::Srej => Some(0b11),
            _ => None,
        }
    }

    pub(crate) fn from_modifier(code: u8) -> Self {
        match Modifier::from_primitive(code) {
            Modifier::Ui => FrameType::Ui,
            Modifier::Sim => FrameType::Sim,
            Modifier::Sarm => FrameType::Sarm,
            Modifier::Up => FrameType::Up,
            Modifier::Sabm => FrameType::Sabm,
            Modifier::Disc => FrameType::Disc,
            Modifier::Ua => FrameType::Ua,
            Modifier::Snrm => FrameType::Snrm,
            Modifier::Cmdr => FrameType::Cmdr,
            Modifier::Test => FrameType::Test,
            Modifier::Xid => FrameType::Xid,
            Modifier::Unrecognized(_) => FrameType::Unset,
        }
    }

    pub(crate) fn modifier(&self) -> Option<u8> {
        let modifier = match self {
            FrameType::Ui => Modifier::Ui,
            FrameType::Sim => Modifier::Sim,
            FrameType::Sarm => Modifier::Sarm,
            FrameType::Up => Modifier::Up,
            FrameType::Sabm => Modifier::Sabm,
            FrameType::Disc => Modifier::Disc,
            FrameType::Ua => Modifier::Ua,
            FrameType::Snrm => Modifier::Snrm,
            FrameType::Cmdr => Modifier::Cmdr,
            FrameType::Test => Modifier::Test,
            FrameType::Xid => Modifier::Xid,
            FrameType::Unset => Modifier::Unrecognized(MODIFIER_UNSET),
            _ => return None,
        };

        Some(modifier.into())
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}


/// 5-bit modifier of U-frames: control bits 2-3 as the low bits, control bits
/// 5-7 as the high bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
enum Modifier {
    Ui = 0b00000,
    Sim = 0b00001,
    Sarm = 0b00011,
    Up = 0b00100,
    Sabm = 0b00111,
    Disc = 0b01000,
    Ua = 0b01100,
    Snrm = 0b10000,
    Cmdr = 0b10001,
    Test = 0b11100,
    Xid = 0b11101,

    #[num_enum(catch_all)]
    Unrecognized(u8) = 0xff,
}

/// Unassigned modifier used when encoding frames of type `Unset`.
const MODIFIER_UNSET: u8 = 0b11111;


/// Integrity verdict of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    ChecksumFailed,
    MalformedEscape,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        *self == Validity::Valid
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Valid => f.write_str("valid"),
            Validity::ChecksumFailed => f.write_str("checksum failed"),
            Validity::MalformedEscape => f.write_str("malformed escape"),
        }
    }
}


/// A single HDLC frame with 3-bit sequence numbers and a one-byte address.
///
/// Sequence numbers are only meaningful for the frame types that carry them
/// and are zero otherwise. The payload is present exactly for the types
/// reporting [`FrameType::has_payload`]. Frames can only be built through the
/// constructors below, so every frame survives an encode/decode round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub(crate) address: u8,
    pub(crate) frame_type: FrameType,
    pub(crate) poll_final: bool,
    pub(crate) send_seq: u8,
    pub(crate) recv_seq: u8,
    pub(crate) payload: Option<Box<[u8]>>,
}

impl Frame {
    pub fn information(address: u8, send_seq: u8, recv_seq: u8, payload: impl Into<Box<[u8]>>) -> Self {
        Self {
            address,
            frame_type: FrameType::I,
            poll_final: false,
            send_seq: send_seq & control::SEQ_MASK,
            recv_seq: recv_seq & control::SEQ_MASK,
            payload: Some(payload.into()),
        }
    }

    /// Create a supervisory frame.
    ///
    /// Frame types of other classes are mapped to receive-ready.
    pub fn supervisory(address: u8, frame_type: FrameType, recv_seq: u8) -> Self {
        let frame_type = match frame_type.class() {
            FrameClass::Supervisory => frame_type,
            _ => FrameType::Rr,
        };

        Self {
            address,
            frame_type,
            poll_final: false,
            send_seq: 0,
            recv_seq: recv_seq & control::SEQ_MASK,
            payload: None,
        }
    }

    /// Create an unnumbered frame.
    ///
    /// The payload is dropped for types without an information field and
    /// defaults to empty for types with one. Frame types of other classes are
    /// mapped to `Unset`.
    pub fn unnumbered(address: u8, frame_type: FrameType, payload: Option<Box<[u8]>>) -> Self {
        let frame_type = match frame_type.class() {
            FrameClass::Unnumbered => frame_type,
            _ => FrameType::Unset,
        };

        let payload = if frame_type.has_payload() {
            Some(payload.unwrap_or_default())
        } else {
            None
        };

        Self {
            address,
            frame_type,
            poll_final: false,
            send_seq: 0,
            recv_seq: 0,
            payload,
        }
    }

    pub fn with_poll_final(mut self, poll_final: bool) -> Self {
        self.poll_final = poll_final;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn poll_final(&self) -> bool {
        self.poll_final
    }

    /// N(S), zero for frames other than I-frames.
    pub fn send_seq(&self) -> u8 {
        self.send_seq
    }

    /// N(R), zero for U-frames.
    pub fn recv_seq(&self) -> u8 {
        self.recv_seq
    }

    pub fn class(&self) -> FrameClass {
        self.frame_type.class()
    }

    pub fn is_i_frame(&self) -> bool {
        self.class() == FrameClass::Information
    }

    pub fn is_s_frame(&self) -> bool {
        self.class() == FrameClass::Supervisory
    }

    pub fn is_u_frame(&self) -> bool {
        self.class() == FrameClass::Unnumbered
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class() {
            FrameClass::Information => "I-frame",
            FrameClass::Supervisory => "S-frame",
            FrameClass::Unnumbered => "U-frame",
        };

        write!(f, "{class} {}, addr=0x{:02x}, P/F={}", self.frame_type, self.address, self.poll_final as u8)?;

        match self.class() {
            FrameClass::Information => {
                write!(f, ", N(S)={}, N(R)={}", self.send_seq, self.recv_seq)?;
            },
            FrameClass::Supervisory => {
                write!(f, ", N(R)={}", self.recv_seq)?;
            },
            FrameClass::Unnumbered => {},
        }

        if let Some(payload) = &self.payload {
            write!(f, ", {} bytes payload", payload.len())?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_modifier_table() {
        let known = [
            (0b00000, FrameType::Ui),
            (0b00001, FrameType::Sim),
            (0b00011, FrameType::Sarm),
            (0b00100, FrameType::Up),
            (0b00111, FrameType::Sabm),
            (0b01000, FrameType::Disc),
            (0b01100, FrameType::Ua),
            (0b10000, FrameType::Snrm),
            (0b10001, FrameType::Cmdr),
            (0b11100, FrameType::Test),
            (0b11101, FrameType::Xid),
        ];

        for (code, ty) in known {
            assert_eq!(FrameType::from_modifier(code), ty);
            assert_eq!(ty.modifier(), Some(code));
        }

        assert_eq!(FrameType::from_modifier(0b00010), FrameType::Unset);
        assert_eq!(FrameType::from_modifier(0b11111), FrameType::Unset);
        assert_eq!(FrameType::Unset.modifier(), Some(0b11111));
        assert_eq!(FrameType::I.modifier(), None);
        assert_eq!(FrameType::Rr.modifier(), None);
    }

    #[test]
    fn test_supervisory_codes() {
        for code in 0..4 {
            let ty = FrameType::from_supervisory(code);
            assert_eq!(ty.class(), FrameClass::Supervisory);
            assert_eq!(ty.supervisory_code(), Some(code));
        }
    }

    #[test]
    fn test_constructors() {
        let frame = Frame::information(0x30, 9, 10, vec![1, 2, 3]);
        assert_eq!(frame.send_seq, 1);
        assert_eq!(frame.recv_seq, 2);
        assert_eq!(frame.payload(), &[1, 2, 3]);

        let frame = Frame::supervisory(0x30, FrameType::Ua, 3);
        assert_eq!(frame.frame_type, FrameType::Rr);
        assert!(frame.payload.is_none());

        let frame = Frame::unnumbered(0x30, FrameType::Test, None);
        assert_eq!(frame.payload.as_deref(), Some(&[][..]));

        let frame = Frame::unnumbered(0x30, FrameType::Disc, Some(vec![1].into()));
        assert!(frame.payload.is_none());

        let frame = Frame::unnumbered(0x30, FrameType::Rej, None);
        assert_eq!(frame.frame_type, FrameType::Unset);
    }

    #[test]
    fn test_constructed_frames_roundtrip() {
        use crate::hdlc::{decoder, encoder};

        let frames = [
            Frame::information(0x30, 12, 3, Vec::<u8>::new()),
            Frame::supervisory(0x30, FrameType::Srej, 15),
            Frame::supervisory(0x30, FrameType::Cmdr, 2),
            Frame::unnumbered(0x30, FrameType::Sabm, Some(vec![1, 2].into())),
            Frame::unnumbered(0x30, FrameType::Xid, None),
            Frame::unnumbered(0x30, FrameType::I, None).with_poll_final(true),
        ];

        for frame in frames {
            let decoded = decoder::decode(&encoder::encode_bytes(&frame), 1024).unwrap();
            assert_eq!(decoded.frame, frame);
        }

        // an empty I-frame still carries an (empty) information field
        let frame = Frame::information(0x30, 0, 0, Vec::<u8>::new());
        assert!(frame.has_payload());
        assert_eq!(frame.payload(), &[] as &[u8]);

        let frame = Frame::supervisory(0x31, FrameType::Rnr, 6).with_poll_final(true);
        assert_eq!(frame.address(), 0x31);
        assert_eq!(frame.frame_type(), FrameType::Rnr);
        assert!(frame.poll_final());
        assert_eq!((frame.send_seq(), frame.recv_seq()), (0, 6));
    }

    #[test]
    fn test_display() {
        let frame = Frame::information(0x30, 1, 2, vec![0; 5]);
        assert_eq!(frame.to_string(), "I-frame I, addr=0x30, P/F=0, N(S)=1, N(R)=2, 5 bytes payload");

        let frame = Frame::supervisory(0x30, FrameType::Rej, 7).with_poll_final(true);
        assert_eq!(frame.to_string(), "S-frame REJ, addr=0x30, P/F=1, N(R)=7");

        let frame = Frame::unnumbered(0x01, FrameType::Sabm, None);
        assert_eq!(frame.to_string(), "U-frame SABM, addr=0x01, P/F=0");
    }
}
