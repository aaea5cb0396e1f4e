//! Flag bytes, bit masks, and size limits used in the HDLC encoding.

pub mod flags {
    pub const FRAME: u8 = 0x7E;
    pub const ESCAPE: u8 = 0x7D;
}

pub mod escape {
    pub const MASK: u8 = 0x20;
}

pub mod control {
    pub const FRAME_I: u8 = 0x01;       // bit 0 clear for I-frames
    pub const FRAME_S: u8 = 0x02;       // bit 1 clear for S-frames, set for U-frames
    pub const POLL_FINAL: u8 = 0x10;

    pub const SEND_SEQ_SHIFT: u8 = 1;
    pub const RECV_SEQ_SHIFT: u8 = 5;
    pub const SEQ_MASK: u8 = 0x07;

    pub const TYPE_SHIFT: u8 = 2;
    pub const TYPE_MASK: u8 = 0x03;
}

pub mod frame {
    /// Smallest unescaped frame: two flags, address, control, and two FCS bytes.
    pub const MIN_LEN: usize = 6;

    /// Default upper bound for unescaped frames, including both flags.
    pub const DEFAULT_MAX_LEN: usize = 1024;

    /// Largest supported maximum frame length.
    pub const MAX_LEN: usize = 64 * 1024;
}
