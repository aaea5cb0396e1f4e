use super::{decoder, encoder, Decoded, Frame};

use bytes::BytesMut;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;


/// Stream codec for HDLC frames.
///
/// Decoding yields every frame recovered from the stream, including invalid
/// ones. Junk and oversized data are dropped silently.
#[derive(Debug, Default)]
pub struct Codec {
    dec: decoder::Decoder,
}

impl Codec {
    pub fn new() -> Self {
        Self { dec: decoder::Decoder::new() }
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self { dec: decoder::Decoder::with_max_len(max_len) }
    }

    pub fn wrap<T>(self, io: T) -> Framed<T, Codec>
    where
        T: AsyncRead + AsyncWrite,
    {
        let cap = self.dec.max_len().saturating_mul(2);
        Framed::with_capacity(io, self, cap)
    }
}

impl tokio_util::codec::Encoder<&Frame> for Codec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encoder::encode_into(dst, frame);
        Ok(())
    }
}

impl tokio_util::codec::Encoder<Frame> for Codec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(&frame, dst)
    }
}

impl tokio_util::codec::Decoder for Codec {
    type Item = Decoded;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.dec.process(src))
    }
}
