//! HDLC framing and link layer for byte-stream transports.
//!
//! The [`hdlc`] module provides byte stuffing, frame encoding and decoding,
//! and a stream framer usable from both synchronous code and tokio. The
//! [`link`] module builds a minimal ARQ link on top of it: sequence
//! numbering, piggy-backed acknowledgments, and duplicate suppression.

pub mod hdlc;
pub mod link;
