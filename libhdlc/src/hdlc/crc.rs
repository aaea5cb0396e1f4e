//! 16-bit frame check sequence (FCS-16) as used by PPP and ISO HDLC.
//!
//! The register is kept in its reflected form: `compute` returns the raw
//! register without the final inversion. The value transmitted on the wire is
//! the one's complement of the register, see [`checksum`].

use crc::{Algorithm, Crc};


/// Initial register value.
pub const INIT: u16 = 0xFFFF;

/// Register value after running over a frame body including its FCS.
pub const GOOD: u16 = 0xF0B8;

const FCS16_RAW: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: INIT,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x6F91,
    residue: GOOD,
};

const FCS16: Crc<u16> = Crc::<u16>::new(&FCS16_RAW);


/// Run the FCS register over `bytes`, starting from `initial`.
pub fn compute(initial: u16, bytes: &[u8]) -> u16 {
    // the crc crate reflects custom initial values for reflected algorithms,
    // undo that so `initial` is taken as-is
    let mut digest = FCS16.digest_with_initial(initial.reverse_bits());
    digest.update(bytes);
    digest.finalize()
}

/// Check whether a register value is the residue of an intact frame.
pub fn is_good(residue: u16) -> bool {
    residue == GOOD
}

/// FCS value to append (little-endian) to `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    !compute(INIT, bytes)
}

/// Validate a frame body that ends with its two FCS bytes.
pub fn verify(body: &[u8]) -> bool {
    is_good(compute(INIT, body))
}
