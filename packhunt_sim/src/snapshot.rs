// Flat versioned snapshot encoding and the desync checksum.
//
// Layout, little-endian:
//
//   offset  size  field
//   0       4     magic `PKHT`
//   4       2     format version
//   6       4     payload length in bytes
//   10      8     FNV-1a 64 checksum of the payload
//   18      n     bincode payload
//
// The payload is the serialized `SimulationWorld`; transient fields (the
// scent scratch buffer, agent poses, the last pack directive) are skipped
// and rebuilt on the next tick. Decoding validates the header fields in
// order (magic, version, length, checksum) before touching bincode, so a
// corrupt file reports the first thing that is wrong with it.
//
// The same FNV-1a hash over the same bincode bytes is the per-tick
// checksum peers exchange for desync detection. FNV is used rather than
// `rustc_hash` because its output must not depend on pointer width.
//
// See also: `sim.rs` for `to_bytes`/`from_bytes`/`checksum`, `error.rs`
// for the failure variants.

use crate::error::{Result, SimError};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const MAGIC: [u8; 4] = *b"PKHT";
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 18;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Checksum of `value`'s bincode encoding.
pub fn checksum<T: Serialize>(value: &T) -> Result<u64> {
    Ok(fnv1a(&bincode::serialize(value)?))
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&fnv1a(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let header = bytes.get(..HEADER_LEN).ok_or(SimError::Truncated {
        needed: HEADER_LEN,
        available: bytes.len(),
    })?;
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&header[0..4]);
    if magic != MAGIC {
        return Err(SimError::BadMagic(magic));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(SimError::UnsupportedVersion {
            found: version,
            supported: VERSION,
        });
    }
    let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
    let mut sum = [0u8; 8];
    sum.copy_from_slice(&header[10..18]);
    let expected = u64::from_le_bytes(sum);

    let needed = HEADER_LEN + len;
    let payload = bytes.get(HEADER_LEN..needed).ok_or(SimError::Truncated {
        needed,
        available: bytes.len(),
    })?;
    let actual = fnv1a(payload);
    if actual != expected {
        return Err(SimError::ChecksumMismatch { expected, actual });
    }
    Ok(bincode::deserialize(payload)?)
}
