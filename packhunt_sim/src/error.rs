// Error type for the fallible edges of the sim.
//
// Only operations that decode external bytes return errors: snapshot
// restore and config parsing. Gameplay refusals inside a tick are `bool`
// returns and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("snapshot magic mismatch: expected PKHT, found {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported snapshot version {found} (this build reads {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("snapshot truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("snapshot checksum mismatch: header {expected:#018x}, payload {actual:#018x}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("snapshot payload error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
