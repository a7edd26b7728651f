//! # Vote Errors
//!
//! Every failure the protocol layer can report. The core returns these to the
//! caller untouched; logging and exit codes are decided by the session layer.

use thiserror::Error;

use super::messages::VoteField;

#[derive(Error, Debug)]
pub enum VoteError {
    /// Stream read/write or connect failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The server greeting did not contain a version token.
    #[error("malformed greeting: {line:?}")]
    Protocol { line: String },

    /// A vote field was empty.
    #[error("invalid vote: {0} is blank")]
    Validation(VoteField),

    /// The serialized fields do not fit in one PKCS#1 v1.5 block for this key.
    #[error("vote payload too large: {size} bytes, key allows at most {max}")]
    Encoding { size: usize, max: usize },

    #[error("encryption failed: {0}")]
    Crypto(#[from] rsa::Error),

    /// The public key file could not be turned into an RSA key.
    #[error("public key {reason}")]
    Key { reason: String },
}

impl VoteError {
    /// Short label used to group failures in session reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => "timeout",
            Self::Io(_) => "io",
            Self::Protocol { .. } => "protocol",
            Self::Validation(_) => "validation",
            Self::Encoding { .. } => "encoding",
            Self::Crypto(_) => "crypto",
            Self::Key { .. } => "key",
        }
    }
}

pub type Result<T> = std::result::Result<T, VoteError>;
