//! # Vote Message
//!
//! The Votifier v1 vote payload. A vote is five newline-terminated text fields
//! zero-padded out to the largest plaintext one PKCS#1 v1.5 block can carry:
//!
//! ```text
//! VOTE\n<service>\n<username>\n<address>\n<timestamp>\n 00 00 .. 00
//! |<------------------ key size in bytes - 11 ------------------->|
//! ```

use std::fmt;

use super::error::{Result, VoteError};

/// First line of every vote payload.
pub const PROTOCOL_MARKER: &str = "VOTE";

/// Bytes PKCS#1 v1.5 reserves for its own padding in every block.
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Names a component of the payload, used when reporting a blank one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteField {
    Marker,
    ServiceName,
    Username,
    Address,
    Timestamp,
}

impl fmt::Display for VoteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Marker => "protocol marker",
            Self::ServiceName => "service name",
            Self::Username => "username",
            Self::Address => "voter address",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// One vote notification.
///
/// Built fresh for every send and consumed by encoding; nothing here is
/// validated until [`VoteRecord::to_plaintext`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    /// Name of the voting site (e.g. "example.com")
    pub service_name: String,
    /// Player the vote is credited to
    pub username: String,
    /// Address of the person who voted
    pub address: String,
    /// When the vote happened, in whatever text form the server accepts
    pub timestamp: String,
}

impl VoteRecord {
    pub fn new(
        service_name: impl Into<String>,
        username: impl Into<String>,
        address: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            username: username.into(),
            address: address.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Fields in wire order.
    fn parts(&self) -> [(VoteField, &str); 5] {
        [
            (VoteField::Marker, PROTOCOL_MARKER),
            (VoteField::ServiceName, &self.service_name),
            (VoteField::Username, &self.username),
            (VoteField::Address, &self.address),
            (VoteField::Timestamp, &self.timestamp),
        ]
    }

    /// Fails with [`VoteError::Validation`] naming the first blank field.
    pub fn validate(&self) -> Result<()> {
        match self.parts().iter().find(|(_, part)| part.is_empty()) {
            Some((field, _)) => Err(VoteError::Validation(*field)),
            None => Ok(()),
        }
    }

    /// Length of the newline-terminated fields, before padding.
    pub fn encoded_len(&self) -> usize {
        self.parts().iter().map(|(_, part)| part.len() + 1).sum()
    }

    /// Checks that the vote can be encoded into a block of `block_size` bytes.
    ///
    /// # Errors
    /// - [`VoteError::Validation`] if any field is empty
    /// - [`VoteError::Encoding`] if the fields alone are longer than `block_size`
    pub fn check_fits(&self, block_size: usize) -> Result<()> {
        self.validate()?;

        let size = self.encoded_len();
        if size > block_size {
            return Err(VoteError::Encoding {
                size,
                max: block_size,
            });
        }

        Ok(())
    }

    /// Serializes the vote into a zero-padded block of exactly `block_size` bytes.
    ///
    /// Fails the same way as [`VoteRecord::check_fits`].
    pub fn to_plaintext(&self, block_size: usize) -> Result<Vec<u8>> {
        self.check_fits(block_size)?;

        let mut block = Vec::with_capacity(block_size);
        for (_, part) in self.parts() {
            block.extend_from_slice(part.as_bytes());
            block.push(b'\n');
        }

        block.resize(block_size, 0);
        Ok(block)
    }
}

/// Largest plaintext a PKCS#1 v1.5 block holds for a modulus of `key_size` bytes.
pub fn plaintext_capacity(key_size: usize) -> usize {
    key_size.saturating_sub(PKCS1_V15_OVERHEAD)
}
