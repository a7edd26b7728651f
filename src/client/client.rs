//! # Client Core
//!
//! One vote delivery, start to finish: connect, read the greeting, send the
//! encrypted vote, close. The core holds only the server's public key; it
//! does not repeat, delay, or time out. Those belong to the
//! [`ClientMiddleware`](super::middleware::ClientMiddleware).
//!
//! ## Usage
//!
//! ```rust,ignore
//! let key = load_public_key("public.key")?;
//! let core = ClientCore::new(key);
//!
//! let record = VoteRecord::new("example.com", "Steve", "203.0.113.5", timestamp);
//! let version = core.deliver(&"127.0.0.1:8192".parse()?, &record).await?;
//! ```

use log::{debug, info};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::common::config::Target;
use crate::common::connection::{read_greeting, send_vote};
use crate::common::error::Result;
use crate::common::messages::{plaintext_capacity, VoteRecord};

/// Sends single votes to a Votifier server with a fixed public key.
pub struct ClientCore {
    key: RsaPublicKey,
}

impl ClientCore {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Deliver `record` to `target` over a fresh connection.
    ///
    /// The vote is checked against the key before connecting, so a blank or
    /// oversized vote never opens a socket.
    ///
    /// # Returns
    /// - `Ok(version)`: the version the server announced in its greeting
    /// - `Err`: validation, connect, greeting, encryption or write failure
    pub async fn deliver(&self, target: &Target, record: &VoteRecord) -> Result<String> {
        record.check_fits(plaintext_capacity(self.key.size()))?;

        let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
        debug!("Connected to {}", target);

        let version = read_greeting(&mut stream).await?;
        info!("Connected to votifier at {} (version {})", target, version);

        send_vote(record, &self.key, &mut stream).await?;

        // The vote is already flushed; a failed FIN changes nothing for the server.
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown of {} failed: {}", target, e);
        }

        Ok(version)
    }
}
