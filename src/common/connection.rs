//! # Votifier Wire Exchange
//!
//! The two halves of a Votifier v1 conversation, seen from the client:
//!
//! ```text
//! server -> client   "VOTIFIER 1.9\n"                  (greeting)
//! client -> server   [key size bytes: RSA ciphertext]  (vote)
//! ```
//!
//! Nothing is sent back after the vote. Both functions borrow a stream the
//! caller owns; neither closes it nor applies a timeout.

use std::io;

use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::crypto;
use super::error::{Result, VoteError};
use super::messages::{plaintext_capacity, VoteRecord};

const READ_CHUNK_SIZE: usize = 16;

/// Upper bound on a greeting line, so a peer that never sends `\n` cannot
/// grow the buffer forever.
const MAX_GREETING_SIZE: usize = 64 * 1024;

/// Read the server greeting and return its version.
///
/// # Returns
/// - `Ok(version)`: everything after the first space of the first line, trimmed
/// - `Err(VoteError::Io)`: the stream failed or closed before a newline
/// - `Err(VoteError::Protocol)`: the line has no space-separated version
///
/// Bytes that arrive after the newline in the same read are dropped.
pub async fn read_greeting<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut received = Vec::new();

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the greeting line ended",
            )
            .into());
        }

        received.extend_from_slice(&chunk[..n]);

        if chunk[..n].contains(&b'\n') {
            break;
        }

        if received.len() > MAX_GREETING_SIZE {
            return Err(VoteError::Protocol {
                line: String::from_utf8_lossy(&received[..64]).into_owned(),
            });
        }
    }

    let text = String::from_utf8_lossy(&received);
    let line = text.split('\n').next().unwrap_or_default();
    parse_greeting(line)
}

/// Extract the version from a greeting line such as `"VOTIFIER 2.13\r"`.
pub fn parse_greeting(line: &str) -> Result<String> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < 2 {
        return Err(VoteError::Protocol {
            line: line.to_string(),
        });
    }

    Ok(tokens[1..].join(" ").trim().to_string())
}

/// Encrypt `record` for `key` and write the ciphertext to `writer`.
///
/// The payload is padded to the key's PKCS#1 v1.5 capacity, so the bytes
/// written always equal the modulus size. Validation and encoding failures
/// are reported before anything is written.
pub async fn send_vote<W>(record: &VoteRecord, key: &RsaPublicKey, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let block = record.to_plaintext(plaintext_capacity(key.size()))?;
    let ciphertext = crypto::encrypt_block(key, &block)?;

    writer.write_all(&ciphertext).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::crypto::test_key;
    use crate::common::messages::VoteField;
    use rsa::Pkcs1v15Encrypt;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    struct BrokenStream;

    impl AsyncRead for BrokenStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    impl AsyncWrite for BrokenStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn sample() -> VoteRecord {
        VoteRecord::new(
            "example.com",
            "Steve",
            "203.0.113.5",
            "Mon Jan 2 15:04:05 MST 2006",
        )
    }

    #[tokio::test]
    async fn test_greeting_version() {
        let mut input: &[u8] = b"VOTIFIER 1.9\n";
        assert_eq!(read_greeting(&mut input).await.unwrap(), "1.9");
    }

    #[tokio::test]
    async fn test_greeting_keeps_inner_spaces() {
        let mut input: &[u8] = b"X Y Z\n";
        assert_eq!(read_greeting(&mut input).await.unwrap(), "Y Z");
    }

    #[tokio::test]
    async fn test_greeting_strips_carriage_return() {
        let mut input: &[u8] = b"VOTING/1.0 2.13\r\n";
        assert_eq!(read_greeting(&mut input).await.unwrap(), "2.13");
    }

    #[tokio::test]
    async fn test_greeting_across_reads() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            for part in [&b"VOTI"[..], b"FIER 2.", b"13\r", b"\n"] {
                server.write_all(part).await.unwrap();
                tokio::task::yield_now().await;
            }
            server
        });

        assert_eq!(read_greeting(&mut client).await.unwrap(), "2.13");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_greeting_ignores_bytes_after_newline() {
        let mut input: &[u8] = b"VOTIFIER 1.9\ntrailing junk";
        assert_eq!(read_greeting(&mut input).await.unwrap(), "1.9");
    }

    #[tokio::test]
    async fn test_greeting_without_version() {
        let mut input: &[u8] = b"VOTIFIER\n";
        let err = read_greeting(&mut input).await.unwrap_err();
        assert!(matches!(err, VoteError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_greeting_without_newline() {
        let mut input: &[u8] = b"VOTIFIER 1.9";
        match read_greeting(&mut input).await {
            Err(VoteError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected eof, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_greeting_read_error() {
        let err = read_greeting(&mut BrokenStream).await.unwrap_err();
        assert!(matches!(err, VoteError::Io(_)));
    }

    #[tokio::test]
    async fn test_greeting_never_terminated() {
        let (mut client, mut server) = tokio::io::duplex(MAX_GREETING_SIZE * 2);
        server.write_all(&vec![b'A'; MAX_GREETING_SIZE + 32]).await.unwrap();

        let err = read_greeting(&mut client).await.unwrap_err();
        assert!(matches!(err, VoteError::Protocol { .. }));
    }

    #[test]
    fn test_parse_greeting_forms() {
        assert_eq!(parse_greeting("A B").unwrap(), "B");
        assert_eq!(parse_greeting("A B  C \r").unwrap(), "B  C");
        assert!(parse_greeting("AB\r").is_err());
        assert!(parse_greeting("").is_err());
    }

    #[tokio::test]
    async fn test_send_vote_round_trip() {
        let key = test_key().to_public_key();
        let mut sent = Vec::new();

        send_vote(&sample(), &key, &mut sent).await.unwrap();

        assert_eq!(sent.len(), 256);
        let plain = test_key().decrypt(Pkcs1v15Encrypt, &sent).unwrap();
        assert_eq!(plain.len(), 245);

        let end = plain.iter().rposition(|b| *b != 0).unwrap() + 1;
        assert_eq!(
            &plain[..end],
            b"VOTE\nexample.com\nSteve\n203.0.113.5\nMon Jan 2 15:04:05 MST 2006\n"
        );
    }

    #[tokio::test]
    async fn test_send_vote_pads_to_smaller_key() {
        let private = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).unwrap();
        let mut sent = Vec::new();

        send_vote(&sample(), &private.to_public_key(), &mut sent)
            .await
            .unwrap();

        assert_eq!(sent.len(), 128);
        let plain = private.decrypt(Pkcs1v15Encrypt, &sent).unwrap();
        assert_eq!(plain.len(), 117);

        let layout = b"VOTE\nexample.com\nSteve\n203.0.113.5\nMon Jan 2 15:04:05 MST 2006\n";
        assert_eq!(&plain[..layout.len()], &layout[..]);
        assert!(plain[layout.len()..].iter().all(|b| *b == 0));
    }

    #[tokio::test]
    async fn test_send_vote_blank_field_writes_nothing() {
        let key = test_key().to_public_key();
        let mut sent = Vec::new();
        let record = VoteRecord {
            address: String::new(),
            ..sample()
        };

        let err = send_vote(&record, &key, &mut sent).await.unwrap_err();

        assert!(matches!(err, VoteError::Validation(VoteField::Address)));
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_send_vote_oversized_writes_nothing() {
        let key = test_key().to_public_key();
        let mut sent = Vec::new();
        let record = VoteRecord {
            service_name: "s".repeat(240),
            ..sample()
        };

        let err = send_vote(&record, &key, &mut sent).await.unwrap_err();

        assert!(matches!(err, VoteError::Encoding { max: 245, .. }));
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_send_vote_write_failure() {
        let key = test_key().to_public_key();
        let err = send_vote(&sample(), &key, &mut BrokenStream).await.unwrap_err();
        assert!(matches!(err, VoteError::Io(_)));
    }

    #[tokio::test]
    async fn test_repeated_sends_differ() {
        let key = test_key().to_public_key();
        let mut first = Vec::new();
        let mut second = Vec::new();

        send_vote(&sample(), &key, &mut first).await.unwrap();
        send_vote(&sample(), &key, &mut second).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(
            test_key().decrypt(Pkcs1v15Encrypt, &first).unwrap(),
            test_key().decrypt(Pkcs1v15Encrypt, &second).unwrap()
        );
    }
}
