//! # Common Components
//!
//! The Votifier protocol itself plus shared configuration.
//!
//! ## Modules
//!
//! - [`messages`]: The vote record and its padded plaintext layout
//! - [`connection`]: Greeting read and vote send over any async stream
//! - [`crypto`]: Public key loading and PKCS#1 v1.5 encryption
//! - [`error`]: Error type shared by all of the above
//! - [`config`]: Session configuration parsing

pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod messages;
