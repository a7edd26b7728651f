//! # Client Components
//!
//! ## Core Client ([`client`])
//! Delivers one vote: connect, read the greeting, send the encrypted payload.
//!
//! ## Client Middleware ([`middleware`])
//! Owns the session around it:
//! - Vote count and delay between votes
//! - Per-delivery timeout
//! - Fresh timestamp per vote
//! - Progress logging and metrics

pub mod client;
pub mod metrics;
pub mod middleware;

pub use client::ClientCore;
pub use metrics::ClientMetrics;
pub use middleware::{ClientMiddleware, SessionSummary};
