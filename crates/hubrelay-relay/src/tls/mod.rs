//! Mutual-TLS plumbing for the device hub leg.

pub mod client;
pub mod verifier;

pub use client::{PeerEndpoint, PeerTimeouts, SecureClientFactory};
pub use verifier::{CapturingVerifier, PinnedVerifier, chain_root};
