//! Assistant backend client
//!
//! Wraps the hosted chat-completion service behind a small trait so the
//! interaction controller can be driven with a simulated backend in tests.

pub mod client;

pub use client::{AssistantBackend, ChatClient};
