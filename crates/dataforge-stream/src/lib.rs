//! dataforge-stream: wire layer for DataForge AI chat streaming
//!
//! This crate turns a user message into a streamed HTTP request and decodes the
//! `data:`-prefixed response body into typed [`StreamEvent`]s.

pub mod auth;
pub mod decoder;
pub mod error;
pub mod event;
pub mod request;
pub mod transport;

pub use auth::{CredentialStore, StaticToken};
pub use decoder::{EventDecoder, EventStream, decode_events};
pub use error::{Error, Result};
pub use event::StreamEvent;
pub use request::{ProviderOptions, StreamRequest};
pub use transport::{ByteStream, HttpTransport, Transport};
