//! dataforge-chat: live state for streamed AI chat replies
//!
//! This crate owns the run lifecycle of a streamed reply: single-flight
//! start, cancellation, ordered application of decoded events, and the
//! generation guard that keeps superseded runs from touching state.

pub mod cache;
pub mod credentials;
pub mod error;
pub mod reducer;
pub mod state;
pub mod store;
pub mod tools;

pub use cache::{NoopCache, QueryCache, QueryKey, RecordingCache};
pub use credentials::FileCredentialStore;
pub use error::{Error, Result};
pub use reducer::{Action, Outcome, Reducer};
pub use state::{Phase, StreamState};
pub use store::{ChatStreamStore, StreamUpdate};
