//! Query-cache invalidation collaborator.
//!
//! The store never writes cached data; it only tells the cache which keys
//! went stale so the cache can refetch them on its own schedule.

use parking_lot::Mutex;

/// Cached query families touched by a streamed reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// The conversation list
    Conversations,
    /// Every message list
    Messages,
    /// One conversation's message list
    ConversationMessages(i64),
}

impl QueryKey {
    /// Key path segments as used by the cache
    pub fn path(&self) -> Vec<String> {
        match self {
            QueryKey::Conversations => vec!["ai".into(), "conversations".into()],
            QueryKey::Messages => vec!["ai".into(), "messages".into()],
            QueryKey::ConversationMessages(id) => vec![
                "ai".into(),
                "conversations".into(),
                id.to_string(),
                "messages".into(),
            ],
        }
    }
}

/// Cache that can be told a key is stale
pub trait QueryCache: Send + Sync {
    fn invalidate(&self, key: &QueryKey);
}

/// Cache that ignores invalidations
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl QueryCache for NoopCache {
    fn invalidate(&self, _key: &QueryKey) {}
}

/// Cache that remembers every invalidation in order
#[derive(Debug, Default)]
pub struct RecordingCache {
    keys: Mutex<Vec<QueryKey>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys invalidated so far, oldest first
    pub fn invalidated(&self) -> Vec<QueryKey> {
        self.keys.lock().clone()
    }

}

impl QueryCache for RecordingCache {
    fn invalidate(&self, key: &QueryKey) {
        tracing::debug!("Invalidating query {:?}", key.path());
        self.keys.lock().push(*key);
    }
}
