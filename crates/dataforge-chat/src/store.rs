//! Run lifecycle for streamed chat replies.
//!
//! [`ChatStreamStore`] is the only mutation entry point for [`StreamState`]:
//! `start`, `stop` and `clear_error`. It is a cloneable handle; all fields are
//! `Arc`-wrapped so a render loop, a Ctrl-C handler and the task driving
//! `start` can share one store.
//!
//! Observers either watch whole [`StreamState`] snapshots (latest value wins)
//! or subscribe to [`StreamUpdate`]s, the ordered text appended by the
//! current run.

use std::sync::Arc;

use dataforge_stream::{
    Error as StreamError, ProviderOptions, StreamEvent, StreamRequest, Transport, decode_events,
};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    cache::QueryCache,
    error::Error,
    reducer::{Action, Outcome, Reducer},
    state::StreamState,
};

/// Text appended to the live buffers by the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Content(String),
    Reasoning(String),
}

/// Streaming chat-response store
#[derive(Clone)]
pub struct ChatStreamStore {
    reducer: Arc<Mutex<Reducer>>,
    state_tx: Arc<watch::Sender<StreamState>>,
    update_tx: broadcast::Sender<StreamUpdate>,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn QueryCache>,
    /// Cancellation handle of the open request, tagged with its run's seq
    cancel: Arc<Mutex<Option<(u64, CancellationToken)>>>,
}

impl ChatStreamStore {
    /// Create an idle store
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn QueryCache>) -> Self {
        let (state_tx, _) = watch::channel(StreamState::default());
        let (update_tx, _) = broadcast::channel(1024);
        Self {
            reducer: Arc::new(Mutex::new(Reducer::new())),
            state_tx: Arc::new(state_tx),
            update_tx,
            transport,
            cache,
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// A copy of the current state
    pub fn snapshot(&self) -> StreamState {
        self.reducer.lock().state().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    /// Receive appended text in order
    pub fn subscribe_updates(&self) -> broadcast::Receiver<StreamUpdate> {
        self.update_tx.subscribe()
    }

    /// Whether a run is in progress
    pub fn is_streaming(&self) -> bool {
        self.reducer.lock().state().is_streaming()
    }

    /// Stream the reply to `content` in `conversation_id`.
    ///
    /// Resolves once the run has ended. Never fails: problems end up in
    /// [`StreamState::error`]. If a run is already active the call is
    /// rejected without touching the network.
    pub async fn start(
        &self,
        conversation_id: i64,
        content: impl Into<String>,
        options: ProviderOptions,
    ) {
        let content = content.into();
        let request = StreamRequest::new(content.clone(), &options);

        let cancel = CancellationToken::new();
        let outcome = {
            let mut reducer = self.reducer.lock();
            let outcome = self.dispatch_locked(
                &mut reducer,
                Action::Start {
                    conversation_id,
                    content,
                },
            );
            // Store the handle before releasing the reducer so a concurrent
            // stop either precedes this run or finds its handle
            if let Outcome::Started { seq } = outcome {
                if let Some((previous, token)) = self.cancel.lock().replace((seq, cancel.clone())) {
                    tracing::debug!("Cancelling leftover request of run {}", previous);
                    token.cancel();
                }
            }
            outcome
        };

        let seq = match outcome {
            Outcome::Started { seq } => seq,
            _ => {
                tracing::warn!(
                    "Rejected reply for conversation {}: another reply is streaming",
                    conversation_id
                );
                return;
            }
        };
        tracing::debug!("Run {} started for conversation {}", seq, conversation_id);

        match self
            .run(seq, conversation_id, &request, &cancel)
            .await
            .map_err(Error::from)
        {
            Ok(()) => tracing::debug!("Run {} completed", seq),
            Err(e) if e.is_abort() => tracing::debug!("Run {} aborted", seq),
            Err(e) => {
                tracing::warn!("Run {} failed: {}", seq, e);
                self.dispatch(Action::Fail {
                    seq,
                    message: e.to_string(),
                });
            }
        }

        self.dispatch(Action::Finish { seq });

        let mut handle = self.cancel.lock();
        if matches!(*handle, Some((owner, _)) if owner == seq) {
            *handle = None;
        }
    }

    /// Cancel the active run, if any, and return to idle immediately.
    ///
    /// Events still buffered from the cancelled run are discarded.
    pub fn stop(&self) {
        let open = {
            let mut reducer = self.reducer.lock();
            self.dispatch_locked(&mut reducer, Action::Stop);
            self.cancel.lock().take()
        };
        if let Some((seq, token)) = open {
            tracing::debug!("Stopping run {}", seq);
            token.cancel();
        }
    }

    /// Dismiss the current error
    pub fn clear_error(&self) {
        self.dispatch(Action::ClearError);
    }

    async fn run(
        &self,
        seq: u64,
        conversation_id: i64,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> dataforge_stream::Result<()> {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Aborted),
            body = self.transport.open(conversation_id, request, cancel.clone()) => body?,
        };

        let mut events = decode_events(body);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Aborted),
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => self.apply(seq, event),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }

    fn apply(&self, seq: u64, event: StreamEvent) {
        let kind = event.kind();

        let outcome = {
            let mut reducer = self.reducer.lock();
            let content_len = reducer.state().streaming_content.len();
            let reasoning_len = reducer.state().streaming_reasoning.len();

            let outcome = self.dispatch_locked(&mut reducer, Action::Event { seq, event });

            let state = reducer.state();
            if let Some(text) = appended(&state.streaming_content, content_len) {
                let _ = self.update_tx.send(StreamUpdate::Content(text));
            }
            if let Some(text) = appended(&state.streaming_reasoning, reasoning_len) {
                let _ = self.update_tx.send(StreamUpdate::Reasoning(text));
            }
            outcome
        };

        match outcome {
            Outcome::Applied { invalidate } => {
                for key in &invalidate {
                    self.cache.invalidate(key);
                }
            }
            Outcome::Ignored => {
                tracing::debug!("Discarding {} event from superseded run {}", kind, seq);
            }
            _ => {}
        }
    }

    fn dispatch(&self, action: Action) -> Outcome {
        let mut reducer = self.reducer.lock();
        self.dispatch_locked(&mut reducer, action)
    }

    fn dispatch_locked(&self, reducer: &mut Reducer, action: Action) -> Outcome {
        let outcome = reducer.dispatch(action);
        if outcome != Outcome::Ignored {
            // Publish under the lock so observers never see states out of order
            self.state_tx.send_replace(reducer.state().clone());
        }
        outcome
    }
}

/// Text added to `buffer` past `previous_len`
fn appended(buffer: &str, previous_len: usize) -> Option<String> {
    buffer
        .get(previous_len..)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
