//! Opening the message-stream HTTP request

use std::{pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{CredentialStore, bearer_header},
    error::{Error, Result},
    request::StreamRequest,
};

/// Raw response body chunks in arrival order
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can start a streamed reply for a conversation
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and return the response body once headers arrive.
    ///
    /// Must return [`Error::Aborted`] if `cancel` fires before the response
    /// headers are received.
    async fn open(
        &self,
        conversation_id: i64,
        request: &StreamRequest,
        cancel: CancellationToken,
    ) -> Result<ByteStream>;
}

/// [`Transport`] over the DataForge REST API
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpTransport {
    /// Create a transport for the given API base URL
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::with_connect_timeout(base_url, credentials, None)
    }

    /// Create a transport that gives up connecting after `timeout`
    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base URL must be http(s): {:?}",
                base_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// URL of the message-stream endpoint for a conversation
    pub fn endpoint(&self, conversation_id: i64) -> String {
        format!(
            "{}/ai/conversations/{}/messages/stream",
            self.base_url, conversation_id
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        conversation_id: i64,
        request: &StreamRequest,
        cancel: CancellationToken,
    ) -> Result<ByteStream> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or_else(|| Error::Auth("no access token, please log in".into()))?;

        let url = self.endpoint(conversation_id);
        tracing::debug!("POST {}", url);

        let pending = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .header(AUTHORIZATION, bearer_header(&token))
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            response = pending => response?,
        };

        if !response.status().is_success() {
            return Err(Error::status(response.status()));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));
        Ok(Box::pin(body))
    }
}
