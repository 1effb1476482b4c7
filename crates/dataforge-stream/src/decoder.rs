//! Incremental decoder for `data:`-prefixed event streams.
//!
//! Bytes arrive in arbitrary chunks. A chunk may end in the middle of a line
//! or in the middle of a multi-byte character, so both the undecoded byte
//! tail and the unterminated line tail are carried into the next chunk.
//! Complete lines are turned into [`StreamEvent`]s in wire order.

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::{error::Result, event::StreamEvent};

/// Prefix every payload line carries
const DATA_PREFIX: &str = "data: ";

/// Transport-level end marker, distinct from the semantic `done` event
const DONE_SENTINEL: &str = "[DONE]";

/// A stream of decoded events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Line-oriented event decoder for one run.
#[derive(Debug, Default)]
pub struct EventDecoder {
    /// Decoded text not yet terminated by a newline
    buffer: String,
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk
    pending: Vec<u8>,
}

impl EventDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode_utf8(chunk);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        complete.split('\n').filter_map(parse_line).collect()
    }

    /// Flush whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }

    /// Text currently waiting for a line terminator
    #[cfg(test)]
    fn buffered(&self) -> &str {
        &self.buffer
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[consumed..valid_end]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for the next chunk
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
    }
}

/// Turn one complete line into an event, if it carries one.
fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        tracing::debug!("Stream end marker received");
        return None;
    }

    match StreamEvent::from_payload(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Skipping malformed stream event: {} (payload: {})", e, payload);
            None
        }
    }
}

/// Decode a byte stream into an ordered stream of events.
///
/// Transport errors are passed through and end the event stream.
pub fn decode_events<S, B>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(stream! {
        let mut decoder = EventDecoder::new();
        let mut bytes = Box::pin(bytes);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for event in decoder.feed(chunk.as_ref()) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        for event in decoder.finish() {
            yield Ok(event);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Vec<u8>>> {
        futures::stream::iter(parts.into_iter().map(|p| Ok(p.to_vec())))
    }

    async fn collect(parts: Vec<&'static [u8]>) -> Vec<StreamEvent> {
        decode_events(chunks(parts))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_single_complete_line() {
        let mut decoder = EventDecoder::new();
        let events = decoder.feed(b"data: {\"type\":\"content\",\"content\":\"Hel\"}\n");
        assert_eq!(events, vec![StreamEvent::content("Hel")]);
        assert_eq!(decoder.buffered(), "");
    }

    #[test]
    fn test_done_sentinel_emits_nothing() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.feed(b"data: [DONE]\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.feed(b"data: {\"typ").is_empty());
        assert_eq!(decoder.buffered(), "data: {\"typ");

        let events = decoder.feed(b"e\":\"content\",\"content\":\"X\"}\n");
        assert_eq!(events, vec![StreamEvent::content("X")]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        // "你" is E4 BD A0
        let mut decoder = EventDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"content\",\"content\":\"\xE4").is_empty());
        assert!(decoder.feed(b"\xBD").is_empty());
        let events = decoder.feed(b"\xA0\"}\n");
        assert_eq!(events, vec![StreamEvent::content("你")]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = EventDecoder::new();
        let events = decoder.feed(b"data: {\"type\":\"content\",\"content\":\"a\xFFb\"}\n");
        assert_eq!(events, vec![StreamEvent::content("a\u{FFFD}b")]);
    }

    #[test]
    fn test_non_data_lines_are_skipped() {
        let mut decoder = EventDecoder::new();
        let events = decoder.feed(
            b": keep-alive\nevent: message\nid: 3\n\n\ndata: {\"type\":\"content\",\"content\":\"ok\"}\n",
        );
        assert_eq!(events, vec![StreamEvent::content("ok")]);
    }

    #[test]
    fn test_crlf_and_surrounding_whitespace() {
        let mut decoder = EventDecoder::new();
        let events =
            decoder.feed(b"  data: {\"type\":\"content\",\"content\":\"a\"}\r\n\r\ndata: {\"type\":\"done\"}\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::content("a"));
        assert!(events[1].is_terminal());
    }

    #[test]
    fn test_malformed_line_between_valid_lines() {
        let mut decoder = EventDecoder::new();
        let events = decoder.feed(
            b"data: {\"type\":\"content\",\"content\":\"A\"}\ndata: {not json\ndata: {\"type\":\"content\",\"content\":\"B\"}\n",
        );
        assert_eq!(events, vec![StreamEvent::content("A"), StreamEvent::content("B")]);
    }

    #[test]
    fn test_unterminated_last_line_flushed_on_finish() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"done\"}").is_empty());
        let events = decoder.finish();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_decode_stream_preserves_order_across_chunks() {
        let events = collect(vec![
            b"data: {\"type\":\"start\",\"assistant_message_id\":42}\ndata: {\"type\":\"con",
            b"tent\",\"content\":\"Hel\"}\n",
            b"data: {\"type\":\"content\",\"content\":\"lo\"}\ndata: {\"type\":\"done\"}\n",
            b"data: [DONE]\n",
        ])
        .await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            StreamEvent::Start {
                user_message_id: None,
                assistant_message_id: Some(42)
            }
        );
        let text: String = events.iter().filter_map(|e| e.fragment()).collect();
        assert_eq!(text, "Hello");
        assert!(events[3].is_terminal());
    }

    #[tokio::test]
    async fn test_decode_stream_one_byte_at_a_time() {
        const WIRE: &[u8] =
            b"data: {\"type\":\"content\",\"content\":\"\xE6\x95\xB0\xE6\x8D\xAE\"}\ndata: {\"type\":\"content\",\"content\":\"ok\"}\n";
        let parts: Vec<&'static [u8]> = WIRE.chunks(1).collect();
        let events = collect(parts).await;
        let text: String = events.iter().filter_map(|e| e.fragment()).collect();
        assert_eq!(text, "数据ok");
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: {\"type\":\"content\",\"content\":\"A\"}\n".to_vec()),
            Err(Error::Aborted),
            Ok(b"data: {\"type\":\"content\",\"content\":\"B\"}\n".to_vec()),
        ];
        let results: Vec<Result<StreamEvent>> =
            decode_events(futures::stream::iter(parts)).collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &StreamEvent::content("A"));
        assert!(results[1].as_ref().unwrap_err().is_abort());
    }
}
