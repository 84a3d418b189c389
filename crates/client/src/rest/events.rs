//! Server-sent event stream for live catalog updates.
//!
//! The database streams `put` and `patch` events carrying a JSON body of
//! the form `{"path": "...", "data": ...}`. A `put` at the root carries the
//! whole document; anything narrower is answered with a one-shot refetch so
//! subscribers always receive full documents.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use appshelf_core::{Catalog, ChangeSink};

use super::DocumentEndpoint;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Longest accepted line. A whole-document `put` arrives as one `data:`
/// line, so this bounds the catalog size the stream can carry.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SseError {
    #[error("event stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines anywhere; complete events are returned as soon
/// as their terminating blank line arrives.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    max_line: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn with_max_line(max_line: usize) -> Self {
        Self { buffer: Vec::new(), event: None, data: Vec::new(), max_line }
    }

    /// Feed a chunk. Fails once a line grows past the limit; the decoder
    /// should then be discarded along with the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, SseError> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            if pos > self.max_line {
                return Err(SseError::LineTooLong { limit: self.max_line });
            }
            let mut raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            let line = String::from_utf8_lossy(&raw);

            if line.is_empty() {
                if let Some(event) = self.finish() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_ref(), ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        if self.buffer.len() > self.max_line {
            return Err(SseError::LineTooLong { limit: self.max_line });
        }
        Ok(events)
    }

    fn finish(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(SseEvent { event: event.unwrap_or_else(|| "message".into()), data: data.join("\n") })
    }
}

/// What to do with one stream event.
#[derive(Debug)]
pub enum StreamAction {
    Deliver(Catalog),
    Refetch,
    Ignore,
    Close(String),
}

#[derive(Deserialize)]
struct EventBody {
    path: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub fn interpret(event: &SseEvent) -> StreamAction {
    match event.event.as_str() {
        "put" => match serde_json::from_str::<EventBody>(&event.data) {
            Ok(body) if body.path == "/" => match Catalog::from_json_value(body.data) {
                Ok(doc) => StreamAction::Deliver(doc),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable pushed document, refetching");
                    StreamAction::Refetch
                }
            },
            _ => StreamAction::Refetch,
        },
        "patch" => StreamAction::Refetch,
        "keep-alive" => StreamAction::Ignore,
        "cancel" | "auth_revoked" => StreamAction::Close(event.event.clone()),
        other => {
            tracing::debug!(event = other, "ignoring stream event");
            StreamAction::Ignore
        }
    }
}

/// Drive an event stream until it ends, is closed by the server, or the
/// receiving side goes away.
pub async fn pump_events<S>(mut stream: S, endpoint: DocumentEndpoint, sink: ChangeSink)
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "event stream failed");
                return;
            }
        };

        let events = match decoder.push(&chunk) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "closing event stream");
                return;
            }
        };

        for event in events {
            let doc = match interpret(&event) {
                StreamAction::Deliver(doc) => doc,
                StreamAction::Refetch => match endpoint.fetch().await {
                    Ok(doc) => doc,
                    Err(e) => {
                        tracing::warn!(error = %e, "refetch after change event failed");
                        continue;
                    }
                },
                StreamAction::Ignore => continue,
                StreamAction::Close(reason) => {
                    tracing::warn!(reason = %reason, "event stream closed by server");
                    return;
                }
            };

            if sink.send(doc).is_err() {
                tracing::debug!("push receiver dropped, stopping event stream");
                return;
            }
        }
    }

    tracing::debug!("event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use appshelf_core::{App, Category};
    use futures_util::stream;
    use tokio::sync::mpsc;

    fn put_root(doc: &Catalog) -> String {
        let body = serde_json::json!({ "path": "/", "data": doc });
        format!("event: put\ndata: {body}\n\n")
    }

    fn endpoint() -> DocumentEndpoint {
        DocumentEndpoint::new(reqwest::Client::new(), reqwest::Url::parse("http://127.0.0.1:9/apps.json").unwrap())
    }

    #[test]
    fn test_decoder_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: pu").unwrap().is_empty());
        assert!(decoder.push(b"t\r\ndata: {\"path\":\"/\",").unwrap().is_empty());
        let events = decoder.push(b"\"data\":null}\r\n\r\n").unwrap();

        assert_eq!(events, vec![SseEvent { event: "put".into(), data: r#"{"path":"/","data":null}"#.into() }]);
    }

    #[test]
    fn test_decoder_multiline_data_and_comments() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": heartbeat\ndata: one\ndata: two\n\n\n").unwrap();
        assert_eq!(events, vec![SseEvent { event: "message".into(), data: "one\ntwo".into() }]);
    }

    #[test]
    fn test_decoder_rejects_unterminated_long_line() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.push(b"data: 0123456").unwrap().is_empty());

        let result = decoder.push(b"789abcdef");

        assert_eq!(result, Err(SseError::LineTooLong { limit: 16 }));
    }

    #[test]
    fn test_decoder_rejects_long_terminated_line() {
        let mut decoder = SseDecoder::with_max_line(8);
        assert!(decoder.push(b"data: 0123456789\n\n").is_err());
    }

    #[tokio::test]
    async fn test_pump_closes_on_oversized_line() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(vec![b'x'; MAX_LINE_BYTES])),
            Ok(Bytes::from_static(b"xx")),
            Ok(Bytes::from(put_root(&Catalog::empty()))),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        pump_events(stream::iter(chunks), endpoint(), tx).await;

        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_interpret_root_put_delivers() {
        let mut doc = Catalog::empty();
        doc.insert_app(App::new("Chess", Category::Game));
        let event = SseEvent {
            event: "put".into(),
            data: serde_json::json!({ "path": "/", "data": doc }).to_string(),
        };

        assert!(matches!(interpret(&event), StreamAction::Deliver(d) if d == doc));
    }

    #[test]
    fn test_interpret_null_root_is_empty_catalog() {
        let event = SseEvent { event: "put".into(), data: r#"{"path":"/","data":null}"#.into() };
        assert!(matches!(interpret(&event), StreamAction::Deliver(d) if d.is_empty()));
    }

    #[test]
    fn test_interpret_partial_changes_refetch() {
        let put = SseEvent { event: "put".into(), data: r#"{"path":"/pc/0/title","data":"New"}"#.into() };
        let patch = SseEvent { event: "patch".into(), data: r#"{"path":"/","data":{"pc":[]}}"#.into() };
        assert!(matches!(interpret(&put), StreamAction::Refetch));
        assert!(matches!(interpret(&patch), StreamAction::Refetch));
    }

    #[test]
    fn test_interpret_control_events() {
        let keep_alive = SseEvent { event: "keep-alive".into(), data: "null".into() };
        let revoked = SseEvent { event: "auth_revoked".into(), data: "\"token expired\"".into() };
        assert!(matches!(interpret(&keep_alive), StreamAction::Ignore));
        assert!(matches!(interpret(&revoked), StreamAction::Close(reason) if reason == "auth_revoked"));
    }

    #[tokio::test]
    async fn test_pump_delivers_root_puts_until_cancel() {
        let mut first = Catalog::empty();
        first.insert_app(App::new("First", Category::Pc));
        let mut second = first.clone();
        second.insert_app(App::new("Second", Category::Editing));

        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(put_root(&first))),
            Ok(Bytes::from_static(b"event: keep-alive\ndata: null\n\n")),
            Ok(Bytes::from(put_root(&second))),
            Ok(Bytes::from_static(b"event: cancel\ndata: null\n\n")),
            Ok(Bytes::from(put_root(&Catalog::empty()))),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        pump_events(stream::iter(chunks), endpoint(), tx).await;

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
        assert!(rx.recv().await.is_none());
    }
}
