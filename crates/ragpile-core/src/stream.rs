//! Chunked stream decoding for streaming chat completions.
//!
//! The chat endpoint answers with a chunked body where every chunk carries
//! one JSON frame `{content?, finish_reason?}`, possibly behind a non-JSON
//! prefix such as an SSE `data: ` marker. [`text_deltas`] turns such a body
//! into a lazy stream of text deltas. Reads are driven by the consumer: the
//! body is only polled when the next delta is requested.

use crate::error::{Error, Result};
use futures_util::stream::{Stream, StreamExt, try_unfold};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

/// One decoded frame of a streaming chat completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatFrame {
    /// True when this frame ends the completion.
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// The text delta carried by this frame (empty when absent).
    pub fn into_delta(self) -> String {
        self.content.unwrap_or_default()
    }
}

/// Decode every JSON frame found in one raw chunk.
///
/// The first `{` marks the start of the first frame. When the transport has
/// coalesced several frames into one chunk, decoding resumes at the next `{`
/// after each frame; trailing text without a `{` is ignored. Once at least
/// one frame has decoded, an undecodable tail ends the chunk instead of
/// failing it.
pub fn decode_chunk(bytes: &[u8]) -> Result<Vec<ChatFrame>> {
    let text = String::from_utf8_lossy(bytes);
    let mut rest: &str = &text;
    let mut frames = Vec::new();

    while let Some(start) = rest.find('{') {
        let mut objects =
            serde_json::Deserializer::from_str(&rest[start..]).into_iter::<ChatFrame>();
        let frame = match objects.next() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) if frames.is_empty() => return Err(Error::MalformedChunk(e.to_string())),
            Some(Err(e)) => {
                log::debug!("dropping undecodable chunk tail: {}", e);
                break;
            }
            None => break,
        };
        let consumed = objects.byte_offset();
        frames.push(frame);
        rest = &rest[start + consumed..];
    }

    if frames.is_empty() {
        return Err(Error::MalformedChunk(format!(
            "no JSON object in chunk: {:?}",
            truncate(&text, 80)
        )));
    }
    Ok(frames)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

struct DeltaState<S> {
    body: Pin<Box<S>>,
    pending: VecDeque<ChatFrame>,
    finished: bool,
}

async fn next_delta<S, B, E>(mut state: DeltaState<S>) -> Result<Option<(String, DeltaState<S>)>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    loop {
        if state.finished {
            return Ok(None);
        }
        if let Some(frame) = state.pending.pop_front() {
            if frame.is_final() {
                state.finished = true;
            }
            return Ok(Some((frame.into_delta(), state)));
        }
        match state.body.next().await {
            None => return Ok(None),
            Some(chunk) => {
                let chunk = chunk.map_err(Into::into)?;
                state.pending.extend(decode_chunk(chunk.as_ref())?);
            }
        }
    }
}

/// Turn a chunked response body into a lazy stream of text deltas.
///
/// The stream ends cleanly when the body ends or after the frame carrying a
/// `finish_reason` (whose content is still yielded). A malformed chunk or a
/// transport failure is yielded as the last item.
pub fn text_deltas<S, B, E>(body: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    let state = DeltaState {
        body: Box::pin(body),
        pending: VecDeque::new(),
        finished: false,
    };
    try_unfold(state, next_delta::<S, B, E>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body(chunks: &[&str]) -> impl Stream<Item = Result<Vec<u8>>> + use<> {
        let chunks: Vec<Result<Vec<u8>>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        stream::iter(chunks)
    }

    async fn collect_all<S: Stream<Item = Result<String>>>(s: S) -> Vec<Result<String>> {
        s.collect().await
    }

    #[test]
    fn test_decode_chunk_with_sse_prefix() {
        let frames =
            decode_chunk(br#"data: {"content":"hi","finish_reason":null}"#).unwrap();
        assert_eq!(
            frames,
            vec![ChatFrame {
                content: Some("hi".into()),
                finish_reason: None,
            }]
        );
        assert!(!frames[0].is_final());
    }

    #[test]
    fn test_decode_chunk_without_brace_is_malformed() {
        let err = decode_chunk(b"data: [DONE]").unwrap_err();
        assert!(matches!(err, Error::MalformedChunk(_)));
    }

    #[test]
    fn test_decode_chunk_invalid_json_is_malformed() {
        let err = decode_chunk(br#"{"content": "unterminated"#).unwrap_err();
        assert!(matches!(err, Error::MalformedChunk(_)));
    }

    #[test]
    fn test_decode_chunk_coalesced_frames() {
        let frames = decode_chunk(
            b"data: {\"content\":\"a\"}\n\ndata: {\"content\":\"b\"}\n\ndata: [DONE]",
        )
        .unwrap();
        let texts: Vec<_> = frames.into_iter().map(ChatFrame::into_delta).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_chunk_keeps_frames_before_bad_tail() {
        let frames = decode_chunk(b"data: {\"content\":\"a\"}\n\n: ping {").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_yields_content_then_continues() {
        let items = collect_all(text_deltas(body(&[
            r#"data: {"content":"hi","finish_reason":null}"#,
            r#"data: {"content":" there","finish_reason":null}"#,
        ])))
        .await;
        let texts: Vec<_> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["hi", " there"]);
    }

    #[tokio::test]
    async fn test_finish_reason_yields_last_content_then_stops() {
        let items = collect_all(text_deltas(body(&[
            r#"{"content":"","finish_reason":"stop"}"#,
            r#"{"content":"never seen"}"#,
        ])))
        .await;
        let texts: Vec<_> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec![""]);
    }

    #[tokio::test]
    async fn test_missing_content_yields_empty_delta() {
        let items = collect_all(text_deltas(body(&[r#"{"finish_reason":null}"#, r#"{"content":"x"}"#])))
            .await;
        let texts: Vec<_> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["", "x"]);
    }

    #[tokio::test]
    async fn test_malformed_chunk_terminates_stream() {
        let items = collect_all(text_deltas(body(&[
            r#"{"content":"ok"}"#,
            "garbage without json",
            r#"{"content":"after"}"#,
        ])))
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(matches!(items[1], Err(Error::MalformedChunk(_))));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(br#"{"content":"partial"}"#.to_vec()),
            Err(Error::ChannelClosed),
        ];
        let items = collect_all(text_deltas(stream::iter(chunks))).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_empty_body_ends_without_error() {
        let items = collect_all(text_deltas(body(&[]))).await;
        assert!(items.is_empty());
    }
}
