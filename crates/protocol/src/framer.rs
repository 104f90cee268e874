//! Server-side framing for the chat stream.
//!
//! The framer serialises [`StreamEvent`]s into newline-terminated JSON
//! frames and enforces the emission contract of the protocol. Order
//! violations are bugs in the caller, so they surface as [`FrameError`]
//! instead of reaching the wire.

use thiserror::Error;

use crate::event::StreamEvent;

/// Emission-order violations. These indicate a programming error in the
/// producer, never a malformed peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("meta must be the first event of a stream")]
    MetaAfterOutput,
    #[error("meta was already emitted for this stream")]
    DuplicateMeta,
    #[error("sources were already emitted for this stream")]
    DuplicateSources,
    #[error("only done may follow an error event")]
    OutputAfterError,
    #[error("the stream is already closed")]
    StreamClosed,
}

/// Serialises chat stream events and tracks what has been emitted.
///
/// One framer instance frames exactly one response stream. The caller is
/// expected to flush each frame to the transport as soon as it is
/// produced; `content` latency is bounded by that flush, not by the
/// framer.
#[derive(Debug, Default)]
pub struct StreamFramer {
    started: bool,
    meta_sent: bool,
    sources_sent: bool,
    errored: bool,
    closed: bool,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialise `event` into a newline-terminated frame.
    pub fn frame(&mut self, event: &StreamEvent) -> Result<String, FrameError> {
        self.check(event)?;
        self.record(event);

        // StreamEvent serialisation cannot fail: every payload is made of
        // plain strings, integers and JSON values.
        let mut line = serde_json::to_string(event).expect("stream event must serialise");
        line.push('\n');
        Ok(line)
    }

    /// Whether the stream has been closed by a `done` frame.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check(&self, event: &StreamEvent) -> Result<(), FrameError> {
        if self.closed {
            return Err(FrameError::StreamClosed);
        }
        if self.errored && !matches!(event, StreamEvent::Done) {
            return Err(FrameError::OutputAfterError);
        }
        match event {
            StreamEvent::Meta { .. } if self.meta_sent => Err(FrameError::DuplicateMeta),
            StreamEvent::Meta { .. } if self.started => Err(FrameError::MetaAfterOutput),
            StreamEvent::Sources { .. } if self.sources_sent => Err(FrameError::DuplicateSources),
            _ => Ok(()),
        }
    }

    fn record(&mut self, event: &StreamEvent) {
        self.started = true;
        match event {
            StreamEvent::Meta { .. } => self.meta_sent = true,
            StreamEvent::Sources { .. } => self.sources_sent = true,
            StreamEvent::Error { .. } => self.errored = true,
            StreamEvent::Done => self.closed = true,
            StreamEvent::Content { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SourceReference;

    #[test]
    fn frames_a_complete_turn_in_order() {
        let mut framer = StreamFramer::new();

        let mut wire = String::new();
        wire.push_str(&framer.frame(&StreamEvent::Meta { chat_id: 42 }).unwrap());
        wire.push_str(&framer.frame(&StreamEvent::content("Immediately ")).unwrap());
        wire.push_str(&framer.frame(&StreamEvent::content("call 1930.")).unwrap());
        wire.push_str(&framer.frame(&StreamEvent::Sources { data: vec![] }).unwrap());
        wire.push_str(&framer.frame(&StreamEvent::Done).unwrap());

        let lines: Vec<&str> = wire.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], r#"{"type":"meta","chat_id":42}"#);
        assert_eq!(lines[4], r#"{"type":"done"}"#);
        assert!(framer.is_closed());
    }

    #[test]
    fn meta_must_come_first() {
        let mut framer = StreamFramer::new();
        framer.frame(&StreamEvent::content("hello")).unwrap();

        let err = framer.frame(&StreamEvent::Meta { chat_id: 7 }).unwrap_err();
        assert_eq!(err, FrameError::MetaAfterOutput);
    }

    #[test]
    fn meta_is_emitted_at_most_once() {
        let mut framer = StreamFramer::new();
        framer.frame(&StreamEvent::Meta { chat_id: 7 }).unwrap();

        let err = framer.frame(&StreamEvent::Meta { chat_id: 8 }).unwrap_err();
        assert_eq!(err, FrameError::DuplicateMeta);
    }

    #[test]
    fn sources_are_emitted_at_most_once() {
        let mut framer = StreamFramer::new();
        let sources = StreamEvent::Sources {
            data: vec![SourceReference::new("sop-1", "Call 1930.", "I4C SOP")],
        };
        framer.frame(&sources).unwrap();

        let err = framer.frame(&sources).unwrap_err();
        assert_eq!(err, FrameError::DuplicateSources);
    }

    #[test]
    fn only_done_may_follow_an_error() {
        let mut framer = StreamFramer::new();
        framer.frame(&StreamEvent::content("partial")).unwrap();
        framer.frame(&StreamEvent::error("engine failed")).unwrap();

        let err = framer.frame(&StreamEvent::content("more")).unwrap_err();
        assert_eq!(err, FrameError::OutputAfterError);

        framer.frame(&StreamEvent::Done).unwrap();
        assert!(framer.is_closed());
    }

    #[test]
    fn nothing_follows_done() {
        let mut framer = StreamFramer::new();
        framer.frame(&StreamEvent::Done).unwrap();

        let err = framer.frame(&StreamEvent::content("late")).unwrap_err();
        assert_eq!(err, FrameError::StreamClosed);
    }
}
