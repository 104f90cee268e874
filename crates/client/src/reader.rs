//! Consuming a chat turn from the byte stream up.
//!
//! [`EventReader`] turns raw response chunks into parsed
//! [`StreamEvent`]s: it buffers partial lines across chunk boundaries,
//! skips malformed lines without dropping the rest of the stream, and
//! enforces the protocol invariants a well-behaved server upholds.
//! [`ChatStream`] folds those events into a [`ChatTurn`] for display.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::warn;

use cybermitra_protocol::{LineDecoder, SourceReference, StreamError, StreamEvent};

use crate::cancel::CancelHandle;
use crate::ClientError;

/// Raw byte chunks feeding a reader.
pub type ByteSource = BoxStream<'static, Result<Bytes, ClientError>>;

/// Parses stream events out of response chunks.
pub struct EventReader {
    source: ByteSource,
    decoder: Option<LineDecoder>,
    pending: VecDeque<StreamEvent>,
    chat_id: Option<i64>,
    saw_done: bool,
    finished: bool,
    cancel: CancelHandle,
    /// Maximum wait between chunks; `None` disables the guard.
    idle_timeout: Option<Duration>,
}

impl EventReader {
    pub fn new(source: ByteSource, idle_timeout: Option<Duration>) -> Self {
        Self {
            source,
            decoder: Some(LineDecoder::new()),
            pending: VecDeque::new(),
            chat_id: None,
            saw_done: false,
            finished: false,
            cancel: CancelHandle::new(),
            idle_timeout,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether the reader stopped because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The next event, `None` once the stream is exhausted.
    ///
    /// Protocol violations and transport failures are returned as
    /// [`StreamError`]s and end the stream; a malformed line alone is
    /// logged and skipped.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.pending.pop_front() {
                match self.admit(event) {
                    Ok(event) => return Some(Ok(event)),
                    Err(error) => {
                        self.finished = true;
                        return Some(Err(error));
                    }
                }
            }

            if self.cancel.is_cancelled() {
                self.finished = true;
                return None;
            }

            let chunk = match self.read_chunk().await {
                Ok(chunk) => chunk,
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            };

            match chunk {
                Some(chunk) => {
                    let decoder = self.decoder.as_mut().expect("decoder present until EOF");
                    for line in decoder.feed(&chunk) {
                        match serde_json::from_str::<StreamEvent>(&line) {
                            Ok(event) => self.pending.push_back(event),
                            Err(parse_error) => {
                                warn!(%parse_error, line, "skipping malformed stream line");
                            }
                        }
                    }
                }
                None => {
                    // The pending queue is always drained before a read,
                    // so EOF is judged on what was already handed out.
                    self.finished = true;
                    if let Some(decoder) = self.decoder.take() {
                        if let Some(fragment) = decoder.finish() {
                            warn!(fragment, "discarding unterminated trailing fragment");
                        }
                    }
                    if !self.saw_done {
                        return Some(Err(StreamError::Truncated));
                    }
                    return None;
                }
            }
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        let next = self.source.next();
        let item = match self.idle_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, next).await {
                Ok(item) => item,
                Err(_) => {
                    return Err(StreamError::Transport(format!(
                        "no data for {}s",
                        timeout.as_secs()
                    )))
                }
            },
            None => next.await,
        };

        match item {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(error)) => Err(StreamError::Transport(error.to_string())),
            None => Ok(None),
        }
    }

    /// Enforce cross-event invariants before handing an event out.
    fn admit(&mut self, event: StreamEvent) -> Result<StreamEvent, StreamError> {
        match &event {
            StreamEvent::Meta { chat_id } => match self.chat_id {
                Some(established) if established != *chat_id => {
                    return Err(StreamError::MetaConflict {
                        established,
                        got: *chat_id,
                    });
                }
                _ => self.chat_id = Some(*chat_id),
            },
            StreamEvent::Done => {
                self.saw_done = true;
                self.finished = true;
            }
            _ => {}
        }
        Ok(event)
    }
}

/// How a turn ended, or that it has not.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnStatus {
    Streaming,
    Done,
    /// The server reported an in-band error; prior content stays valid.
    Errored(String),
    Cancelled,
    /// The stream itself broke (truncation, transport, protocol).
    Failed(StreamError),
}

/// The client-side accumulation of one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub chat_id: Option<i64>,
    pub content: String,
    pub sources: Vec<SourceReference>,
    pub status: TurnStatus,
}

impl ChatTurn {
    fn new() -> Self {
        Self {
            chat_id: None,
            content: String::new(),
            sources: Vec::new(),
            status: TurnStatus::Streaming,
        }
    }

    fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Meta { chat_id } => self.chat_id = Some(chat_id),
            StreamEvent::Content { data } => {
                // An error event terminates the logical turn; trailing
                // content from a misbehaving server is not applied.
                if self.status == TurnStatus::Streaming {
                    self.content.push_str(&data);
                }
            }
            StreamEvent::Sources { data } => {
                if self.status == TurnStatus::Streaming {
                    self.sources = data;
                }
            }
            StreamEvent::Error { error } => {
                self.status = TurnStatus::Errored(error);
            }
            StreamEvent::Done => {
                if self.status == TurnStatus::Streaming {
                    self.status = TurnStatus::Done;
                }
            }
        }
    }
}

/// A chat turn being received: pull events, watch the turn build up.
pub struct ChatStream {
    reader: EventReader,
    turn: ChatTurn,
}

impl ChatStream {
    pub fn new(source: ByteSource, idle_timeout: Option<Duration>) -> Self {
        Self {
            reader: EventReader::new(source, idle_timeout),
            turn: ChatTurn::new(),
        }
    }

    /// Handle for the stop button. Safe to trigger from anywhere, any
    /// number of times.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.reader.cancel_handle()
    }

    /// Current view of the turn; valid at any point during streaming.
    pub fn turn(&self) -> &ChatTurn {
        &self.turn
    }

    /// Advance by one event, applying it to the turn.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        match self.reader.next_event().await {
            Some(Ok(event)) => {
                self.turn.apply(event.clone());
                Some(event)
            }
            Some(Err(error)) => {
                if !matches!(self.turn.status, TurnStatus::Errored(_)) {
                    self.turn.status = TurnStatus::Failed(error);
                }
                None
            }
            None => {
                if self.reader.was_cancelled() && self.turn.status == TurnStatus::Streaming {
                    self.turn.status = TurnStatus::Cancelled;
                }
                None
            }
        }
    }

    /// Drain the stream and return the finished turn.
    pub async fn collect(mut self) -> ChatTurn {
        while self.next_event().await.is_some() {}
        // A cancelled reader returns None without a final event; make
        // sure the status reflects it.
        if self.reader.was_cancelled() && self.turn.status == TurnStatus::Streaming {
            self.turn.status = TurnStatus::Cancelled;
        }
        self.turn
    }
}
