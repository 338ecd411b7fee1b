use std::sync::{Arc, Mutex};

use crosstalk_core::{
    BrokerError, ConversationBroker, Entry, ModelTag, TranscriptEvent,
    TurnOutcome,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// A conversation session, like a window that displays the exchange
/// and has an input box.
///
/// The session wraps a fully configured [`ConversationBroker`] and
/// manages the cancellation token for it. Tokens are one-shot: once
/// one has fired it stays inert, so the session swaps in a fresh token
/// before every run while [`StopHandle`]s keep pointing at whichever
/// token is current.
pub struct Session {
    broker: ConversationBroker,
    current: Arc<Mutex<CancellationToken>>,
}

/// A handle that stops a session's in-flight work from another task.
#[derive(Clone)]
pub struct StopHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    /// Requests that the in-flight run stop.
    ///
    /// Already-committed turns stand; the turn in flight is discarded.
    pub fn stop(&self) {
        self.current.lock().unwrap().cancel();
    }
}

impl Session {
    /// Creates a session around the given broker.
    pub fn new(broker: ConversationBroker) -> Self {
        Self {
            broker,
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Returns a handle for stopping this session's runs.
    #[inline]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            current: Arc::clone(&self.current),
        }
    }

    /// Subscribes to the transcript event feed.
    #[inline]
    pub fn subscribe(&self) -> UnboundedReceiver<TranscriptEvent> {
        self.broker.transcript().subscribe()
    }

    /// Returns a snapshot of the committed transcript entries.
    #[inline]
    pub fn entries(&self) -> Vec<Entry> {
        self.broker.transcript().entries()
    }

    /// Injects a user message into the transcript.
    #[inline]
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.broker.add_user_message(text);
    }

    /// Clears the transcript and starts over.
    #[inline]
    pub fn reset(&mut self) {
        self.broker.reset();
    }

    /// Runs the conversation until it finishes or is stopped.
    pub async fn run(&mut self) -> Result<(), BrokerError> {
        let cancel = self.fresh_token();
        self.broker.run(&cancel).await
    }

    /// Sends an optional user message and then lets the given model
    /// take one turn, regardless of whose turn it is.
    pub async fn send_to(
        &mut self,
        tag: ModelTag,
        message: Option<&str>,
    ) -> Result<TurnOutcome, BrokerError> {
        if let Some(message) = message {
            self.broker.add_user_message(message);
        }
        let cancel = self.fresh_token();
        self.broker.run_model_turn(tag, &cancel).await
    }

    // Replaces a spent token and hands out the current one.
    fn fresh_token(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap();
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        current.clone()
    }
}
