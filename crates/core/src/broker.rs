//! The conversation broker that relays turns between the two models.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::LazyLock;

use crosstalk_model::{AdapterError, ErrorKind, ModelAdapter, SendOptions};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::adapter_client::{AdapterClient, TurnOutcome};
use crate::engine::{EngineConfig, TurnEngine};
use crate::transcript::{ModelTag, Transcript};

// A single leading speaker label, e.g. "A:" or "b :".
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ab]\s*:\s*").unwrap());

/// An error from one of the two model adapters, attributed to the
/// model that produced it.
#[derive(Debug)]
pub struct BrokerError {
    adapter: String,
    source: Box<dyn AdapterError>,
}

impl BrokerError {
    /// The name of the adapter that failed.
    #[inline]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// The kind of the underlying adapter error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

impl Display for BrokerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "model {} request failed: {}", self.adapter, self.source)
    }
}

impl StdError for BrokerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref() as &(dyn StdError + 'static))
    }
}

/// The system prompts for the two models.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SystemPrompts {
    /// The system prompt for model A.
    pub a: String,
    /// The system prompt for model B.
    pub b: String,
}

impl SystemPrompts {
    /// Creates prompts from explicit parts.
    #[inline]
    pub fn new<A: Into<String>, B: Into<String>>(a: A, b: B) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    /// Creates prompts that give both models the same instructions.
    #[inline]
    pub fn shared<S: Into<String>>(prompt: S) -> Self {
        let prompt = prompt.into();
        Self {
            a: prompt.clone(),
            b: prompt,
        }
    }

    #[inline]
    fn for_tag(&self, tag: ModelTag) -> &str {
        match tag {
            ModelTag::A => &self.a,
            ModelTag::B => &self.b,
        }
    }
}

/// Relays a conversation between two models over a shared transcript.
///
/// Model A always opens, and the two models then strictly alternate.
/// Every committed turn goes through the same path: render the
/// transcript for the speaking model, stream the reply, normalize it
/// and append it. A cancelled turn commits nothing and leaves the turn
/// counter untouched.
pub struct ConversationBroker {
    model_a: AdapterClient,
    model_b: AdapterClient,
    transcript: Transcript,
    engine: TurnEngine,
    prompts: SystemPrompts,
    next_speaker: ModelTag,
}

impl ConversationBroker {
    /// Creates a broker over the two given adapters.
    pub fn new<A, B>(
        model_a: A,
        model_b: B,
        config: EngineConfig,
        prompts: SystemPrompts,
    ) -> Self
    where
        A: ModelAdapter + 'static,
        B: ModelAdapter + 'static,
    {
        Self {
            model_a: AdapterClient::new(model_a),
            model_b: AdapterClient::new(model_b),
            transcript: Transcript::new(),
            engine: TurnEngine::new(config),
            prompts,
            next_speaker: ModelTag::A,
        }
    }

    /// The transcript backing this conversation.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The number of committed turns so far.
    #[inline]
    pub fn turn_count(&self) -> u32 {
        self.engine.turn_count()
    }

    /// Injects a user message into the transcript.
    ///
    /// The message becomes part of the history both models see; it
    /// does not consume a turn or change whose turn is next.
    #[inline]
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.transcript.add_user(text);
    }

    /// Clears the transcript and turn counter.
    ///
    /// Model A opens again on the next run.
    pub fn reset(&mut self) {
        self.transcript.reset();
        self.engine.reset();
        self.next_speaker = ModelTag::A;
    }

    /// Seeds the transcript with an opening user message and runs the
    /// conversation. Model A always speaks first, regardless of who
    /// spoke last.
    pub async fn start(
        &mut self,
        initial_prompt: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.next_speaker = ModelTag::A;
        self.transcript.add_user(initial_prompt);
        self.run(cancel).await
    }

    /// Runs the conversation until a stop condition is met or the
    /// token fires.
    ///
    /// A fired token ends the run gracefully; the in-flight turn is
    /// discarded and already-committed turns stand. The token is spent
    /// afterwards, so a later run needs a fresh one.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(), BrokerError> {
        loop {
            if cancel.is_cancelled() {
                self.transcript.status("Conversation stopped.");
                return Ok(());
            }
            if self.engine.should_stop(self.transcript.last_assistant_text())
            {
                self.transcript.status("Conversation finished.");
                return Ok(());
            }
            let outcome =
                self.run_one_turn(self.next_speaker, cancel).await?;
            if outcome == TurnOutcome::Cancelled {
                self.transcript.status("Conversation stopped.");
                return Ok(());
            }
        }
    }

    /// Runs a single turn for the given model, out of band.
    ///
    /// The alternation continues from here: the other model speaks
    /// next. A cancelled turn commits nothing and leaves the order
    /// unchanged.
    pub async fn run_model_turn(
        &mut self,
        tag: ModelTag,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, BrokerError> {
        self.run_one_turn(tag, cancel).await
    }

    async fn run_one_turn(
        &mut self,
        tag: ModelTag,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, BrokerError> {
        if cancel.is_cancelled() {
            return Ok(TurnOutcome::Cancelled);
        }
        let client = match tag {
            ModelTag::A => self.model_a.clone(),
            ModelTag::B => self.model_b.clone(),
        };
        self.transcript.status(format!(
            "Turn {}: {} ({})",
            self.engine.turn_count() + 1,
            tag.label(),
            client.name(),
        ));

        let messages = self
            .transcript
            .to_chat_messages_for(tag, self.prompts.for_tag(tag));
        let options = SendOptions::streaming(cancel.clone());
        let on_fragment = self.transcript.chunk_forwarder(tag);

        debug!("running turn {} for {tag}", self.engine.turn_count() + 1);
        let outcome = client
            .send_message(messages, options, on_fragment)
            .await
            .map_err(|source| BrokerError {
                adapter: client.name().to_owned(),
                source,
            })?;

        if let TurnOutcome::Completed(raw) = &outcome {
            let text = normalize_reply(raw);
            self.transcript.add_assistant(tag, text);
            self.engine.increment_turn();
            self.next_speaker = tag.other();
        }
        Ok(outcome)
    }
}

/// Normalizes a raw model reply before it is committed.
///
/// Trims surrounding whitespace and strips one leading speaker label
/// if the model echoed its own prefix. Only a single label comes off;
/// a reply that quotes a label beyond the first keeps it verbatim.
fn normalize_reply(raw: &str) -> String {
    let trimmed = raw.trim();
    LABEL_RE.replace(trimmed, "").into_owned()
}

#[cfg(test)]
mod tests;
