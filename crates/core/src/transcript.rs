//! The append-only conversation transcript and its event feed.

use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use crosstalk_model::ChatMessage;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Identifies one of the two conversing models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelTag {
    /// The model that opens the conversation.
    A,
    /// The second model.
    B,
}

impl ModelTag {
    /// The label this model prefixes its messages with.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            ModelTag::A => "A",
            ModelTag::B => "B",
        }
    }

    /// The other model.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            ModelTag::A => ModelTag::B,
            ModelTag::B => ModelTag::A,
        }
    }
}

impl Display for ModelTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who produced a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// A message injected by the user.
    User,
    /// A committed reply from one of the models.
    Model(ModelTag),
}

impl Speaker {
    /// The display label for this speaker.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Model(tag) => tag.label(),
        }
    }
}

impl Display for Speaker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Speaker {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One committed transcript entry.
#[derive(Clone, Debug, Serialize)]
pub struct Entry {
    /// A monotonically increasing id within this transcript.
    pub id: u64,
    /// Who produced this entry.
    pub speaker: Speaker,
    /// The normalized entry text.
    pub content: String,
    /// When the entry was committed.
    pub timestamp: DateTime<Utc>,
}

/// An event published to transcript subscribers.
///
/// `Chunk` events carry in-flight stream fragments and are not backed
/// by a transcript entry; a cancelled turn produces chunks but never a
/// `Message`.
#[derive(Clone, Debug)]
pub enum TranscriptEvent {
    /// An entry was committed.
    Message {
        /// Who produced the entry.
        speaker: Speaker,
        /// The full committed text.
        text: String,
    },
    /// A fragment of an in-flight model reply.
    Chunk {
        /// The model currently speaking.
        tag: ModelTag,
        /// The fragment text.
        text: String,
    },
    /// A lifecycle status line.
    Status {
        /// The status text.
        text: String,
    },
}

type Subscribers = Arc<Mutex<Vec<UnboundedSender<TranscriptEvent>>>>;

/// The append-only record of a conversation.
///
/// Committed entries only ever get appended (or wholesale cleared by
/// [`reset`]); there is no edit operation. Events fan out to any
/// number of subscribers, and subscribers that went away are dropped
/// on the next publish.
///
/// [`reset`]: Transcript::reset
#[derive(Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    subscribers: Subscribers,
}

impl Transcript {
    /// Creates an empty transcript.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the event feed of this transcript.
    pub fn subscribe(&self) -> UnboundedReceiver<TranscriptEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Appends a user-injected message.
    pub fn add_user(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.push(Speaker::User, text.clone());
        self.publish(TranscriptEvent::Message {
            speaker: Speaker::User,
            text,
        });
    }

    /// Commits a completed model reply.
    pub fn add_assistant(&mut self, tag: ModelTag, text: impl Into<String>) {
        let text = text.into();
        self.push(Speaker::Model(tag), text.clone());
        self.publish(TranscriptEvent::Message {
            speaker: Speaker::Model(tag),
            text,
        });
    }

    /// Publishes a fragment of an in-flight reply.
    ///
    /// Chunks are display-only; nothing is committed until the full
    /// reply lands through [`add_assistant`].
    ///
    /// [`add_assistant`]: Transcript::add_assistant
    #[inline]
    pub fn stream_chunk(&self, tag: ModelTag, text: impl Into<String>) {
        self.publish(TranscriptEvent::Chunk {
            tag,
            text: text.into(),
        });
    }

    /// Publishes a lifecycle status line.
    #[inline]
    pub fn status(&self, text: impl Into<String>) {
        self.publish(TranscriptEvent::Status { text: text.into() });
    }

    /// Clears all committed entries.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.next_id = 0;
        self.status("Transcript cleared.");
    }

    /// Returns a snapshot of the committed entries.
    #[inline]
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.clone()
    }

    /// The number of committed entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the transcript has no committed entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The text of the most recently committed model reply, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| matches!(entry.speaker, Speaker::Model(_)))
            .map(|entry| entry.content.as_str())
    }

    /// Renders the transcript as the message history for one model.
    ///
    /// The system message frames the two-party format, user entries
    /// keep the `user` role, and every committed model reply becomes an
    /// `assistant` message re-prefixed with its speaker label so the
    /// receiving model can tell the two voices apart.
    pub fn to_chat_messages_for(
        &self,
        tag: ModelTag,
        system_prompt: &str,
    ) -> Vec<ChatMessage> {
        let label = tag.label();
        let system = format!(
            "{system_prompt}\n\nConversation format: assistant messages \
             are prefixed with \"A:\" or \"B:\". Respond as {label} \
             (prefix your own output with \"{label}:\")."
        );
        let mut messages = Vec::with_capacity(self.entries.len() + 1);
        messages.push(ChatMessage::system(system));
        for entry in &self.entries {
            let message = match entry.speaker {
                Speaker::User => ChatMessage::user(&entry.content),
                Speaker::Model(speaker) => ChatMessage::assistant(format!(
                    "{}: {}",
                    speaker.label(),
                    entry.content
                )),
            };
            messages.push(message);
        }
        messages
    }

    /// Returns a callback that publishes stream fragments for `tag`.
    ///
    /// The callback is detached from the transcript borrow, so it can
    /// be handed to an in-flight request while the caller retains
    /// access to the transcript.
    pub fn chunk_forwarder(
        &self,
        tag: ModelTag,
    ) -> impl Fn(&str) + Send + 'static {
        let subscribers = Arc::clone(&self.subscribers);
        move |text: &str| {
            publish_to(
                &subscribers,
                TranscriptEvent::Chunk {
                    tag,
                    text: text.to_owned(),
                },
            );
        }
    }

    fn push(&mut self, speaker: Speaker, content: String) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            speaker,
            content,
            timestamp: Utc::now(),
        });
    }

    #[inline]
    fn publish(&self, event: TranscriptEvent) {
        publish_to(&self.subscribers, event);
    }
}

fn publish_to(subscribers: &Subscribers, event: TranscriptEvent) {
    let mut subscribers = subscribers.lock().unwrap();
    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
}
