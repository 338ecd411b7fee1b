use serde::Serialize;

/// The role of an outbound chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the whole conversation.
    System,
    /// Input from the human user.
    User,
    /// A reply produced by either model.
    Assistant,
}

/// A chat message in the normalized form handed to a model adapter.
///
/// These are derived from the transcript on every turn and never
/// stored; the transcript itself is the single source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatMessage {
    /// The role of this message.
    pub role: ChatRole,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = ChatMessage::assistant("B: sounds good");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({ "role": "assistant", "content": "B: sounds good" })
        );
    }
}
