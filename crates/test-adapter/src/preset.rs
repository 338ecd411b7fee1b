use serde::{Deserialize, Serialize};

/// One scripted reply for the fake adapter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetReply {
    /// The fragments to stream, in order.
    pub fragments: Vec<String>,
    /// If set, the request fails with this message instead of
    /// streaming any fragments.
    pub failure: Option<String>,
}

impl PresetReply {
    /// Creates a `PresetReply` that streams the given fragments.
    #[inline]
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Creates a `PresetReply` that fails with the given message.
    #[inline]
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            fragments: Vec::new(),
            failure: Some(message.into()),
        }
    }

    /// The full text of this reply.
    pub fn text(&self) -> String {
        self.fragments.concat()
    }
}
