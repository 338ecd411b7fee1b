//! Core logic including the transcript, turn engine and conversation
//! broker.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod adapter_client;
mod broker;
mod engine;
pub mod export;
mod transcript;

pub use adapter_client::TurnOutcome;
pub use broker::{BrokerError, ConversationBroker, SystemPrompts};
pub use engine::{
    EngineConfig, StopCondition, TurnEngine, checklist_is_empty,
    count_open_checklist_items,
};
pub use transcript::{
    Entry, ModelTag, Speaker, Transcript, TranscriptEvent,
};
