//! An abstraction layer for the two conversing model backends.
//!
//! This crate establishes an unified protocol for the conversation
//! broker to talk to heterogeneous chat backends, so that either side
//! of a conversation can be swapped without touching the broker.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod adapter;
mod error;
mod message;

pub use adapter::*;
pub use error::*;
pub use message::*;
