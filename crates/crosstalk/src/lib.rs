//! An out-of-the-box relay that lets two chat models talk to each
//! other.
//!
//! The crate includes a CLI tool for watching a conversation in the
//! terminal. And you can also use it as a library to bring two-model
//! conversations into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod config;
mod session;

pub use session::{Session, StopHandle};

/// Re-exports of [`crosstalk_core`] crate.
pub mod core {
    pub use crosstalk_core::*;
}
