//! Core types and trait definitions for the Nudge deadline pipeline.
//!
//! No HTTP or database dependencies live here. Everything else depends on
//! it: the store backend, the engine, the API and the adapters for the
//! extraction source and the delivery channel.

// The traits spell out `Send` futures themselves; implementors use `async fn`.
#![allow(async_fn_in_trait)]

pub mod activity;
pub mod channel;
pub mod error;
pub mod notification;
pub mod source;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
