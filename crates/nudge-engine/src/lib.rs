//! The Nudge pipeline: ingestion, notification scheduling, dispatch and the
//! multi-subject orchestrator.
//!
//! Everything here is generic over the collaborator traits in `nudge-core`,
//! so the same code runs against SQLite in production and against in-memory
//! fakes in tests.

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod message;
pub mod orchestrator;
pub mod periodic;
pub mod schedule;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
