//! Backend seams for the message queue and the record store.
//!
//! The core never talks to a cloud SDK directly: everything it needs from
//! the outside world is expressed through two narrow traits, [`QueueBackend`]
//! and [`RecordStore`]. Any backend with equivalent primitives (long-poll
//! receive with a visibility timeout, delayed send, delete-by-receipt;
//! keyed put/get with a health probe) can be substituted, and tests
//! substitute both without touching the business core.
//!
//! [`memory`] provides a process-local implementation of both contracts,
//! used by the binary for local runs and by the integration-style tests.

pub mod memory;
mod queue;
mod store;

pub use queue::{QueueBackend, QueueError};
pub use store::{RecordStore, StoreError};
