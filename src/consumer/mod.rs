//! Queue consumption: the long-poll receiver, bounded dispatch, and
//! lifecycle supervision.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   long poll    ┌──────────┐   bounded pool   ┌─────────┐
//! │ QueueBackend│ ─────────────► │ Receiver │ ───────────────► │ workers │
//! └────────────┘                └──────────┘  (semaphore)     └─────────┘
//!                                    ▲
//!                              cancellation
//!                                    │
//!                              ┌────────────┐
//!                              │ Supervisor │
//!                              └────────────┘
//! ```
//!
//! The receiver performs sequential long polls; each received message takes
//! a pool slot before a worker task is spawned, so a full pool blocks
//! dispatch instead of spawning unbounded work. The supervisor wires
//! cancellation into the loop and drains in-flight workers on stop.

mod receiver;
mod supervisor;

pub use receiver::Receiver;
pub use supervisor::{StopOutcome, Supervisor, SupervisorError};
