//! Per-message processing: the pipeline plus retry and DLQ control.
//!
//! A worker owns one received message end-to-end. [`EventProcessor`] runs
//! the pipeline (validate → triage → authorize → persist);
//! [`MessageWorker`] maps the pipeline's outcome onto queue operations so
//! that every message ends in exactly one of:
//!
//! - **acked after success** - the pipeline completed and the envelope was
//!   persisted (including authorization denials, which are persisted as
//!   failed and then acked);
//! - **acked after DLQ** - the input is terminally bad (validation or
//!   triage failure) or the retry budget is exhausted; the message was
//!   published to the DLQ first, then acked;
//! - **re-enqueued then acked** - a transient persistence failure; a new
//!   message with an incremented attempt counter and exponential backoff
//!   delay replaces the original;
//! - **left to visibility-timeout redelivery** - a queue operation in the
//!   retry/DLQ path itself failed, so the ack is withheld and the backend
//!   redelivers.
//!
//! No branch drops a message silently.

mod dlq;
mod handler;
mod processor;
mod retry;


pub use dlq::{DlqController, DlqOutcome};
pub use handler::{HandleOutcome, MessageWorker};
pub use processor::{EventProcessor, ProcessError};
pub use retry::{RetryController, RetryOutcome, backoff_delay};
