//! Background stroke worker for labelbrush.
//!
//! One worker thread exists per open stroke. It owns the stroke's
//! [`StrokeBuffer`](labelbrush_core::StrokeBuffer), applies operations in
//! the order they were submitted, and hands the buffer back by move when
//! the stroke ends.
//!
//! Every request returns a [`Pending`] handle that resolves once the
//! worker has processed it. Requests pipeline: callers may submit any
//! number of operations before waiting on any of them.
//!
//! The scanning work itself lives in `labelbrush-core`; this crate only
//! hosts it on a thread.

mod handle;
mod protocol;
mod worker;

pub use handle::{Pending, WorkerHandle};
pub use protocol::Operation;
pub use worker::StrokeWorker;
