//! Worker-side state machine.
//!
//! [`StrokeWorker`] is plain data and can be driven synchronously; the
//! thread in [`crate::WorkerHandle`] just feeds it messages.

use std::sync::mpsc::Receiver;

use labelbrush_core::{MaskError, SliceAxis, StrokeBuffer};
use tracing::trace;

use crate::protocol::{Message, Operation};

/// The scratch buffer of one stroke and the slicing axis it was started
/// with.
#[derive(Debug, Default)]
pub struct StrokeWorker {
    buffer: Option<StrokeBuffer>,
    slicing: Option<SliceAxis>,
}

impl StrokeWorker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: None,
            slicing: None,
        }
    }

    /// Whether a buffer is currently allocated.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.buffer.is_some()
    }

    /// Apply one operation to the scratch buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotStarted`] for any operation but `Start` when
    /// no buffer is allocated, or [`MaskError::DimensionMismatch`] when a
    /// label snapshot does not match the buffer.
    pub fn apply(&mut self, op: Operation) -> Result<(), MaskError> {
        if let Operation::Start {
            dims,
            scratch_type,
            slicing,
        } = op
        {
            if self.buffer.is_none() {
                self.buffer = Some(StrokeBuffer::new(dims, scratch_type));
                self.slicing = slicing;
            }
            return Ok(());
        }

        let slicing = self.slicing;
        let buffer = self.buffer.as_mut().ok_or(MaskError::NotStarted)?;
        match op {
            Operation::Start { .. } => {}
            Operation::Paint { points, brush } => buffer.paint(&points, &brush, slicing),
            Operation::PaintFloodFill {
                labels,
                label,
                label_constraint,
                points,
                brush,
            } => buffer.paint_flood_fill(&labels, label, label_constraint, &points, &brush, slicing)?,
            Operation::Crop { p1, p2 } => buffer.crop(p1, p2, slicing),
            Operation::Split {
                labels,
                split_label,
                slice_index,
            } => buffer.split(&labels, split_label, slice_index, slicing)?,
            Operation::Merge {
                labels,
                merge_label,
            } => buffer.merge(&labels, merge_label)?,
            Operation::Delete => buffer.delete(),
        }
        Ok(())
    }

    /// Give up the scratch buffer. The worker can be started again
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotStarted`] if no buffer is allocated.
    pub fn end(&mut self) -> Result<StrokeBuffer, MaskError> {
        self.slicing = None;
        self.buffer.take().ok_or(MaskError::NotStarted)
    }

    /// Serve messages until every sender is gone.
    pub(crate) fn run(mut self, inbox: &Receiver<Message>) {
        while let Ok(message) = inbox.recv() {
            match message {
                Message::Run { op, reply } => {
                    let name = op.name();
                    let result = self.apply(op);
                    trace!(op = name, ok = result.is_ok(), "stroke worker operation");
                    // The caller may have dropped its pending handle.
                    let _ = reply.send(result);
                }
                Message::End { reply } => {
                    let result = self.end();
                    trace!(ok = result.is_ok(), "stroke worker end");
                    let _ = reply.send(result);
                }
            }
        }
    }
}
