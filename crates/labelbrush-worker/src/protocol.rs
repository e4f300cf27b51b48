//! Messages exchanged with the worker thread.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use labelbrush_core::{Brush, Dimensions, IndexPoint, Label, MaskError, ScratchType, SliceAxis, StrokeBuffer};

/// A stroke operation. Points are already in index space.
///
/// Label snapshots are shared, not copied: every operation of one stroke
/// can reference the same `Arc`.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Allocate the scratch buffer. A no-op if one already exists.
    Start {
        dims: Dimensions,
        scratch_type: ScratchType,
        slicing: Option<SliceAxis>,
    },
    Paint {
        points: Vec<IndexPoint>,
        brush: Brush,
    },
    PaintFloodFill {
        labels: Arc<[Label]>,
        label: Label,
        label_constraint: Option<Label>,
        points: Vec<IndexPoint>,
        brush: Brush,
    },
    Crop {
        p1: IndexPoint,
        p2: IndexPoint,
    },
    Split {
        labels: Arc<[Label]>,
        split_label: Label,
        slice_index: usize,
    },
    Merge {
        labels: Arc<[Label]>,
        merge_label: Label,
    },
    Delete,
}

impl Operation {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Paint { .. } => "paint",
            Self::PaintFloodFill { .. } => "paint_flood_fill",
            Self::Crop { .. } => "crop",
            Self::Split { .. } => "split",
            Self::Merge { .. } => "merge",
            Self::Delete => "delete",
        }
    }
}

/// A request plus the channel its answer goes back on.
pub(crate) enum Message {
    Run {
        op: Operation,
        reply: Sender<Result<(), MaskError>>,
    },
    End {
        reply: Sender<Result<StrokeBuffer, MaskError>>,
    },
}
