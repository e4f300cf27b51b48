//! labelbrush: stroke-based editing of 3-D segmentation label volumes.
//!
//! [`MaskPainter`] is the editing surface. A stroke is opened with
//! [`MaskPainter::start_stroke`], filled with any number of painting,
//! flood-fill, crop, split, merge or delete operations (all executed on a
//! background worker thread), and committed atomically by
//! [`MaskPainter::end_stroke`]. Every committed stroke can be undone and
//! redone exactly.
//!
//! The data model and algorithms are re-exported from `labelbrush-core`.

mod painter;

pub use labelbrush_core::{
    Brush, BrushKernel, Dimensions, History, HistoryEntry, IndexPoint, IntensityRange,
    IntensityVolume, Label, LabelVolume, MaskError, PainterConfig, ScratchType, SliceAxis,
    StrokeBuffer, Transform, VoxelChange, VoxelFilter, WorldPoint,
};
pub use labelbrush_worker::Pending;
pub use painter::MaskPainter;
