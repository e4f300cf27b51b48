//! labelbrush-core: pure label-volume editing algorithms (sans-IO).
//!
//! A label volume is a flat `nx * ny * nz` buffer of small integer labels.
//! Edits are expressed as strokes:
//!
//! 1. a [`StrokeBuffer`] is marked by brush painting, flood fill, cropping,
//!    splitting, merging or deleting,
//! 2. [`apply_binary_mask`] commits the marked voxels to the
//!    [`LabelVolume`] and returns the minimal [`HistoryEntry`],
//! 3. [`History`] replays entries for undo and redo.
//!
//! This crate has **no threading or I/O** -- the background worker lives in
//! `labelbrush-worker` and the orchestrator in `labelbrush`.

pub mod brush;
pub mod commit;
pub mod flood;
pub mod history;
pub mod raster;
pub mod stroke;
pub mod types;
pub mod volume;

pub use brush::{Brush, BrushKernel};
pub use commit::{Acceptance, VoxelFilter, apply_binary_mask, apply_label_map};
pub use history::{History, HistoryEntry, VoxelChange};
pub use stroke::StrokeBuffer;
pub use types::{
    Dimensions, IndexPoint, IntensityRange, Label, MaskError, PainterConfig, ScratchType,
    SliceAxis, WorldPoint,
};
pub use volume::{IntensityVolume, LabelVolume, Transform};
