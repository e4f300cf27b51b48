//! The editing orchestrator.

use std::sync::Arc;

use labelbrush_core::{
    Acceptance, Brush, History, IndexPoint, IntensityRange, IntensityVolume, Label, LabelVolume,
    MaskError, PainterConfig, SliceAxis, VoxelFilter, WorldPoint, apply_binary_mask,
    apply_label_map,
};
use labelbrush_worker::{Operation, Pending, WorkerHandle};
use tracing::{debug, warn};

type Listener = Box<dyn FnMut(u64) + Send>;

/// The stroke currently being built.
struct Stroke {
    worker: WorkerHandle,
    /// Labels as of the first operation that needed them, shared by every
    /// later operation of the stroke.
    labels: Option<Arc<[Label]>>,
}

enum StrokeState {
    Idle,
    Stroking(Stroke),
}

/// Edits one [`LabelVolume`] through strokes, with undo and redo.
///
/// At most one stroke is open at a time. Stroke operations called while
/// no stroke is open do nothing and return `None`.
pub struct MaskPainter {
    volume: LabelVolume,
    /// Labels as loaded, before any edit. Erasing uncovers these.
    initial: Arc<[Label]>,
    history: History,
    config: PainterConfig,
    label: Label,
    label_constraint: Option<Label>,
    background: Option<IntensityVolume>,
    filter: Option<Box<dyn VoxelFilter>>,
    stroke: StrokeState,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for MaskPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskPainter")
            .field("dims", &self.volume.dims())
            .field("generation", &self.volume.generation())
            .field("label", &self.label)
            .field("stroking", &self.is_stroking())
            .field("undo_count", &self.history.undo_count())
            .field("redo_count", &self.history.redo_count())
            .finish_non_exhaustive()
    }
}

impl MaskPainter {
    /// Edit `volume` with the default configuration.
    #[must_use]
    pub fn new(volume: LabelVolume) -> Self {
        Self::with_config(volume, PainterConfig::default())
    }

    #[must_use]
    pub fn with_config(volume: LabelVolume, config: PainterConfig) -> Self {
        Self {
            initial: volume.snapshot(),
            volume,
            history: History::new(),
            config,
            label: 1,
            label_constraint: None,
            background: None,
            filter: None,
            stroke: StrokeState::Idle,
            listeners: Vec::new(),
        }
    }

    // ───────────────────────────── accessors ─────────────────────────────

    #[must_use]
    pub const fn volume(&self) -> &LabelVolume {
        &self.volume
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub const fn config(&self) -> &PainterConfig {
        &self.config
    }

    /// The label committed by the next stroke.
    #[must_use]
    pub const fn label(&self) -> Label {
        self.label
    }

    pub const fn set_label(&mut self, label: Label) {
        self.label = label;
    }

    #[must_use]
    pub const fn label_constraint(&self) -> Option<Label> {
        self.label_constraint
    }

    /// Limit flood fills to voxels currently holding `constraint`.
    pub const fn set_label_constraint(&mut self, constraint: Option<Label>) {
        self.label_constraint = constraint;
    }

    /// Slicing axis used by strokes started from now on.
    pub const fn set_slicing_mode(&mut self, slicing: Option<SliceAxis>) {
        self.config.slicing_mode = slicing;
    }

    /// Intensity window for threshold-constrained painting. An explicit
    /// [`set_voxel_filter`](Self::set_voxel_filter) takes precedence.
    pub const fn set_threshold(&mut self, threshold: Option<IntensityRange>) {
        self.config.threshold = threshold;
    }

    /// Background image that voxel filters test against.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if the image does not match
    /// the volume.
    pub fn set_background(&mut self, background: IntensityVolume) -> Result<(), MaskError> {
        let expected = self.volume.dims().voxel_count();
        let actual = background.dims().voxel_count();
        if background.dims() != self.volume.dims() {
            return Err(MaskError::DimensionMismatch { expected, actual });
        }
        self.background = Some(background);
        Ok(())
    }

    /// Install a custom voxel acceptance test, or remove it with `None`.
    pub fn set_voxel_filter(&mut self, filter: Option<Box<dyn VoxelFilter>>) {
        self.filter = filter;
    }

    /// Replace the volume being edited.
    ///
    /// Any open stroke is discarded and the history is cleared.
    pub fn set_volume(&mut self, volume: LabelVolume) {
        if let StrokeState::Stroking(stroke) = std::mem::replace(&mut self.stroke, StrokeState::Idle)
        {
            warn!("volume replaced during an open stroke; discarding it");
            stroke.worker.terminate();
        }
        self.initial = volume.snapshot();
        self.volume = volume;
        self.history.clear();
        debug!(dims = ?self.volume.dims().to_array(), "volume replaced");
        self.notify();
    }

    /// Call `listener` with the new generation after every change to the
    /// volume.
    pub fn on_modified(&mut self, listener: impl FnMut(u64) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ───────────────────────────── strokes ─────────────────────────────

    /// Open a stroke. Does nothing if one is already open.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::WorkerSpawn`] if the worker thread cannot be
    /// started.
    pub fn start_stroke(&mut self) -> Result<(), MaskError> {
        if self.is_stroking() {
            return Ok(());
        }
        let worker = WorkerHandle::spawn()?;
        // Starting cannot fail; any fault surfaces on a later request.
        drop(worker.submit(Operation::Start {
            dims: self.volume.dims(),
            scratch_type: self.config.scratch_type,
            slicing: self.config.slicing_mode,
        }));
        self.stroke = StrokeState::Stroking(Stroke {
            worker,
            labels: None,
        });
        debug!(label = self.label, "stroke started");
        Ok(())
    }

    #[must_use]
    pub const fn is_stroking(&self) -> bool {
        matches!(self.stroke, StrokeState::Stroking(_))
    }

    /// Brush along the world-space points.
    pub fn paint(&mut self, points: &[WorldPoint], brush: &Brush) -> Option<Pending<()>> {
        let points = self.to_index(points);
        let worker = self.worker()?;
        Some(worker.submit(Operation::Paint {
            points,
            brush: brush.clone(),
        }))
    }

    /// Brush along the points, then fill the region they enclose on the
    /// current slice.
    pub fn paint_flood_fill(&mut self, points: &[WorldPoint], brush: &Brush) -> Option<Pending<()>> {
        let points = self.to_index(points);
        let (label, label_constraint) = (self.label, self.label_constraint);
        let (worker, labels) = self.worker_with_labels()?;
        Some(worker.submit(Operation::PaintFloodFill {
            labels,
            label,
            label_constraint,
            points,
            brush: brush.clone(),
        }))
    }

    /// Brush along the points. The stroke removes the active label when
    /// it is ended with `erase` set.
    pub fn erase(&mut self, points: &[WorldPoint], brush: &Brush) -> Option<Pending<()>> {
        self.paint(points, brush)
    }

    /// Mark the rectangle spanned by two world-space corners on the slice
    /// of the first.
    pub fn crop(&mut self, p1: WorldPoint, p2: WorldPoint) -> Option<Pending<()>> {
        let p1 = self.volume.world_to_index(p1);
        let p2 = self.volume.world_to_index(p2);
        let worker = self.worker()?;
        Some(worker.submit(Operation::Crop { p1, p2 }))
    }

    /// Mark the part of `split_label` at or beyond `slice_index` along the
    /// slicing axis.
    pub fn split(&mut self, split_label: Label, slice_index: usize) -> Option<Pending<()>> {
        let (worker, labels) = self.worker_with_labels()?;
        Some(worker.submit(Operation::Split {
            labels,
            split_label,
            slice_index,
        }))
    }

    /// Mark every voxel of `merge_label`.
    pub fn merge(&mut self, merge_label: Label) -> Option<Pending<()>> {
        let (worker, labels) = self.worker_with_labels()?;
        Some(worker.submit(Operation::Merge {
            labels,
            merge_label,
        }))
    }

    /// Mark the whole volume.
    pub fn delete_region(&mut self) -> Option<Pending<()>> {
        let worker = self.worker()?;
        Some(worker.submit(Operation::Delete))
    }

    /// Commit the open stroke and close it.
    ///
    /// Returns `Ok(None)` if no stroke was open, else the number of voxels
    /// that changed. A stroke that changed nothing is not recorded, so it
    /// leaves any redo branch in place; only a recorded stroke prunes it.
    ///
    /// Errors from earlier operations are reported only through their own
    /// [`Pending`] handles. If those handles were dropped the errors are
    /// lost and the stroke commits whatever the buffer holds.
    ///
    /// # Errors
    ///
    /// Returns the error of the final `end` request, e.g.
    /// [`MaskError::WorkerDisconnected`] if the worker is gone. The stroke
    /// is closed either way.
    pub fn end_stroke(&mut self, erase: bool) -> Result<Option<usize>, MaskError> {
        let StrokeState::Stroking(stroke) = std::mem::replace(&mut self.stroke, StrokeState::Idle)
        else {
            return Ok(None);
        };
        let buffer = stroke.worker.end().wait();
        stroke.worker.terminate();
        let buffer = buffer?;

        let filter: Option<&dyn VoxelFilter> = match (&self.filter, &self.config.threshold) {
            (Some(filter), _) => Some(&**filter),
            (None, Some(range)) => Some(range as &dyn VoxelFilter),
            (None, None) => None,
        };
        let acceptance = Acceptance {
            background: self.background.as_ref(),
            filter,
        };
        let entry = apply_binary_mask(
            &mut self.volume,
            &self.initial,
            &buffer,
            self.label,
            erase,
            &acceptance,
        )?;

        let changed = entry.len();
        debug!(label = self.label, erase, changed, "stroke committed");
        if changed > 0 {
            self.history.push(entry);
            self.notify();
        }
        Ok(Some(changed))
    }

    /// Replace every label at once, recording the difference as one
    /// undoable entry under the active label. Returns the number of
    /// voxels that changed.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if `labels` does not match
    /// the volume.
    pub fn apply_label_map(&mut self, labels: &[Label]) -> Result<usize, MaskError> {
        let entry = apply_label_map(&mut self.volume, labels, self.label)?;
        let changed = entry.len();
        if changed > 0 {
            self.history.push(entry);
            self.invalidate_stroke_labels();
            self.notify();
        }
        Ok(changed)
    }

    // ───────────────────────────── history ─────────────────────────────

    /// Revert the last committed stroke. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.volume);
        if undone {
            debug!(remaining = self.history.undo_count(), "undo");
            self.invalidate_stroke_labels();
            self.notify();
        }
        undone
    }

    /// Reapply the last undone stroke. Returns `false` if there is none.
    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.volume);
        if redone {
            debug!(remaining = self.history.redo_count(), "redo");
            self.invalidate_stroke_labels();
            self.notify();
        }
        redone
    }

    #[must_use]
    pub const fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Record the current state as saved.
    pub const fn mark_saved(&mut self) {
        self.history.mark_saved();
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.history.is_dirty()
    }

    // ───────────────────────────── internals ─────────────────────────────

    fn to_index(&self, points: &[WorldPoint]) -> Vec<IndexPoint> {
        points
            .iter()
            .map(|&p| self.volume.world_to_index(p))
            .collect()
    }

    fn worker(&self) -> Option<&WorkerHandle> {
        match &self.stroke {
            StrokeState::Stroking(stroke) => Some(&stroke.worker),
            StrokeState::Idle => None,
        }
    }

    fn worker_with_labels(&mut self) -> Option<(&WorkerHandle, Arc<[Label]>)> {
        let StrokeState::Stroking(stroke) = &mut self.stroke else {
            return None;
        };
        let labels = Arc::clone(stroke.labels.get_or_insert_with(|| self.volume.snapshot()));
        Some((&stroke.worker, labels))
    }

    fn invalidate_stroke_labels(&mut self) {
        if let StrokeState::Stroking(stroke) = &mut self.stroke {
            stroke.labels = None;
        }
    }

    fn notify(&mut self) {
        let generation = self.volume.generation();
        for listener in &mut self.listeners {
            listener(generation);
        }
    }
}
