//! Diff-based undo/redo.
//!
//! Each committed stroke is stored as the exact list of voxels it changed,
//! with the value before and after. Undo writes the `previous` values back,
//! redo writes the `next` values; voxels outside an entry are never
//! touched.

use crate::types::Label;
use crate::volume::LabelVolume;

/// One voxel changed by a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelChange {
    /// Flat voxel index.
    pub index: usize,
    /// Label before the stroke.
    pub previous: Label,
    /// Label after the stroke.
    pub next: Label,
}

/// The changes made by one committed stroke.
///
/// Every index appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The active label when the stroke was committed.
    pub label: Label,
    /// Changed voxels in ascending index order.
    pub changes: Vec<VoxelChange>,
}

impl HistoryEntry {
    #[must_use]
    pub const fn new(label: Label) -> Self {
        Self {
            label,
            changes: Vec::new(),
        }
    }

    /// Number of changed voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Write every `previous` value back.
    pub fn revert(&self, labels: &mut [Label]) {
        for change in &self.changes {
            if let Some(slot) = labels.get_mut(change.index) {
                *slot = change.previous;
            }
        }
    }

    /// Write every `next` value again.
    pub fn reapply(&self, labels: &mut [Label]) {
        for change in &self.changes {
            if let Some(slot) = labels.get_mut(change.index) {
                *slot = change.next;
            }
        }
    }
}

/// Stack of committed strokes with an undo cursor and a save marker.
///
/// `entries[..applied]` are reflected in the volume; the rest can be
/// redone. Pushing a new entry drops everything past the cursor.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    applied: usize,
    saved: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// An empty history whose current state counts as saved.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            applied: 0,
            saved: Some(0),
        }
    }

    /// Record a committed stroke, pruning any redo branch first.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.applied < self.entries.len() {
            self.entries.truncate(self.applied);
            if self.saved.is_some_and(|s| s > self.applied) {
                self.saved = None;
            }
        }
        self.entries.push(entry);
        self.applied += 1;
    }

    /// Revert the most recent applied entry. Returns `false` at the bottom
    /// of the stack.
    pub fn undo(&mut self, volume: &mut LabelVolume) -> bool {
        let Some(index) = self.applied.checked_sub(1) else {
            return false;
        };
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        entry.revert(volume.labels_mut());
        volume.touch();
        self.applied = index;
        true
    }

    /// Reapply the next undone entry. Returns `false` at the top of the
    /// stack.
    pub fn redo(&mut self, volume: &mut LabelVolume) -> bool {
        let Some(entry) = self.entries.get(self.applied) else {
            return false;
        };
        entry.reapply(volume.labels_mut());
        volume.touch();
        self.applied += 1;
        true
    }

    #[must_use]
    pub const fn can_undo(&self) -> bool {
        self.applied > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    /// Index of the last applied entry, `None` when nothing is applied.
    #[must_use]
    pub const fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    #[must_use]
    pub const fn undo_count(&self) -> usize {
        self.applied
    }

    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.entries.len() - self.applied
    }

    /// All entries, applied ones first.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Drop every entry and treat the current state as saved.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Remember the current cursor as the saved state.
    pub const fn mark_saved(&mut self) {
        self.saved = Some(self.applied);
    }

    /// Whether the cursor has moved away from the saved state.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.saved != Some(self.applied)
    }
}
