//! Turning a finished stroke's marks into label changes.

use tracing::debug;

use crate::history::{HistoryEntry, VoxelChange};
use crate::stroke::StrokeBuffer;
use crate::types::{IntensityRange, Label, MaskError};
use crate::volume::{IntensityVolume, LabelVolume};

/// Per-voxel acceptance test over the background intensity image.
///
/// Called with the background intensity, the flat voxel index and the
/// active label.
pub trait VoxelFilter: Send {
    fn accept(&self, intensity: f32, index: usize, label: Label) -> bool;
}

impl VoxelFilter for IntensityRange {
    fn accept(&self, intensity: f32, _index: usize, _label: Label) -> bool {
        self.contains(intensity)
    }
}

impl<F> VoxelFilter for F
where
    F: Fn(f32, usize, Label) -> bool + Send,
{
    fn accept(&self, intensity: f32, index: usize, label: Label) -> bool {
        self(intensity, index, label)
    }
}

/// Which painted voxels may be committed.
///
/// The filter only takes effect when a background image is present;
/// without one every painted voxel is accepted.
#[derive(Default, Clone, Copy)]
pub struct Acceptance<'a> {
    pub background: Option<&'a IntensityVolume>,
    pub filter: Option<&'a dyn VoxelFilter>,
}

impl Acceptance<'_> {
    /// Accept every voxel.
    pub const ALL: Self = Self {
        background: None,
        filter: None,
    };

    fn accepts(&self, index: usize, label: Label) -> bool {
        match (self.background, self.filter) {
            (Some(background), Some(filter)) => background
                .sample(index)
                .is_some_and(|v| filter.accept(v, index, label)),
            _ => true,
        }
    }
}

impl std::fmt::Debug for Acceptance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptance")
            .field("background", &self.background.map(IntensityVolume::dims))
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Commit `mask` to `volume` and return the changes made.
///
/// For every marked voxel:
///
/// - **paint**: a voxel not already holding `label` that passes
///   `acceptance` is set to `label`.
/// - **erase**: a voxel holding `label` is reset to its value in
///   `initial` if that was some other label, else to 0. Erasing never
///   removes any label but the active one.
///
/// The volume's generation is bumped only if something changed.
///
/// # Errors
///
/// Returns [`MaskError::DimensionMismatch`] if `mask` or `initial` does not
/// match the volume.
pub fn apply_binary_mask(
    volume: &mut LabelVolume,
    initial: &[Label],
    mask: &StrokeBuffer,
    label: Label,
    erase: bool,
    acceptance: &Acceptance<'_>,
) -> Result<HistoryEntry, MaskError> {
    let expected = volume.dims().voxel_count();
    for actual in [mask.len(), initial.len()] {
        if actual != expected {
            return Err(MaskError::DimensionMismatch { expected, actual });
        }
    }

    let mut entry = HistoryEntry::new(label);
    let labels = volume.labels_mut();
    for index in mask.marked_indices() {
        let previous = labels[index];
        let next = if erase {
            if previous != label {
                continue;
            }
            if initial[index] == label { 0 } else { initial[index] }
        } else {
            if previous == label || !acceptance.accepts(index, label) {
                continue;
            }
            label
        };
        if next == previous {
            continue;
        }
        labels[index] = next;
        entry.changes.push(VoxelChange {
            index,
            previous,
            next,
        });
    }

    if !entry.is_empty() {
        volume.touch();
    }
    debug!(
        label,
        erase,
        marked = mask.marked_count(),
        changed = entry.len(),
        "applied binary mask"
    );
    Ok(entry)
}

/// Replace every label of `volume` with `labels` and return the changes
/// as one entry recorded under `label`.
///
/// # Errors
///
/// Returns [`MaskError::DimensionMismatch`] if `labels` does not match the
/// volume.
pub fn apply_label_map(
    volume: &mut LabelVolume,
    labels: &[Label],
    label: Label,
) -> Result<HistoryEntry, MaskError> {
    let expected = volume.dims().voxel_count();
    if labels.len() != expected {
        return Err(MaskError::DimensionMismatch {
            expected,
            actual: labels.len(),
        });
    }

    let mut entry = HistoryEntry::new(label);
    for (index, (slot, &next)) in volume.labels_mut().iter_mut().zip(labels).enumerate() {
        if *slot != next {
            entry.changes.push(VoxelChange {
                index,
                previous: *slot,
                next,
            });
            *slot = next;
        }
    }

    if !entry.is_empty() {
        volume.touch();
    }
    debug!(changed = entry.len(), "applied label map");
    Ok(entry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::brush::{Brush, BrushKernel};
    use crate::types::{Dimensions, IndexPoint, ScratchType};

    fn dims(nx: usize, ny: usize, nz: usize) -> Dimensions {
        Dimensions::new(nx, ny, nz).unwrap()
    }

    fn mask_of(d: Dimensions, marked: &[usize]) -> StrokeBuffer {
        let mut mask = StrokeBuffer::new(d, ScratchType::U8);
        for &i in marked {
            mask.mark(i);
        }
        mask
    }

    // --- Paint tests ---

    #[test]
    fn paint_records_only_changed_voxels() {
        let d = dims(4, 1, 1);
        let mut volume = LabelVolume::from_labels(d, vec![0, 1, 2, 0]).unwrap();
        let initial = volume.snapshot();
        let mask = mask_of(d, &[0, 1, 2]);

        let entry =
            apply_binary_mask(&mut volume, &initial, &mask, 1, false, &Acceptance::ALL).unwrap();

        assert_eq!(volume.labels(), &[1, 1, 1, 0]);
        assert_eq!(
            entry.changes,
            vec![
                VoxelChange { index: 0, previous: 0, next: 1 },
                VoxelChange { index: 2, previous: 2, next: 1 },
            ]
        );
        assert_eq!(volume.generation(), 1);
    }

    #[test]
    fn empty_mask_changes_nothing() {
        let d = dims(3, 1, 1);
        let mut volume = LabelVolume::new(d);
        let initial = volume.snapshot();
        let mask = mask_of(d, &[]);
        let entry =
            apply_binary_mask(&mut volume, &initial, &mask, 1, false, &Acceptance::ALL).unwrap();
        assert!(entry.is_empty());
        assert_eq!(volume.generation(), 0);
    }

    #[test]
    fn threshold_limits_painted_voxels() {
        let d = dims(4, 1, 1);
        let mut volume = LabelVolume::new(d);
        let initial = volume.snapshot();
        let background = IntensityVolume::from_samples(d, vec![0.0, 50.0, 100.0, 150.0]).unwrap();
        let range = IntensityRange {
            lower: 40.0,
            upper: 120.0,
        };
        let acceptance = Acceptance {
            background: Some(&background),
            filter: Some(&range),
        };
        let mask = mask_of(d, &[0, 1, 2, 3]);

        apply_binary_mask(&mut volume, &initial, &mask, 7, false, &acceptance).unwrap();
        assert_eq!(volume.labels(), &[0, 7, 7, 0]);
    }

    #[test]
    fn closure_filter_sees_index_and_label() {
        let d = dims(4, 1, 1);
        let mut volume = LabelVolume::new(d);
        let initial = volume.snapshot();
        let background = IntensityVolume::from_samples(d, vec![0.0; 4]).unwrap();
        let even = |_: f32, i: usize, l: Label| i % 2 == 0 && l == 3;
        let acceptance = Acceptance {
            background: Some(&background),
            filter: Some(&even),
        };
        let mask = mask_of(d, &[0, 1, 2, 3]);

        apply_binary_mask(&mut volume, &initial, &mask, 3, false, &acceptance).unwrap();
        assert_eq!(volume.labels(), &[3, 0, 3, 0]);
    }

    #[test]
    fn filter_without_background_accepts_all() {
        let d = dims(2, 1, 1);
        let mut volume = LabelVolume::new(d);
        let initial = volume.snapshot();
        let never = |_: f32, _: usize, _: Label| false;
        let acceptance = Acceptance {
            background: None,
            filter: Some(&never),
        };
        apply_binary_mask(&mut volume, &initial, &mask_of(d, &[0, 1]), 1, false, &acceptance)
            .unwrap();
        assert_eq!(volume.labels(), &[1, 1]);
    }

    // --- Erase tests ---

    #[test]
    fn erase_restores_fresh_region_to_zero() {
        // 5x5x1: a region of label 4 created this session, then erased
        // with a 3x3 brush fully inside it.
        let d = dims(5, 5, 1);
        let mut volume = LabelVolume::new(d);
        let initial = volume.snapshot();

        let mut region = StrokeBuffer::new(d, ScratchType::U8);
        region.delete();
        apply_binary_mask(&mut volume, &initial, &region, 4, false, &Acceptance::ALL).unwrap();

        let mut eraser = StrokeBuffer::new(d, ScratchType::U8);
        let brush = Brush::Kernel(BrushKernel::square(3).unwrap());
        eraser.paint(&[IndexPoint::new(2, 2, 0)], &brush, None);
        let entry =
            apply_binary_mask(&mut volume, &initial, &eraser, 4, true, &Acceptance::ALL).unwrap();

        assert_eq!(entry.len(), 9);
        for y in 0..5 {
            for x in 0..5 {
                let inside = (1..=3).contains(&x) && (1..=3).contains(&y);
                let expected = if inside { 0 } else { 4 };
                assert_eq!(volume.labels()[d.index(x, y, 0)], expected, "voxel ({x}, {y})");
            }
        }
    }

    #[test]
    fn erase_uncovers_the_initial_label() {
        let d = dims(3, 1, 1);
        let mut volume = LabelVolume::from_labels(d, vec![2, 0, 5]).unwrap();
        let initial = volume.snapshot();
        let all = mask_of(d, &[0, 1, 2]);
        apply_binary_mask(&mut volume, &initial, &all, 1, false, &Acceptance::ALL).unwrap();
        assert_eq!(volume.labels(), &[1, 1, 1]);

        apply_binary_mask(&mut volume, &initial, &all, 1, true, &Acceptance::ALL).unwrap();
        assert_eq!(volume.labels(), &[2, 0, 5]);
    }

    #[test]
    fn erase_leaves_other_labels_alone() {
        let d = dims(3, 1, 1);
        let mut volume = LabelVolume::from_labels(d, vec![1, 2, 1]).unwrap();
        let initial = volume.snapshot();
        let entry = apply_binary_mask(
            &mut volume,
            &initial,
            &mask_of(d, &[0, 1, 2]),
            1,
            true,
            &Acceptance::ALL,
        )
        .unwrap();
        assert_eq!(volume.labels(), &[0, 2, 0]);
        assert_eq!(entry.len(), 2);
    }

    // --- Label map tests ---

    #[test]
    fn label_map_records_every_difference() {
        let d = dims(4, 1, 1);
        let mut volume = LabelVolume::from_labels(d, vec![0, 1, 2, 3]).unwrap();
        let entry = apply_label_map(&mut volume, &[0, 5, 2, 0], 5).unwrap();
        assert_eq!(volume.labels(), &[0, 5, 2, 0]);
        assert_eq!(
            entry.changes,
            vec![
                VoxelChange { index: 1, previous: 1, next: 5 },
                VoxelChange { index: 3, previous: 3, next: 0 },
            ]
        );
        assert_eq!(volume.generation(), 1);
    }

    #[test]
    fn identical_label_map_is_empty() {
        let d = dims(2, 1, 1);
        let mut volume = LabelVolume::from_labels(d, vec![4, 4]).unwrap();
        assert!(apply_label_map(&mut volume, &[4, 4], 1).unwrap().is_empty());
        assert_eq!(volume.generation(), 0);
        assert!(apply_label_map(&mut volume, &[4], 1).is_err());
    }

    #[test]
    fn rejects_mismatched_initial_snapshot() {
        let d = dims(2, 1, 1);
        let mut volume = LabelVolume::new(d);
        let err = apply_binary_mask(
            &mut volume,
            &[0; 3],
            &mask_of(d, &[]),
            1,
            false,
            &Acceptance::ALL,
        )
        .unwrap_err();
        assert!(matches!(err, MaskError::DimensionMismatch { expected: 2, actual: 3 }));
    }
}
